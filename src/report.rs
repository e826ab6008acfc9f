use std::io::{self, Write};

use crossterm::style::Stylize;
use rust_decimal::prelude::*;

use crate::cli::Selection;
use crate::model::{Field, Snapshot};

/// Direction of a percent change between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

/// A percent change, already rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub percent: String,
    pub trend: Trend,
}

impl Delta {
    /// Percent change from `previous` to `current`.
    ///
    /// Returns `None` when the change rounds to zero or cannot be computed.
    pub fn between(previous: f64, current: f64) -> Option<Self> {
        let delta = 100.0 - (previous / current * 100.0);
        if !delta.is_finite() {
            return None;
        }

        // exact ties round away from zero
        let percent = match Decimal::from_f64_retain(delta) {
            Some(exact) => {
                let rounded =
                    exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                if rounded.is_zero() {
                    return None;
                }
                format!("{rounded:.2}")
            }
            None => format!("{delta:.2}"),
        };

        let trend = if delta > 0.0 { Trend::Up } else { Trend::Down };
        Some(Self { percent, trend })
    }

    fn render(&self, color: bool) -> String {
        let text = match self.trend {
            Trend::Up => format!("+{}%", self.percent),
            Trend::Down => format!("{}%", self.percent),
        };

        match (color, self.trend) {
            (false, _) => format!(" {text}"),
            (true, Trend::Up) => format!(" {}", text.dark_green()),
            (true, Trend::Down) => format!(" {}", text.dark_red()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: &'static str,
    pub value: String,
    pub delta: Option<Delta>,
}

impl Line {
    pub fn render(&self, color: bool) -> String {
        let delta = self
            .delta
            .as_ref()
            .map(|d| d.render(color))
            .unwrap_or_default();
        format!(" {:<7}{}{}", self.label, self.value, delta)
    }
}

/// The lines printed for one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub lines: Vec<Line>,
}

impl Report {
    /// Build the report for `current`. Deltas are only computed in continuous mode and only
    /// once a previous snapshot exists.
    pub fn build(
        current: &Snapshot,
        previous: Option<&Snapshot>,
        selection: &Selection,
        continuous: bool,
    ) -> Self {
        let previous = previous.filter(|_| continuous);

        let mut lines: Vec<Line> = Field::ALL
            .into_iter()
            .filter(|&field| selection.contains(field))
            .map(|field| Line {
                label: field.name(),
                value: current.stat(field).raw.clone(),
                delta: previous.and_then(|p| Delta::between(p.value(field), current.value(field))),
            })
            .collect();

        if selection.spread {
            let spread = current.spread();
            lines.push(Line {
                label: "spread",
                value: spread.to_string(),
                delta: previous.and_then(|p| Delta::between(p.spread(), spread)),
            });
        }

        Self { lines }
    }

    pub fn render(&self, color: bool) -> Vec<String> {
        self.lines.iter().map(|line| line.render(color)).collect()
    }

    /// Write the report framed by blank lines.
    pub fn print<W: Write>(&self, out: &mut W, color: bool) -> io::Result<()> {
        writeln!(out)?;
        for line in self.render(color) {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
        out.flush()
    }
}

/// Write the notice shown for any failed poll.
pub fn print_failure<W: Write>(err: &mut W, color: bool) -> io::Result<()> {
    const NOTICE: &str = "something went wrong accessing the stats.";
    if color {
        writeln!(err, " {}\n", NOTICE.dark_red())?;
    } else {
        writeln!(err, " {NOTICE}\n")?;
    }
    err.flush()
}
