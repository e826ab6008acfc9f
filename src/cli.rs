use std::time::Duration;

use clap::Parser;

use crate::client::DEFAULT_ENDPOINT;
use crate::model::Field;

/// Bitcoin market stats from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Run continuously, query every 30 seconds
    #[arg(short, long)]
    pub cont: bool,

    /// Output buy
    #[arg(short, long)]
    pub buy: bool,

    /// Output sell
    #[arg(short, long)]
    pub sell: bool,

    /// Output spread (rounded)
    #[arg(short = 'S', long)]
    pub spread: bool,

    /// Output high
    #[arg(short = 'H', long)]
    pub high: bool,

    /// Output low
    #[arg(short = 'L', long)]
    pub low: bool,

    /// Output average
    #[arg(short, long)]
    pub avg: bool,

    /// Output volume
    #[arg(short, long)]
    pub vol: bool,

    /// Output volume-weighted average price
    #[arg(short = 'p', long)]
    pub vwap: bool,

    /// Output last
    #[arg(short, long)]
    pub last: bool,

    /// Output all available stats
    #[arg(short = 'A', long)]
    pub all: bool,

    /// Custom interval in seconds for continuous output
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Print plain text without colors
    #[arg(long)]
    pub no_color: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "error")]
    pub log_level: String,

    /// Ticker endpoint
    #[arg(long, env = "COINSTAT_ENDPOINT", default_value = DEFAULT_ENDPOINT, hide = true)]
    pub endpoint: String,
}

/// Which statistics a report includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub fields: Vec<Field>,
    pub spread: bool,
}

impl Selection {
    /// The stats shown when nothing specific was asked for.
    pub fn default_fields() -> Self {
        Self {
            fields: vec![Field::Buy, Field::Sell, Field::High, Field::Low],
            spread: false,
        }
    }

    pub fn all() -> Self {
        Self {
            fields: Field::ALL.to_vec(),
            spread: true,
        }
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.spread
    }
}

/// Everything the poll loop needs to know from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub selection: Selection,
    pub continuous: bool,
    pub interval: Duration,
    pub color: bool,
}

impl Args {
    pub fn selection(&self) -> Selection {
        if self.all {
            return Selection::all();
        }

        let flags = [
            (Field::Buy, self.buy),
            (Field::Sell, self.sell),
            (Field::High, self.high),
            (Field::Low, self.low),
            (Field::Avg, self.avg),
            (Field::Vol, self.vol),
            (Field::Vwap, self.vwap),
            (Field::Last, self.last),
        ];
        let selection = Selection {
            fields: flags
                .into_iter()
                .filter_map(|(field, on)| on.then_some(field))
                .collect(),
            spread: self.spread,
        };

        if selection.is_empty() {
            Selection::default_fields()
        } else {
            selection
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            selection: self.selection(),
            continuous: self.cont,
            interval: Duration::from_secs(self.interval),
            color: !self.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("coinstat").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_buy_sell_high_low() {
        let args = parse(&[]);
        assert_eq!(args.selection(), Selection::default_fields());
        assert!(!args.cont);
        assert_eq!(args.settings().interval, Duration::from_secs(30));
    }

    #[test]
    fn continuous_alone_keeps_default_selection() {
        let args = parse(&["-c", "-i", "5"]);
        let settings = args.settings();
        assert!(settings.continuous);
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.selection, Selection::default_fields());
    }

    #[test]
    fn all_selects_everything() {
        let args = parse(&["--all", "-b"]);
        let selection = args.selection();
        assert_eq!(selection.fields, Field::ALL.to_vec());
        assert!(selection.spread);
    }

    #[test]
    fn explicit_flags_replace_defaults() {
        let args = parse(&["-v", "-l", "-p"]);
        let selection = args.selection();
        assert_eq!(selection.fields, vec![Field::Vol, Field::Vwap, Field::Last]);
        assert!(!selection.spread);
    }

    #[test]
    fn spread_alone_is_a_selection() {
        let selection = parse(&["-S"]).selection();
        assert!(selection.fields.is_empty());
        assert!(selection.spread);
    }

    #[test]
    fn short_flags_map_to_fields() {
        let selection = parse(&["-bsHLa"]).selection();
        assert_eq!(
            selection.fields,
            vec![Field::Buy, Field::Sell, Field::High, Field::Low, Field::Avg]
        );
    }

    #[test]
    fn rejects_zero_interval() {
        let argv = ["coinstat", "-c", "-i", "0"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn no_color_disables_styling() {
        assert!(!parse(&["--no-color"]).settings().color);
        assert!(parse(&[]).settings().color);
    }
}
