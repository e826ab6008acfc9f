//! Poll cycle: fetch a snapshot, report it, remember it for the next delta.
//!
//! In continuous mode a new tick aborts any request still in flight, and results are
//! applied inside the loop so two cycles never update the previous snapshot at once.

use std::io::{self, Stderr, Stdout, Write};
use std::sync::Arc;

use itertools::Itertools;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cli::Settings;
use crate::client::{FetchError, TickerSource};
use crate::model::Snapshot;
use crate::report::{print_failure, Report};

/// Continuous mode gives up once this many polls have failed.
pub const MAX_FAILURES: u32 = 5;

/// How the poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Completed,
    Failed,
}

type InFlight = JoinHandle<Result<Snapshot, FetchError>>;

enum Event {
    Settled(Result<Snapshot, FetchError>),
    Tick,
}

pub struct Poller<S, O = Stdout, E = Stderr> {
    source: Arc<S>,
    settings: Settings,
    previous: Option<Snapshot>,
    failures: u32,
    out: O,
    err: E,
}

impl<S: TickerSource + 'static> Poller<S> {
    pub fn new(source: S, settings: Settings) -> Self {
        Self::with_output(source, settings, io::stdout(), io::stderr())
    }
}

impl<S, O, E> Poller<S, O, E>
where
    S: TickerSource + 'static,
    O: Write,
    E: Write,
{
    pub fn with_output(source: S, settings: Settings, out: O, err: E) -> Self {
        Self {
            source: Arc::new(source),
            settings,
            previous: None,
            failures: 0,
            out,
            err,
        }
    }

    pub async fn run(&mut self) -> eyre::Result<Exit> {
        info!(
            continuous = self.settings.continuous,
            interval_secs = self.settings.interval.as_secs(),
            stats = %self.selected_names(),
            "poller started"
        );

        if !self.settings.continuous {
            let result = self.source.poll().await;
            return self.apply(result);
        }

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<InFlight> = None;

        loop {
            match next_event(&mut ticker, &mut in_flight).await {
                Event::Settled(result) => {
                    in_flight = None;
                    if self.apply(result)? == Exit::Failed {
                        return Ok(Exit::Failed);
                    }
                }
                Event::Tick => {
                    if let Some(stale) = in_flight.take() {
                        stale.abort();
                        warn!("previous request still pending, cancelling it");
                        if self.apply(Err(FetchError::Cancelled))? == Exit::Failed {
                            return Ok(Exit::Failed);
                        }
                    }
                    in_flight = Some(self.spawn_fetch());
                }
            }
        }
    }

    fn spawn_fetch(&self) -> InFlight {
        debug!("polling ticker");
        let source = Arc::clone(&self.source);
        tokio::spawn(async move { source.poll().await })
    }

    /// Report a successful poll or count a failed one.
    fn apply(&mut self, result: Result<Snapshot, FetchError>) -> eyre::Result<Exit> {
        match result {
            Ok(snapshot) => {
                debug!(fetched_at = %snapshot.fetched_at, "ticker parsed");
                let report = Report::build(
                    &snapshot,
                    self.previous.as_ref(),
                    &self.settings.selection,
                    self.settings.continuous,
                );
                report.print(&mut self.out, self.settings.color)?;
                self.previous = Some(snapshot);
                Ok(Exit::Completed)
            }
            Err(e) => {
                // never reset, so this counts every failure since start
                self.failures += 1;
                warn!(
                    error = %e,
                    transport = e.is_transport(),
                    failures = self.failures,
                    "poll failed"
                );
                print_failure(&mut self.err, self.settings.color)?;

                if !self.settings.continuous {
                    return Ok(Exit::Failed);
                }
                if self.failures >= MAX_FAILURES {
                    warn!(failures = self.failures, "too many failed polls, giving up");
                    return Ok(Exit::Failed);
                }
                Ok(Exit::Completed)
            }
        }
    }

    fn selected_names(&self) -> String {
        let selection = &self.settings.selection;
        selection
            .fields
            .iter()
            .map(|f| f.name())
            .chain(selection.spread.then_some("spread"))
            .join(",")
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Wait for whichever comes first: the in-flight result or the next tick.
///
/// A finished result always wins over a tick that is ready at the same time.
async fn next_event(ticker: &mut Interval, in_flight: &mut Option<InFlight>) -> Event {
    tokio::select! {
        biased;
        result = settle(in_flight) => Event::Settled(result),
        _ = ticker.tick() => Event::Tick,
    }
}

/// Wait for the in-flight request, or forever when there is none.
async fn settle(in_flight: &mut Option<InFlight>) -> Result<Snapshot, FetchError> {
    match in_flight {
        Some(handle) => handle.await?,
        None => std::future::pending().await,
    }
}
