use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{FixedOffset, Utc};
use log::{debug, info, warn};
use tokio::time::sleep;

use crate::broadcast::ChangeSignal;
use crate::config::{POLL_SLEEP_FLOOR_MS, QUOTE_BACKOFF_SECS, RATE_BACKOFF_MS};
use crate::feed::gate::{QuoteGate, QuoteRecord, RateGate, RateRecord};
use crate::feed::quote::QuoteFetch;
use crate::feed::rate::RateFetch;
use crate::store::BoundedHistory;

/// Polls the rate feed forever. Transport and parse failures are recoverable:
/// log, back off, retry. Accepted observations land in the shared history and
/// fire the change signal.
pub async fn run_rate_poller(
    fetcher: Arc<dyn RateFetch>,
    history: BoundedHistory<RateRecord>,
    mut gate: RateGate,
    changed: ChangeSignal,
    poll_interval: Duration,
) {
    info!(
        "📈 Rate poller started (interval: {}ms)",
        poll_interval.as_millis()
    );

    loop {
        let started = Instant::now();

        match fetcher.fetch().await {
            Ok(observation) => {
                if let Some(record) = gate.evaluate(observation) {
                    debug!(
                        "Rate accepted: buy={} sell={} at {}",
                        record.buying_rate, record.selling_rate, record.observed_at
                    );
                    history.append(record);
                    changed.notify();
                }
                sleep(next_sleep(poll_interval, started.elapsed())).await;
            }
            Err(e) => {
                warn!("Rate fetch failed: {}", e);
                sleep(Duration::from_millis(RATE_BACKOFF_MS)).await;
            }
        }
    }
}

/// Polls the quote feed forever, same failure discipline as the rate poller.
/// Kept quotes are stamped with local wall-clock time (WIB).
pub async fn run_quote_poller(
    fetcher: Arc<dyn QuoteFetch>,
    history: BoundedHistory<QuoteRecord>,
    changed: ChangeSignal,
    poll_interval: Duration,
) {
    info!(
        "💱 Quote poller started (interval: {}s)",
        poll_interval.as_secs()
    );

    loop {
        let started = Instant::now();

        match fetcher.fetch().await {
            Ok(price) => {
                if QuoteGate::should_keep(&price, history.last().as_ref()) {
                    debug!("Quote accepted: {}", price);
                    history.append(QuoteRecord {
                        price,
                        observed_at: wib_time(),
                    });
                    changed.notify();
                }
                sleep(next_sleep(poll_interval, started.elapsed())).await;
            }
            Err(e) => {
                warn!("Quote fetch failed: {}", e);
                sleep(Duration::from_secs(QUOTE_BACKOFF_SECS)).await;
            }
        }
    }
}

/// Sleeps for the remainder of the poll interval so slow fetches do not stack
/// up, with a small floor so the loop always yields.
fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    let floor = Duration::from_millis(POLL_SLEEP_FLOOR_MS);
    interval.saturating_sub(elapsed).max(floor)
}

/// Current wall-clock time in WIB (UTC+7), HH:MM:SS.
fn wib_time() -> String {
    let wib = FixedOffset::east_opt(7 * 3600).expect("valid fixed offset");
    Utc::now().with_timezone(&wib).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_sleep_subtracts_elapsed() {
        let interval = Duration::from_millis(250);
        let remaining = next_sleep(interval, Duration::from_millis(100));
        assert_eq!(remaining, Duration::from_millis(150));
    }

    #[test]
    fn test_next_sleep_floors_on_slow_fetch() {
        let interval = Duration::from_millis(250);
        let remaining = next_sleep(interval, Duration::from_millis(900));
        assert_eq!(remaining, Duration::from_millis(POLL_SLEEP_FLOOR_MS));
    }

    #[test]
    fn test_wib_time_format() {
        let time = wib_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.as_bytes()[2], b':');
        assert_eq!(time.as_bytes()[5], b':');
    }
}
