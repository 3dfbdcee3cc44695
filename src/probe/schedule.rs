use std::time::Duration;

use tokio::time::Instant;

use super::Probe;
use crate::docker::RuntimeApi;
use crate::error::ResultOkLogExt;
use crate::report::EventSink;

/// Returns how long to sleep so that the next tick starts on the grid
/// `origin + k * interval`, whatever the duration of the previous tick.
///
/// # Arguments
///
/// * `interval` - Time between two ticks.
/// * `elapsed` - Time since the origin of the grid.
pub fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    let interval_nanos = interval.as_nanos();
    if interval_nanos == 0 {
        return Duration::ZERO;
    }
    let into_period = elapsed.as_nanos() % interval_nanos;
    interval.saturating_sub(Duration::from_nanos(
        u64::try_from(into_period).unwrap_or(u64::MAX),
    ))
}

/// Drives `probe` forever, one tick per `interval`.
///
/// Ticks never overlap. A tick that fails is logged and the loop continues
/// with the next one.
pub async fn run<A: RuntimeApi, S: EventSink>(mut probe: Probe<A, S>, interval: Duration) {
    let origin = Instant::now();
    loop {
        let started = Instant::now();
        probe.tick().await.ok_log("tick failed");
        log::trace!("tick took {} ms", started.elapsed().as_millis());

        tokio::time::sleep(next_sleep(interval, origin.elapsed())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_sleep_compensates_tick_duration() {
        let interval = Duration::from_secs(5);
        assert_eq!(next_sleep(interval, Duration::ZERO), interval);
        assert_eq!(
            next_sleep(interval, Duration::from_millis(1_200)),
            Duration::from_millis(3_800)
        );
        assert_eq!(
            next_sleep(interval, Duration::from_millis(11_500)),
            Duration::from_millis(3_500)
        );
    }

    #[test]
    fn test_next_sleep_on_grid_waits_full_interval() {
        let interval = Duration::from_secs(5);
        assert_eq!(next_sleep(interval, Duration::from_secs(10)), interval);
    }

    #[test]
    fn test_next_sleep_zero_interval() {
        assert_eq!(
            next_sleep(Duration::ZERO, Duration::from_secs(3)),
            Duration::ZERO
        );
    }
}
