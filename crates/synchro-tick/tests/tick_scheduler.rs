//! Integration tests for the fixed-interval tick scheduler.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle (auto-advance) or when a test calls `time::advance`. That makes
//! deadlines and lateness exact.

use std::time::Duration;

use synchro_tick::{TickConfig, TickMetrics, TickPolicy, TickScheduler};
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

fn config_100ms() -> TickConfig {
    TickConfig::every(Duration::from_millis(100))
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_100ms_skip() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval, Duration::from_millis(100));
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.initial_jitter_us, 0);
    assert!(cfg.metrics_enabled);
}

#[test]
fn test_tick_policy_serde_names() {
    assert_eq!(serde_json::to_string(&TickPolicy::Drop).unwrap(), r#""drop""#);
    let skip: TickPolicy = serde_json::from_str(r#""skip""#).unwrap();
    assert_eq!(skip, TickPolicy::Skip);
}

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = TickConfig::every(Duration::ZERO).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_clamps_thresholds() {
    let cfg = TickConfig {
        budget_warn_threshold: 1.5,
        budget_critical_threshold: 0.5,
        ..config_100ms()
    }
    .validated();
    assert_eq!(cfg.budget_critical_threshold, 0.5);
    assert_eq!(cfg.budget_warn_threshold, 0.5);

    let cfg = TickConfig {
        budget_warn_threshold: -1.0,
        ..config_100ms()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 0.0);
}

// =========================================================================
// Scheduler creation and accessors
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_initial_state() {
    let s = TickScheduler::new(config_100ms());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.interval(), Duration::from_millis(100));
    assert_eq!(s.policy(), TickPolicy::Skip);
}

#[tokio::test(start_paused = true)]
async fn test_every_constructor_validates() {
    let s = TickScheduler::every(Duration::ZERO);
    assert_eq!(s.interval(), Duration::from_millis(1));
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_after_one_interval() {
    let start = Instant::now();
    let mut s = TickScheduler::new(config_100ms());

    let info = s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert_eq!(info.tick, 1);
    assert_eq!(info.interval, Duration::from_millis(100));
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_evenly_spaced() {
    let start = Instant::now();
    let mut s = TickScheduler::new(config_100ms());

    for expected in 1..=5u64 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(start.elapsed(), Duration::from_millis(100 * expected));
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_delays_first_tick_only() {
    let start = Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter_us: 2_000,
        ..config_100ms()
    });

    s.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_millis(100));
    assert!(first < Duration::from_millis(102));

    s.wait_for_tick().await;
    assert_eq!(start.elapsed() - first, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_deadline() {
    let start = Instant::now();
    let mut s = TickScheduler::new(config_100ms());

    // Abandon the wait halfway, as a losing select! branch would.
    let result = time::timeout(Duration::from_millis(40), s.wait_for_tick()).await;
    assert!(result.is_err());
    assert_eq!(s.tick_count(), 0);

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(start.elapsed(), Duration::from_millis(100));
}

// =========================================================================
// Overrun handling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_skipped_ticks() {
    let mut s = TickScheduler::new(config_100ms());

    // The owner stalls for 350 ms before polling: due at 100, seen at 350.
    time::advance(Duration::from_millis(350)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);

    // Rescheduled from "now", so the next tick is a full interval away.
    let before = Instant::now();
    let info = s.wait_for_tick().await;
    assert!(!info.overrun);
    assert_eq!(before.elapsed(), Duration::from_millis(100));

    let m = s.metrics();
    assert_eq!(m.total_ticks, 2);
    assert_eq!(m.total_overruns, 1);
    assert_eq!(m.total_skipped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_slight_delay_is_not_an_overrun() {
    let mut s = TickScheduler::new(config_100ms());

    // 5 ms late is within the 10% tolerance.
    time::advance(Duration::from_millis(105)).await;
    let info = s.wait_for_tick().await;
    assert!(!info.overrun);
    assert_eq!(s.metrics().total_overruns, 0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let start = Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_100ms()
    });

    time::advance(Duration::from_millis(250)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);

    // The 200 ms deadline already passed: the next tick fires at once.
    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert_eq!(start.elapsed(), Duration::from_millis(250));

    // Back on the grid at 300 ms.
    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

// =========================================================================
// Metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_100ms());
    assert_eq!(s.metrics(), &TickMetrics::default());
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(config_100ms());
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_tracks_work_time() {
    let mut s = TickScheduler::new(config_100ms());

    s.wait_for_tick().await;
    // Tick work is measured on the wall clock, not Tokio's paused clock.
    std::thread::sleep(Duration::from_micros(200));
    s.record_tick_end();

    let m = s.metrics();
    assert!(m.max_tick_time > Duration::ZERO);
    assert!(m.avg_tick_time > Duration::ZERO);
    assert!(m.budget_utilization > 0.0);
    assert!(m.budget_utilization < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_timing() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..config_100ms()
    });

    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(200));
    s.record_tick_end();

    assert_eq!(s.metrics().total_ticks, 1);
    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// Integration: select! loop pattern (mirrors the world actor)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = TickScheduler::new(config_100ms());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        time::sleep(Duration::from_millis(50)).await;
        tx.send("frame").await.ok();
        time::sleep(Duration::from_millis(300)).await;
        tx.send("stop").await.ok();
    });

    let mut ticks_fired = 0u64;
    let mut commands = Vec::new();
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                if cmd == "stop" {
                    break;
                }
                commands.push(cmd);
            }
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    assert_eq!(commands, vec!["frame"]);
    assert_eq!(ticks_fired, 3, "ticks at 100, 200, 300 ms before stop at 350");
}
