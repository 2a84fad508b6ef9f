//! Client-side scrape-run orchestration.
//!
//! Drives a long-running provider job to completion without blocking the
//! caller: a poll timer issues status checks at a fixed cadence, while an
//! independent 1 s countdown tracks the user-facing wait budget. When the
//! budget runs out the cadence escalates exactly once; when the overtime
//! floor is reached the run is abandoned as timed out.
//!
//! Both timers live in a single task so cancellation tears them down
//! together, and a poll result that races with cancellation is discarded
//! rather than applied.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use adlens_core::Ad;

use crate::error::ScrapeError;

/// Result of one status check against the run.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Still in flight; no state change is emitted.
    Running,
    /// The run finished and produced these normalized ads.
    Completed(Vec<Ad>),
    /// The run terminated; the message is the provider's, verbatim.
    Failed(String),
}

/// One status check. Implemented over HTTP against the server's
/// scrape-status endpoint, and by scripted fakes in tests.
pub trait StatusPoll: Send + 'static {
    fn check(
        &mut self,
        run_id: &str,
    ) -> impl Future<Output = Result<PollOutcome, ScrapeError>> + Send;
}

/// Client-observable run events, in emission order. After a terminal
/// event (`Completed`, `Failed`, `TimedOut`) the channel closes; nothing
/// ever follows a terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The poll loop has started.
    Polling,
    Completed(Vec<Ad>),
    Failed(String),
    TimedOut,
}

/// Whether this run is a fresh trigger (countdown + hard ceiling) or a
/// force refresh (no wait budget — the caller cancels when it loses
/// interest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Fresh,
    ForceRefresh,
}

/// Timing knobs for the poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub poll_interval: Duration,
    pub fast_poll_interval: Duration,
    /// User-facing wait budget for a fresh trigger, in seconds.
    pub wait_budget_secs: u32,
    /// Overtime past the budget before giving up, in seconds.
    pub overtime_secs: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            fast_poll_interval: Duration::from_secs(3),
            wait_budget_secs: 300,
            overtime_secs: 180,
        }
    }
}

impl PollConfig {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_app_config(config: &adlens_core::AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.scrape_poll_interval_secs),
            fast_poll_interval: Duration::from_secs(config.scrape_fast_poll_interval_secs),
            wait_budget_secs: config.scrape_wait_budget_secs as u32,
            overtime_secs: config.scrape_overtime_secs as u32,
        }
    }
}

/// Handle to one running poll loop.
///
/// There is exactly one loop per handle; triggering a second run while
/// one is outstanding is a caller error. Dropping the handle cancels the
/// loop the same way [`RunHandle::cancel`] does.
pub struct RunHandle {
    pub run_id: String,
    events: mpsc::UnboundedReceiver<RunEvent>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Next observable event; `None` once the loop has terminated.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`RunHandle::next_event`].
    pub fn try_event(&mut self) -> Option<RunEvent> {
        self.events.try_recv().ok()
    }

    /// Stops both timers. No further side effects occur; an in-flight
    /// status check is discarded, not applied.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Waits for the poll loop task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns the poll loop for an already-triggered run.
///
/// The first status check fires immediately, not after the first
/// interval elapses.
pub fn start<P: StatusPoll>(
    run_id: impl Into<String>,
    poller: P,
    mode: TriggerMode,
    config: PollConfig,
) -> RunHandle {
    let run_id = run_id.into();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let task = tokio::spawn(poll_loop(
        run_id.clone(),
        poller,
        mode,
        config,
        events_tx,
        cancel_rx,
    ));

    RunHandle {
        run_id,
        events: events_rx,
        cancel: cancel_tx,
        task,
    }
}

async fn poll_loop<P: StatusPoll>(
    run_id: String,
    mut poller: P,
    mode: TriggerMode,
    config: PollConfig,
    events: mpsc::UnboundedSender<RunEvent>,
    mut cancel: watch::Receiver<bool>,
) {
    let _ = events.send(RunEvent::Polling);

    let mut poll = tokio::time::interval(config.poll_interval);
    // A slow status check must not cause a burst of catch-up polls.
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The countdown starts one second in; its default Burst behavior
    // catches up seconds spent inside a status check, keeping the budget
    // aligned with wall-clock time.
    let mut countdown = tokio::time::interval_at(
        tokio::time::Instant::now() + Duration::from_secs(1),
        Duration::from_secs(1),
    );

    let fresh = mode == TriggerMode::Fresh;
    let mut remaining = i64::from(config.wait_budget_secs);
    let overtime_floor = -i64::from(config.overtime_secs);
    let mut escalated = false;

    loop {
        tokio::select! {
            biased;

            // Explicit cancel, or the handle was dropped.
            _ = cancel.changed() => break,

            _ = countdown.tick(), if fresh => {
                remaining -= 1;
                if !escalated && remaining <= 0 {
                    escalated = true;
                    poll = tokio::time::interval(config.fast_poll_interval);
                    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    tracing::info!(
                        run_id = %run_id,
                        fast_interval_secs = config.fast_poll_interval.as_secs(),
                        "wait budget exhausted — escalating poll cadence"
                    );
                }
                if remaining <= overtime_floor {
                    tracing::warn!(run_id = %run_id, "overtime exhausted — abandoning run");
                    let _ = events.send(RunEvent::TimedOut);
                    break;
                }
            }

            _ = poll.tick() => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.changed() => break,
                    outcome = poller.check(&run_id) => outcome,
                };
                if *cancel.borrow() {
                    break;
                }
                match outcome {
                    Ok(PollOutcome::Running) => {}
                    Ok(PollOutcome::Completed(ads)) => {
                        let _ = events.send(RunEvent::Completed(ads));
                        break;
                    }
                    Ok(PollOutcome::Failed(message)) => {
                        let _ = events.send(RunEvent::Failed(message));
                        break;
                    }
                    Err(err) => {
                        // Transient; the next tick is the retry.
                        tracing::warn!(run_id = %run_id, error = %err, "status check failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;
    use serde_json::json;

    use crate::brand_match::resolve_brand_url;
    use crate::normalize::{normalize_record, NormalizeContext, PLACEHOLDER_THUMBNAIL_URL};

    use super::*;

    /// Scripted poller: pops one outcome per check, then keeps reporting
    /// `Running`. Optionally records the paused-clock time of each check.
    struct ScriptedPoll {
        script: VecDeque<Result<PollOutcome, ScrapeError>>,
        check_times: Option<Arc<Mutex<Vec<Duration>>>>,
        started: tokio::time::Instant,
        check_delay: Option<Duration>,
    }

    impl ScriptedPoll {
        fn new(script: Vec<Result<PollOutcome, ScrapeError>>) -> Self {
            Self {
                script: script.into(),
                check_times: None,
                started: tokio::time::Instant::now(),
                check_delay: None,
            }
        }

        fn recording(times: Arc<Mutex<Vec<Duration>>>) -> Self {
            let mut poll = Self::new(Vec::new());
            poll.check_times = Some(times);
            poll
        }
    }

    impl StatusPoll for ScriptedPoll {
        async fn check(&mut self, _run_id: &str) -> Result<PollOutcome, ScrapeError> {
            if let Some(times) = &self.check_times {
                times.lock().unwrap().push(self.started.elapsed());
            }
            if let Some(delay) = self.check_delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .pop_front()
                .unwrap_or(Ok(PollOutcome::Running))
        }
    }

    fn normalized_fixture_ads() -> Vec<Ad> {
        let observed = chrono::Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap();
        let known = vec!["https://example.com/ads/library/?view_all_page_id=1".to_owned()];
        let raw_items = vec![
            json!({
                "ad_archive_id": "a1",
                "page_name": "Lumina Skin",
                "reach": 1000,
                "snapshot": { "cards": [{
                    "title": "Get Glowing Skin",
                    "resized_image_url": "https://cdn.example.com/a1.jpg"
                }]}
            }),
            // No media anywhere: placeholder must be applied.
            json!({ "ad_archive_id": "a2", "page_name": "Lumina Skin", "reach": 50 }),
        ];
        let mut ctx = NormalizeContext::new();
        raw_items
            .iter()
            .map(|raw| {
                let brand_url = resolve_brand_url(raw, &known);
                normalize_record(raw, &brand_url, observed, &mut ctx)
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_third_poll_with_normalized_dataset() {
        let ads = normalized_fixture_ads();
        let poller = ScriptedPoll::new(vec![
            Ok(PollOutcome::Running),
            Ok(PollOutcome::Running),
            Ok(PollOutcome::Completed(ads.clone())),
        ]);
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        assert_eq!(handle.next_event().await, Some(RunEvent::Polling));
        let completed = handle.next_event().await;
        match completed {
            Some(RunEvent::Completed(got)) => {
                assert_eq!(got.len(), 2);
                assert_eq!(got[0].thumbnail_url, "https://cdn.example.com/a1.jpg");
                assert_eq!(got[1].thumbnail_url, PLACEHOLDER_THUMBNAIL_URL);
                assert!(got.iter().all(|ad| ad.last_seen >= ad.first_seen.unwrap_or(ad.last_seen)));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        // Terminal: the channel closes, nothing follows.
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_fires_immediately() {
        let times = Arc::new(Mutex::new(Vec::new()));
        let poller = ScriptedPoll::recording(Arc::clone(&times));
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        assert_eq!(handle.next_event().await, Some(RunEvent::Polling));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(times.lock().unwrap().first(), Some(&Duration::ZERO));
        handle.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_surfaced_verbatim_and_terminal() {
        let poller = ScriptedPoll::new(vec![Ok(PollOutcome::Failed(
            "Actor run was aborted by the user".to_owned(),
        ))]);
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        assert_eq!(handle.next_event().await, Some(RunEvent::Polling));
        assert_eq!(
            handle.next_event().await,
            Some(RunEvent::Failed("Actor run was aborted by the user".to_owned()))
        );
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_on_next_tick() {
        let ads = normalized_fixture_ads();
        let poller = ScriptedPoll::new(vec![
            Err(ScrapeError::ApiError("temporarily unavailable".to_owned())),
            Ok(PollOutcome::Completed(ads)),
        ]);
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        assert_eq!(handle.next_event().await, Some(RunEvent::Polling));
        assert!(matches!(
            handle.next_event().await,
            Some(RunEvent::Completed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_cadence_once_then_times_out_at_the_ceiling() {
        let times = Arc::new(Mutex::new(Vec::new()));
        let poller = ScriptedPoll::recording(Arc::clone(&times));
        let started = tokio::time::Instant::now();
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        assert_eq!(handle.next_event().await, Some(RunEvent::Polling));
        assert_eq!(handle.next_event().await, Some(RunEvent::TimedOut));
        assert_eq!(started.elapsed(), Duration::from_secs(480));
        assert_eq!(handle.next_event().await, None);

        let times = times.lock().unwrap();
        // Initial cadence: immediate check, then every 5 s through the
        // 300 s budget window.
        assert_eq!(times.first(), Some(&Duration::ZERO));
        let slow: Vec<_> = times
            .iter()
            .filter(|t| **t <= Duration::from_secs(300))
            .collect();
        assert_eq!(slow.len(), 61);
        // Escalated cadence: 3 s apart during overtime, switched exactly
        // once (a 5 s gap would reappear if it switched back).
        assert!(times.contains(&Duration::from_secs(303)));
        assert!(times.contains(&Duration::from_secs(477)));
        let overtime: Vec<_> = times
            .iter()
            .filter(|t| **t > Duration::from_secs(300))
            .collect();
        for pair in overtime.windows(2) {
            assert_eq!(*pair[1] - *pair[0], Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_has_no_wait_ceiling() {
        let poller = ScriptedPoll::new(Vec::new());
        let mut handle = start(
            "run-1",
            poller,
            TriggerMode::ForceRefresh,
            PollConfig::default(),
        );

        tokio::time::sleep(Duration::from_secs(1_000)).await;
        assert_eq!(handle.try_event(), Some(RunEvent::Polling));
        assert_eq!(handle.try_event(), None);
        handle.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_discards_in_flight_result() {
        let ads = normalized_fixture_ads();
        let mut poller = ScriptedPoll::new(vec![Ok(PollOutcome::Completed(ads))]);
        poller.check_delay = Some(Duration::from_secs(10));
        let mut handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());

        // The first check is in flight (it sleeps 10 s); cancel mid-call.
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        assert_eq!(handle.try_event(), Some(RunEvent::Polling));
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        let times = Arc::new(Mutex::new(Vec::new()));
        let poller = ScriptedPoll::recording(Arc::clone(&times));
        let handle = start("run-1", poller, TriggerMode::Fresh, PollConfig::default());
        tokio::time::sleep(Duration::from_secs(6)).await;
        let checks_before_drop = times.lock().unwrap().len();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(times.lock().unwrap().len(), checks_before_drop);
    }
}
