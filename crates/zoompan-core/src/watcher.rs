#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;

const TRANSITION_LOG_CAPACITY: usize = 256;

/// Readiness-poll lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    /// A probe has been requested and its result is pending.
    Probing,
    /// The last probe found nothing; a retry timer is armed.
    Waiting,
    Attached,
    /// Gave up (attempt budget spent or cancelled). Terminal.
    Exhausted,
}

impl WatchState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Waiting => "waiting",
            Self::Attached => "attached",
            Self::Exhausted => "exhausted",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Attached | Self::Exhausted)
    }
}

/// Event classes accepted by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    StartRequested,
    ProbeResult,
    RetryTimerElapsed,
    Tick,
    CancelRequested,
}

impl WatchEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartRequested => "start_requested",
            Self::ProbeResult => "probe_result",
            Self::RetryTimerElapsed => "retry_timer_elapsed",
            Self::Tick => "tick",
            Self::CancelRequested => "cancel_requested",
        }
    }
}

/// Side effects the host performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchActionKind {
    /// Query the document for ready surfaces and report back with
    /// [`WatchEvent::ProbeResult`].
    Probe,
    ScheduleRetry,
    AttachSurfaces,
}

impl WatchActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::ScheduleRetry => "schedule_retry",
            Self::AttachSurfaces => "attach_surfaces",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchAction {
    pub kind: WatchActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl WatchAction {
    #[must_use]
    pub const fn probe() -> Self {
        Self {
            kind: WatchActionKind::Probe,
            deadline_ms: None,
            attempt: None,
            count: None,
        }
    }

    #[must_use]
    pub const fn schedule_retry(deadline_ms: u64, attempt: u32) -> Self {
        Self {
            kind: WatchActionKind::ScheduleRetry,
            deadline_ms: Some(deadline_ms),
            attempt: Some(attempt),
            count: None,
        }
    }

    #[must_use]
    pub const fn attach_surfaces(count: usize) -> Self {
        Self {
            kind: WatchActionKind::AttachSurfaces,
            deadline_ms: None,
            attempt: None,
            count: Some(count),
        }
    }
}

/// Retry policy. Fixed interval, no backoff growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Retries after the first probe. The poll window is
    /// `max_attempts * interval_ms`.
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSnapshot {
    pub state: WatchState,
    pub attempt: u32,
    pub max_attempts: u32,
    pub retry_deadline_ms: Option<u64>,
    pub attached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchTransition {
    pub seq: u64,
    pub at_ms: u64,
    pub event: WatchEventKind,
    pub from_state: WatchState,
    pub to_state: WatchState,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub actions: Vec<WatchAction>,
}

impl WatchTransition {
    /// Serialize one JSONL diagnostics line.
    #[must_use]
    pub fn to_jsonl_line(&self, run_id: &str) -> String {
        let record = WatchTransitionJsonl {
            schema_version: "zoompan-jsonl-v1",
            event: "watch_state_transition",
            run_id,
            ts_ms: self.at_ms,
            transition_seq: self.seq,
            watch_event: self.event.as_str(),
            from_state: self.from_state.as_str(),
            to_state: self.to_state.as_str(),
            attempt: self.attempt,
            retry_deadline_ms: self.retry_deadline_ms,
            reason: self.reason.as_deref(),
            actions: &self.actions,
        };
        match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(error) => serde_json::to_string(&json!({
                "schema_version": "zoompan-jsonl-v1",
                "event": "watch_state_transition_encode_error",
                "run_id": run_id,
                "ts_ms": self.at_ms,
                "transition_seq": self.seq,
                "error": error.to_string(),
            }))
            .unwrap_or_else(|_| {
                "{\"schema_version\":\"zoompan-jsonl-v1\",\"event\":\"watch_state_transition_encode_error\"}".to_owned()
            }),
        }
    }
}

#[derive(Serialize)]
struct WatchTransitionJsonl<'a> {
    schema_version: &'static str,
    event: &'static str,
    run_id: &'a str,
    ts_ms: u64,
    transition_seq: u64,
    watch_event: &'static str,
    from_state: &'static str,
    to_state: &'static str,
    attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_deadline_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    actions: &'a [WatchAction],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Start,
    /// Outcome of a probe: how many ready, not-yet-attached surfaces exist.
    ProbeResult { ready: usize },
    Tick,
    Cancel,
}

/// Bounded fixed-interval readiness poll for diagram surfaces.
///
/// One initial probe, then up to `max_attempts` retries spaced `interval_ms`
/// apart. The first probe that finds a surface wins; running out of attempts
/// is silent.
#[derive(Debug, Clone)]
pub struct SurfaceWatcher {
    config: WatchConfig,
    state: WatchState,
    attempt: u32,
    retry_deadline_ms: Option<u64>,
    attached: usize,
    transition_seq: u64,
    transitions: VecDeque<WatchTransition>,
}

impl Default for SurfaceWatcher {
    fn default() -> Self {
        Self::new(WatchConfig::default())
    }
}

impl SurfaceWatcher {
    #[must_use]
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            state: WatchState::Idle,
            attempt: 0,
            retry_deadline_ms: None,
            attached: 0,
            transition_seq: 0,
            transitions: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &WatchConfig {
        &self.config
    }

    #[must_use]
    pub fn snapshot(&self) -> WatchSnapshot {
        WatchSnapshot {
            state: self.state,
            attempt: self.attempt,
            max_attempts: self.config.max_attempts,
            retry_deadline_ms: self.retry_deadline_ms,
            attached: self.attached,
        }
    }

    pub fn handle_event(&mut self, now_ms: u64, event: WatchEvent) -> WatchTransition {
        match event {
            WatchEvent::Start => self.on_start(now_ms),
            WatchEvent::ProbeResult { ready } => self.on_probe_result(now_ms, ready),
            WatchEvent::Tick => self.on_tick(now_ms),
            WatchEvent::Cancel => self.on_cancel(now_ms),
        }
    }

    #[must_use]
    pub fn drain_transitions(&mut self) -> Vec<WatchTransition> {
        self.transitions.drain(..).collect()
    }

    #[must_use]
    pub fn drain_transition_jsonl(&mut self, run_id: &str) -> Vec<String> {
        self.drain_transitions()
            .into_iter()
            .map(|transition| transition.to_jsonl_line(run_id))
            .collect()
    }

    fn on_start(&mut self, now_ms: u64) -> WatchTransition {
        let from_state = self.state;
        let mut reason = None;
        let mut actions = Vec::new();

        if self.state == WatchState::Idle {
            self.state = WatchState::Probing;
            self.attempt = 0;
            actions.push(WatchAction::probe());
        } else {
            reason = Some("ignored_in_current_state".to_owned());
        }

        self.record_transition(
            now_ms,
            WatchEventKind::StartRequested,
            from_state,
            reason,
            actions,
        )
    }

    fn on_probe_result(&mut self, now_ms: u64, ready: usize) -> WatchTransition {
        let from_state = self.state;
        let mut actions = Vec::new();

        if self.state != WatchState::Probing {
            return self.record_transition(
                now_ms,
                WatchEventKind::ProbeResult,
                from_state,
                Some("ignored_in_current_state".to_owned()),
                actions,
            );
        }

        let reason = if ready > 0 {
            self.state = WatchState::Attached;
            self.attached = ready;
            self.retry_deadline_ms = None;
            actions.push(WatchAction::attach_surfaces(ready));
            "surfaces_ready"
        } else if self.attempt < self.config.max_attempts {
            let deadline = now_ms.saturating_add(self.config.interval_ms);
            self.state = WatchState::Waiting;
            self.attempt = self.attempt.saturating_add(1);
            self.retry_deadline_ms = Some(deadline);
            actions.push(WatchAction::schedule_retry(deadline, self.attempt));
            "not_ready"
        } else {
            self.state = WatchState::Exhausted;
            self.retry_deadline_ms = None;
            "attempts_exhausted"
        };

        self.record_transition(
            now_ms,
            WatchEventKind::ProbeResult,
            from_state,
            Some(reason.to_owned()),
            actions,
        )
    }

    fn on_tick(&mut self, now_ms: u64) -> WatchTransition {
        let from_state = self.state;

        if self.state == WatchState::Waiting
            && self
                .retry_deadline_ms
                .is_some_and(|deadline| now_ms >= deadline)
        {
            self.state = WatchState::Probing;
            self.retry_deadline_ms = None;
            return self.record_transition(
                now_ms,
                WatchEventKind::RetryTimerElapsed,
                from_state,
                None,
                vec![WatchAction::probe()],
            );
        }

        self.record_transition(
            now_ms,
            WatchEventKind::Tick,
            from_state,
            Some("no_timer_elapsed".to_owned()),
            Vec::new(),
        )
    }

    fn on_cancel(&mut self, now_ms: u64) -> WatchTransition {
        let from_state = self.state;
        let reason = if matches!(
            self.state,
            WatchState::Idle | WatchState::Probing | WatchState::Waiting
        ) {
            self.state = WatchState::Exhausted;
            self.retry_deadline_ms = None;
            "cancelled"
        } else {
            "ignored_in_current_state"
        };

        self.record_transition(
            now_ms,
            WatchEventKind::CancelRequested,
            from_state,
            Some(reason.to_owned()),
            Vec::new(),
        )
    }

    fn record_transition(
        &mut self,
        now_ms: u64,
        event: WatchEventKind,
        from_state: WatchState,
        reason: Option<String>,
        actions: Vec<WatchAction>,
    ) -> WatchTransition {
        self.transition_seq = self.transition_seq.saturating_add(1);
        let transition = WatchTransition {
            seq: self.transition_seq,
            at_ms: now_ms,
            event,
            from_state,
            to_state: self.state,
            attempt: self.attempt,
            retry_deadline_ms: self.retry_deadline_ms,
            reason,
            actions,
        };

        #[cfg(feature = "tracing")]
        if transition.from_state != transition.to_state {
            tracing::debug!(
                event = transition.event.as_str(),
                from = transition.from_state.as_str(),
                to = transition.to_state.as_str(),
                attempt = transition.attempt,
                "surface watcher transition"
            );
        }

        if self.transitions.len() >= TRANSITION_LOG_CAPACITY {
            let _ = self.transitions.pop_front();
        }
        self.transitions.push_back(transition.clone());
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    /// Drive the watcher the way the web host does: probe on `Probe`, sleep
    /// until the deadline on `ScheduleRetry`.
    fn run_to_completion(watcher: &mut SurfaceWatcher, mut probe: impl FnMut(u32) -> usize) -> u32 {
        let mut now = 0;
        let mut probes = 0;
        let mut pending = watcher.handle_event(now, WatchEvent::Start).actions;
        while let Some(action) = pending.pop() {
            match action.kind {
                WatchActionKind::Probe => {
                    let ready = probe(probes);
                    probes += 1;
                    pending = watcher
                        .handle_event(now, WatchEvent::ProbeResult { ready })
                        .actions;
                }
                WatchActionKind::ScheduleRetry => {
                    now = action.deadline_ms.expect("retry carries deadline");
                    pending = watcher.handle_event(now, WatchEvent::Tick).actions;
                }
                WatchActionKind::AttachSurfaces => {}
            }
        }
        probes
    }

    #[test]
    fn start_requests_a_probe() {
        let mut watcher = SurfaceWatcher::default();
        let start = watcher.handle_event(0, WatchEvent::Start);
        assert_eq!(start.from_state, WatchState::Idle);
        assert_eq!(start.to_state, WatchState::Probing);
        assert_eq!(start.actions, vec![WatchAction::probe()]);
    }

    #[test]
    fn ready_surface_on_first_probe_attaches_immediately() {
        let mut watcher = SurfaceWatcher::default();
        watcher.handle_event(0, WatchEvent::Start);
        let found = watcher.handle_event(1, WatchEvent::ProbeResult { ready: 2 });
        assert_eq!(found.to_state, WatchState::Attached);
        assert_eq!(found.actions, vec![WatchAction::attach_surfaces(2)]);
        assert_eq!(watcher.snapshot().attached, 2);
    }

    #[test]
    fn missing_surface_schedules_fixed_interval_retry() {
        let mut watcher = SurfaceWatcher::default();
        watcher.handle_event(0, WatchEvent::Start);
        let miss = watcher.handle_event(5, WatchEvent::ProbeResult { ready: 0 });
        assert_eq!(miss.to_state, WatchState::Waiting);
        assert_eq!(miss.actions, vec![WatchAction::schedule_retry(205, 1)]);

        let early = watcher.handle_event(204, WatchEvent::Tick);
        assert_eq!(early.event, WatchEventKind::Tick);
        assert_eq!(early.to_state, WatchState::Waiting);
        assert!(early.actions.is_empty());

        let due = watcher.handle_event(205, WatchEvent::Tick);
        assert_eq!(due.event, WatchEventKind::RetryTimerElapsed);
        assert_eq!(due.to_state, WatchState::Probing);
        assert_eq!(due.actions, vec![WatchAction::probe()]);

        let miss = watcher.handle_event(206, WatchEvent::ProbeResult { ready: 0 });
        assert_eq!(miss.actions, vec![WatchAction::schedule_retry(406, 2)]);
    }

    #[test]
    fn absent_surface_exhausts_silently_after_thirty_retries() {
        let mut watcher = SurfaceWatcher::default();
        let probes = run_to_completion(&mut watcher, |_| 0);
        assert_eq!(probes, 31);
        let snapshot = watcher.snapshot();
        assert_eq!(snapshot.state, WatchState::Exhausted);
        assert_eq!(snapshot.attempt, 30);
        assert_eq!(snapshot.attached, 0);

        let transitions = watcher.drain_transitions();
        let last = transitions.last().expect("at least one transition");
        assert_eq!(last.reason.as_deref(), Some("attempts_exhausted"));
        assert!(last.actions.is_empty());
        assert_eq!(last.at_ms, 30 * 200);
        assert!(
            transitions
                .iter()
                .flat_map(|t| &t.actions)
                .all(|a| a.kind != WatchActionKind::AttachSurfaces)
        );
    }

    #[test]
    fn late_render_attaches_and_stops_polling() {
        let mut watcher = SurfaceWatcher::default();
        let probes = run_to_completion(&mut watcher, |n| usize::from(n == 1));
        assert_eq!(probes, 2);
        assert_eq!(watcher.state(), WatchState::Attached);

        let after = watcher.handle_event(10_000, WatchEvent::Tick);
        assert!(after.actions.is_empty());
        let stray = watcher.handle_event(10_001, WatchEvent::ProbeResult { ready: 1 });
        assert_eq!(stray.reason.as_deref(), Some("ignored_in_current_state"));
        assert!(stray.actions.is_empty());
    }

    #[test]
    fn zero_attempt_budget_probes_once() {
        let mut watcher = SurfaceWatcher::new(WatchConfig {
            max_attempts: 0,
            interval_ms: 200,
        });
        assert_eq!(run_to_completion(&mut watcher, |_| 0), 1);
        assert_eq!(watcher.state(), WatchState::Exhausted);
    }

    #[test]
    fn cancel_while_waiting_is_terminal() {
        let mut watcher = SurfaceWatcher::default();
        watcher.handle_event(0, WatchEvent::Start);
        watcher.handle_event(0, WatchEvent::ProbeResult { ready: 0 });
        let cancel = watcher.handle_event(50, WatchEvent::Cancel);
        assert_eq!(cancel.to_state, WatchState::Exhausted);
        assert_eq!(cancel.reason.as_deref(), Some("cancelled"));
        assert_eq!(watcher.snapshot().retry_deadline_ms, None);

        let tick = watcher.handle_event(1_000, WatchEvent::Tick);
        assert!(tick.actions.is_empty());
        let restart = watcher.handle_event(1_001, WatchEvent::Start);
        assert_eq!(restart.reason.as_deref(), Some("ignored_in_current_state"));
        assert!(restart.actions.is_empty());
    }

    #[test]
    fn cancel_after_attach_is_ignored() {
        let mut watcher = SurfaceWatcher::default();
        watcher.handle_event(0, WatchEvent::Start);
        watcher.handle_event(0, WatchEvent::ProbeResult { ready: 1 });
        let cancel = watcher.handle_event(1, WatchEvent::Cancel);
        assert_eq!(cancel.to_state, WatchState::Attached);
        assert_eq!(cancel.reason.as_deref(), Some("ignored_in_current_state"));
    }

    #[test]
    fn transition_log_is_bounded_to_capacity() {
        let mut watcher = SurfaceWatcher::default();
        for idx in 0..(TRANSITION_LOG_CAPACITY + 8) {
            let timestamp = u64::try_from(idx).expect("idx fits into u64");
            watcher.handle_event(timestamp, WatchEvent::Tick);
        }
        let drained = watcher.drain_transitions();
        assert_eq!(drained.len(), TRANSITION_LOG_CAPACITY);
        assert!(drained.first().is_some_and(|entry| entry.seq > 1));
    }

    #[test]
    fn transition_jsonl_contains_required_fields() {
        let mut watcher = SurfaceWatcher::default();
        watcher.handle_event(0, WatchEvent::Start);
        let miss = watcher.handle_event(42, WatchEvent::ProbeResult { ready: 0 });
        let line = miss.to_jsonl_line("run-1");
        let parsed: Value = serde_json::from_str(&line).expect("transition line should parse");

        assert_eq!(parsed["schema_version"], "zoompan-jsonl-v1");
        assert_eq!(parsed["event"], "watch_state_transition");
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["ts_ms"], 42);
        assert_eq!(parsed["from_state"], "probing");
        assert_eq!(parsed["to_state"], "waiting");
        assert_eq!(parsed["watch_event"], "probe_result");
        assert_eq!(parsed["retry_deadline_ms"], 242);
        assert_eq!(parsed["actions"][0]["kind"], "schedule_retry");
        assert_eq!(parsed["actions"][0]["attempt"], 1);
    }

    #[test]
    fn terminal_states() {
        assert!(WatchState::Attached.is_terminal());
        assert!(WatchState::Exhausted.is_terminal());
        assert!(!WatchState::Waiting.is_terminal());
    }
}
