//! Focus-timer subsystem: the Pomodoro state machine that runs in a
//! persistent background context, the command/event protocol between it and
//! the foreground, and the foreground-side bridge.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WORK_DURATION: Duration = Duration::from_secs(25 * 60);
pub const SHORT_BREAK_DURATION: Duration = Duration::from_secs(5 * 60);
pub const LONG_BREAK_DURATION: Duration = Duration::from_secs(15 * 60);
/// Every Nth completed work phase is followed by a long break.
pub const CYCLES_PER_LONG_BREAK: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerPhase {
    pub fn duration(self) -> Duration {
        match self {
            TimerPhase::Work => WORK_DURATION,
            TimerPhase::ShortBreak => SHORT_BREAK_DURATION,
            TimerPhase::LongBreak => LONG_BREAK_DURATION,
        }
    }
}

/// Outbound commands, foreground to background.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerCommand {
    StartWork,
    StartShortBreak,
    StartLongBreak,
    PauseTimer,
    ResumeTimer,
    ResetTimer,
    GetInitialState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub time_remaining: Duration,
    pub is_running: bool,
    pub cycles_completed: u32,
    /// Set on the first event after a phase transition, then cleared.
    pub phase_just_changed: bool,
    pub previous_phase: Option<TimerPhase>,
}

/// Inbound events, background to foreground.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TimerEvent {
    #[serde(rename = "TIMER_STATE")]
    State(TimerState),
    #[serde(rename = "SW_ERROR")]
    Error { message: String },
}

/// The background timer state machine. Driven by [`handle`](Self::handle)
/// for commands and [`tick`](Self::tick) for elapsed wall-clock time.
#[derive(Debug)]
pub struct FocusTimer {
    phase: TimerPhase,
    remaining: Duration,
    running: bool,
    cycles_completed: u32,
    previous_phase: Option<TimerPhase>,
    phase_just_changed: bool,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Work,
            remaining: WORK_DURATION,
            running: false,
            cycles_completed: 0,
            previous_phase: None,
            phase_just_changed: false,
        }
    }
}

impl FocusTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, command: TimerCommand) -> TimerEvent {
        match command {
            TimerCommand::StartWork => self.start_phase(TimerPhase::Work),
            TimerCommand::StartShortBreak => self.start_phase(TimerPhase::ShortBreak),
            TimerCommand::StartLongBreak => self.start_phase(TimerPhase::LongBreak),
            TimerCommand::PauseTimer => self.running = false,
            TimerCommand::ResumeTimer => {
                if !self.remaining.is_zero() {
                    self.running = true;
                }
            }
            TimerCommand::ResetTimer => *self = Self::default(),
            TimerCommand::GetInitialState => {}
        }
        self.state_event()
    }

    /// Advances the clock. Returns an event while the timer is running;
    /// a phase that runs out advances to the next one and keeps running.
    pub fn tick(&mut self, elapsed: Duration) -> Option<TimerEvent> {
        if !self.running {
            return None;
        }
        if elapsed < self.remaining {
            self.remaining -= elapsed;
            return Some(self.state_event());
        }

        let finished = self.phase;
        self.previous_phase = Some(finished);
        self.phase_just_changed = true;
        match finished {
            TimerPhase::Work => {
                self.cycles_completed += 1;
                self.phase = if self.cycles_completed % CYCLES_PER_LONG_BREAK == 0 {
                    TimerPhase::LongBreak
                } else {
                    TimerPhase::ShortBreak
                };
            }
            TimerPhase::ShortBreak | TimerPhase::LongBreak => {
                self.phase = TimerPhase::Work;
            }
        }
        self.remaining = self.phase.duration();
        Some(self.state_event())
    }

    fn start_phase(&mut self, phase: TimerPhase) {
        if self.phase != phase {
            self.previous_phase = Some(self.phase);
            self.phase_just_changed = true;
        }
        self.phase = phase;
        self.remaining = phase.duration();
        self.running = true;
    }

    fn state_event(&mut self) -> TimerEvent {
        let state = TimerState {
            phase: self.phase,
            time_remaining: self.remaining,
            is_running: self.running,
            cycles_completed: self.cycles_completed,
            phase_just_changed: self.phase_just_changed,
            previous_phase: self.previous_phase,
        };
        self.phase_just_changed = false;
        TimerEvent::State(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("focus timer background context unavailable; command dropped")]
pub struct TimerUnavailable;

/// Foreground side of the timer channel. Commands queue while the background
/// context is reachable and are dropped with an error otherwise; inbound
/// events fold into an eventually-consistent `last_state`.
#[derive(Debug, Default)]
pub struct TimerBridge {
    connected: bool,
    outbound: VecDeque<TimerCommand>,
    last_state: Option<TimerState>,
}

impl TimerBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self) {
        self.connected = true;
        self.outbound.push_back(TimerCommand::GetInitialState);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.outbound.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn send(&mut self, command: TimerCommand) -> Result<(), TimerUnavailable> {
        if !self.connected {
            tracing::warn!(?command, "dropping timer command, background context unavailable");
            return Err(TimerUnavailable);
        }
        self.outbound.push_back(command);
        Ok(())
    }

    pub fn next_outbound(&mut self) -> Option<TimerCommand> {
        self.outbound.pop_front()
    }

    pub fn apply(&mut self, event: &TimerEvent) {
        match event {
            TimerEvent::State(state) => self.last_state = Some(state.clone()),
            TimerEvent::Error { message } => {
                tracing::warn!(%message, "background timer reported an error");
            }
        }
    }

    pub fn last_state(&self) -> Option<&TimerState> {
        self.last_state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(event: TimerEvent) -> TimerState {
        match event {
            TimerEvent::State(state) => state,
            TimerEvent::Error { message } => panic!("unexpected error event: {message}"),
        }
    }

    #[test]
    fn initial_state_is_paused_work() {
        let mut timer = FocusTimer::new();
        let st = state(timer.handle(TimerCommand::GetInitialState));
        assert_eq!(st.phase, TimerPhase::Work);
        assert_eq!(st.time_remaining, WORK_DURATION);
        assert!(!st.is_running);
        assert_eq!(st.cycles_completed, 0);
    }

    #[test]
    fn work_phase_flows_into_short_break() {
        let mut timer = FocusTimer::new();
        timer.handle(TimerCommand::StartWork);
        let st = state(timer.tick(WORK_DURATION).unwrap());
        assert_eq!(st.phase, TimerPhase::ShortBreak);
        assert_eq!(st.cycles_completed, 1);
        assert!(st.phase_just_changed);
        assert_eq!(st.previous_phase, Some(TimerPhase::Work));
        assert!(st.is_running);
    }

    #[test]
    fn fourth_work_phase_earns_a_long_break() {
        let mut timer = FocusTimer::new();
        timer.handle(TimerCommand::StartWork);
        for cycle in 1..=4u32 {
            let st = state(timer.tick(WORK_DURATION).unwrap());
            assert_eq!(st.cycles_completed, cycle);
            if cycle < 4 {
                assert_eq!(st.phase, TimerPhase::ShortBreak);
                let back = state(timer.tick(SHORT_BREAK_DURATION).unwrap());
                assert_eq!(back.phase, TimerPhase::Work);
            } else {
                assert_eq!(st.phase, TimerPhase::LongBreak);
            }
        }
    }

    #[test]
    fn phase_just_changed_is_one_shot() {
        let mut timer = FocusTimer::new();
        timer.handle(TimerCommand::StartWork);
        let first = state(timer.tick(WORK_DURATION).unwrap());
        assert!(first.phase_just_changed);
        let second = state(timer.tick(Duration::from_secs(1)).unwrap());
        assert!(!second.phase_just_changed);
        assert_eq!(second.previous_phase, Some(TimerPhase::Work));
    }

    #[test]
    fn pause_and_resume() {
        let mut timer = FocusTimer::new();
        timer.handle(TimerCommand::StartWork);
        timer.tick(Duration::from_secs(60));
        let paused = state(timer.handle(TimerCommand::PauseTimer));
        assert!(!paused.is_running);
        assert!(timer.tick(Duration::from_secs(60)).is_none());

        let resumed = state(timer.handle(TimerCommand::ResumeTimer));
        assert!(resumed.is_running);
        assert_eq!(resumed.time_remaining, WORK_DURATION - Duration::from_secs(60));
    }

    #[test]
    fn reset_returns_to_the_initial_state() {
        let mut timer = FocusTimer::new();
        timer.handle(TimerCommand::StartWork);
        timer.tick(WORK_DURATION);
        let st = state(timer.handle(TimerCommand::ResetTimer));
        assert_eq!(st.phase, TimerPhase::Work);
        assert_eq!(st.time_remaining, WORK_DURATION);
        assert_eq!(st.cycles_completed, 0);
        assert!(!st.is_running);
    }

    #[test]
    fn bridge_drops_commands_while_disconnected() {
        let mut bridge = TimerBridge::new();
        assert_eq!(bridge.send(TimerCommand::StartWork), Err(TimerUnavailable));
        assert!(bridge.next_outbound().is_none());

        bridge.connect();
        assert_eq!(bridge.next_outbound(), Some(TimerCommand::GetInitialState));
        bridge.send(TimerCommand::StartWork).unwrap();
        assert_eq!(bridge.next_outbound(), Some(TimerCommand::StartWork));
    }

    #[test]
    fn bridge_tracks_the_latest_state() {
        let mut bridge = TimerBridge::new();
        let mut timer = FocusTimer::new();
        bridge.connect();
        bridge.apply(&timer.handle(TimerCommand::StartWork));
        assert!(bridge.last_state().unwrap().is_running);

        bridge.apply(&TimerEvent::Error {
            message: "context torn down".into(),
        });
        // errors are logged, the last state stays as-is
        assert!(bridge.last_state().unwrap().is_running);
    }

    #[test]
    fn events_serialize_with_protocol_tags() {
        let mut timer = FocusTimer::new();
        let wire = serde_json::to_string(&timer.handle(TimerCommand::GetInitialState)).unwrap();
        assert!(wire.contains("\"type\":\"TIMER_STATE\""));

        let err = TimerEvent::Error {
            message: "boom".into(),
        };
        let wire = serde_json::to_string(&err).unwrap();
        assert!(wire.contains("\"type\":\"SW_ERROR\""));

        let cmd = serde_json::to_string(&TimerCommand::StartShortBreak).unwrap();
        assert_eq!(cmd, "\"START_SHORT_BREAK\"");
    }
}
