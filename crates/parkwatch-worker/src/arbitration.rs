//! Motion arbitration: the device state machine.
//!
//! Pure decision functions over `(state, last_motion_at, now)`. Handlers
//! execute the decided effect against storage with a compare-and-swap filter
//! on the previous state, so two racing requests for the same device cannot
//! both win a transition. No background timers exist anywhere: the
//! THEFT_DETECTED -> WATCH recovery is decided here and evaluated lazily at
//! the top of every poll.

use entity::device::DeviceState;
use serde::Deserialize;

/// How long THEFT_DETECTED persists without a fresh motion report before the
/// next poll recovers the device back to WATCH. Strict: a poll at exactly the
/// threshold still sees THEFT_DETECTED.
pub const MOTION_SILENCE_TIMEOUT_MS: i64 = 10_000;

/// Outcome of a device motion report, decided from current state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionDecision {
    /// Device is IDLE: sensor noise or a report that arrived after the owner
    /// disarmed. Not an error; nothing is recorded.
    Ignore,
    /// WATCH -> THEFT_DETECTED. The only edge that logs a MotionEvent and
    /// dispatches an alert, which is what bounds notifications to one per
    /// episode.
    StartEpisode,
    /// Already THEFT_DETECTED: refresh the motion clock, log nothing, notify
    /// nobody.
    RefreshEpisode,
}

pub fn on_motion(state: DeviceState) -> MotionDecision {
    match state {
        DeviceState::Idle => MotionDecision::Ignore,
        DeviceState::Watch => MotionDecision::StartEpisode,
        DeviceState::TheftDetected => MotionDecision::RefreshEpisode,
    }
}

/// Lazy-recovery check, evaluated before every poll answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Answer with the stored state as-is.
    Unchanged,
    /// The episode went silent: transition THEFT_DETECTED -> WATCH and clear
    /// the alarm before answering.
    Recover,
}

pub fn on_poll(state: DeviceState, last_motion_at: Option<i64>, now_ms: i64) -> PollDecision {
    if state != DeviceState::TheftDetected {
        return PollDecision::Unchanged;
    }
    // A THEFT_DETECTED device without a motion timestamp cannot time out;
    // it stays put until a report or an owner command moves it.
    let Some(last) = last_motion_at else {
        return PollDecision::Unchanged;
    };

    if now_ms - last > MOTION_SILENCE_TIMEOUT_MS {
        PollDecision::Recover
    } else {
        PollDecision::Unchanged
    }
}

/// The two states an owner may command directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OwnerTarget {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "WATCH")]
    Watch,
}

/// Effect of an owner state command. Idempotent: commanding the current state
/// re-applies the same effect (IDLE always clears the alarm and purges event
/// history, even from IDLE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCommand {
    pub state: DeviceState,
    pub alarm_active: bool,
    pub purge_events: bool,
}

pub fn owner_set_state(target: OwnerTarget) -> StateCommand {
    match target {
        // The "it was me" / explicit-disarm path, from any prior state.
        OwnerTarget::Idle => StateCommand {
            state: DeviceState::Idle,
            alarm_active: false,
            purge_events: true,
        },
        OwnerTarget::Watch => StateCommand {
            state: DeviceState::Watch,
            alarm_active: false,
            purge_events: false,
        },
    }
}

/// Forced reset applied when a device is unclaimed: back to IDLE, alarm off,
/// history purged.
pub fn unclaim_reset() -> StateCommand {
    StateCommand {
        state: DeviceState::Idle,
        alarm_active: false,
        purge_events: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_motion_is_ignored() {
        assert_eq!(on_motion(DeviceState::Idle), MotionDecision::Ignore);
    }

    #[test]
    fn watch_motion_starts_episode() {
        assert_eq!(on_motion(DeviceState::Watch), MotionDecision::StartEpisode);
    }

    #[test]
    fn repeated_motion_only_refreshes() {
        assert_eq!(
            on_motion(DeviceState::TheftDetected),
            MotionDecision::RefreshEpisode
        );
    }

    #[test]
    fn poll_recovers_only_after_threshold() {
        let t = 1_700_000_000_000;

        // Just inside the window: still THEFT_DETECTED.
        assert_eq!(
            on_poll(DeviceState::TheftDetected, Some(t), t + MOTION_SILENCE_TIMEOUT_MS - 1),
            PollDecision::Unchanged
        );
        // Exactly at the threshold: still THEFT_DETECTED (strict comparison).
        assert_eq!(
            on_poll(DeviceState::TheftDetected, Some(t), t + MOTION_SILENCE_TIMEOUT_MS),
            PollDecision::Unchanged
        );
        // One past it: recover.
        assert_eq!(
            on_poll(DeviceState::TheftDetected, Some(t), t + MOTION_SILENCE_TIMEOUT_MS + 1),
            PollDecision::Recover
        );
    }

    #[test]
    fn poll_never_recovers_outside_theft() {
        let t = 1_700_000_000_000;
        assert_eq!(
            on_poll(DeviceState::Idle, Some(t), t + 60_000),
            PollDecision::Unchanged
        );
        assert_eq!(
            on_poll(DeviceState::Watch, Some(t), t + 60_000),
            PollDecision::Unchanged
        );
    }

    #[test]
    fn poll_without_motion_clock_stays_put() {
        assert_eq!(
            on_poll(DeviceState::TheftDetected, None, i64::MAX),
            PollDecision::Unchanged
        );
    }

    #[test]
    fn owner_idle_clears_alarm_and_purges() {
        let cmd = owner_set_state(OwnerTarget::Idle);
        assert_eq!(cmd.state, DeviceState::Idle);
        assert!(!cmd.alarm_active);
        assert!(cmd.purge_events);
    }

    #[test]
    fn owner_watch_clears_alarm_but_keeps_history() {
        let cmd = owner_set_state(OwnerTarget::Watch);
        assert_eq!(cmd.state, DeviceState::Watch);
        assert!(!cmd.alarm_active);
        assert!(!cmd.purge_events);
    }

    #[test]
    fn unclaim_resets_everything() {
        let cmd = unclaim_reset();
        assert_eq!(cmd.state, DeviceState::Idle);
        assert!(!cmd.alarm_active);
        assert!(cmd.purge_events);
    }

    #[test]
    fn owner_target_parses_wire_form() {
        assert_eq!(
            serde_json::from_str::<OwnerTarget>("\"IDLE\"").unwrap(),
            OwnerTarget::Idle
        );
        assert_eq!(
            serde_json::from_str::<OwnerTarget>("\"WATCH\"").unwrap(),
            OwnerTarget::Watch
        );
        assert!(serde_json::from_str::<OwnerTarget>("\"THEFT_DETECTED\"").is_err());
    }

    /// In-memory stand-in for one device row plus its event log. Applies
    /// decisions the same way the handlers do against storage, with an
    /// injected clock instead of sleeping.
    struct Harness {
        state: DeviceState,
        alarm_active: bool,
        last_motion_at: Option<i64>,
        events: usize,
        notifications: usize,
    }

    impl Harness {
        fn armed() -> Self {
            Harness {
                state: DeviceState::Watch,
                alarm_active: false,
                last_motion_at: None,
                events: 0,
                notifications: 0,
            }
        }

        fn report_motion(&mut self, now_ms: i64) -> bool {
            match on_motion(self.state) {
                MotionDecision::Ignore => false,
                MotionDecision::StartEpisode => {
                    self.state = DeviceState::TheftDetected;
                    self.last_motion_at = Some(now_ms);
                    self.events += 1;
                    self.notifications += 1;
                    true
                }
                MotionDecision::RefreshEpisode => {
                    self.last_motion_at = Some(now_ms);
                    true
                }
            }
        }

        fn poll(&mut self, now_ms: i64) -> (DeviceState, bool) {
            if on_poll(self.state, self.last_motion_at, now_ms) == PollDecision::Recover {
                self.state = DeviceState::Watch;
                self.alarm_active = false;
            }
            (self.state, self.alarm_active)
        }

        fn set_state(&mut self, target: OwnerTarget) {
            let cmd = owner_set_state(target);
            self.state = cmd.state;
            self.alarm_active = cmd.alarm_active;
            if cmd.purge_events {
                self.events = 0;
            }
        }
    }

    #[test]
    fn episode_produces_exactly_one_event_and_alert() {
        let mut dev = Harness::armed();
        let t = 1_700_000_000_000;

        assert!(dev.report_motion(t));
        assert!(dev.report_motion(t + 1_000));
        assert!(dev.report_motion(t + 2_000));

        assert_eq!(dev.state, DeviceState::TheftDetected);
        assert_eq!(dev.events, 1);
        assert_eq!(dev.notifications, 1);
        assert_eq!(dev.last_motion_at, Some(t + 2_000));
    }

    #[test]
    fn acknowledged_theft_clears_history() {
        let mut dev = Harness::armed();
        let t = 1_700_000_000_000;
        dev.report_motion(t);

        dev.set_state(OwnerTarget::Idle);
        assert_eq!(dev.state, DeviceState::Idle);
        assert_eq!(dev.events, 0);

        // Late-arriving report after disarm is dropped.
        assert!(!dev.report_motion(t + 3_000));
        assert_eq!(dev.notifications, 1);
    }

    #[test]
    fn silent_episode_recovers_on_poll() {
        let mut dev = Harness::armed();
        let t = 1_700_000_000_000;
        dev.report_motion(t);

        assert_eq!(dev.poll(t + 5_000), (DeviceState::TheftDetected, false));
        // 11 simulated seconds of silence.
        assert_eq!(dev.poll(t + 11_000), (DeviceState::Watch, false));

        // Re-armed: the next motion opens a fresh episode with a fresh alert.
        assert!(dev.report_motion(t + 12_000));
        assert_eq!(dev.events, 2);
        assert_eq!(dev.notifications, 2);
    }

    #[test]
    fn intervening_motion_defers_recovery() {
        let mut dev = Harness::armed();
        let t = 1_700_000_000_000;
        dev.report_motion(t);
        dev.report_motion(t + 9_000);

        // 11s after the first report, but only 2s after the refresh.
        assert_eq!(dev.poll(t + 11_000), (DeviceState::TheftDetected, false));
        assert_eq!(dev.poll(t + 9_000 + 10_001), (DeviceState::Watch, false));
    }
}
