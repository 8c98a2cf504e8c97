//! Visibility monitor.
//!
//! The embedding layer holds a cloneable [`VisibilitySignal`] and reports
//! focus transitions: page-hidden and window-blur both map to `hidden()`.
//! The monitor keeps one grace deadline at a time; repeated hidden events
//! while a deadline is pending do not stack timers, and returning to visible
//! before the deadline cancels it with no violation. After a violation fires
//! the user must return and leave again to trigger another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::clock::Clock;
use crate::monitor::{MonitorStats, STOP_POLL_MS};
use crate::{ViolationKind, ViolationSink, VISIBILITY_GRACE_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VisibilityEvent {
    Hidden,
    Visible,
}

/// Handle through which the embedding layer reports focus changes.
#[derive(Clone, Debug)]
pub struct VisibilitySignal {
    events: Sender<VisibilityEvent>,
}

impl VisibilitySignal {
    pub(crate) fn new(events: Sender<VisibilityEvent>) -> Self {
        Self { events }
    }

    /// Report the page becoming hidden or the window losing focus.
    pub fn hidden(&self) {
        // Send failures mean the monitor already stopped; nothing to report.
        let _ = self.events.send(VisibilityEvent::Hidden);
    }

    /// Report the page returning to visible/focused.
    pub fn visible(&self) {
        let _ = self.events.send(VisibilityEvent::Visible);
    }
}

/// One-shot grace-deadline state machine for focus loss.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityRule {
    grace_ms: u64,
    deadline_ms: Option<u64>,
}

impl VisibilityRule {
    pub fn new(grace_ms: u64) -> Self {
        Self {
            grace_ms,
            deadline_ms: None,
        }
    }

    /// A hidden event arms the deadline unless one is already pending.
    pub fn on_hidden(&mut self, now_ms: u64) {
        if self.deadline_ms.is_none() {
            self.deadline_ms = Some(now_ms + self.grace_ms);
        }
    }

    /// A visible event cancels any pending deadline.
    pub fn on_visible(&mut self) {
        self.deadline_ms = None;
    }

    /// Returns true when a pending deadline has expired.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms > deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }
}

pub(crate) fn spawn_visibility_monitor(
    events: Receiver<VisibilityEvent>,
    sink: ViolationSink,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<MonitorStats> {
    std::thread::spawn(move || {
        let mut stats = MonitorStats::default();
        let mut rule = VisibilityRule::new(VISIBILITY_GRACE_MS);

        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            stats.ticks += 1;
            match events.recv_timeout(Duration::from_millis(STOP_POLL_MS)) {
                Ok(VisibilityEvent::Hidden) => {
                    stats.samples += 1;
                    rule.on_hidden(clock.now_ms());
                }
                Ok(VisibilityEvent::Visible) => {
                    stats.samples += 1;
                    rule.on_visible();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // All signal handles dropped; keep polling the pending
                    // deadline until stop.
                    std::thread::sleep(Duration::from_millis(STOP_POLL_MS));
                }
            }

            let now = clock.now_ms();
            if rule.poll(now) && !stop.load(Ordering::SeqCst) {
                sink.record(ViolationKind::TabHiddenOrBlur, now, None);
            }
        }

        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_past_grace_fires_once() {
        let mut rule = VisibilityRule::new(3_000);
        rule.on_hidden(1_000);
        assert!(!rule.poll(2_000));
        assert!(!rule.poll(4_000));
        assert!(rule.poll(4_001));
        // Still hidden, but the deadline is consumed.
        assert!(!rule.poll(10_000));
    }

    #[test]
    fn returning_before_grace_cancels_with_zero_violations() {
        let mut rule = VisibilityRule::new(3_000);
        rule.on_hidden(0);
        assert!(!rule.poll(2_900));
        rule.on_visible();
        assert!(!rule.poll(3_100));
        assert!(!rule.is_pending());
    }

    #[test]
    fn repeated_hidden_events_do_not_stack_timers() {
        let mut rule = VisibilityRule::new(3_000);
        rule.on_hidden(0);
        // Later hidden events must not push the deadline out.
        rule.on_hidden(2_000);
        rule.on_hidden(2_500);
        assert!(rule.poll(3_001));
        assert!(!rule.is_pending());
    }
}
