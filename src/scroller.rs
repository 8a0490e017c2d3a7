//! Scroll-to-index convergence.
//!
//! A jump issued before the rows above the target are measured lands short
//! or long once their real heights arrive. The scroller therefore re-issues
//! the jump on a fixed retry delay until the observed first visible index
//! equals the target and has stayed there for a few ticks.
//!
//! The scroller is a plain state machine: it never touches the window
//! itself. The owner asks [`ConvergentScroller::due_target`] whether an
//! attempt is due, performs the jump and layout pass, and reports back
//! through [`ConvergentScroller::observe`]. Attempts are bounded; once the
//! budget is spent the request is abandoned with a warning.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Timing and budget of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPolicy {
    /// Delay between two attempts.
    pub retry_delay: Duration,
    /// Attempts before a request is abandoned. Always greater than `settle_ticks`.
    pub max_attempts: u32,
    /// Extra matching observations required after the first one.
    pub settle_ticks: u32,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(20),
            max_attempts: 50,
            settle_ticks: 2,
        }
    }
}

/// What the owner saw after performing an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// First visible index after the layout pass.
    pub position: Option<usize>,
    /// Whether the target counts as reached.
    pub reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStatus {
    Idle,
    Pending {
        target: usize,
        due: Instant,
    },
    Converged {
        target: usize,
        position: usize,
        attempts: u32,
    },
    /// Budget exhausted without a stable match; best effort, no more retries.
    Abandoned {
        target: usize,
        position: Option<usize>,
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy)]
struct PendingScroll {
    target: usize,
    attempts: u32,
    /// Consecutive observations that reached the target.
    matched: u32,
    due: Instant,
}

#[derive(Debug)]
pub struct ConvergentScroller {
    policy: ScrollPolicy,
    pending: Option<PendingScroll>,
}

impl ConvergentScroller {
    pub fn new(policy: ScrollPolicy) -> Self {
        let max_attempts = policy.max_attempts.max(policy.settle_ticks + 1);
        Self {
            policy: ScrollPolicy {
                max_attempts,
                ..policy
            },
            pending: None,
        }
    }

    pub fn policy(&self) -> ScrollPolicy {
        self.policy
    }

    /// Start converging on `target`, first attempt at `due`.
    ///
    /// Replaces any pending request; the replaced target is returned.
    pub fn request(&mut self, target: usize, due: Instant) -> Option<usize> {
        let superseded = self.pending.take().map(|p| p.target);
        if let Some(old) = superseded {
            debug!("Scroll to {} superseded by scroll to {}", old, target);
        }
        self.pending = Some(PendingScroll {
            target,
            attempts: 0,
            matched: 0,
            due,
        });
        superseded
    }

    /// Drop the pending request, if any.
    pub fn cancel(&mut self) -> Option<usize> {
        self.pending.take().map(|p| p.target)
    }

    pub fn target(&self) -> Option<usize> {
        self.pending.map(|p| p.target)
    }

    /// When the next attempt should run.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    /// Target to attempt now, if an attempt is due.
    pub fn due_target(&self, now: Instant) -> Option<usize> {
        self.pending
            .filter(|p| now >= p.due)
            .map(|p| p.target)
    }

    pub fn status(&self) -> ScrollStatus {
        match self.pending {
            Some(p) => ScrollStatus::Pending {
                target: p.target,
                due: p.due,
            },
            None => ScrollStatus::Idle,
        }
    }

    /// Account for one attempt and decide whether to keep going.
    pub fn observe(&mut self, now: Instant, observation: Observation) -> ScrollStatus {
        let Some(pending) = self.pending.as_mut() else {
            return ScrollStatus::Idle;
        };

        pending.attempts += 1;
        if observation.reached {
            pending.matched += 1;
        } else {
            pending.matched = 0;
        }

        let target = pending.target;
        let attempts = pending.attempts;

        if pending.matched > self.policy.settle_ticks
            || (attempts >= self.policy.max_attempts && observation.reached)
        {
            self.pending = None;
            let position = observation.position.unwrap_or(target);
            debug!(
                "Scroll to {} converged at {} after {} attempts",
                target, position, attempts
            );
            return ScrollStatus::Converged {
                target,
                position,
                attempts,
            };
        }

        if attempts >= self.policy.max_attempts {
            self.pending = None;
            warn!(
                "Scroll to {} abandoned after {} attempts (position {:?})",
                target, attempts, observation.position
            );
            return ScrollStatus::Abandoned {
                target,
                position: observation.position,
                attempts,
            };
        }

        pending.due = now + self.policy.retry_delay;
        ScrollStatus::Pending {
            target,
            due: pending.due,
        }
    }
}

impl Default for ConvergentScroller {
    fn default() -> Self {
        Self::new(ScrollPolicy::default())
    }
}
