/// Result of one [`AutoFramePolicy::try_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAttempt {
    /// The attempt ran and framed the subject.
    Framed,
    /// The attempt ran and found nothing to frame.
    Failed,
    /// The attempt budget is used up; nothing ran.
    Exhausted,
    /// An earlier attempt succeeded; nothing ran.
    AlreadyFramed,
}

/// Bounded retry of camera auto-framing.
///
/// Framing runs at most `max_attempts` times before the first success and never again
/// after it, until [`AutoFramePolicy::reset`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoFramePolicy {
    max_attempts: u32,
    attempts: u32,
    framed: bool,
}

impl AutoFramePolicy {
    /// Policy allowing `max_attempts` invocations.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
            framed: false,
        }
    }

    /// Invoke `frame` unless the policy forbids it.
    pub fn try_frame(&mut self, frame: impl FnOnce() -> bool) -> FrameAttempt {
        if self.framed {
            return FrameAttempt::AlreadyFramed;
        }
        if self.attempts >= self.max_attempts {
            return FrameAttempt::Exhausted;
        }
        self.attempts += 1;
        if frame() {
            self.framed = true;
            tracing::debug!(attempts = self.attempts, "auto-frame succeeded");
            FrameAttempt::Framed
        } else {
            FrameAttempt::Failed
        }
    }

    /// Invocations so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether an attempt has succeeded.
    pub fn is_framed(&self) -> bool {
        self.framed
    }

    /// Start over, e.g. after a new model was loaded.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.framed = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/framing.rs"]
mod tests;
