use std::ops::RangeInclusive;

use crate::Speed;

/// Delay range for natural typing, in milliseconds.
pub const NATURAL_TYPING_MS: RangeInclusive<u64> = 120..=160;
/// Delay range for natural deleting, in milliseconds.
pub const NATURAL_DELETING_MS: RangeInclusive<u64> = 40..=80;

/// Identifies an outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host animation-frame scheduler. Once a requested frame fires, the host
/// calls [`crate::Session::tick`] with the current timestamp.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Frame scheduler for hosts that poll: it only remembers whether a frame is
/// wanted. Tests and the terminal host drive ticks themselves.
#[derive(Debug, Default)]
pub struct ManualFrames {
    next: u64,
    pending: Option<FrameHandle>,
    requested: u64,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Total number of frames requested so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

/// Source of the random delays used by natural speeds.
pub trait RandomSource {
    /// Uniform integer in `range`, both ends included.
    fn integer(&mut self, range: RangeInclusive<u64>) -> u64;
}

/// [`RandomSource`] backed by `fastrand`.
#[derive(Debug, Clone)]
pub struct FastRandom(fastrand::Rng);

impl FastRandom {
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FastRandom {
    fn integer(&mut self, range: RangeInclusive<u64>) -> u64 {
        self.0.u64(range)
    }
}

/// Milliseconds to wait for `speed`; natural speeds draw a fresh value on
/// every call.
pub fn resolve_delay(speed: Speed, natural: RangeInclusive<u64>, random: &mut dyn RandomSource) -> u64 {
    match speed {
        Speed::Natural => random.integer(natural),
        Speed::Fixed(ms) => ms,
    }
}
