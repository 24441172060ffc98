use std::sync::atomic::{AtomicBool, Ordering};

/// Shared presentation: the blinking cursor animation.
pub const CURSOR_STYLES: &str = ".Typewriter__cursor{-webkit-animation:Typewriter-cursor 1s infinite;animation:Typewriter-cursor 1s infinite;margin-left:1px}@-webkit-keyframes Typewriter-cursor{0%{opacity:0}50%{opacity:1}100%{opacity:0}}@keyframes Typewriter-cursor{0%{opacity:0}50%{opacity:1}100%{opacity:0}}";

/// Init-once flag guarding style injection. Sessions query it while being
/// constructed; the first one to claim it injects the styles.
#[derive(Debug)]
pub struct StyleRegistry {
    injected: AtomicBool,
}

static PROCESS_STYLES: StyleRegistry = StyleRegistry::new();

impl StyleRegistry {
    pub const fn new() -> Self {
        Self {
            injected: AtomicBool::new(false),
        }
    }

    /// The registry shared by every session of this process.
    pub fn process() -> &'static StyleRegistry {
        &PROCESS_STYLES
    }

    /// Marks the styles as injected. Returns true for the caller that flipped
    /// the flag, which is then responsible for injecting them.
    pub fn try_claim(&self) -> bool {
        !self.injected.swap(true, Ordering::AcqRel)
    }

    pub fn is_injected(&self) -> bool {
        self.injected.load(Ordering::Acquire)
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
