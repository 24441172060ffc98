//! Core library for the typewriter effect.
//!
//! Characters and inline markup are inserted into (and later removed from) a
//! render container one unit at a time, at variable intervals. Each module
//! owns one piece of that: the authoring surface and lifecycle live in
//! [`session`], the per-frame queue execution in [`scheduler`], markup
//! decomposition in [`markup`], and the host collaborators (rendering, frame
//! scheduling, randomness) sit behind the traits in [`render`] and
//! [`timing`].

pub mod config;
pub mod error;
pub mod markup;
pub mod operation;
pub mod render;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod styles;
pub mod timing;

pub use config::{Hooks, Speed, Strings, TypewriterConfig};
pub use error::{Result, TypewriterError};
pub use markup::{ElementSpec, FragmentNode, MarkupStep};
pub use operation::{Operation, OperationKind};
pub use render::{Container, Elements, MemoryBackend, MemoryNodeKind, NodeId, RenderBackend};
pub use scheduler::{RemovedNode, Scheduler, SchedulerState, TickOutcome, VisibleKind, VisibleNode};
pub use script::{Script, ScriptStep};
pub use session::{Session, SessionBuilder};
pub use styles::{StyleRegistry, CURSOR_STYLES};
pub use timing::{FastRandom, FrameHandle, FrameScheduler, ManualFrames, RandomSource};
