use std::fmt;

use crate::{render::Elements, Result, Speed};

/// Callback run by [`Operation::CallFunction`]. Whatever context the original
/// call site wants bound travels inside the closure.
pub type Callback<H> = Box<dyn FnMut(&Elements<H>) -> Result<()>>;

/// One primitive timed unit of work in the scheduler's queue.
pub enum Operation<H> {
    TypeCharacter {
        character: String,
        target: Option<H>,
    },
    /// Like `TypeCharacter`, but the whole string lands in one write.
    PasteString {
        text: String,
        target: Option<H>,
    },
    RemoveCharacter,
    /// Expands into one `RemoveLastVisibleNode` per visible unit, optionally
    /// bracketed by transient delete-speed changes.
    RemoveAll {
        speed: Option<Speed>,
    },
    /// Synthesized by the scheduler only.
    RemoveLastVisibleNode {
        removing_character: bool,
    },
    PauseFor {
        ms: u64,
    },
    CallFunction(Callback<H>),
    /// Inserts a prepared, empty element; typed characters target it later.
    AddMarkupNode {
        node: H,
        parent: Option<H>,
    },
    /// Removes `node` and everything shown after it in a single step.
    RemoveMarkupNode {
        node: H,
    },
    ChangeDeleteSpeed {
        speed: Speed,
        transient: bool,
    },
    ChangeDelay {
        delay: Speed,
    },
    ChangeCursor {
        cursor: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    TypeCharacter,
    PasteString,
    RemoveCharacter,
    RemoveAll,
    RemoveLastVisibleNode,
    PauseFor,
    CallFunction,
    AddMarkupNode,
    RemoveMarkupNode,
    ChangeDeleteSpeed,
    ChangeDelay,
    ChangeCursor,
}

impl<H> Operation<H> {
    pub fn call_function<F>(callback: F) -> Self
    where
        F: FnMut(&Elements<H>) -> Result<()> + 'static,
    {
        Operation::CallFunction(Box::new(callback))
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::TypeCharacter { .. } => OperationKind::TypeCharacter,
            Operation::PasteString { .. } => OperationKind::PasteString,
            Operation::RemoveCharacter => OperationKind::RemoveCharacter,
            Operation::RemoveAll { .. } => OperationKind::RemoveAll,
            Operation::RemoveLastVisibleNode { .. } => OperationKind::RemoveLastVisibleNode,
            Operation::PauseFor { .. } => OperationKind::PauseFor,
            Operation::CallFunction(_) => OperationKind::CallFunction,
            Operation::AddMarkupNode { .. } => OperationKind::AddMarkupNode,
            Operation::RemoveMarkupNode { .. } => OperationKind::RemoveMarkupNode,
            Operation::ChangeDeleteSpeed { .. } => OperationKind::ChangeDeleteSpeed,
            Operation::ChangeDelay { .. } => OperationKind::ChangeDelay,
            Operation::ChangeCursor { .. } => OperationKind::ChangeCursor,
        }
    }

    /// Transient operations only bracket a batch and are never replayed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Operation::ChangeDeleteSpeed { transient: true, .. })
    }

    /// Whether the operation is timed by the delete speed rather than the
    /// typing delay.
    pub fn uses_delete_speed(&self) -> bool {
        matches!(
            self,
            Operation::RemoveCharacter | Operation::RemoveLastVisibleNode { .. }
        )
    }

    /// Whether a looping session records the operation for the next
    /// iteration.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Operation::RemoveLastVisibleNode { .. }) && !self.is_transient()
    }
}

impl<H: fmt::Debug> fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::TypeCharacter { character, target } => f
                .debug_struct("TypeCharacter")
                .field("character", character)
                .field("target", target)
                .finish(),
            Operation::PasteString { text, target } => f
                .debug_struct("PasteString")
                .field("text", text)
                .field("target", target)
                .finish(),
            Operation::RemoveCharacter => f.write_str("RemoveCharacter"),
            Operation::RemoveAll { speed } => {
                f.debug_struct("RemoveAll").field("speed", speed).finish()
            }
            Operation::RemoveLastVisibleNode { removing_character } => f
                .debug_struct("RemoveLastVisibleNode")
                .field("removing_character", removing_character)
                .finish(),
            Operation::PauseFor { ms } => f.debug_struct("PauseFor").field("ms", ms).finish(),
            Operation::CallFunction(_) => f.write_str("CallFunction(..)"),
            Operation::AddMarkupNode { node, parent } => f
                .debug_struct("AddMarkupNode")
                .field("node", node)
                .field("parent", parent)
                .finish(),
            Operation::RemoveMarkupNode { node } => f
                .debug_struct("RemoveMarkupNode")
                .field("node", node)
                .finish(),
            Operation::ChangeDeleteSpeed { speed, transient } => f
                .debug_struct("ChangeDeleteSpeed")
                .field("speed", speed)
                .field("transient", transient)
                .finish(),
            Operation::ChangeDelay { delay } => {
                f.debug_struct("ChangeDelay").field("delay", delay).finish()
            }
            Operation::ChangeCursor { cursor } => {
                f.debug_struct("ChangeCursor").field("cursor", cursor).finish()
            }
        }
    }
}
