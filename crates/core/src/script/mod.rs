use serde::{Deserialize, Serialize};

use crate::{render::RenderBackend, timing::FrameScheduler, Result, Session, Speed};

/// One authored step, as written in a script file:
/// `{ "op": "type", "text": "Hello" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    Type { text: String },
    Paste { text: String },
    Pause { ms: u64 },
    DeleteAll {
        #[serde(default)]
        speed: Option<Speed>,
    },
    DeleteChars { amount: usize },
    ChangeDeleteSpeed { speed: Speed },
    ChangeDelay { delay: Speed },
    ChangeCursor { cursor: String },
}

/// A JSON array of [`ScriptStep`]s replayed through the session builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Queues every step. Validation failures abort at the offending step;
    /// steps before it stay queued.
    pub fn apply<B, F>(&self, session: &mut Session<B, F>) -> Result<()>
    where
        B: RenderBackend,
        F: FrameScheduler,
    {
        for step in &self.steps {
            match step {
                ScriptStep::Type { text } => {
                    session.type_string(text);
                }
                ScriptStep::Paste { text } => {
                    session.paste_string(text);
                }
                ScriptStep::Pause { ms } => {
                    session.pause_for(*ms);
                }
                ScriptStep::DeleteAll { speed } => {
                    session.delete_all(*speed);
                }
                ScriptStep::DeleteChars { amount } => {
                    session.delete_chars(*amount)?;
                }
                ScriptStep::ChangeDeleteSpeed { speed } => {
                    session.change_delete_speed(*speed)?;
                }
                ScriptStep::ChangeDelay { delay } => {
                    session.change_delay(*delay)?;
                }
                ScriptStep::ChangeCursor { cursor } => {
                    session.change_cursor(cursor)?;
                }
            }
        }
        tracing::debug!(steps = self.steps.len(), "script applied");
        Ok(())
    }
}
