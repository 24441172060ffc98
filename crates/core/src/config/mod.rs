use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{operation::Operation, scheduler::RemovedNode, TypewriterError};

pub const DEFAULT_CURSOR: &str = "|";
pub const DEFAULT_PAUSE_FOR_MS: u64 = 1500;
pub const DEFAULT_WRAPPER_CLASS: &str = "Typewriter__wrapper";
pub const DEFAULT_CURSOR_CLASS: &str = "Typewriter__cursor";

/// Typing or deleting speed. `Natural` draws a fresh random delay for every
/// operation; `Fixed` waits the given number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SpeedRepr", into = "SpeedRepr")]
pub enum Speed {
    Natural,
    Fixed(u64),
}

impl Speed {
    /// A fixed speed of zero carries no information and is rejected by the
    /// builder, mirroring the "falsy value" checks of the authoring surface.
    pub fn is_zero(self) -> bool {
        matches!(self, Speed::Fixed(0))
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::Natural
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speed::Natural => f.write_str("natural"),
            Speed::Fixed(ms) => write!(f, "{ms}"),
        }
    }
}

impl FromStr for Speed {
    type Err = TypewriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("natural") {
            return Ok(Speed::Natural);
        }
        trimmed
            .parse::<u64>()
            .map(Speed::Fixed)
            .map_err(|_| TypewriterError::msg(format!("`{s}` is neither `natural` nor milliseconds")))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SpeedRepr {
    Millis(u64),
    Keyword(String),
}

impl TryFrom<SpeedRepr> for Speed {
    type Error = TypewriterError;

    fn try_from(value: SpeedRepr) -> Result<Self, Self::Error> {
        match value {
            SpeedRepr::Millis(ms) => Ok(Speed::Fixed(ms)),
            SpeedRepr::Keyword(keyword) => keyword.parse(),
        }
    }
}

impl From<Speed> for SpeedRepr {
    fn from(value: Speed) -> Self {
        match value {
            Speed::Natural => SpeedRepr::Keyword("natural".to_string()),
            Speed::Fixed(ms) => SpeedRepr::Millis(ms),
        }
    }
}

/// Strings typed out by [`crate::Session::type_out_all_strings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Strings {
    /// Typed once and left on screen.
    Single(String),
    /// Typed, paused on and deleted one after another.
    List(Vec<String>),
}

impl Strings {
    pub fn is_empty(&self) -> bool {
        match self {
            Strings::Single(text) => text.is_empty(),
            Strings::List(items) => items.is_empty(),
        }
    }
}

impl Default for Strings {
    fn default() -> Self {
        Strings::Single(String::new())
    }
}

impl From<&str> for Strings {
    fn from(value: &str) -> Self {
        Strings::Single(value.to_string())
    }
}

impl From<String> for Strings {
    fn from(value: String) -> Self {
        Strings::Single(value)
    }
}

impl From<Vec<String>> for Strings {
    fn from(value: Vec<String>) -> Self {
        Strings::List(value)
    }
}

impl From<Vec<&str>> for Strings {
    fn from(value: Vec<&str>) -> Self {
        Strings::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Data options of a session. The scheduler keeps a mutable copy of this
/// (`delete_speed`, `delay` and `cursor` change in-band) and an immutable
/// snapshot that is restored on every loop iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypewriterConfig {
    pub strings: Strings,
    pub cursor: String,
    pub delay: Speed,
    /// Pause after each configured string, in milliseconds.
    pub pause_for: u64,
    pub delete_speed: Speed,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub auto_start: bool,
    pub dev_mode: bool,
    pub skip_add_styles: bool,
    pub wrapper_class_name: String,
    pub cursor_class_name: String,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            strings: Strings::default(),
            cursor: DEFAULT_CURSOR.to_string(),
            delay: Speed::Natural,
            pause_for: DEFAULT_PAUSE_FOR_MS,
            delete_speed: Speed::Natural,
            looping: false,
            auto_start: false,
            dev_mode: false,
            skip_add_styles: false,
            wrapper_class_name: DEFAULT_WRAPPER_CLASS.to_string(),
            cursor_class_name: DEFAULT_CURSOR_CLASS.to_string(),
        }
    }
}

impl TypewriterConfig {
    /// Parses a JSON document; missing fields fall back to the defaults.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub type StringSplitter = Box<dyn Fn(&str) -> Vec<String>>;
pub type CreateTextNodeHook<H> = Box<dyn FnMut(&str, H) -> Option<H>>;
pub type RemoveNodeHook<H> = Box<dyn FnMut(RemovedNode<'_, H>)>;
pub type StepHook<H> = Box<dyn FnMut(&Operation<H>)>;

/// Behavioural options. Kept apart from [`TypewriterConfig`] because closures
/// can be neither serialized nor restored on loop reset.
pub struct Hooks<H> {
    /// Overrides the per-character decomposition of typed strings.
    pub string_splitter: Option<StringSplitter>,
    /// Sees every freshly created text unit and may substitute another
    /// handle, or return `None` to keep it off screen.
    pub on_create_text_node: Option<CreateTextNodeHook<H>>,
    pub on_remove_node: Option<RemoveNodeHook<H>>,
    pub on_step: Option<StepHook<H>>,
}

impl<H> Hooks<H> {
    pub fn with_string_splitter<F>(mut self, splitter: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + 'static,
    {
        self.string_splitter = Some(Box::new(splitter));
        self
    }

    pub fn with_on_create_text_node<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, H) -> Option<H> + 'static,
    {
        self.on_create_text_node = Some(Box::new(hook));
        self
    }

    pub fn with_on_remove_node<F>(mut self, hook: F) -> Self
    where
        F: FnMut(RemovedNode<'_, H>) + 'static,
    {
        self.on_remove_node = Some(Box::new(hook));
        self
    }

    pub fn with_on_step<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Operation<H>) + 'static,
    {
        self.on_step = Some(Box::new(hook));
        self
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        match &self.string_splitter {
            Some(splitter) => splitter(text),
            None => text.chars().map(String::from).collect(),
        }
    }
}

impl<H> Default for Hooks<H> {
    fn default() -> Self {
        Self {
            string_splitter: None,
            on_create_text_node: None,
            on_remove_node: None,
            on_step: None,
        }
    }
}

impl<H> fmt::Debug for Hooks<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("string_splitter", &self.string_splitter.is_some())
            .field("on_create_text_node", &self.on_create_text_node.is_some())
            .field("on_remove_node", &self.on_remove_node.is_some())
            .field("on_step", &self.on_step.is_some())
            .finish()
    }
}
