use std::fmt;

use crate::{
    config::{Hooks, Strings},
    markup::{self, ElementSpec, MarkupStep},
    operation::Operation,
    render::{Container, Elements, RenderBackend},
    scheduler::{Scheduler, SchedulerState, StepEnv, TickOutcome, VisibleNode},
    styles::{StyleRegistry, CURSOR_STYLES},
    timing::{FastRandom, FrameScheduler, ManualFrames, RandomSource},
    Result, Speed, TypewriterConfig, TypewriterError,
};

/// Collects the optional collaborators of a [`Session`] before it is built.
pub struct SessionBuilder<B: RenderBackend, F: FrameScheduler> {
    backend: B,
    frames: F,
    config: TypewriterConfig,
    hooks: Hooks<B::Handle>,
    random: Box<dyn RandomSource>,
    styles: &'static StyleRegistry,
}

impl<B: RenderBackend, F: FrameScheduler> SessionBuilder<B, F> {
    pub fn hooks(mut self, hooks: Hooks<B::Handle>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    /// Replaces the process-wide style registry.
    pub fn styles(mut self, styles: &'static StyleRegistry) -> Self {
        self.styles = styles;
        self
    }

    /// Resolves the container, builds the wrapper and cursor nodes, queues the
    /// initial cursor update and clean-up, injects the shared styles once per
    /// registry and auto-starts when configured with strings.
    pub fn build(self, container: Container<B::Handle>) -> Result<Session<B, F>> {
        let SessionBuilder {
            mut backend,
            frames,
            config,
            hooks,
            random,
            styles,
        } = self;

        let container = match container {
            Container::Handle(handle) => handle,
            Container::Selector(selector) => backend
                .query_container(&selector)
                .ok_or(TypewriterError::Configuration(selector))?,
        };

        let wrapper = backend.create_element(&ElementSpec::with_class("span", &config.wrapper_class_name));
        let cursor = backend.create_element(&ElementSpec::with_class("span", &config.cursor_class_name));
        backend.set_inner_markup(&cursor, &config.cursor);
        backend.set_inner_markup(&container, "");
        backend.append_child(&container, &wrapper);
        backend.append_child(&container, &cursor);

        let mut scheduler = Scheduler::new(config.clone());
        scheduler.enqueue_front(Operation::ChangeCursor {
            cursor: config.cursor.clone(),
        });
        scheduler.enqueue_front(Operation::RemoveAll { speed: None });

        if !config.skip_add_styles && styles.try_claim() {
            backend.inject_global_style(CURSOR_STYLES);
        }

        let mut session = Session {
            backend,
            frames,
            random,
            hooks,
            elements: Elements {
                container,
                wrapper,
                cursor,
            },
            scheduler,
        };
        tracing::debug!(looping = config.looping, auto_start = config.auto_start, "session created");

        if config.auto_start && !config.strings.is_empty() {
            session.type_out_all_strings().start();
        }

        Ok(session)
    }
}

/// A typewriter session: the authoring surface, the lifecycle controls and
/// the per-frame entry point the host calls.
pub struct Session<B: RenderBackend, F: FrameScheduler = ManualFrames> {
    backend: B,
    frames: F,
    random: Box<dyn RandomSource>,
    hooks: Hooks<B::Handle>,
    elements: Elements<B::Handle>,
    scheduler: Scheduler<B::Handle>,
}

impl<B: RenderBackend, F: FrameScheduler> Session<B, F> {
    pub fn builder(backend: B, frames: F, config: TypewriterConfig) -> SessionBuilder<B, F> {
        SessionBuilder {
            backend,
            frames,
            config,
            hooks: Hooks::default(),
            random: Box::new(FastRandom::new()),
            styles: StyleRegistry::process(),
        }
    }

    /// Builds a session with default hooks, randomness and style registry.
    pub fn new(
        backend: B,
        frames: F,
        container: impl Into<Container<B::Handle>>,
        config: TypewriterConfig,
    ) -> Result<Self> {
        Self::builder(backend, frames, config).build(container.into())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Clears the paused flag and makes sure a frame is scheduled. Also the
    /// way back in after [`Session::stop`]: the queue resumes where it was.
    pub fn start(&mut self) -> &mut Self {
        self.scheduler.set_paused(false);
        self.scheduler.schedule(&mut self.frames);
        tracing::info!(pending = self.scheduler.pending_len(), "typewriter started");
        self
    }

    /// Frames keep coming while paused, they just do nothing.
    pub fn pause(&mut self) -> &mut Self {
        self.scheduler.set_paused(true);
        tracing::info!("typewriter paused");
        self
    }

    /// Cancels the outstanding frame. Queued state is kept.
    pub fn stop(&mut self) -> &mut Self {
        self.scheduler.cancel(&mut self.frames);
        tracing::info!(pending = self.scheduler.pending_len(), "typewriter stopped");
        self
    }

    /// Called by the host when the requested frame fires. Ticks without an
    /// outstanding frame (never started, stopped, or idle) do nothing.
    pub fn tick(&mut self, now_ms: u64) -> Result<TickOutcome> {
        if !self.scheduler.is_scheduled() {
            return Ok(TickOutcome::Idle);
        }

        let mut env = StepEnv {
            backend: &mut self.backend,
            frames: &mut self.frames,
            random: self.random.as_mut(),
            hooks: &mut self.hooks,
            elements: &self.elements,
        };
        self.scheduler.step(now_ms, &mut env)
    }

    // ---------------------------------------------------------------------
    // Authoring
    // ---------------------------------------------------------------------

    pub fn type_string(&mut self, text: &str) -> &mut Self {
        self.type_string_into(text, None)
    }

    /// Queues `text` one character at a time under `target` (the wrapper when
    /// `None`). Inline markup becomes element insertions with the characters
    /// typed inside them.
    pub fn type_string_into(&mut self, text: &str, target: Option<B::Handle>) -> &mut Self {
        if markup::contains_markup(text) {
            return self.enqueue_markup(text, target, false);
        }

        if !text.is_empty() {
            let characters = self.hooks.split(text);
            self.type_characters(characters, target);
        }
        self
    }

    pub fn paste_string(&mut self, text: &str) -> &mut Self {
        self.paste_string_into(text, None)
    }

    /// Same decomposition as [`Session::type_string_into`], but every text
    /// run appears in a single write.
    pub fn paste_string_into(&mut self, text: &str, target: Option<B::Handle>) -> &mut Self {
        if markup::contains_markup(text) {
            return self.enqueue_markup(text, target, true);
        }

        if !text.is_empty() {
            self.scheduler.enqueue(Operation::PasteString {
                text: text.to_string(),
                target,
            });
        }
        self
    }

    /// Queues pre-split characters.
    pub fn type_characters<I>(&mut self, characters: I, target: Option<B::Handle>) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for character in characters {
            self.scheduler.enqueue(Operation::TypeCharacter {
                character: character.into(),
                target: target.clone(),
            });
        }
        self
    }

    /// Queues one character removal per item.
    pub fn remove_characters<I: IntoIterator>(&mut self, characters: I) -> &mut Self {
        for _ in characters {
            self.scheduler.enqueue(Operation::RemoveCharacter);
        }
        self
    }

    /// A zero pause is accepted and resolves on the next frame.
    pub fn pause_for(&mut self, ms: u64) -> &mut Self {
        self.scheduler.enqueue(Operation::PauseFor { ms });
        self
    }

    /// Deletes everything visible when the operation runs, at `speed` or at
    /// natural speed when `None`. The configured delete speed is restored
    /// afterwards.
    pub fn delete_all(&mut self, speed: Option<Speed>) -> &mut Self {
        self.scheduler.enqueue(Operation::RemoveAll {
            speed: Some(speed.unwrap_or(Speed::Natural)),
        });
        self
    }

    pub fn delete_chars(&mut self, amount: usize) -> Result<&mut Self> {
        if amount == 0 {
            return Err(TypewriterError::InvalidArgument(
                "must provide amount of characters to delete",
            ));
        }

        for _ in 0..amount {
            self.scheduler.enqueue(Operation::RemoveCharacter);
        }
        Ok(self)
    }

    pub fn change_delete_speed(&mut self, speed: Speed) -> Result<&mut Self> {
        if speed.is_zero() {
            return Err(TypewriterError::InvalidArgument("must provide new delete speed"));
        }

        self.scheduler.enqueue(Operation::ChangeDeleteSpeed {
            speed,
            transient: false,
        });
        Ok(self)
    }

    pub fn change_delay(&mut self, delay: Speed) -> Result<&mut Self> {
        if delay.is_zero() {
            return Err(TypewriterError::InvalidArgument("must provide new delay"));
        }

        self.scheduler.enqueue(Operation::ChangeDelay { delay });
        Ok(self)
    }

    pub fn change_cursor(&mut self, cursor: &str) -> Result<&mut Self> {
        if cursor.is_empty() {
            return Err(TypewriterError::InvalidArgument("must provide new cursor"));
        }

        self.scheduler.enqueue(Operation::ChangeCursor {
            cursor: cursor.to_string(),
        });
        Ok(self)
    }

    /// Queues `callback`, which receives the session's render elements. Any
    /// context it needs is captured by the closure.
    pub fn call_function<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&Elements<B::Handle>) -> Result<()> + 'static,
    {
        self.scheduler.enqueue(Operation::call_function(callback));
        self
    }

    /// Queues the configured strings: a single string is typed and paused on;
    /// a list is typed, paused on and deleted string by string.
    pub fn type_out_all_strings(&mut self) -> &mut Self {
        let options = self.scheduler.options();
        let (strings, pause, delete_speed) = (options.strings.clone(), options.pause_for, options.delete_speed);

        match strings {
            Strings::Single(text) => {
                self.type_string(&text).pause_for(pause);
            }
            Strings::List(items) => {
                for text in items {
                    self.type_string(&text)
                        .pause_for(pause)
                        .delete_all(Some(delete_speed));
                }
            }
        }
        self
    }

    /// Low-level enqueue, at the tail or at the head of the queue.
    pub fn add_operation(&mut self, operation: Operation<B::Handle>, prepend: bool) -> &mut Self {
        if prepend {
            self.scheduler.enqueue_front(operation);
        } else {
            self.scheduler.enqueue(operation);
        }
        self
    }

    pub fn clear_queue(&mut self) -> &mut Self {
        self.scheduler.clear_queue();
        self
    }

    fn enqueue_markup(&mut self, text: &str, target: Option<B::Handle>, paste: bool) -> &mut Self {
        let steps = {
            let backend = &self.backend;
            let hooks = &self.hooks;
            markup::decompose(text, |m| backend.parse_fragment(m), |t| hooks.split(t), paste)
        };

        let mut elements: Vec<Option<B::Handle>> = Vec::with_capacity(steps.len());
        for step in steps {
            let created = match step {
                MarkupStep::OpenElement { element, parent } => {
                    let node = self.backend.create_element(&element);
                    self.scheduler.enqueue(Operation::AddMarkupNode {
                        node: node.clone(),
                        parent: resolve_parent(&elements, parent, &target),
                    });
                    Some(node)
                }
                MarkupStep::Type { character, parent } => {
                    self.scheduler.enqueue(Operation::TypeCharacter {
                        character,
                        target: resolve_parent(&elements, parent, &target),
                    });
                    None
                }
                MarkupStep::Paste { text, parent } => {
                    self.scheduler.enqueue(Operation::PasteString {
                        text,
                        target: resolve_parent(&elements, parent, &target),
                    });
                    None
                }
            };
            elements.push(created);
        }
        self
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    pub fn scheduler(&self) -> &Scheduler<B::Handle> {
        &self.scheduler
    }

    pub fn visible(&self) -> &[VisibleNode<B::Handle>] {
        self.scheduler.visible()
    }

    pub fn options(&self) -> &TypewriterConfig {
        self.scheduler.options()
    }

    pub fn elements(&self) -> &Elements<B::Handle> {
        &self.elements
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }
}

fn resolve_parent<H: Clone>(elements: &[Option<H>], parent: Option<usize>, target: &Option<H>) -> Option<H> {
    parent
        .and_then(|index| elements.get(index).cloned().flatten())
        .or_else(|| target.clone())
}

impl<B: RenderBackend, F: FrameScheduler> fmt::Debug for Session<B, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.scheduler.state())
            .field("pending", &self.scheduler.pending_len())
            .field("visible", &self.scheduler.visible().len())
            .field("elements", &self.elements)
            .field("hooks", &self.hooks)
            .finish()
    }
}
