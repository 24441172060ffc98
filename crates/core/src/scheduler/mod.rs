//! Frame-driven operation scheduler.
//!
//! The scheduler owns the pending queue, the loop history and the stack of
//! visible units. [`Scheduler::step`] runs once per animation frame and
//! executes at most one operation, as soon as enough time has passed since
//! the previous one. Operations may splice follow-ups in front of the queue
//! (`RemoveAll` expands into one removal per visible unit), which then run
//! before anything queued later.
//!
//! Deletion is strictly the inverse of insertion: the most recently shown
//! unit is always the first to go.

use std::collections::VecDeque;

use crate::{
    config::Hooks,
    operation::{Operation, OperationKind},
    render::{Elements, RenderBackend},
    timing::{resolve_delay, FrameHandle, FrameScheduler, RandomSource, NATURAL_DELETING_MS, NATURAL_TYPING_MS},
    Result, TypewriterConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleKind {
    Text,
    Markup,
}

/// One unit currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleNode<H> {
    pub kind: VisibleKind,
    /// `None` when an `on_create_text_node` hook kept the unit off screen.
    pub handle: Option<H>,
    pub character: Option<String>,
    pub parent: H,
}

/// What the `on_remove_node` hook gets to see of a removed unit.
#[derive(Debug, Clone, Copy)]
pub struct RemovedNode<'a, H> {
    pub character: Option<&'a str>,
    pub handle: Option<&'a H>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No frame is scheduled.
    Idle,
    Running,
    /// Frames keep coming but do nothing.
    Paused,
    /// Frames keep coming but the next operation is not due yet.
    Waiting,
}

/// Result of a single [`Scheduler::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue drained without looping; no further frame was requested.
    Idle,
    Paused,
    /// A `PauseFor` deadline has not passed yet.
    Waiting,
    /// Not enough time since the last executed operation.
    Throttled,
    Executed(OperationKind),
}

/// Collaborators a step needs, borrowed from the owning session.
pub struct StepEnv<'a, B: RenderBackend> {
    pub backend: &'a mut B,
    pub frames: &'a mut dyn FrameScheduler,
    pub random: &'a mut dyn RandomSource,
    pub hooks: &'a mut Hooks<B::Handle>,
    pub elements: &'a Elements<B::Handle>,
}

#[derive(Debug)]
pub struct Scheduler<H> {
    pending: VecDeque<Operation<H>>,
    history: Vec<Operation<H>>,
    visible: Vec<VisibleNode<H>>,
    last_frame: Option<u64>,
    pause_until: Option<u64>,
    paused: bool,
    frame: Option<FrameHandle>,
    last_outcome: Option<TickOutcome>,
    options: TypewriterConfig,
    initial: TypewriterConfig,
}

impl<H: Clone + PartialEq + std::fmt::Debug> Scheduler<H> {
    /// Creates an idle scheduler; `options` doubles as the loop snapshot.
    pub fn new(options: TypewriterConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            history: Vec::new(),
            visible: Vec::new(),
            last_frame: None,
            pause_until: None,
            paused: false,
            frame: None,
            last_outcome: None,
            initial: options.clone(),
            options,
        }
    }

    pub fn enqueue(&mut self, operation: Operation<H>) {
        self.pending.push_back(operation);
    }

    pub fn enqueue_front(&mut self, operation: Operation<H>) {
        self.pending.push_front(operation);
    }

    /// Splices `batch` in front of the queue, keeping its order.
    pub fn prepend(&mut self, batch: Vec<Operation<H>>) {
        for operation in batch.into_iter().rev() {
            self.pending.push_front(operation);
        }
    }

    pub fn clear_queue(&mut self) {
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        self.pending.iter().map(Operation::kind).collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Operation<H>> {
        self.pending.iter()
    }

    pub fn history_kinds(&self) -> Vec<OperationKind> {
        self.history.iter().map(Operation::kind).collect()
    }

    pub fn visible(&self) -> &[VisibleNode<H>] {
        &self.visible
    }

    /// Options as mutated by in-band `Change*` operations.
    pub fn options(&self) -> &TypewriterConfig {
        &self.options
    }

    /// Snapshot restored at every loop iteration.
    pub fn initial_options(&self) -> &TypewriterConfig {
        &self.initial
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_scheduled(&self) -> bool {
        self.frame.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        if self.frame.is_none() {
            SchedulerState::Idle
        } else if self.paused {
            SchedulerState::Paused
        } else if matches!(
            self.last_outcome,
            Some(TickOutcome::Waiting | TickOutcome::Throttled)
        ) {
            SchedulerState::Waiting
        } else {
            SchedulerState::Running
        }
    }

    /// Requests a frame unless one is already outstanding.
    pub fn schedule(&mut self, frames: &mut dyn FrameScheduler) {
        if self.frame.is_none() {
            self.frame = Some(frames.request_frame());
        }
    }

    /// Cancels the outstanding frame. Queue and timing state are kept.
    pub fn cancel(&mut self, frames: &mut dyn FrameScheduler) {
        if let Some(handle) = self.frame.take() {
            frames.cancel_frame(handle);
        }
    }

    /// Runs one frame. A failing `CallFunction` callback leaves the queue as
    /// it was before the step, so the callback runs again on a later frame.
    pub fn step<B>(&mut self, now: u64, env: &mut StepEnv<'_, B>) -> Result<TickOutcome>
    where
        B: RenderBackend<Handle = H>,
    {
        let outcome = self.run_step(now, env);
        if let Ok(outcome) = &outcome {
            self.last_outcome = Some(*outcome);
        }
        outcome
    }

    fn run_step<B>(&mut self, now: u64, env: &mut StepEnv<'_, B>) -> Result<TickOutcome>
    where
        B: RenderBackend<Handle = H>,
    {
        // The frame that invoked this step has fired.
        self.frame = None;

        let last_frame = *self.last_frame.get_or_insert(now);
        let delta = now.saturating_sub(last_frame);

        if self.pending.is_empty() {
            if !self.options.looping {
                tracing::debug!("queue drained, scheduler idle");
                return Ok(TickOutcome::Idle);
            }
            self.reset_for_loop();
            if self.pending.is_empty() {
                tracing::debug!("nothing recorded to replay, scheduler idle");
                return Ok(TickOutcome::Idle);
            }
        }

        self.frame = Some(env.frames.request_frame());

        if self.paused {
            return Ok(TickOutcome::Paused);
        }

        if let Some(until) = self.pause_until {
            if now < until {
                return Ok(TickOutcome::Waiting);
            }
            self.pause_until = None;
        }

        let Some(head) = self.pending.front() else {
            return Ok(TickOutcome::Idle);
        };
        let delay = if head.uses_delete_speed() {
            resolve_delay(self.options.delete_speed, NATURAL_DELETING_MS, env.random)
        } else {
            resolve_delay(self.options.delay, NATURAL_TYPING_MS, env.random)
        };

        if delta <= delay {
            tracing::trace!(delta, delay, "operation not due yet");
            return Ok(TickOutcome::Throttled);
        }

        let Some(mut operation) = self.pending.pop_front() else {
            return Ok(TickOutcome::Idle);
        };
        let kind = operation.kind();

        if self.options.dev_mode {
            tracing::info!(
                ?operation,
                delay,
                pending = self.pending.len(),
                visible = self.visible.len(),
                "executing operation"
            );
        } else {
            tracing::debug!(?kind, delay, "executing operation");
        }
        if let Some(on_step) = env.hooks.on_step.as_mut() {
            on_step(&operation);
        }

        if let Err(err) = self.execute(&mut operation, now, env) {
            tracing::warn!(?kind, %err, "operation failed, will retry");
            self.pending.push_front(operation);
            return Err(err);
        }

        if self.options.looping && operation.is_replayable() {
            self.history.push(operation);
        }
        self.last_frame = Some(now);

        Ok(TickOutcome::Executed(kind))
    }

    fn execute<B>(&mut self, operation: &mut Operation<H>, now: u64, env: &mut StepEnv<'_, B>) -> Result<()>
    where
        B: RenderBackend<Handle = H>,
    {
        match operation {
            Operation::TypeCharacter { character: text, target }
            | Operation::PasteString { text, target } => {
                self.insert_text(text, target.as_ref(), env);
            }
            Operation::RemoveCharacter => {
                self.pending.push_front(Operation::RemoveLastVisibleNode {
                    removing_character: true,
                });
            }
            Operation::PauseFor { ms } => {
                self.pause_until = Some(now.saturating_add(*ms));
            }
            Operation::CallFunction(callback) => {
                callback(env.elements)?;
            }
            Operation::AddMarkupNode { node, parent } => {
                let parent = parent
                    .clone()
                    .unwrap_or_else(|| env.elements.wrapper.clone());
                env.backend.append_child(&parent, node);
                self.visible.push(VisibleNode {
                    kind: VisibleKind::Markup,
                    handle: Some(node.clone()),
                    character: None,
                    parent,
                });
            }
            Operation::RemoveMarkupNode { node } => {
                let shown = self.visible.iter().any(|visible| {
                    visible.kind == VisibleKind::Markup && visible.handle.as_ref() == Some(&*node)
                });
                if shown {
                    while let Some(removed) = self.pop_visible(env) {
                        if removed.kind == VisibleKind::Markup && removed.handle.as_ref() == Some(&*node) {
                            break;
                        }
                    }
                }
            }
            Operation::RemoveAll { speed } => {
                let speed = speed.filter(|speed| !speed.is_zero());
                let mut batch = Vec::with_capacity(self.visible.len() + 2);
                if let Some(speed) = speed {
                    batch.push(Operation::ChangeDeleteSpeed {
                        speed,
                        transient: true,
                    });
                }
                batch.extend((0..self.visible.len()).map(|_| Operation::RemoveLastVisibleNode {
                    removing_character: false,
                }));
                if speed.is_some() {
                    batch.push(Operation::ChangeDeleteSpeed {
                        speed: self.options.delete_speed,
                        transient: true,
                    });
                }
                self.prepend(batch);
            }
            Operation::RemoveLastVisibleNode { removing_character } => {
                let Some(removed) = self.pop_visible(env) else {
                    return Ok(());
                };
                // An emptied wrapper is its own unit; take the character too.
                if removed.kind == VisibleKind::Markup && *removing_character {
                    self.pending.push_front(Operation::RemoveLastVisibleNode {
                        removing_character: false,
                    });
                }
            }
            Operation::ChangeDeleteSpeed { speed, .. } => self.options.delete_speed = *speed,
            Operation::ChangeDelay { delay } => self.options.delay = *delay,
            Operation::ChangeCursor { cursor } => {
                self.options.cursor = cursor.clone();
                env.backend.set_inner_markup(&env.elements.cursor, cursor);
            }
        }

        Ok(())
    }

    fn insert_text<B>(&mut self, text: &str, target: Option<&H>, env: &mut StepEnv<'_, B>)
    where
        B: RenderBackend<Handle = H>,
    {
        let created = env.backend.create_text_unit(text);
        let handle = match env.hooks.on_create_text_node.as_mut() {
            Some(hook) => hook(text, created),
            None => Some(created),
        };
        let parent = target
            .cloned()
            .unwrap_or_else(|| env.elements.wrapper.clone());

        if let Some(handle) = &handle {
            env.backend.append_child(&parent, handle);
        }

        self.visible.push(VisibleNode {
            kind: VisibleKind::Text,
            handle,
            character: Some(text.to_string()),
            parent,
        });
    }

    fn pop_visible<B>(&mut self, env: &mut StepEnv<'_, B>) -> Option<VisibleNode<H>>
    where
        B: RenderBackend<Handle = H>,
    {
        let removed = self.visible.pop()?;

        if let Some(on_remove) = env.hooks.on_remove_node.as_mut() {
            on_remove(RemovedNode {
                character: removed.character.as_deref(),
                handle: removed.handle.as_ref(),
            });
        }
        if let Some(handle) = &removed.handle {
            env.backend.remove_child(&removed.parent, handle);
        }

        Some(removed)
    }

    fn reset_for_loop(&mut self) {
        tracing::debug!(replayed = self.history.len(), "looping, replaying recorded operations");
        self.pending = std::mem::take(&mut self.history).into();
        self.options = self.initial.clone();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, ops::RangeInclusive, rc::Rc};

    use super::*;
    use crate::{
        markup::ElementSpec,
        render::{MemoryBackend, NodeId},
        timing::ManualFrames,
        Speed, TypewriterError,
    };

    struct LowestRandom;

    impl RandomSource for LowestRandom {
        fn integer(&mut self, range: RangeInclusive<u64>) -> u64 {
            *range.start()
        }
    }

    struct Harness {
        backend: MemoryBackend,
        frames: ManualFrames,
        random: Box<dyn RandomSource>,
        hooks: Hooks<NodeId>,
        elements: Elements<NodeId>,
        scheduler: Scheduler<NodeId>,
    }

    impl Harness {
        fn new(options: TypewriterConfig) -> Self {
            let mut backend = MemoryBackend::new();
            let container = backend.add_container("#root");
            let wrapper = backend.create_element(&ElementSpec::new("span"));
            let cursor = backend.create_element(&ElementSpec::new("span"));
            backend.append_child(&container, &wrapper);
            backend.append_child(&container, &cursor);

            Self {
                backend,
                frames: ManualFrames::new(),
                random: Box::new(LowestRandom),
                hooks: Hooks::default(),
                elements: Elements {
                    container,
                    wrapper,
                    cursor,
                },
                scheduler: Scheduler::new(options),
            }
        }

        fn fixed(delay: u64, delete: u64) -> Self {
            Self::new(TypewriterConfig {
                delay: Speed::Fixed(delay),
                delete_speed: Speed::Fixed(delete),
                ..TypewriterConfig::default()
            })
        }

        fn tick(&mut self, now: u64) -> Result<TickOutcome> {
            let mut env = StepEnv {
                backend: &mut self.backend,
                frames: &mut self.frames,
                random: self.random.as_mut(),
                hooks: &mut self.hooks,
                elements: &self.elements,
            };
            self.scheduler.step(now, &mut env)
        }

        /// Ticks every millisecond from `from` until the queue is idle.
        fn drain(&mut self, from: u64) -> u64 {
            let mut now = from;
            while self.tick(now).unwrap() != TickOutcome::Idle {
                now += 1;
                assert!(now < from + 1_000_000, "scheduler never went idle");
            }
            now
        }

        fn text(&self) -> String {
            self.backend.text_content(self.elements.wrapper)
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.scheduler.enqueue(Operation::TypeCharacter {
                    character: c.to_string(),
                    target: None,
                });
            }
        }
    }

    #[test]
    fn second_character_waits_for_the_delay() {
        let mut h = Harness::fixed(100, 50);
        h.type_text("ab");

        assert_eq!(h.tick(0).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(100).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(101).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.text(), "a");

        assert_eq!(h.tick(201).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.text(), "a");
        assert_eq!(h.tick(202).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.text(), "ab");

        assert_eq!(h.tick(400).unwrap(), TickOutcome::Idle);
        assert!(!h.scheduler.is_scheduled());
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn every_non_idle_tick_requests_a_frame() {
        let mut h = Harness::fixed(100, 50);
        h.type_text("a");

        h.tick(0).unwrap();
        assert!(h.scheduler.is_scheduled());
        assert_eq!(h.scheduler.state(), SchedulerState::Waiting);
        assert_eq!(h.frames.requested(), 1);

        h.tick(101).unwrap();
        assert_eq!(h.scheduler.state(), SchedulerState::Running);
        assert_eq!(h.frames.requested(), 2);
    }

    #[test]
    fn removing_from_an_empty_stack_is_a_no_op() {
        let mut h = Harness::fixed(1, 1);
        h.scheduler.enqueue(Operation::RemoveLastVisibleNode {
            removing_character: true,
        });

        h.tick(0).unwrap();
        assert_eq!(
            h.tick(10).unwrap(),
            TickOutcome::Executed(OperationKind::RemoveLastVisibleNode)
        );
        assert!(h.scheduler.visible().is_empty());
        assert_eq!(h.scheduler.pending_len(), 0);
    }

    #[test]
    fn remove_character_expands_into_one_removal() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("xy");
        h.scheduler.enqueue(Operation::RemoveCharacter);
        let now = h.drain(0);

        assert_eq!(h.text(), "x");
        assert_eq!(h.scheduler.visible().len(), 1);
        assert!(now > 0);
    }

    #[test]
    fn remove_all_brackets_removals_with_transient_speed_changes() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("abc");
        h.scheduler.enqueue(Operation::RemoveAll {
            speed: Some(Speed::Fixed(5)),
        });
        h.scheduler.enqueue(Operation::PauseFor { ms: 1 });

        let mut now = 0;
        loop {
            now += 2;
            if h.tick(now).unwrap() == TickOutcome::Executed(OperationKind::RemoveAll) {
                break;
            }
        }

        assert_eq!(
            h.scheduler.pending_kinds(),
            vec![
                OperationKind::ChangeDeleteSpeed,
                OperationKind::RemoveLastVisibleNode,
                OperationKind::RemoveLastVisibleNode,
                OperationKind::RemoveLastVisibleNode,
                OperationKind::ChangeDeleteSpeed,
                OperationKind::PauseFor,
            ]
        );
        let restore = h.scheduler.pending().nth(4).unwrap();
        assert!(matches!(
            restore,
            Operation::ChangeDeleteSpeed {
                speed: Speed::Fixed(1),
                transient: true
            }
        ));

        h.drain(now + 1);
        assert_eq!(h.text(), "");
        assert_eq!(h.scheduler.options().delete_speed, Speed::Fixed(1));
    }

    #[test]
    fn removal_uses_the_delete_speed() {
        let mut h = Harness::fixed(1, 30);
        h.type_text("a");
        h.scheduler.enqueue(Operation::RemoveCharacter);

        h.tick(0).unwrap();
        assert_eq!(h.tick(2).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.tick(20).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(33).unwrap(), TickOutcome::Executed(OperationKind::RemoveCharacter));
        assert_eq!(h.tick(50).unwrap(), TickOutcome::Throttled);
        assert_eq!(
            h.tick(64).unwrap(),
            TickOutcome::Executed(OperationKind::RemoveLastVisibleNode)
        );
        assert_eq!(h.text(), "");
    }

    fn add_bold(h: &mut Harness) -> NodeId {
        let bold = h.backend.create_element(&ElementSpec::new("b"));
        h.scheduler.enqueue(Operation::AddMarkupNode {
            node: bold,
            parent: None,
        });
        h.scheduler.enqueue(Operation::TypeCharacter {
            character: "z".to_string(),
            target: Some(bold),
        });
        bold
    }

    #[test]
    fn deleting_a_character_also_drops_its_emptied_wrapper() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("a");
        add_bold(&mut h);
        h.drain(0);
        assert_eq!(h.backend.inner_markup(h.elements.wrapper), "a<b>z</b>");

        h.scheduler.enqueue(Operation::RemoveCharacter);
        let now = h.drain(1_000);
        assert_eq!(h.backend.inner_markup(h.elements.wrapper), "a<b></b>");

        h.scheduler.enqueue(Operation::RemoveCharacter);
        h.drain(now + 1_000);
        assert_eq!(h.backend.inner_markup(h.elements.wrapper), "");
        assert!(h.scheduler.visible().is_empty());
    }

    #[test]
    fn remove_all_pops_each_unit_exactly_once() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("a");
        add_bold(&mut h);
        h.type_text("c");
        h.scheduler.enqueue(Operation::RemoveAll { speed: None });

        let removed = Rc::new(RefCell::new(Vec::new()));
        let sink = removed.clone();
        h.hooks = std::mem::take(&mut h.hooks).with_on_remove_node(move |node| {
            sink.borrow_mut().push(node.character.map(str::to_string));
        });
        h.drain(0);

        assert_eq!(h.backend.inner_markup(h.elements.wrapper), "");
        assert_eq!(
            *removed.borrow(),
            vec![Some("c".to_string()), Some("z".to_string()), None, Some("a".to_string())]
        );
    }

    #[test]
    fn remove_markup_node_takes_everything_after_it() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("a");
        let bold = add_bold(&mut h);
        h.type_text("c");
        h.scheduler.enqueue(Operation::RemoveMarkupNode { node: bold });
        h.drain(0);

        assert_eq!(h.text(), "a");
        assert_eq!(h.scheduler.visible().len(), 1);

        h.scheduler.enqueue(Operation::RemoveMarkupNode { node: bold });
        h.drain(1_000);
        assert_eq!(h.text(), "a", "unknown node is ignored");
    }

    #[test]
    fn pause_defers_the_next_operation() {
        let mut h = Harness::fixed(1, 1);
        h.scheduler.enqueue(Operation::PauseFor { ms: 500 });
        h.type_text("a");

        h.tick(0).unwrap();
        assert_eq!(h.tick(10).unwrap(), TickOutcome::Executed(OperationKind::PauseFor));
        assert_eq!(h.tick(300).unwrap(), TickOutcome::Waiting);
        assert_eq!(h.scheduler.state(), SchedulerState::Waiting);
        assert_eq!(h.tick(510).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
    }

    #[test]
    fn paused_scheduler_keeps_ticking_without_effect() {
        let mut h = Harness::fixed(1, 1);
        h.type_text("a");
        h.scheduler.set_paused(true);

        assert_eq!(h.tick(0).unwrap(), TickOutcome::Paused);
        assert_eq!(h.tick(100).unwrap(), TickOutcome::Paused);
        assert!(h.scheduler.is_scheduled());
        assert_eq!(h.scheduler.state(), SchedulerState::Paused);
        assert_eq!(h.text(), "");

        h.scheduler.set_paused(false);
        assert_eq!(h.tick(101).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
    }

    #[test]
    fn change_operations_mutate_active_options_only() {
        let mut h = Harness::fixed(1, 1);
        h.scheduler.enqueue(Operation::ChangeDelay {
            delay: Speed::Fixed(2),
        });
        h.scheduler.enqueue(Operation::ChangeDeleteSpeed {
            speed: Speed::Natural,
            transient: false,
        });
        h.scheduler.enqueue(Operation::ChangeCursor {
            cursor: "_".to_string(),
        });
        h.drain(0);

        assert_eq!(h.scheduler.options().delay, Speed::Fixed(2));
        assert_eq!(h.scheduler.options().delete_speed, Speed::Natural);
        assert_eq!(h.scheduler.options().cursor, "_");
        assert_eq!(h.scheduler.initial_options().delay, Speed::Fixed(1));
        assert_eq!(h.backend.text_content(h.elements.cursor), "_");
    }

    #[test]
    fn looping_replays_history_and_restores_options() {
        let mut h = Harness::new(TypewriterConfig {
            delay: Speed::Fixed(1),
            delete_speed: Speed::Fixed(1),
            looping: true,
            ..TypewriterConfig::default()
        });
        h.type_text("hi");
        h.scheduler.enqueue(Operation::ChangeDelay {
            delay: Speed::Fixed(3),
        });
        h.scheduler.enqueue(Operation::RemoveAll {
            speed: Some(Speed::Fixed(2)),
        });

        let mut now = 0;
        while h.scheduler.pending_len() > 0 || now == 0 {
            now += 5;
            h.tick(now).unwrap();
        }
        assert_eq!(h.text(), "");
        assert_eq!(
            h.scheduler.history_kinds(),
            vec![
                OperationKind::TypeCharacter,
                OperationKind::TypeCharacter,
                OperationKind::ChangeDelay,
                OperationKind::RemoveAll,
            ]
        );
        assert_eq!(h.scheduler.options().delay, Speed::Fixed(3));

        now += 5;
        assert_eq!(h.tick(now).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.scheduler.options(), h.scheduler.initial_options());
        assert_eq!(h.text(), "h");
        assert!(h.scheduler.history_kinds() == vec![OperationKind::TypeCharacter]);
    }

    #[test]
    fn failing_callback_is_retried() {
        let mut h = Harness::fixed(1, 1);
        let attempts = Rc::new(RefCell::new(0));
        let counter = attempts.clone();
        h.scheduler.enqueue(Operation::call_function(move |elements: &Elements<NodeId>| {
            *counter.borrow_mut() += 1;
            assert_ne!(elements.wrapper, elements.cursor);
            if *counter.borrow() == 1 {
                Err(TypewriterError::callback("not yet"))
            } else {
                Ok(())
            }
        }));

        h.tick(0).unwrap();
        assert!(matches!(h.tick(5), Err(TypewriterError::Callback(_))));
        assert_eq!(h.scheduler.pending_len(), 1);
        assert!(h.scheduler.is_scheduled());

        assert_eq!(h.tick(10).unwrap(), TickOutcome::Executed(OperationKind::CallFunction));
        assert_eq!(*attempts.borrow(), 2);
    }

    #[test]
    fn create_text_hook_can_substitute_or_hide_units() {
        let mut h = Harness::fixed(1, 1);
        h.hooks = std::mem::take(&mut h.hooks)
            .with_on_create_text_node(|character, handle| (character != "x").then_some(handle));
        h.type_text("axb");
        h.drain(0);

        assert_eq!(h.text(), "ab");
        assert_eq!(h.scheduler.visible().len(), 3);
        assert_eq!(h.scheduler.visible()[1].handle, None);

        h.scheduler.enqueue(Operation::RemoveAll { speed: None });
        h.drain(1_000);
        assert_eq!(h.text(), "");
    }

    /// Hands out queued values and records every range it was asked for.
    struct RecordingRandom {
        values: Vec<u64>,
        draws: Rc<RefCell<Vec<RangeInclusive<u64>>>>,
    }

    impl RandomSource for RecordingRandom {
        fn integer(&mut self, range: RangeInclusive<u64>) -> u64 {
            let index = self.draws.borrow().len();
            self.draws.borrow_mut().push(range.clone());
            self.values.get(index).copied().unwrap_or(*range.start())
        }
    }

    #[test]
    fn natural_delay_is_drawn_afresh_on_every_tick() {
        let draws = Rc::new(RefCell::new(Vec::new()));
        let mut h = Harness::new(TypewriterConfig {
            delay: Speed::Natural,
            ..TypewriterConfig::default()
        });
        h.random = Box::new(RecordingRandom {
            values: vec![150, 130, 160, 125],
            draws: draws.clone(),
        });
        h.type_text("ab");

        assert_eq!(h.tick(0).unwrap(), TickOutcome::Throttled);
        // A cached 150 would still throttle here.
        assert_eq!(h.tick(140).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.tick(200).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(270).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.tick(400).unwrap(), TickOutcome::Idle);

        assert_eq!(h.text(), "ab");
        assert_eq!(*draws.borrow(), vec![NATURAL_TYPING_MS; 4]);
    }

    #[test]
    fn zero_pause_resolves_on_the_next_frame() {
        let mut h = Harness::fixed(10, 10);
        h.scheduler.enqueue(Operation::PauseFor { ms: 0 });
        h.type_text("a");

        assert_eq!(h.tick(0).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(11).unwrap(), TickOutcome::Executed(OperationKind::PauseFor));
        assert_eq!(h.tick(12).unwrap(), TickOutcome::Throttled);
        assert_eq!(h.tick(22).unwrap(), TickOutcome::Executed(OperationKind::TypeCharacter));
        assert_eq!(h.text(), "a");
    }
}
