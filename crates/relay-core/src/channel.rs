//! Single-writer, multi-reader state broadcast.
//!
//! A [`Channel`] owns the canonical [`State`] and an ordered registry of
//! listeners. Every committed transition replaces the stored snapshot and then
//! synchronously notifies the listeners that were registered when the pass
//! started, in subscription order.
//!
//! # Invariants
//!
//! 1. Each listener registered before a pass starts is invoked at most once
//!    per pass, and exactly once unless it is unsubscribed before its turn.
//! 2. A listener subscribed during a pass is first notified by the next pass.
//! 3. After `unsubscribe(id)` returns, `id`'s listener is never invoked again.
//! 4. Stale or unknown ids are no-ops; slot-map versioning keeps them from
//!    aliasing newer subscriptions.
//! 5. No internal borrow is held while listener or transition code runs, so
//!    nested `set_state`/`subscribe`/`unsubscribe` calls are allowed. A nested
//!    pass completes before the outer pass resumes, and the outer pass hands
//!    each remaining listener the state current at its turn.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::state::{Patch, State};

new_key_type! {
    /// Handle returned by [`Channel::subscribe`].
    pub struct SubId;
}

/// Listener invoked with the post-transition state.
pub type Listener = Box<dyn Fn(&State)>;

/// A transition: `None` aborts without committing or notifying.
pub type Transition<'a> = Box<dyn FnOnce(&State) -> Option<Patch> + 'a>;

/// The seam a [`Binding`](crate::Binding) talks to. [`Channel`] is the
/// production implementation.
pub trait StateChannel {
    fn get_state(&self) -> Rc<State>;
    /// Runs `transition` against the current state and commits its patch.
    /// Returns whether a transition was committed.
    fn apply(&self, transition: Transition<'_>) -> bool;
    fn subscribe(&self, listener: Listener) -> SubId;
    /// Returns `false` when `id` was not registered.
    fn unsubscribe(&self, id: SubId) -> bool;
}

#[derive(Clone)]
pub struct Channel(Rc<Inner>);

struct Inner {
    state: RefCell<Rc<State>>,
    registry: RefCell<Registry>,
    version: Cell<u64>,
}

#[derive(Default)]
struct Registry {
    listeners: SlotMap<SubId, Rc<dyn Fn(&State)>>,
    order: Vec<SubId>,
}

impl Channel {
    pub fn new(initial: State) -> Self {
        Self(Rc::new(Inner {
            state: RefCell::new(Rc::new(initial)),
            registry: RefCell::new(Registry::default()),
            version: Cell::new(0),
        }))
    }

    pub fn get_state(&self) -> Rc<State> {
        self.0.state.borrow().clone()
    }

    /// Number of committed transitions so far.
    pub fn version(&self) -> u64 {
        self.0.version.get()
    }

    pub fn set_state(&self, patch: impl Into<Patch>) {
        let patch = patch.into();
        self.commit(patch);
    }

    pub fn update(&self, f: impl FnOnce(&State) -> Patch) {
        let current = self.get_state();
        let patch = f(&current);
        self.commit(patch);
    }

    /// Like [`update`](Self::update), but an `Err` leaves the state untouched
    /// and notifies no one.
    pub fn try_update<E>(&self, f: impl FnOnce(&State) -> Result<Patch, E>) -> Result<(), E> {
        let current = self.get_state();
        let patch = f(&current)?;
        self.commit(patch);
        Ok(())
    }

    pub fn subscribe(&self, listener: impl Fn(&State) + 'static) -> SubId {
        self.insert_listener(Rc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        let mut reg = self.0.registry.borrow_mut();
        if reg.listeners.remove(id).is_none() {
            log::debug!("Channel::unsubscribe: {id:?} is not registered; ignoring");
            return false;
        }
        reg.order.retain(|s| *s != id);
        log::trace!("Channel: unsubscribed {id:?}");
        true
    }

    pub fn is_subscribed(&self, id: SubId) -> bool {
        self.0.registry.borrow().listeners.contains_key(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.registry.borrow().listeners.len()
    }

    fn insert_listener(&self, listener: Rc<dyn Fn(&State)>) -> SubId {
        let mut reg = self.0.registry.borrow_mut();
        let id = reg.listeners.insert(listener);
        reg.order.push(id);
        log::trace!("Channel: subscribed {id:?}");
        id
    }

    fn commit(&self, patch: Patch) {
        // Merge into whatever is current now: the transition may itself have
        // caused a nested commit.
        let next = Rc::new(self.0.state.borrow().merged(patch));
        *self.0.state.borrow_mut() = next;
        let version = self.0.version.get() + 1;
        self.0.version.set(version);
        log::trace!("Channel: committed transition #{version}");
        self.notify();
    }

    fn notify(&self) {
        let pass: SmallVec<[SubId; 8]> = self.0.registry.borrow().order.iter().copied().collect();
        for id in pass {
            let listener = self.0.registry.borrow().listeners.get(id).cloned();
            let Some(listener) = listener else {
                // unsubscribed earlier in this pass
                continue;
            };
            let state = self.get_state();
            listener(&state);
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(State::default())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("state", &*self.get_state())
            .field("subscribers", &self.subscriber_count())
            .field("version", &self.version())
            .finish()
    }
}

impl StateChannel for Channel {
    fn get_state(&self) -> Rc<State> {
        Channel::get_state(self)
    }

    fn apply(&self, transition: Transition<'_>) -> bool {
        let current = Channel::get_state(self);
        match transition(&current) {
            Some(patch) => {
                self.commit(patch);
                true
            }
            None => false,
        }
    }

    fn subscribe(&self, listener: Listener) -> SubId {
        self.insert_listener(Rc::from(listener))
    }

    fn unsubscribe(&self, id: SubId) -> bool {
        Channel::unsubscribe(self, id)
    }
}
