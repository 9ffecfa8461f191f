//! Per-mount adapters between a consumer and shared or local state.
//!
//! A [`Binding`] resolves the channel published in its [`Context`], or owns a
//! private local [`State`] instead, narrows the authoritative state through a
//! selector and hands the projection to a render callback:
//!
//! ```rust
//! use relay_core::*;
//!
//! let provider = Provider::root(state!({ "count": 0, "data": [] }));
//!
//! let label = Binding::builder()
//!     .select(|s| s.get_as::<i64>("count").unwrap_or_default())
//!     .render(|count, _update| format!("count = {count}"))
//!     .build();
//! label.attach(provider.context());
//! assert_eq!(label.output().as_deref(), Some("count = 0"));
//!
//! label.update(|s| patch!({ "count": s.get_as::<i64>("count").unwrap_or_default() + 1 }));
//! assert_eq!(label.output().as_deref(), Some("count = 1"));
//! ```
//!
//! # Lifecycle
//!
//! `Unattached -> Attached -> Detached`. [`attach`](Binding::attach)
//! subscribes to the channel (unless local state is authoritative) and runs
//! the first render. [`detach`](Binding::detach), dropping the binding, or
//! disposing the [`Scope`](crate::Scope) that was current at attach time
//! unsubscribes exactly once. `Detached` is terminal; updates and
//! notifications reaching a detached binding are ignored.
//!
//! # Re-rendering
//!
//! After every change to the authoritative state the selector runs again.
//! The render callback runs only when the new projection differs from the
//! last one (`PartialEq`). The default projection, [`Snapshot`], compares by
//! pointer identity, so every committed transition re-renders it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::channel::{StateChannel, SubId, Transition};
use crate::context::Context;
use crate::dispose::Dispose;
use crate::scope::current_scope;
use crate::state::{Patch, State};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unattached,
    Attached,
    Detached,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BindingStats {
    /// Channel notifications delivered to this binding.
    pub notifications: u64,
    /// Read-path evaluations that produced a new projection.
    pub renders: u64,
}

/// Whole-state projection compared by pointer identity.
#[derive(Clone, Debug)]
pub struct Snapshot(Rc<State>);

impl Snapshot {
    pub fn state(&self) -> &State {
        &self.0
    }

    pub fn into_inner(self) -> Rc<State> {
        self.0
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = State;

    fn deref(&self) -> &State {
        &self.0
    }
}

type Select<P> = Rc<dyn Fn(&Rc<State>) -> P>;
type Render<P, O> = Rc<dyn Fn(&P, &Updater) -> O>;

trait UpdateTarget {
    fn apply(&self, transition: Transition<'_>) -> bool;
}

/// Write handle passed to render callbacks. Holds the binding weakly: once
/// the binding is detached or dropped every call is a no-op.
#[derive(Clone)]
pub struct Updater {
    target: Weak<dyn UpdateTarget>,
}

impl Updater {
    /// Applies `f` to the authoritative state. Returns whether a transition
    /// was committed.
    pub fn update(&self, f: impl FnOnce(&State) -> Patch) -> bool {
        let Some(target) = self.target.upgrade() else {
            log::debug!("Updater::update: binding is gone; ignoring");
            return false;
        };
        target.apply(Box::new(move |s: &State| Some(f(s))))
    }

    /// Like [`update`](Self::update); an `Err` from `f` commits nothing and is
    /// returned unchanged.
    pub fn try_update<E>(&self, f: impl FnOnce(&State) -> Result<Patch, E>) -> Result<bool, E> {
        let Some(target) = self.target.upgrade() else {
            log::debug!("Updater::try_update: binding is gone; ignoring");
            return Ok(false);
        };
        let mut failure = None;
        let committed = target.apply(Box::new(|s: &State| match f(s) {
            Ok(patch) => Some(patch),
            Err(e) => {
                failure = Some(e);
                None
            }
        }));
        match failure {
            Some(e) => Err(e),
            None => Ok(committed),
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

pub struct BindingBuilder<P: 'static, O: 'static> {
    local: Option<State>,
    select: Select<P>,
    render: Option<Render<P, O>>,
}

impl Default for BindingBuilder<Snapshot, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingBuilder<Snapshot, ()> {
    pub fn new() -> Self {
        Self {
            local: None,
            select: Rc::new(|s: &Rc<State>| Snapshot(s.clone())),
            render: None,
        }
    }

    /// Narrows what the binding observes. Call before [`render`](Self::render).
    pub fn select<Q: 'static>(self, f: impl Fn(&State) -> Q + 'static) -> BindingBuilder<Q, ()> {
        BindingBuilder {
            local: self.local,
            select: Rc::new(move |s: &Rc<State>| f(&**s)),
            render: None,
        }
    }
}

impl<P: 'static> BindingBuilder<P, ()> {
    pub fn render<O: 'static>(
        self,
        f: impl Fn(&P, &Updater) -> O + 'static,
    ) -> BindingBuilder<P, O> {
        BindingBuilder {
            local: self.local,
            select: self.select,
            render: Some(Rc::new(f)),
        }
    }
}

impl<P: Clone + PartialEq + 'static, O: 'static> BindingBuilder<P, O> {
    /// Gives the binding its own state. The channel in scope, if any, is then
    /// never read, written or subscribed to by this binding.
    pub fn local_state(mut self, initial: State) -> Self {
        self.local = Some(initial);
        self
    }

    pub fn build(self) -> Binding<P, O> {
        let inner = Rc::new_cyclic(|weak: &Weak<Inner<P, O>>| {
            let target: Weak<dyn UpdateTarget> = weak.clone();
            Inner {
                phase: Cell::new(Phase::Unattached),
                local: RefCell::new(self.local.map(Rc::new)),
                channel: RefCell::new(None),
                subscription: Cell::new(None),
                teardown: RefCell::new(None),
                scope_guard: RefCell::new(None),
                select: self.select,
                render: self.render,
                updater: Updater { target },
                last: RefCell::new(None),
                output: RefCell::new(None),
                on_rerender: RefCell::new(None),
                generation: Cell::new(0),
                stats: Cell::new(BindingStats::default()),
                weak: weak.clone(),
            }
        });
        Binding { inner }
    }
}

pub struct Binding<P: 'static, O: 'static> {
    inner: Rc<Inner<P, O>>,
}

struct Inner<P: 'static, O: 'static> {
    phase: Cell<Phase>,
    local: RefCell<Option<Rc<State>>>,
    channel: RefCell<Option<Rc<dyn StateChannel>>>,
    subscription: Cell<Option<SubId>>,
    teardown: RefCell<Option<Dispose>>,
    scope_guard: RefCell<Option<Dispose>>,
    select: Select<P>,
    render: Option<Render<P, O>>,
    updater: Updater,
    last: RefCell<Option<P>>,
    output: RefCell<Option<O>>,
    on_rerender: RefCell<Option<Rc<dyn Fn()>>>,
    generation: Cell<u64>,
    stats: Cell<BindingStats>,
    weak: Weak<Inner<P, O>>,
}

impl Binding<Snapshot, ()> {
    pub fn builder() -> BindingBuilder<Snapshot, ()> {
        BindingBuilder::new()
    }
}

impl<P: Clone + PartialEq + 'static, O: 'static> Binding<P, O> {
    /// Inserts the binding into the live tree under `ctx`.
    pub fn attach(&self, ctx: &Context) {
        self.inner.attach(ctx);
    }

    /// Removes the binding from the tree. Idempotent and terminal.
    pub fn detach(&self) {
        self.inner.detach();
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    pub fn is_local(&self) -> bool {
        self.inner.local.borrow().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscription.get().is_some()
    }

    pub fn subscription(&self) -> Option<SubId> {
        self.inner.subscription.get()
    }

    pub fn local_state(&self) -> Option<Rc<State>> {
        self.inner.local.borrow().clone()
    }

    /// Projection of the last completed render.
    pub fn projection(&self) -> Option<P> {
        self.inner.last.borrow().clone()
    }

    /// Last render output; `None` before attach or without a render callback.
    pub fn output(&self) -> Option<O>
    where
        O: Clone,
    {
        self.inner.output.borrow().clone()
    }

    pub fn updater(&self) -> Updater {
        self.inner.updater.clone()
    }

    pub fn update(&self, f: impl FnOnce(&State) -> Patch) -> bool {
        self.inner.updater.update(f)
    }

    pub fn try_update<E>(&self, f: impl FnOnce(&State) -> Result<Patch, E>) -> Result<bool, E> {
        self.inner.updater.try_update(f)
    }

    /// Called after each re-render that stored new output.
    pub fn on_rerender(&self, hook: impl Fn() + 'static) {
        if self.phase() == Phase::Detached {
            return;
        }
        *self.inner.on_rerender.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn stats(&self) -> BindingStats {
        self.inner.stats.get()
    }
}

impl<P: 'static, O: 'static> Drop for Binding<P, O> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

impl<P: 'static, O: 'static> fmt::Debug for Binding<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("phase", &self.inner.phase.get())
            .field("local", &self.inner.local.borrow().is_some())
            .field("subscription", &self.inner.subscription.get())
            .field("stats", &self.inner.stats.get())
            .finish()
    }
}

impl<P: 'static, O: 'static> Inner<P, O> {
    fn detach(&self) {
        if self.phase.replace(Phase::Detached) == Phase::Detached {
            return;
        }
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown.run();
        }
        // retire the scope's entry
        let guard = self.scope_guard.borrow_mut().take();
        if let Some(guard) = guard {
            guard.cancel();
        }
        self.subscription.set(None);
        let channel = self.channel.borrow_mut().take();
        let hook = self.on_rerender.borrow_mut().take();
        drop((channel, hook));
        log::trace!("Binding: detached");
    }
}

impl<P: Clone + PartialEq + 'static, O: 'static> Inner<P, O> {
    fn attach(&self, ctx: &Context) {
        match self.phase.get() {
            Phase::Unattached => {}
            phase => {
                log::debug!("Binding::attach while {phase:?}; ignoring");
                return;
            }
        }
        self.phase.set(Phase::Attached);

        if self.local.borrow().is_none() {
            match ctx.channel() {
                Some(channel) => self.subscribe(channel),
                None => log::debug!("Binding: no channel in scope; reading an empty state"),
            }
        }

        if let Some(scope) = current_scope() {
            let weak = self.weak.clone();
            let guard = scope.add_disposer(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.detach();
                }
            });
            if !guard.is_spent() {
                *self.scope_guard.borrow_mut() = Some(guard);
            }
        }

        self.refresh(true);
    }

    fn subscribe(&self, channel: Rc<dyn StateChannel>) {
        let weak = self.weak.clone();
        let id = channel.subscribe(Box::new(move |_: &State| {
            if let Some(inner) = weak.upgrade() {
                inner.on_channel_change();
            }
        }));
        let teardown = {
            let channel = channel.clone();
            Dispose::new(move || {
                channel.unsubscribe(id);
            })
        };
        self.subscription.set(Some(id));
        *self.channel.borrow_mut() = Some(channel);
        *self.teardown.borrow_mut() = Some(teardown);
    }

    fn on_channel_change(&self) {
        if self.phase.get() != Phase::Attached {
            return;
        }
        let mut stats = self.stats.get();
        stats.notifications += 1;
        self.stats.set(stats);
        self.refresh(false);
    }

    fn authoritative(&self) -> Rc<State> {
        let local = self.local.borrow().clone();
        if let Some(local) = local {
            return local;
        }
        let channel = self.channel.borrow().clone();
        match channel {
            Some(channel) => channel.get_state(),
            None => Rc::new(State::default()),
        }
    }

    fn refresh(&self, force: bool) {
        if self.phase.get() != Phase::Attached {
            return;
        }
        let state = self.authoritative();
        let projection = (self.select)(&state);
        if !force && self.last.borrow().as_ref() == Some(&projection) {
            log::trace!("Binding: projection unchanged; skipping render");
            return;
        }
        // Cleared until render returns, so a panicking render is retried.
        *self.last.borrow_mut() = None;

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let mut stats = self.stats.get();
        stats.renders += 1;
        self.stats.set(stats);

        let output = self
            .render
            .as_ref()
            .map(|render| render(&projection, &self.updater));

        // A nested refresh (render calling update) already stored newer output,
        // or render detached us.
        if self.generation.get() != generation || self.phase.get() != Phase::Attached {
            return;
        }
        *self.last.borrow_mut() = Some(projection);
        *self.output.borrow_mut() = output;

        let hook = self.on_rerender.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<P: Clone + PartialEq + 'static, O: 'static> UpdateTarget for Inner<P, O> {
    fn apply(&self, transition: Transition<'_>) -> bool {
        if self.phase.get() == Phase::Detached {
            log::debug!("Binding: update after detach ignored");
            return false;
        }

        let local = self.local.borrow().clone();
        if let Some(current) = local {
            let Some(patch) = transition(&current) else {
                return false;
            };
            let base = self.local.borrow().clone().unwrap_or(current);
            *self.local.borrow_mut() = Some(Rc::new(base.merged(patch)));
            self.refresh(false);
            return true;
        }

        let channel = self.channel.borrow().clone();
        match channel {
            Some(channel) => channel.apply(transition),
            None => {
                log::debug!("Binding: no channel in scope; update ignored");
                false
            }
        }
    }
}
