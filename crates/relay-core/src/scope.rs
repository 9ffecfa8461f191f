//! Mount scopes.
//!
//! A [`Scope`] owns the teardown of one subtree. Bindings attached while a
//! scope is current (see [`Scope::run`]) register their detach with it, so
//! disposing the scope unmounts every binding below it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::dispose::Dispose;

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    disposers: RefCell<Vec<Dispose>>,
    children: RefCell<Vec<Scope>>,
    disposed: Cell<bool>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                disposers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Runs `f` with this scope as the current one.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        // restores the previous scope on unwind too
        struct Restore(Option<Weak<ScopeInner>>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                CURRENT_SCOPE.with(|current| *current.borrow_mut() = prev);
            }
        }

        let prev = CURRENT_SCOPE.with(|current| {
            current
                .borrow_mut()
                .replace(Rc::downgrade(&self.inner))
        });
        let _restore = Restore(prev);
        f()
    }

    /// Registers teardown work. On an already disposed scope it runs at once.
    ///
    /// The returned handle is shared with the scope: cancelling or running it
    /// early retires the entry, and spent entries are dropped on the next
    /// registration.
    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) -> Dispose {
        let dispose = Dispose::new(disposer);
        if self.inner.disposed.get() {
            log::debug!("Scope::add_disposer on a disposed scope; running now");
            dispose.run();
            return dispose;
        }
        let mut disposers = self.inner.disposers.borrow_mut();
        disposers.retain(|d| !d.is_spent());
        disposers.push(dispose.clone());
        dispose
    }

    /// Registered disposers that have not run or been cancelled.
    pub fn pending_disposers(&self) -> usize {
        self.inner
            .disposers
            .borrow()
            .iter()
            .filter(|d| !d.is_spent())
            .count()
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        if self.inner.disposed.get() {
            child.dispose();
        } else {
            self.inner.children.borrow_mut().push(child.clone());
        }
        child
    }

    /// Disposes children first, then runs this scope's disposers in
    /// registration order. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.teardown();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl ScopeInner {
    fn teardown(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers {
            disposer.run();
        }
    }
}

pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade().map(|inner| Scope { inner }))
    })
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if !self.disposed.replace(true) {
            self.teardown();
        }
    }
}
