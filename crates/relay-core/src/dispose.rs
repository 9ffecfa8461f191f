use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Teardown action that runs at most once, however many clones call it.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Runs the action if it has not run yet. Returns whether it ran now.
    pub fn run(&self) -> bool {
        // take first so the action may drop or re-run this guard
        let f = self.0.borrow_mut().take();
        match f {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// Drops the action without running it. Returns whether it was pending.
    pub fn cancel(&self) -> bool {
        let f = self.0.borrow_mut().take();
        f.is_some()
    }

    pub fn is_spent(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispose")
            .field("spent", &self.is_spent())
            .finish()
    }
}
