//! # Context
//!
//! Descendants find shared values through a [`Context`]: a chain of frames
//! keyed by type, handed explicitly down the composition chain. Each
//! [`with`](Context::with) call pushes a child frame that shadows its
//! ancestors for that type only:
//!
//! ```rust
//! use relay_core::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Locale(&'static str);
//!
//! let root = Context::root().with(Locale("en"));
//! let child = root.with(Locale("fr"));
//!
//! assert_eq!(*root.get::<Locale>().unwrap(), Locale("en"));
//! assert_eq!(*child.get::<Locale>().unwrap(), Locale("fr"));
//! ```
//!
//! The shared state channel lives in a fixed slot, see
//! [`with_channel`](Context::with_channel) and [`channel`](Context::channel).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::channel::StateChannel;

#[derive(Clone, Default)]
pub struct Context(Option<Rc<Frame>>);

struct Frame {
    values: HashMap<TypeId, Rc<dyn Any>>,
    parent: Context,
}

/// Well-known slot holding the channel published by the nearest
/// [`Provider`](crate::Provider).
#[derive(Clone)]
pub struct ChannelSlot(pub Rc<dyn StateChannel>);

impl Context {
    /// An empty context: every lookup misses.
    pub fn root() -> Self {
        Self(None)
    }

    /// Returns a child context with `value` visible to everything below it.
    pub fn with<T: 'static>(&self, value: T) -> Context {
        let mut values: HashMap<TypeId, Rc<dyn Any>> = HashMap::new();
        values.insert(TypeId::of::<T>(), Rc::new(value));
        Context(Some(Rc::new(Frame {
            values,
            parent: self.clone(),
        })))
    }

    /// Nearest value of type `T`, if any frame provides one.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let key = TypeId::of::<T>();
        let mut cur = self.0.as_ref();
        while let Some(frame) = cur {
            if let Some(v) = frame.values.get(&key)
                && let Ok(t) = v.clone().downcast::<T>()
            {
                return Some(t);
            }
            cur = frame.parent.0.as_ref();
        }
        None
    }

    pub fn with_channel(&self, channel: Rc<dyn StateChannel>) -> Context {
        self.with(ChannelSlot(channel))
    }

    pub fn channel(&self) -> Option<Rc<dyn StateChannel>> {
        self.get::<ChannelSlot>().map(|slot| slot.0.clone())
    }

    /// Number of frames between this context and the root.
    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cur = self.0.as_ref();
        while let Some(frame) = cur {
            n += 1;
            cur = frame.parent.0.as_ref();
        }
        n
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("has_channel", &self.get::<ChannelSlot>().is_some())
            .finish()
    }
}
