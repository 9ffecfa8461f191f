//! # Shared state for component trees
//!
//! Relay hands one mutable state object to every descendant of a scope
//! without threading it through each layer. There are four pieces:
//!
//! - [`Channel`]: owns the canonical [`State`] and broadcasts every
//!   transition to its subscribers, in subscription order.
//! - [`Provider`]: the scope owner. Creates one channel and publishes it in
//!   a [`Context`].
//! - [`Binding`]: a per-mount adapter. Reads the channel in scope (or its own
//!   local state), narrows it with a selector, renders, and re-renders when
//!   its projection changes.
//! - [`Scope`]: mount-tree teardown. Disposing a scope detaches every binding
//!   attached under it.
//!
//! ## Global state
//!
//! ```rust
//! use relay_core::*;
//!
//! let provider = Provider::root(state!({ "count": 0 }));
//!
//! let a = Binding::builder()
//!     .render(|s, _| s.get_as::<i64>("count"))
//!     .build();
//! let b = Binding::builder()
//!     .render(|s, _| s.get_as::<i64>("count"))
//!     .build();
//! a.attach(provider.context());
//! b.attach(provider.context());
//!
//! a.update(|s| Patch::new().set("count", s.get_as::<i64>("count").unwrap_or(0) + 1));
//!
//! // every subscriber saw the transition
//! assert_eq!(a.output(), Some(Some(1)));
//! assert_eq!(b.output(), Some(Some(1)));
//! ```
//!
//! ## Local state
//!
//! A binding built with [`local_state`](BindingBuilder::local_state) never
//! touches the channel; its updates are invisible to everyone else:
//!
//! ```rust
//! use relay_core::*;
//!
//! let provider = Provider::root(state!({ "count": 0 }));
//! let local = Binding::builder()
//!     .local_state(state!({ "count": 10 }))
//!     .render(|s, _| s.get_as::<i64>("count"))
//!     .build();
//! local.attach(provider.context());
//!
//! local.update(|s| patch!({ "count": s.get_as::<i64>("count").unwrap_or(0) + 1 }));
//! assert_eq!(local.output(), Some(Some(11)));
//! assert_eq!(provider.channel().get_state().get_as::<i64>("count"), Some(0));
//! ```

pub mod binding;
pub mod channel;
pub mod context;
pub mod dispose;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod scope;
pub mod state;

pub use prelude::*;

#[doc(hidden)]
pub use serde_json::json;
pub use serde_json::Value;
