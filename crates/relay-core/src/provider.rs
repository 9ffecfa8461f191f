use std::rc::Rc;

use crate::channel::Channel;
use crate::context::Context;
use crate::state::State;

/// Scope owner: creates exactly one [`Channel`] and publishes it to every
/// descendant of [`context`](Provider::context).
///
/// The published channel is fixed for the provider's lifetime; state changes
/// go through [`Channel::set_state`] and friends.
pub struct Provider {
    channel: Channel,
    context: Context,
}

impl Provider {
    pub fn new(parent: &Context, initial: State) -> Self {
        let channel = Channel::new(initial);
        let context = parent.with_channel(Rc::new(channel.clone()));
        log::debug!("Provider: published channel at depth {}", context.depth());
        Self { channel, context }
    }

    pub fn root(initial: State) -> Self {
        Self::new(&Context::root(), initial)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Context to hand to descendants.
    pub fn context(&self) -> &Context {
        &self.context
    }
}
