pub use crate::binding::{Binding, BindingBuilder, BindingStats, Phase, Snapshot, Updater};
pub use crate::channel::{Channel, Listener, StateChannel, SubId, Transition};
pub use crate::context::{ChannelSlot, Context};
pub use crate::dispose::Dispose;
pub use crate::error::StateError;
pub use crate::provider::Provider;
pub use crate::scope::{Scope, current_scope};
pub use crate::state::{Patch, State};
