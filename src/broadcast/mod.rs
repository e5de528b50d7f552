pub mod hub;
pub mod session;
pub mod snapshot;

pub use hub::{BroadcastHub, ChangeSignal, ConnectionRegistry};
pub use session::SubscriberSession;
pub use snapshot::{build_snapshot, RupiahCache, KEEPALIVE_MESSAGE};
