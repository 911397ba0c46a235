mod manager;
mod snapshot;
#[cfg(test)]
pub mod testing;
mod traits;

pub use manager::{PresenceManager, StatusReport};
pub use snapshot::build_snapshot;
pub use traits::{
    Activity, DisconnectSignal, PresenceClient, PresenceConnection, PresenceError, PresenceSession,
};
