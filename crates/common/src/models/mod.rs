mod pending;
mod tunnel;

pub use pending::PendingRequest;
pub use tunnel::Tunnel;
