//! Device session and transports

pub mod session;
pub mod ssh;
pub mod transport;
