pub mod bus;
pub mod protocol;

pub use bus::{Dispatcher, Outbox, SessionBus};
pub use protocol::{FireRequest, Frame, RemoteCall, Target};
