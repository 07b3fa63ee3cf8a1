pub mod forwarding;
pub mod relay;

pub use forwarding::{FORWARDING_WORKER, MessageForwardingWorker};
pub use relay::RelayTransport;
