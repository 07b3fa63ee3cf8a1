pub mod channel;
pub mod config;
pub mod logger;
pub mod message;
pub mod schema;
pub mod sender;
pub mod store;
pub mod supervisor;
pub mod workers;
