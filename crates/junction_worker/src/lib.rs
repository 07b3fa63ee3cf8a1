//! Worker runtime for junction channels.
//!
//! Every transport or application worker runs as a small tokio actor that
//! owns a [`worker_runtime::WorkerHandler`] and is driven through a cloneable
//! [`worker_actor::WorkerHandle`].

pub mod message;
pub mod worker_actor;
pub mod worker_helpers;
pub mod worker_runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod worker_test_util;

pub use message::{SessionEvent, TransportMessage, WorkerConfig, WorkerState};
pub use worker_actor::{spawn_worker_actor, WorkerHandle};
pub use worker_helpers::WorkerError;
pub use worker_runtime::WorkerHandler;
