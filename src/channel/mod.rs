/*
┌────────────────────────────── Channel ──────────────────────────────┐
│  properties ──▶ ChannelSettings ──▶ WorkerSupervisor                 │
│                                       │                             │
│                         attach "<id>" │ attach "application:<id>"   │
│                                       ▼                             │
│                      transport worker ──▶ forwarding worker ──▶ mo_url
└──────────────────────────────────────────────────────────────────────┘
      save/delete ──▶ ChannelStore        send_message ──▶ MessageSender
*/
#[allow(clippy::module_inception)]
pub mod channel;
pub mod error;
pub mod registry;
pub mod settings;
pub mod store;
pub mod translate;

pub use channel::{Channel, ChannelContext, ChannelLifecycle, application_id};
pub use error::{ChannelError, Result};
pub use registry::TransportRegistry;
pub use settings::ChannelSettings;
pub use store::{CHANNELS_SET, ChannelStore};
