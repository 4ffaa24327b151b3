//! Session domain — the exclusive channel to the native host and the
//! processing/image state derived from it.

pub mod channel;
mod controller;

pub use channel::{
    ChannelConnector, ChannelError, ChannelEvent, ChannelTransport, NativeHostConnector,
};
pub use controller::{SessionController, SessionSnapshot};
