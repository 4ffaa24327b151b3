//! tutor-relay — capture-and-relay core for a screen-snip AI tutor.
//!
//! The library wires four components:
//! - Session domain (session/): the exclusive channel to the native host
//!   and the processing/image state derived from it
//! - Capture domain (capture/): full-frame grab, pixel-exact crop, one
//!   transaction at a time
//! - MessageRouter (router.rs): the single inbound dispatch point for typed
//!   envelopes from UI surfaces
//! - EventBus (events.rs): outbound notifications toward a possibly-absent
//!   UI surface
//!
//! A UI request flows router → coordinator → crop engine → session → host;
//! host events flow back through the session onto the event bus.

pub mod capture;
pub mod config;
pub mod events;
pub mod router;
pub mod session;
