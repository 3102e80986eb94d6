//! Domain layer containing the value types of the live-feed core.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, errors, state machine trait)
//! - `credential` - Bearer token, validity and identity reference
//! - `live` - Scopes, inbound messages, connection lifecycle, reconnect policy

pub mod credential;
pub mod foundation;
pub mod live;
