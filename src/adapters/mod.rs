//! Adapters - Implementations of port interfaces.
//!
//! Each submodule groups the production adapter for a port with its
//! test double.

pub mod auth;
pub mod navigation;
pub mod storage;
pub mod websocket;
