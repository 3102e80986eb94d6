//! FitLive - live-feed core for the FitLive mobile companion.
//!
//! Keeps scoped live update channels (gym occupancy, buddy sessions) alive
//! while the user is looking at them, and shares one short-lived bearer
//! credential with the rest of the app under a refresh-at-most-once
//! guarantee.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
