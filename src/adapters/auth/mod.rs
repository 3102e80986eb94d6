//! Authentication adapters.
//!
//! Implementations of the `AuthApi` port:
//!
//! - `HttpAuthApi` - REST client for `/auth/refresh` and `/auth/verify`
//! - `MockAuthApi` - Scriptable test implementation

mod http_auth_api;
mod mock;

pub use http_auth_api::HttpAuthApi;
pub use mock::MockAuthApi;
