//! Credential module - bearer token and the identity used to renew it.

mod identity;
mod token;

pub use identity::{IdentityReference, Role};
pub use token::{BearerToken, CredentialValidity};
