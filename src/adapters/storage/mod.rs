//! Storage Adapters
//!
//! Implementations of the CredentialStore port.
//!
//! ## Available Adapters
//!
//! - **FileCredentialStore** - Stores the credential as a YAML file on disk
//! - **InMemoryCredentialStore** - Stores the credential in memory (testing)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileCredentialStore, InMemoryCredentialStore};
//!
//! let store = FileCredentialStore::new("./data/credentials.yaml");
//! let store = InMemoryCredentialStore::new();
//! ```

mod file_credential_store;
mod in_memory_credential_store;

pub use file_credential_store::FileCredentialStore;
pub use in_memory_credential_store::InMemoryCredentialStore;
