//! Collaborator traits
//!
//! - [`Transport`]: authenticated requests against the manager API
//! - [`CredentialSource`]: credential exchange for bearer tokens

pub mod credentials;
pub mod transport;

pub use credentials::CredentialSource;
pub use transport::{ApiResponse, Method, Transport};
