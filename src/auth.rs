//! Credential and identity model: identifiers, secrets, user credentials, assertions, and
//! id-token claims.

pub mod assertion;
pub mod claims;
pub mod credential;
pub mod device;
pub mod id;
pub mod secret;

pub use assertion::*;
pub use claims::*;
pub use credential::*;
pub use device::*;
pub use id::*;
pub use secret::*;
