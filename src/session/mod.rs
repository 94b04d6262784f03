//! Session Module
//!
//! Caps and rotates the concurrently active sessions of an identity.
//! Cryptographic validity of the credential is established upstream; this
//! module only answers whether the session it names is still live.

pub mod registry;

pub use registry::{new_session_id, SessionMeta, SessionRegistry, StoredSession};
