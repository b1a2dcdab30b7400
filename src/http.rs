//! Layered HTTP stack: transport → authenticator → raw client → JSON codec.
//!
//! ```text
//! JsonClient ──► HttpClient ──► Authenticator ──► HttpTransport
//!                    │
//!                    └── non-2xx ──► ErrorInterpreter ──► Error
//! ```

pub mod auth;
pub mod client;
pub mod context;
pub mod interpret;
pub mod json;
pub mod transport;

pub use auth::*;
pub use client::*;
pub use context::*;
pub use interpret::{DefaultErrorInterpreter, ErrorInterpreter, ErrorResponse};
pub use json::*;
pub use transport::*;
