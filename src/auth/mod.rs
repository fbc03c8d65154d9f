//! Authentication module for the postboard server
//!
//! This module handles registration, credential checks, the
//! access/refresh token lifecycle and bearer-token extraction.

mod extractor;
pub mod handlers;
mod service;

pub use extractor::AuthenticatedUser;
pub use service::{AuthService, Claims, TokenPair};
