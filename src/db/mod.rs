//! Database module for the postboard server
//!
//! Repository traits for users and posts, the Postgres implementation
//! and an in-process store with identical semantics.

pub mod memory;
pub mod models;
pub mod operations;
pub mod repository;

pub use memory::MemoryStore;
pub use models::{NewPost, PostRecord, User, UserId};
pub use operations::DbOperations;
pub use repository::{PostRepository, UserRepository};
