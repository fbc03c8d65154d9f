//! Threaded posts: ownership-checked mutation, tombstones for posts
//! with replies, and the masked read projection.

pub mod handlers;
mod model;
mod service;

pub use model::{AuthorView, PostStatus, PostView, DELETED_PLACEHOLDER};
pub use service::{DeleteOutcome, PostService};
