//! Tweet domain logic.
//!
//! This module contains the hashtag indexer, the interaction toggler, link
//! preview support and the [`TweetService`] that orchestrates them.

mod interactions;
mod links;
mod parsing;
mod service;
mod tags;

// Re-export public API
pub use interactions::toggle_interaction;
pub use links::LinkPreviewClient;
pub use parsing::{extract_first_link, extract_hashtags, parse_link_preview};
pub use service::TweetService;
pub use tags::index_hashtags;
