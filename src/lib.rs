//! # Tweet Service Library
//!
//! A Rust web service library implementing the tweet side of a Twitter-like
//! social network: creating and deleting tweets, replies and quotes, hashtag
//! indexing, like/retweet/bookmark toggles, search, timelines and scheduled
//! tweets.
//!
//! ## Features
//!
//! - Hashtag index maintained on every new tweet (`#tag` occurrences are counted, not deduplicated)
//! - Atomic like/retweet/bookmark toggles
//! - Search across tweet text, tag names and user names
//! - Scheduled tweets published by a cron job
//! - Polls with one vote per user
//! - Optional link previews for the first link of a tweet
//! - PostgreSQL storage, or an in-memory store for development and tests
//! - Structured logging
//!
//! ## Configuration
//!
//! - `DATABASE_URL`: PostgreSQL connection string (in-memory store when unset)
//! - `PORT`: Server port (defaults to 3000)
//! - `LINK_PREVIEWS`: enable link preview fetching
//! - `SCHEDULED_PUBLISH_CRON`: schedule of the scheduled-tweet publisher
//!
//! The caller's identity is taken from the `X-Authenticated-User` header set by
//! the authenticating gateway.
//!
//! ## API Endpoints
//!
//! - `GET /health`: Returns service health status
//! - `GET|POST /api/v1/tweets`: Timeline / create a tweet
//! - `GET|DELETE /api/v1/tweets/:id`: Fetch / delete a tweet
//! - `POST /api/v1/tweets/:id/{reply,like,retweet,bookmark}`: Reply and toggles
//! - `POST /api/v1/tweets/:id/vote`: Vote in the tweet's poll
//! - `GET /api/v1/tweets/search?text=`: Search
//!
//! See [`handlers::router`] for the full route table.

pub mod config;
pub mod cronjob;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod store;
pub mod tweets;

// Re-export commonly used types and functions
pub use config::{get_server_port, AppConfig};
pub use cronjob::{run_publish_job, start_publish_cronjob};
pub use db::PgStore;
pub use error::{TweetError, TweetResult};
pub use handlers::router;
pub use identity::Identity;
pub use store::{MemoryStore, StoreTx, TweetStore};
pub use tweets::TweetService;

#[cfg(test)]
mod tests;
