//! Persistence gateway.
//!
//! A [`TweetStore`] hands out units of work ([`StoreTx`]). Every service
//! operation opens one, performs all of its reads and writes through it and
//! commits at the end. Dropping a unit of work without committing discards
//! everything it did.
//!
//! Two stores exist: [`crate::db::PgStore`] for PostgreSQL and
//! [`MemoryStore`] for tests and database-less runs.

mod memory;

pub use memory::{MemoryStore, NewUser};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TweetResult;
use crate::models::{
    InteractionKind, PageRequest, Poll, PollChoiceId, PollId, Tag, TagId, Tweet, TweetDraft,
    TweetId, User, UserId,
};

#[async_trait]
pub trait TweetStore: Send + Sync {
    async fn begin(&self) -> TweetResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    // Users

    async fn find_user_by_email(&mut self, email: &str) -> TweetResult<Option<User>>;

    async fn find_user_by_id(&mut self, user_id: UserId) -> TweetResult<Option<User>>;

    /// Users whose full name or username contains `text`, ignoring case.
    async fn find_users_matching(&mut self, text: &str) -> TweetResult<Vec<User>>;

    async fn adjust_tweet_count(&mut self, user_id: UserId, delta: i64) -> TweetResult<()>;

    // Tweets

    async fn find_tweet(&mut self, tweet_id: TweetId) -> TweetResult<Option<Tweet>>;

    async fn insert_tweet(&mut self, draft: TweetDraft) -> TweetResult<Tweet>;

    /// Deletes a tweet together with everything hanging off it: interactions
    /// (retweeters get their tweet count back), tag entries (tag quantities
    /// are decremented) and quote references.
    async fn delete_tweet(&mut self, tweet_id: TweetId) -> TweetResult<()>;

    /// Non-reply, non-scheduled tweets, newest first.
    async fn timeline(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>>;

    /// Non-scheduled tweets carrying at least one image, newest first.
    async fn media_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>>;

    /// Non-scheduled tweets linking a video, newest first.
    async fn video_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>>;

    /// A user's non-scheduled tweets carrying images or a video link,
    /// newest first.
    async fn user_media_tweets(
        &mut self,
        user_id: UserId,
        page: PageRequest,
    ) -> TweetResult<Vec<Tweet>>;

    /// A user's non-reply, non-scheduled tweets, newest first.
    async fn user_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>>;

    /// A user's non-scheduled replies, newest first.
    async fn user_replies(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>>;

    /// Every non-scheduled tweet owned by the user, replies included.
    async fn tweets_by_user(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>>;

    /// A user's pending scheduled tweets, latest scheduled date first.
    async fn scheduled_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>>;

    async fn replies_to(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>>;

    async fn quotes_of(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>>;

    /// Non-scheduled tweets whose text contains `text`, ignoring case.
    async fn tweets_matching_text(&mut self, text: &str) -> TweetResult<Vec<Tweet>>;

    /// Ids of scheduled tweets whose date is at or before `now`.
    async fn due_scheduled_tweets(&mut self, now: DateTime<Utc>) -> TweetResult<Vec<TweetId>>;

    /// Clears the schedule and stamps the tweet with `now`.
    async fn publish_tweet(&mut self, tweet_id: TweetId, now: DateTime<Utc>) -> TweetResult<()>;

    // Tags

    async fn find_tag_by_name(&mut self, tag_name: &str) -> TweetResult<Option<Tag>>;

    /// Creates a tag listing `tweet_id` once with a quantity of 1. A tag
    /// created concurrently under the same name is incremented instead.
    async fn insert_tag(&mut self, tag_name: &str, tweet_id: TweetId) -> TweetResult<Tag>;

    /// Increments the quantity and appends `tweet_id` to the tag's list.
    async fn append_tag_tweet(&mut self, tag_id: TagId, tweet_id: TweetId) -> TweetResult<Tag>;

    /// Tags whose name contains `text`, ignoring case.
    async fn tags_matching(&mut self, text: &str) -> TweetResult<Vec<Tag>>;

    /// Distinct non-scheduled tweets listed under the tag, newest first.
    async fn tagged_tweets(&mut self, tag_id: TagId) -> TweetResult<Vec<Tweet>>;

    /// Tags by quantity, highest first, ties by name.
    async fn top_tags(&mut self, limit: i64) -> TweetResult<Vec<Tag>>;

    // Polls

    /// Attaches a poll with the given choices, in order, to a tweet.
    async fn insert_poll(
        &mut self,
        tweet_id: TweetId,
        ends_at: DateTime<Utc>,
        choices: &[String],
    ) -> TweetResult<Poll>;

    /// Records a vote unless the user already voted in the poll. Returns
    /// whether a vote was recorded.
    async fn add_poll_vote(
        &mut self,
        poll_id: PollId,
        choice_id: PollChoiceId,
        user_id: UserId,
    ) -> TweetResult<bool>;

    // Interactions

    /// Removes the interaction if present. Returns whether a record was removed.
    async fn remove_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool>;

    /// Adds the interaction unless one exists. Returns whether a record was added.
    async fn add_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool>;

    /// Non-scheduled tweets the user has an active interaction of `kind`
    /// with, most recent interaction first.
    async fn interacted_tweets(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
    ) -> TweetResult<Vec<Tweet>>;

    async fn commit(self: Box<Self>) -> TweetResult<()>;
}
