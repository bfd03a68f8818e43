//! Domain model shared by the store, the tweet service and the HTTP layer.
//!
//! Collections such as a user's tweets, a tweet's replies or a user's liked
//! tweets are not stored on the entities. They are derived by store queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type TweetId = i64;
pub type TagId = i64;
pub type PollId = i64;
pub type PollChoiceId = i64;

/// Maximum number of characters in a tweet's text.
pub const MAX_TWEET_LENGTH: usize = 280;

/// Tweets whose text contains this marker (youtube.com, youtu.be links) are
/// video tweets.
pub const VIDEO_LINK_MARKER: &str = "youtu";

pub const MIN_POLL_CHOICES: usize = 2;
pub const MAX_POLL_CHOICES: usize = 4;
pub const MAX_POLL_CHOICE_LENGTH: usize = 25;
/// Polls run for at most seven days.
pub const MAX_POLL_DURATION_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub username: String,
    pub about: Option<String>,
    pub avatar: Option<String>,
    /// Owned tweets plus active retweets
    pub tweet_count: i64,
    pub registration_date: DateTime<Utc>,
}

/// Who may reply to a tweet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyType {
    #[default]
    Everyone,
    Follow,
    Mention,
}

impl ReplyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyType::Everyone => "EVERYONE",
            ReplyType::Follow => "FOLLOW",
            ReplyType::Mention => "MENTION",
        }
    }
}

impl FromStr for ReplyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EVERYONE" => Ok(ReplyType::Everyone),
            "FOLLOW" => Ok(ReplyType::Follow),
            "MENTION" => Ok(ReplyType::Mention),
            other => Err(format!("unknown reply type '{}'", other)),
        }
    }
}

/// Metadata of the first link found in a tweet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: TweetId,
    pub text: String,
    pub date_time: DateTime<Utc>,
    /// Hidden from every public view while set
    pub scheduled_date: Option<DateTime<Utc>>,
    pub addressed_username: Option<String>,
    pub addressed_id: Option<UserId>,
    pub addressed_tweet_id: Option<TweetId>,
    pub reply_type: ReplyType,
    pub link: Option<LinkPreview>,
    pub quote_tweet_id: Option<TweetId>,
    pub user_id: UserId,
    pub images: Vec<String>,
    pub poll: Option<Poll>,
    pub likes_count: i64,
    pub retweets_count: i64,
    pub replies_count: i64,
}

impl Tweet {
    pub fn is_reply(&self) -> bool {
        self.addressed_username.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_date.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.text.to_lowercase().contains(VIDEO_LINK_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollChoice {
    pub id: PollChoiceId,
    pub choice: String,
    /// Users who voted for this choice, in voting order
    pub voted_user_ids: Vec<UserId>,
}

/// A poll attached to a tweet. Each user votes at most once per poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub ends_at: DateTime<Utc>,
    pub choices: Vec<PollChoice>,
}

impl Poll {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at
    }

    pub fn choice(&self, choice_id: PollChoiceId) -> Option<&PollChoice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    pub fn has_voted(&self, user_id: UserId) -> bool {
        self.choices
            .iter()
            .any(|c| c.voted_user_ids.contains(&user_id))
    }
}

/// Poll part of a [`NewTweet`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPoll {
    /// Minutes the poll stays open, counted from publication
    pub duration_minutes: i64,
    pub choices: Vec<String>,
}

/// Request body for creating a tweet or a reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTweet {
    pub text: String,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_type: Option<ReplyType>,
    #[serde(default)]
    pub quote_tweet_id: Option<TweetId>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub poll: Option<NewPoll>,
}

impl NewTweet {
    pub fn text(text: impl Into<String>) -> Self {
        NewTweet {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Everything the store needs to persist a tweet. Built by the tweet service
/// from a [`NewTweet`] once ownership, reply target and link are resolved.
#[derive(Debug, Clone)]
pub struct TweetDraft {
    pub user_id: UserId,
    pub text: String,
    pub date_time: DateTime<Utc>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub addressed_username: Option<String>,
    pub addressed_id: Option<UserId>,
    pub addressed_tweet_id: Option<TweetId>,
    pub reply_type: ReplyType,
    pub link: Option<LinkPreview>,
    pub quote_tweet_id: Option<TweetId>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    /// The matched hashtag including its leading `#`
    pub tag_name: String,
    pub tweets_quantity: i64,
    /// One entry per occurrence, so a tweet using the tag twice appears twice
    pub tweet_ids: Vec<TweetId>,
}

/// The per-user, per-tweet toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionKind {
    Like,
    Retweet,
    Bookmark,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "LIKE",
            InteractionKind::Retweet => "RETWEET",
            InteractionKind::Bookmark => "BOOKMARK",
        }
    }

    /// Change applied to the caller's tweet count when the interaction is
    /// added. Removal applies the negation.
    pub fn tweet_count_delta(&self) -> i64 {
        match self {
            InteractionKind::Retweet => 1,
            InteractionKind::Like | InteractionKind::Bookmark => 0,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of toggling an interaction: the tweet as re-read after the toggle
/// and whether the interaction is now active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub tweet: Tweet,
    pub active: bool,
}

pub const DEFAULT_PAGE_SIZE: i64 = 15;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination query parameters (`?page=0&size=15`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        PageRequest {
            page: Some(page),
            size: Some(size),
        }
    }

    pub fn limit(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip. Saturates instead of overflowing on huge page numbers.
    pub fn offset(&self) -> i64 {
        self.page.unwrap_or(0).max(0).saturating_mul(self.limit())
    }
}
