//! Tweet orchestration.
//!
//! [`TweetService`] composes the store, the tag indexer, the interaction
//! toggler and the link previewer. Every public operation runs inside one
//! unit of work: either all of its writes land or none do.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::interactions::toggle_interaction;
use super::links::LinkPreviewClient;
use super::parsing::extract_first_link;
use super::tags::index_hashtags;
use crate::error::{TweetError, TweetResult};
use crate::identity::Identity;
use crate::models::{
    InteractionKind, LinkPreview, NewPoll, NewTweet, PageRequest, PollChoiceId, Tag,
    ToggleOutcome, Tweet, TweetDraft, TweetId, User, UserId, MAX_PAGE_SIZE,
    MAX_POLL_CHOICES, MAX_POLL_CHOICE_LENGTH, MAX_POLL_DURATION_MINUTES, MAX_TWEET_LENGTH,
    MIN_POLL_CHOICES,
};
use crate::store::{StoreTx, TweetStore};

#[derive(Clone)]
pub struct TweetService {
    store: Arc<dyn TweetStore>,
    link_previews: Option<LinkPreviewClient>,
}

/// Resolves the caller, failing with `Unauthenticated` when the identity
/// maps to no user.
async fn resolve_caller(tx: &mut dyn StoreTx, identity: &Identity) -> TweetResult<User> {
    tx.find_user_by_email(identity.email())
        .await?
        .ok_or_else(|| {
            TweetError::Unauthenticated(format!("no user registered as {}", identity.email()))
        })
}

async fn require_tweet(tx: &mut dyn StoreTx, tweet_id: TweetId) -> TweetResult<Tweet> {
    tx.find_tweet(tweet_id)
        .await?
        .ok_or_else(|| TweetError::tweet_not_found(tweet_id))
}

async fn require_user(tx: &mut dyn StoreTx, user_id: UserId) -> TweetResult<User> {
    tx.find_user_by_id(user_id)
        .await?
        .ok_or_else(|| TweetError::user_not_found(user_id))
}

fn validate(new_tweet: &NewTweet) -> TweetResult<()> {
    let length = new_tweet.text.chars().count();
    if length > MAX_TWEET_LENGTH {
        return Err(TweetError::InvalidInput(format!(
            "tweet text is {} characters long, the limit is {}",
            length, MAX_TWEET_LENGTH
        )));
    }
    if new_tweet.text.trim().is_empty() && new_tweet.images.is_empty() {
        return Err(TweetError::InvalidInput(
            "a tweet needs text or at least one image".to_string(),
        ));
    }
    if let Some(poll) = &new_tweet.poll {
        validate_poll(poll)?;
    }
    Ok(())
}

fn validate_poll(poll: &NewPoll) -> TweetResult<()> {
    if !(MIN_POLL_CHOICES..=MAX_POLL_CHOICES).contains(&poll.choices.len()) {
        return Err(TweetError::InvalidInput(format!(
            "a poll needs {} to {} choices",
            MIN_POLL_CHOICES, MAX_POLL_CHOICES
        )));
    }
    for choice in &poll.choices {
        let length = choice.trim().chars().count();
        if length == 0 || length > MAX_POLL_CHOICE_LENGTH {
            return Err(TweetError::InvalidInput(format!(
                "poll choices must be 1 to {} characters long",
                MAX_POLL_CHOICE_LENGTH
            )));
        }
    }
    if !(1..=MAX_POLL_DURATION_MINUTES).contains(&poll.duration_minutes) {
        return Err(TweetError::InvalidInput(format!(
            "poll duration must be 1 to {} minutes",
            MAX_POLL_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Reply target fields copied onto a reply.
struct ReplyTarget {
    username: String,
    user_id: UserId,
    tweet_id: TweetId,
}

impl TweetService {
    pub fn new(store: Arc<dyn TweetStore>) -> Self {
        Self {
            store,
            link_previews: None,
        }
    }

    pub fn with_link_previews(mut self, client: LinkPreviewClient) -> Self {
        self.link_previews = Some(client);
        self
    }

    /// Looks for a link in the text and, when previews are enabled, fetches
    /// its metadata. Runs before the unit of work is opened.
    async fn link_for(&self, text: &str) -> Option<LinkPreview> {
        let url = extract_first_link(text)?;
        match &self.link_previews {
            Some(client) => Some(client.fetch(&url).await),
            None => Some(LinkPreview {
                url: url.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Persists a tweet owned by `caller`, bumps the caller's tweet count and
    /// indexes the tweet's hashtags.
    async fn insert_owned(
        tx: &mut dyn StoreTx,
        caller: &User,
        new_tweet: NewTweet,
        link: Option<LinkPreview>,
        target: Option<ReplyTarget>,
    ) -> TweetResult<Tweet> {
        if let Some(quoted) = new_tweet.quote_tweet_id {
            require_tweet(tx, quoted).await?;
        }

        let (addressed_username, addressed_id, addressed_tweet_id) = match target {
            Some(target) => (
                Some(target.username),
                Some(target.user_id),
                Some(target.tweet_id),
            ),
            None => (None, None, None),
        };

        let now = Utc::now();
        let poll = new_tweet.poll;
        let draft = TweetDraft {
            user_id: caller.id,
            text: new_tweet.text,
            date_time: now,
            scheduled_date: new_tweet.scheduled_date,
            addressed_username,
            addressed_id,
            addressed_tweet_id,
            reply_type: new_tweet.reply_type.unwrap_or_default(),
            link,
            quote_tweet_id: new_tweet.quote_tweet_id,
            images: new_tweet.images,
        };

        let mut tweet = tx.insert_tweet(draft).await?;
        tx.adjust_tweet_count(caller.id, 1).await?;
        let tags = index_hashtags(tx, tweet.id, &tweet.text).await?;
        debug!("Tweet {} carries {} hashtag occurrences", tweet.id, tags.len());

        if let Some(poll) = poll {
            // Polls open when the tweet is published.
            let opens_at = tweet.scheduled_date.unwrap_or(now);
            let ends_at = opens_at + Duration::minutes(poll.duration_minutes);
            let choices: Vec<String> = poll
                .choices
                .iter()
                .map(|choice| choice.trim().to_string())
                .collect();
            tweet.poll = Some(tx.insert_poll(tweet.id, ends_at, &choices).await?);
        }
        Ok(tweet)
    }

    /// Creates a tweet owned by the caller.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the identity maps to no user
    /// - `InvalidInput` if the text is too long or the tweet is empty
    /// - `NotFound` if the quoted tweet does not exist
    pub async fn create(&self, identity: &Identity, new_tweet: NewTweet) -> TweetResult<Tweet> {
        validate(&new_tweet)?;
        let link = self.link_for(&new_tweet.text).await;

        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let tweet = Self::insert_owned(tx.as_mut(), &caller, new_tweet, link, None).await?;
        tx.commit().await?;

        info!("User {} created tweet {}", caller.id, tweet.id);
        Ok(tweet)
    }

    /// Deletes one of the caller's tweets and returns the first page of the
    /// updated public timeline (non-reply, non-scheduled tweets, newest
    /// first), read within the same unit of work.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tweet does not exist
    /// - `Forbidden` if the caller does not own it
    pub async fn delete(&self, identity: &Identity, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let tweet = require_tweet(tx.as_mut(), tweet_id).await?;
        if tweet.user_id != caller.id {
            return Err(TweetError::Forbidden(format!(
                "tweet {} belongs to another user",
                tweet_id
            )));
        }

        tx.delete_tweet(tweet_id).await?;
        tx.adjust_tweet_count(caller.id, -1).await?;
        let timeline = tx.timeline(PageRequest::default()).await?;
        tx.commit().await?;

        info!("User {} deleted tweet {}", caller.id, tweet_id);
        Ok(timeline)
    }

    /// Replies to a tweet and returns the target with its updated reply count.
    ///
    /// The reply goes through the same path as [`TweetService::create`], with
    /// the target's owner and id recorded as its addressee.
    pub async fn reply(
        &self,
        identity: &Identity,
        tweet_id: TweetId,
        reply: NewTweet,
    ) -> TweetResult<Tweet> {
        validate(&reply)?;
        let link = self.link_for(&reply.text).await;

        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let target = require_tweet(tx.as_mut(), tweet_id).await?;
        let owner = require_user(tx.as_mut(), target.user_id).await?;

        let reply_target = ReplyTarget {
            username: owner.username,
            user_id: owner.id,
            tweet_id: target.id,
        };
        let created =
            Self::insert_owned(tx.as_mut(), &caller, reply, link, Some(reply_target)).await?;
        let target = require_tweet(tx.as_mut(), tweet_id).await?;
        tx.commit().await?;

        info!(
            "User {} replied to tweet {} with tweet {}",
            caller.id, tweet_id, created.id
        );
        Ok(target)
    }

    /// Finds tweets whose text, tag or author matches `text`, ignoring case.
    ///
    /// The three sources are merged without duplicates and ordered newest
    /// first, ties broken by the higher id.
    pub async fn search(&self, text: &str) -> TweetResult<Vec<Tweet>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TweetError::InvalidInput(
                "search text must not be blank".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut found: BTreeMap<TweetId, Tweet> = BTreeMap::new();

        for tweet in tx.tweets_matching_text(text).await? {
            found.insert(tweet.id, tweet);
        }
        for tag in tx.tags_matching(text).await? {
            for tweet in tx.tagged_tweets(tag.id).await? {
                found.insert(tweet.id, tweet);
            }
        }
        for user in tx.find_users_matching(text).await? {
            for tweet in tx.tweets_by_user(user.id).await? {
                found.insert(tweet.id, tweet);
            }
        }
        tx.commit().await?;

        let mut tweets: Vec<Tweet> = found.into_values().collect();
        tweets.sort_by(|a, b| b.date_time.cmp(&a.date_time).then(b.id.cmp(&a.id)));
        info!("Search for '{}' matched {} tweets", text, tweets.len());
        Ok(tweets)
    }

    async fn toggle(
        &self,
        identity: &Identity,
        tweet_id: TweetId,
        kind: InteractionKind,
    ) -> TweetResult<ToggleOutcome> {
        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let outcome = toggle_interaction(tx.as_mut(), &caller, tweet_id, kind).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn like(&self, identity: &Identity, tweet_id: TweetId) -> TweetResult<ToggleOutcome> {
        self.toggle(identity, tweet_id, InteractionKind::Like).await
    }

    pub async fn retweet(
        &self,
        identity: &Identity,
        tweet_id: TweetId,
    ) -> TweetResult<ToggleOutcome> {
        self.toggle(identity, tweet_id, InteractionKind::Retweet)
            .await
    }

    pub async fn bookmark(
        &self,
        identity: &Identity,
        tweet_id: TweetId,
    ) -> TweetResult<ToggleOutcome> {
        self.toggle(identity, tweet_id, InteractionKind::Bookmark)
            .await
    }

    /// Votes for `choice_id` in the poll of a tweet and returns the tweet
    /// with the updated poll.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tweet is missing, not yet published, has no poll,
    ///   or the choice is not one of its poll's choices
    /// - `InvalidInput` if the poll has ended
    /// - `ConstraintViolation` if the caller already voted in this poll
    pub async fn vote(
        &self,
        identity: &Identity,
        tweet_id: TweetId,
        choice_id: PollChoiceId,
    ) -> TweetResult<Tweet> {
        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let tweet = require_tweet(tx.as_mut(), tweet_id).await?;
        if tweet.is_scheduled() {
            return Err(TweetError::tweet_not_found(tweet_id));
        }
        let poll = tweet
            .poll
            .ok_or_else(|| TweetError::NotFound(format!("tweet {} has no poll", tweet_id)))?;
        if poll.choice(choice_id).is_none() {
            return Err(TweetError::NotFound(format!(
                "choice {} does not belong to the poll of tweet {}",
                choice_id, tweet_id
            )));
        }
        if !poll.is_open(Utc::now()) {
            return Err(TweetError::InvalidInput(format!(
                "the poll of tweet {} has ended",
                tweet_id
            )));
        }

        if !tx.add_poll_vote(poll.id, choice_id, caller.id).await? {
            return Err(TweetError::ConstraintViolation(format!(
                "user {} already voted in the poll of tweet {}",
                caller.id, tweet_id
            )));
        }
        let tweet = require_tweet(tx.as_mut(), tweet_id).await?;
        tx.commit().await?;

        info!(
            "User {} voted for choice {} on tweet {}",
            caller.id, choice_id, tweet_id
        );
        Ok(tweet)
    }

    pub async fn timeline(&self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let tweets = tx.timeline(page).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn media_timeline(&self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let tweets = tx.media_tweets(page).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    /// Tweets linking a video (youtube.com, youtu.be), newest first.
    pub async fn video_timeline(&self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let tweets = tx.video_tweets(page).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    /// A user's tweets carrying images or a video link, newest first.
    pub async fn user_media_tweets(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await?;
        let tweets = tx.user_media_tweets(user_id, page).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn tweet(&self, tweet_id: TweetId) -> TweetResult<Tweet> {
        let mut tx = self.store.begin().await?;
        let tweet = require_tweet(tx.as_mut(), tweet_id).await?;
        tx.commit().await?;
        Ok(tweet)
    }

    pub async fn user(&self, user_id: UserId) -> TweetResult<User> {
        let mut tx = self.store.begin().await?;
        let user = require_user(tx.as_mut(), user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn user_tweets(&self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await?;
        let tweets = tx.user_tweets(user_id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn user_replies(&self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await?;
        let tweets = tx.user_replies(user_id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn user_liked_tweets(&self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await?;
        let tweets = tx
            .interacted_tweets(InteractionKind::Like, user_id)
            .await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn bookmarks(&self, identity: &Identity) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let tweets = tx
            .interacted_tweets(InteractionKind::Bookmark, caller.id)
            .await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn scheduled_tweets(&self, identity: &Identity) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        let caller = resolve_caller(tx.as_mut(), identity).await?;
        let tweets = tx.scheduled_tweets(caller.id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn replies(&self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_tweet(tx.as_mut(), tweet_id).await?;
        let tweets = tx.replies_to(tweet_id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    pub async fn quotes(&self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        let mut tx = self.store.begin().await?;
        require_tweet(tx.as_mut(), tweet_id).await?;
        let tweets = tx.quotes_of(tweet_id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    /// Most used tags, `limit` clamped to `1..=100`.
    pub async fn trends(&self, limit: i64) -> TweetResult<Vec<Tag>> {
        let mut tx = self.store.begin().await?;
        let tags = tx.top_tags(limit.clamp(1, MAX_PAGE_SIZE)).await?;
        tx.commit().await?;
        Ok(tags)
    }

    /// Tweets under a tag. The leading `#` of `tag_name` is optional.
    pub async fn tag_tweets(&self, tag_name: &str) -> TweetResult<Vec<Tweet>> {
        let tag_name = if tag_name.starts_with('#') {
            tag_name.to_string()
        } else {
            format!("#{}", tag_name)
        };

        let mut tx = self.store.begin().await?;
        let tag = tx
            .find_tag_by_name(&tag_name)
            .await?
            .ok_or_else(|| TweetError::NotFound(format!("tag {} does not exist", tag_name)))?;
        let tweets = tx.tagged_tweets(tag.id).await?;
        tx.commit().await?;
        Ok(tweets)
    }

    /// Publishes every scheduled tweet whose date is at or before `now`.
    ///
    /// Returns the ids of the published tweets.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> TweetResult<Vec<TweetId>> {
        let mut tx = self.store.begin().await?;
        let due = tx.due_scheduled_tweets(now).await?;
        for tweet_id in &due {
            tx.publish_tweet(*tweet_id, now).await?;
            debug!("Published scheduled tweet {}", tweet_id);
        }
        tx.commit().await?;

        if !due.is_empty() {
            info!("Published {} scheduled tweets", due.len());
        }
        Ok(due)
    }
}
