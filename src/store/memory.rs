//! In-process store.
//!
//! The whole state sits behind one async mutex. A unit of work holds the lock
//! for its entire lifetime and operates on a private copy of the state, which
//! replaces the shared state on commit. Units of work are therefore
//! serialized and all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{StoreTx, TweetStore};
use crate::error::{TweetError, TweetResult};
use crate::models::{
    InteractionKind, PageRequest, Poll, PollChoice, PollChoiceId, PollId, Tag, TagId, Tweet,
    TweetDraft, TweetId, User, UserId,
};

/// A user to provision in a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub username: String,
}

impl NewUser {
    pub fn new(email: &str, full_name: &str, username: &str) -> Self {
        NewUser {
            email: email.to_string(),
            full_name: full_name.to_string(),
            username: username.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Interaction {
    kind: InteractionKind,
    user_id: UserId,
    tweet_id: TweetId,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    tweets: BTreeMap<TweetId, Tweet>,
    tags: BTreeMap<TagId, Tag>,
    interactions: Vec<Interaction>,
    next_user_id: i64,
    next_tweet_id: i64,
    next_tag_id: i64,
    next_poll_id: i64,
    next_poll_choice_id: i64,
    next_seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisions a user. Emails and usernames must be unique.
    pub async fn add_user(&self, new_user: NewUser) -> TweetResult<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|u| u.email == new_user.email || u.username == new_user.username)
        {
            return Err(TweetError::ConstraintViolation(format!(
                "user {} already exists",
                new_user.email
            )));
        }
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            email: new_user.email,
            full_name: new_user.full_name,
            username: new_user.username,
            about: None,
            avatar: None,
            tweet_count: 0,
            registration_date: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        debug!("Provisioned in-memory user {} (@{})", user.id, user.username);
        Ok(user)
    }
}

#[async_trait]
impl TweetStore for MemoryStore {
    async fn begin(&self) -> TweetResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn newest_first(tweets: &mut [Tweet]) {
    tweets.sort_by(|a, b| b.date_time.cmp(&a.date_time).then(b.id.cmp(&a.id)));
}

impl MemoryState {
    /// The stored tweet with its derived counters filled in.
    fn view(&self, tweet: &Tweet) -> Tweet {
        let count = |kind: InteractionKind| {
            self.interactions
                .iter()
                .filter(|i| i.kind == kind && i.tweet_id == tweet.id)
                .count() as i64
        };
        let replies = self
            .tweets
            .values()
            .filter(|t| t.addressed_tweet_id == Some(tweet.id) && !t.is_scheduled())
            .count() as i64;
        Tweet {
            likes_count: count(InteractionKind::Like),
            retweets_count: count(InteractionKind::Retweet),
            replies_count: replies,
            ..tweet.clone()
        }
    }

    fn select<F>(&self, predicate: F) -> Vec<Tweet>
    where
        F: Fn(&Tweet) -> bool,
    {
        let mut tweets: Vec<Tweet> = self
            .tweets
            .values()
            .filter(|t| predicate(*t))
            .map(|t| self.view(t))
            .collect();
        newest_first(&mut tweets);
        tweets
    }

    fn page(tweets: Vec<Tweet>, page: PageRequest) -> Vec<Tweet> {
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        tweets.into_iter().skip(offset).take(limit).collect()
    }

    fn user_mut(&mut self, user_id: UserId) -> TweetResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| TweetError::user_not_found(user_id))
    }

    fn tag_mut(&mut self, tag_id: TagId) -> TweetResult<&mut Tag> {
        self.tags
            .get_mut(&tag_id)
            .ok_or_else(|| TweetError::NotFound(format!("tag {} does not exist", tag_id)))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_user_by_email(&mut self, email: &str) -> TweetResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&mut self, user_id: UserId) -> TweetResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn find_users_matching(&mut self, text: &str) -> TweetResult<Vec<User>> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| {
                contains_ignore_case(&u.full_name, text) || contains_ignore_case(&u.username, text)
            })
            .cloned()
            .collect())
    }

    async fn adjust_tweet_count(&mut self, user_id: UserId, delta: i64) -> TweetResult<()> {
        self.working.user_mut(user_id)?.tweet_count += delta;
        Ok(())
    }

    async fn find_tweet(&mut self, tweet_id: TweetId) -> TweetResult<Option<Tweet>> {
        let state = &self.working;
        Ok(state.tweets.get(&tweet_id).map(|t| state.view(t)))
    }

    async fn insert_tweet(&mut self, draft: TweetDraft) -> TweetResult<Tweet> {
        let state = &mut self.working;
        if !state.users.contains_key(&draft.user_id) {
            return Err(TweetError::ConstraintViolation(format!(
                "tweet owner {} does not exist",
                draft.user_id
            )));
        }
        if let Some(quoted) = draft.quote_tweet_id {
            if !state.tweets.contains_key(&quoted) {
                return Err(TweetError::ConstraintViolation(format!(
                    "quoted tweet {} does not exist",
                    quoted
                )));
            }
        }

        state.next_tweet_id += 1;
        let tweet = Tweet {
            id: state.next_tweet_id,
            text: draft.text,
            date_time: draft.date_time,
            scheduled_date: draft.scheduled_date,
            addressed_username: draft.addressed_username,
            addressed_id: draft.addressed_id,
            addressed_tweet_id: draft.addressed_tweet_id,
            reply_type: draft.reply_type,
            link: draft.link,
            quote_tweet_id: draft.quote_tweet_id,
            user_id: draft.user_id,
            images: draft.images,
            poll: None,
            likes_count: 0,
            retweets_count: 0,
            replies_count: 0,
        };
        state.tweets.insert(tweet.id, tweet.clone());
        Ok(tweet)
    }

    async fn delete_tweet(&mut self, tweet_id: TweetId) -> TweetResult<()> {
        let state = &mut self.working;
        if state.tweets.remove(&tweet_id).is_none() {
            return Err(TweetError::tweet_not_found(tweet_id));
        }

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.interactions)
            .into_iter()
            .partition(|i| i.tweet_id == tweet_id);
        state.interactions = kept;
        for interaction in removed {
            let delta = interaction.kind.tweet_count_delta();
            if delta != 0 {
                if let Some(user) = state.users.get_mut(&interaction.user_id) {
                    user.tweet_count -= delta;
                }
            }
        }

        for tag in state.tags.values_mut() {
            let before = tag.tweet_ids.len();
            tag.tweet_ids.retain(|id| *id != tweet_id);
            tag.tweets_quantity -= (before - tag.tweet_ids.len()) as i64;
        }

        for tweet in state.tweets.values_mut() {
            if tweet.quote_tweet_id == Some(tweet_id) {
                tweet.quote_tweet_id = None;
            }
        }
        Ok(())
    }

    async fn timeline(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let tweets = self
            .working
            .select(|t| !t.is_reply() && !t.is_scheduled());
        Ok(MemoryState::page(tweets, page))
    }

    async fn media_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let tweets = self
            .working
            .select(|t| !t.images.is_empty() && !t.is_scheduled());
        Ok(MemoryState::page(tweets, page))
    }

    async fn video_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let tweets = self
            .working
            .select(|t| t.has_video() && !t.is_scheduled());
        Ok(MemoryState::page(tweets, page))
    }

    async fn user_media_tweets(
        &mut self,
        user_id: UserId,
        page: PageRequest,
    ) -> TweetResult<Vec<Tweet>> {
        let tweets = self.working.select(|t| {
            t.user_id == user_id && !t.is_scheduled() && (!t.images.is_empty() || t.has_video())
        });
        Ok(MemoryState::page(tweets, page))
    }

    async fn user_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| t.user_id == user_id && !t.is_reply() && !t.is_scheduled()))
    }

    async fn user_replies(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| t.user_id == user_id && t.is_reply() && !t.is_scheduled()))
    }

    async fn tweets_by_user(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| t.user_id == user_id && !t.is_scheduled()))
    }

    async fn scheduled_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let mut tweets = self
            .working
            .select(|t| t.user_id == user_id && t.is_scheduled());
        tweets.sort_by(|a, b| b.scheduled_date.cmp(&a.scheduled_date).then(b.id.cmp(&a.id)));
        Ok(tweets)
    }

    async fn replies_to(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| t.addressed_tweet_id == Some(tweet_id) && !t.is_scheduled()))
    }

    async fn quotes_of(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| t.quote_tweet_id == Some(tweet_id) && !t.is_scheduled()))
    }

    async fn tweets_matching_text(&mut self, text: &str) -> TweetResult<Vec<Tweet>> {
        Ok(self
            .working
            .select(|t| !t.is_scheduled() && contains_ignore_case(&t.text, text)))
    }

    async fn due_scheduled_tweets(&mut self, now: DateTime<Utc>) -> TweetResult<Vec<TweetId>> {
        Ok(self
            .working
            .tweets
            .values()
            .filter(|t| matches!(t.scheduled_date, Some(date) if date <= now))
            .map(|t| t.id)
            .collect())
    }

    async fn publish_tweet(&mut self, tweet_id: TweetId, now: DateTime<Utc>) -> TweetResult<()> {
        let tweet = self
            .working
            .tweets
            .get_mut(&tweet_id)
            .ok_or_else(|| TweetError::tweet_not_found(tweet_id))?;
        tweet.scheduled_date = None;
        tweet.date_time = now;
        Ok(())
    }

    async fn find_tag_by_name(&mut self, tag_name: &str) -> TweetResult<Option<Tag>> {
        Ok(self
            .working
            .tags
            .values()
            .find(|t| t.tag_name == tag_name)
            .cloned())
    }

    async fn insert_tag(&mut self, tag_name: &str, tweet_id: TweetId) -> TweetResult<Tag> {
        if let Some(existing) = self.find_tag_by_name(tag_name).await? {
            return self.append_tag_tweet(existing.id, tweet_id).await;
        }
        let state = &mut self.working;
        state.next_tag_id += 1;
        let tag = Tag {
            id: state.next_tag_id,
            tag_name: tag_name.to_string(),
            tweets_quantity: 1,
            tweet_ids: vec![tweet_id],
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn append_tag_tweet(&mut self, tag_id: TagId, tweet_id: TweetId) -> TweetResult<Tag> {
        let tag = self.working.tag_mut(tag_id)?;
        tag.tweets_quantity += 1;
        tag.tweet_ids.push(tweet_id);
        Ok(tag.clone())
    }

    async fn tags_matching(&mut self, text: &str) -> TweetResult<Vec<Tag>> {
        Ok(self
            .working
            .tags
            .values()
            .filter(|t| contains_ignore_case(&t.tag_name, text))
            .cloned()
            .collect())
    }

    async fn tagged_tweets(&mut self, tag_id: TagId) -> TweetResult<Vec<Tweet>> {
        let tweet_ids = match self.working.tags.get(&tag_id) {
            Some(tag) => tag.tweet_ids.clone(),
            None => return Ok(Vec::new()),
        };
        Ok(self
            .working
            .select(|t| tweet_ids.contains(&t.id) && !t.is_scheduled()))
    }

    async fn top_tags(&mut self, limit: i64) -> TweetResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.working.tags.values().cloned().collect();
        tags.sort_by(|a, b| {
            b.tweets_quantity
                .cmp(&a.tweets_quantity)
                .then_with(|| a.tag_name.cmp(&b.tag_name))
        });
        tags.truncate(limit.max(0) as usize);
        Ok(tags)
    }

    async fn insert_poll(
        &mut self,
        tweet_id: TweetId,
        ends_at: DateTime<Utc>,
        choices: &[String],
    ) -> TweetResult<Poll> {
        let state = &mut self.working;
        if !state.tweets.contains_key(&tweet_id) {
            return Err(TweetError::ConstraintViolation(format!(
                "tweet {} does not exist",
                tweet_id
            )));
        }

        state.next_poll_id += 1;
        let mut poll = Poll {
            id: state.next_poll_id,
            ends_at,
            choices: Vec::with_capacity(choices.len()),
        };
        for choice in choices {
            state.next_poll_choice_id += 1;
            poll.choices.push(PollChoice {
                id: state.next_poll_choice_id,
                choice: choice.clone(),
                voted_user_ids: Vec::new(),
            });
        }

        if let Some(tweet) = state.tweets.get_mut(&tweet_id) {
            tweet.poll = Some(poll.clone());
        }
        Ok(poll)
    }

    async fn add_poll_vote(
        &mut self,
        poll_id: PollId,
        choice_id: PollChoiceId,
        user_id: UserId,
    ) -> TweetResult<bool> {
        let poll = self
            .working
            .tweets
            .values_mut()
            .filter_map(|t| t.poll.as_mut())
            .find(|p| p.id == poll_id)
            .ok_or_else(|| TweetError::NotFound(format!("poll {} does not exist", poll_id)))?;

        if poll.has_voted(user_id) {
            return Ok(false);
        }
        let choice = poll
            .choices
            .iter_mut()
            .find(|c| c.id == choice_id)
            .ok_or_else(|| {
                TweetError::NotFound(format!(
                    "choice {} does not belong to poll {}",
                    choice_id, poll_id
                ))
            })?;
        choice.voted_user_ids.push(user_id);
        Ok(true)
    }

    async fn remove_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool> {
        let interactions = &mut self.working.interactions;
        let before = interactions.len();
        interactions
            .retain(|i| !(i.kind == kind && i.user_id == user_id && i.tweet_id == tweet_id));
        Ok(interactions.len() < before)
    }

    async fn add_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool> {
        let state = &mut self.working;
        if !state.tweets.contains_key(&tweet_id) {
            return Err(TweetError::ConstraintViolation(format!(
                "tweet {} does not exist",
                tweet_id
            )));
        }
        if state
            .interactions
            .iter()
            .any(|i| i.kind == kind && i.user_id == user_id && i.tweet_id == tweet_id)
        {
            return Ok(false);
        }
        state.next_seq += 1;
        state.interactions.push(Interaction {
            kind,
            user_id,
            tweet_id,
            seq: state.next_seq,
        });
        Ok(true)
    }

    async fn interacted_tweets(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
    ) -> TweetResult<Vec<Tweet>> {
        let state = &self.working;
        let mut interactions: Vec<&Interaction> = state
            .interactions
            .iter()
            .filter(|i| i.kind == kind && i.user_id == user_id)
            .collect();
        interactions.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(interactions
            .into_iter()
            .filter_map(|i| state.tweets.get(&i.tweet_id))
            .filter(|t| !t.is_scheduled())
            .map(|t| state.view(t))
            .collect())
    }

    async fn commit(self: Box<Self>) -> TweetResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
