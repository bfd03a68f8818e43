//! PostgreSQL store.
//!
//! This module provides the [`PgStore`] implementation of the persistence
//! gateway. Each unit of work is a `sqlx` transaction; derived tweet counters
//! (likes, retweets, replies) and tag tweet lists are computed by the queries
//! rather than stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::{TweetError, TweetResult};
use crate::models::{
    InteractionKind, LinkPreview, PageRequest, Poll, PollChoice, PollChoiceId, PollId, Tag, TagId,
    Tweet, TweetDraft, TweetId, User, UserId, VIDEO_LINK_MARKER,
};
use crate::store::{StoreTx, TweetStore};

const TWEET_COLUMNS: &str = r#"
    t.id, t.text, t.date_time, t.scheduled_date, t.addressed_username, t.addressed_id,
    t.addressed_tweet_id, t.reply_type, t.link, t.link_title, t.link_description, t.link_cover,
    t.quote_tweet_id, t.user_id, t.images,
    (SELECT COUNT(*) FROM interactions li
        WHERE li.tweet_id = t.id AND li.kind = 'LIKE') AS likes_count,
    (SELECT COUNT(*) FROM interactions ri
        WHERE ri.tweet_id = t.id AND ri.kind = 'RETWEET') AS retweets_count,
    (SELECT COUNT(*) FROM tweets rt
        WHERE rt.addressed_tweet_id = t.id AND rt.scheduled_date IS NULL) AS replies_count,
    (SELECT json_build_object(
        'id', p.id,
        'endsAt', p.ends_at,
        'choices', COALESCE((
            SELECT json_agg(json_build_object(
                'id', c.id,
                'choice', c.choice,
                'votedUserIds', ARRAY(
                    SELECT v.user_id FROM poll_votes v WHERE v.choice_id = c.id ORDER BY v.id
                )
            ) ORDER BY c.id)
            FROM poll_choices c WHERE c.poll_id = p.id
        ), '[]'::json)
    ) FROM polls p WHERE p.tweet_id = t.id) AS poll
"#;

const TAG_COLUMNS: &str = r#"
    g.id, g.tag_name, g.tweets_quantity,
    ARRAY(SELECT tt.tweet_id FROM tag_tweets tt WHERE tt.tag_id = g.id ORDER BY tt.id) AS tweet_ids
"#;

const USER_COLUMNS: &str = r#"
    id, email, full_name, username, about, avatar, tweet_count, registration_date
"#;

/// Keeps the first 20 characters of a connection string for logging.
pub fn masked_database_url(database_url: &str) -> String {
    let prefix: String = database_url.chars().take(20).collect();
    format!("{}...", prefix)
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// # Parameters
///
/// - `database_url`: PostgreSQL connection string
///
/// # Returns
///
/// - `Ok(PgPool)`: A connection pool to the database
/// - `Err(TweetError)`: If the connection fails
pub async fn get_db_pool(database_url: &str) -> TweetResult<PgPool> {
    info!("Connecting to PostgreSQL database");
    debug!("Database URL (masked): {}", masked_database_url(database_url));

    let pool = PgPool::connect(database_url).await?;
    info!("Successfully connected to PostgreSQL database");

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and applies the migrations under `migrations/`.
    pub async fn connect(database_url: &str) -> TweetResult<Self> {
        let pool = get_db_pool(database_url).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> TweetResult<()> {
        info!("Applying database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl TweetStore for PgStore {
    async fn begin(&self) -> TweetResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// Wraps `text` for an `ILIKE .. ESCAPE '\'` substring match.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        username: row.try_get("username")?,
        about: row.try_get("about")?,
        avatar: row.try_get("avatar")?,
        tweet_count: row.try_get("tweet_count")?,
        registration_date: row.try_get("registration_date")?,
    })
}

fn tweet_from_row(row: &PgRow) -> Result<Tweet, sqlx::Error> {
    let reply_type: String = row.try_get("reply_type")?;
    let reply_type = reply_type
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

    let link = match row.try_get::<Option<String>, _>("link")? {
        Some(url) => Some(LinkPreview {
            url,
            title: row.try_get("link_title")?,
            description: row.try_get("link_description")?,
            cover: row.try_get("link_cover")?,
        }),
        None => None,
    };

    Ok(Tweet {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        date_time: row.try_get("date_time")?,
        scheduled_date: row.try_get("scheduled_date")?,
        addressed_username: row.try_get("addressed_username")?,
        addressed_id: row.try_get("addressed_id")?,
        addressed_tweet_id: row.try_get("addressed_tweet_id")?,
        reply_type,
        link,
        quote_tweet_id: row.try_get("quote_tweet_id")?,
        user_id: row.try_get("user_id")?,
        images: row.try_get("images")?,
        poll: row
            .try_get::<Option<Json<Poll>>, _>("poll")?
            .map(|poll| poll.0),
        likes_count: row.try_get("likes_count")?,
        retweets_count: row.try_get("retweets_count")?,
        replies_count: row.try_get("replies_count")?,
    })
}

fn tag_from_row(row: &PgRow) -> Result<Tag, sqlx::Error> {
    Ok(Tag {
        id: row.try_get("id")?,
        tag_name: row.try_get("tag_name")?,
        tweets_quantity: row.try_get("tweets_quantity")?,
        tweet_ids: row.try_get("tweet_ids")?,
    })
}

fn tweets_from_rows(rows: &[PgRow]) -> TweetResult<Vec<Tweet>> {
    Ok(rows
        .iter()
        .map(tweet_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

impl PgTx {
    async fn load_tweet(&mut self, tweet_id: TweetId) -> TweetResult<Tweet> {
        self.find_tweet(tweet_id)
            .await?
            .ok_or_else(|| TweetError::tweet_not_found(tweet_id))
    }

    async fn load_tag(&mut self, tag_id: TagId) -> TweetResult<Tag> {
        let sql = format!("SELECT {} FROM tags g WHERE g.id = $1", TAG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(tag_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(tag_from_row(&row)?)
    }

    async fn add_tag_tweet_row(&mut self, tag_id: TagId, tweet_id: TweetId) -> TweetResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_tweets (tag_id, tweet_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(tag_id)
        .bind(tweet_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_user_by_email(&mut self, email: &str) -> TweetResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_user_by_id(&mut self, user_id: UserId) -> TweetResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_users_matching(&mut self, text: &str) -> TweetResult<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {} FROM users
            WHERE full_name ILIKE $1 ESCAPE '\' OR username ILIKE $1 ESCAPE '\'
            "#,
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(text))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn adjust_tweet_count(&mut self, user_id: UserId, delta: i64) -> TweetResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET tweet_count = tweet_count + $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TweetError::user_not_found(user_id));
        }
        debug!("Adjusted tweet count of user {} by {}", user_id, delta);
        Ok(())
    }

    async fn find_tweet(&mut self, tweet_id: TweetId) -> TweetResult<Option<Tweet>> {
        let sql = format!("SELECT {} FROM tweets t WHERE t.id = $1", TWEET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(tweet_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(tweet_from_row).transpose()?)
    }

    async fn insert_tweet(&mut self, draft: TweetDraft) -> TweetResult<Tweet> {
        let (link, link_title, link_description, link_cover) = match draft.link {
            Some(link) => (Some(link.url), link.title, link.description, link.cover),
            None => (None, None, None, None),
        };

        let tweet_id: TweetId = sqlx::query_scalar(
            r#"
            INSERT INTO tweets (
                text, date_time, scheduled_date, addressed_username, addressed_id,
                addressed_tweet_id, reply_type, link, link_title, link_description,
                link_cover, quote_tweet_id, user_id, images
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(draft.text)
        .bind(draft.date_time)
        .bind(draft.scheduled_date)
        .bind(draft.addressed_username)
        .bind(draft.addressed_id)
        .bind(draft.addressed_tweet_id)
        .bind(draft.reply_type.as_str())
        .bind(link)
        .bind(link_title)
        .bind(link_description)
        .bind(link_cover)
        .bind(draft.quote_tweet_id)
        .bind(draft.user_id)
        .bind(draft.images)
        .fetch_one(&mut *self.tx)
        .await?;

        debug!("Inserted tweet {}", tweet_id);
        self.load_tweet(tweet_id).await
    }

    async fn delete_tweet(&mut self, tweet_id: TweetId) -> TweetResult<()> {
        // Retweeters lose the retweet from their count before the cascade drops it.
        sqlx::query(
            r#"
            UPDATE users u SET tweet_count = u.tweet_count - 1
            FROM interactions i
            WHERE i.user_id = u.id AND i.tweet_id = $1 AND i.kind = $2
            "#,
        )
        .bind(tweet_id)
        .bind(InteractionKind::Retweet.as_str())
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE tags g SET tweets_quantity = g.tweets_quantity - c.occurrences
            FROM (
                SELECT tag_id, COUNT(*) AS occurrences
                FROM tag_tweets
                WHERE tweet_id = $1
                GROUP BY tag_id
            ) c
            WHERE g.id = c.tag_id
            "#,
        )
        .bind(tweet_id)
        .execute(&mut *self.tx)
        .await?;

        let result = sqlx::query("DELETE FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TweetError::tweet_not_found(tweet_id));
        }
        debug!("Deleted tweet {}", tweet_id);
        Ok(())
    }

    async fn timeline(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.addressed_username IS NULL AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            LIMIT $1 OFFSET $2
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn media_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE cardinality(t.images) > 0 AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            LIMIT $1 OFFSET $2
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn video_tweets(&mut self, page: PageRequest) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.scheduled_date IS NULL AND t.text ILIKE $1 ESCAPE '\'
            ORDER BY t.date_time DESC, t.id DESC
            LIMIT $2 OFFSET $3
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(VIDEO_LINK_MARKER))
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn user_media_tweets(
        &mut self,
        user_id: UserId,
        page: PageRequest,
    ) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.user_id = $1
              AND t.scheduled_date IS NULL
              AND (cardinality(t.images) > 0 OR t.text ILIKE $2 ESCAPE '\')
            ORDER BY t.date_time DESC, t.id DESC
            LIMIT $3 OFFSET $4
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(like_pattern(VIDEO_LINK_MARKER))
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn user_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.user_id = $1
              AND t.addressed_username IS NULL
              AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn user_replies(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.user_id = $1
              AND t.addressed_username IS NOT NULL
              AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn tweets_by_user(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.user_id = $1 AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn scheduled_tweets(&mut self, user_id: UserId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.user_id = $1 AND t.scheduled_date IS NOT NULL
            ORDER BY t.scheduled_date DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn replies_to(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.addressed_tweet_id = $1 AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tweet_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn quotes_of(&mut self, tweet_id: TweetId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.quote_tweet_id = $1 AND t.scheduled_date IS NULL
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tweet_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn tweets_matching_text(&mut self, text: &str) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.scheduled_date IS NULL AND t.text ILIKE $1 ESCAPE '\'
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(text))
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn due_scheduled_tweets(&mut self, now: DateTime<Utc>) -> TweetResult<Vec<TweetId>> {
        let ids: Vec<TweetId> = sqlx::query_scalar(
            r#"
            SELECT id FROM tweets
            WHERE scheduled_date <= $1
            ORDER BY scheduled_date, id
            FOR UPDATE
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn publish_tweet(&mut self, tweet_id: TweetId, now: DateTime<Utc>) -> TweetResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tweets SET scheduled_date = NULL, date_time = $2
            WHERE id = $1
            "#,
        )
        .bind(tweet_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TweetError::tweet_not_found(tweet_id));
        }
        Ok(())
    }

    async fn find_tag_by_name(&mut self, tag_name: &str) -> TweetResult<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags g WHERE g.tag_name = $1", TAG_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(tag_name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(tag_from_row).transpose()?)
    }

    async fn insert_tag(&mut self, tag_name: &str, tweet_id: TweetId) -> TweetResult<Tag> {
        let tag_id: TagId = sqlx::query_scalar(
            r#"
            INSERT INTO tags (tag_name, tweets_quantity)
            VALUES ($1, 1)
            ON CONFLICT (tag_name) DO UPDATE SET tweets_quantity = tags.tweets_quantity + 1
            RETURNING id
            "#,
        )
        .bind(tag_name)
        .fetch_one(&mut *self.tx)
        .await?;

        self.add_tag_tweet_row(tag_id, tweet_id).await?;
        self.load_tag(tag_id).await
    }

    async fn append_tag_tweet(&mut self, tag_id: TagId, tweet_id: TweetId) -> TweetResult<Tag> {
        let updated: Option<TagId> = sqlx::query_scalar(
            r#"
            UPDATE tags SET tweets_quantity = tweets_quantity + 1
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(tag_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if updated.is_none() {
            return Err(TweetError::NotFound(format!("tag {} does not exist", tag_id)));
        }
        self.add_tag_tweet_row(tag_id, tweet_id).await?;
        self.load_tag(tag_id).await
    }

    async fn tags_matching(&mut self, text: &str) -> TweetResult<Vec<Tag>> {
        let sql = format!(
            "SELECT {} FROM tags g WHERE g.tag_name ILIKE $1 ESCAPE '\\'",
            TAG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(like_pattern(text))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .iter()
            .map(tag_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn tagged_tweets(&mut self, tag_id: TagId) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM tweets t
            WHERE t.scheduled_date IS NULL
              AND t.id IN (SELECT tweet_id FROM tag_tweets WHERE tag_id = $1)
            ORDER BY t.date_time DESC, t.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tag_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn top_tags(&mut self, limit: i64) -> TweetResult<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT {} FROM tags g
            ORDER BY g.tweets_quantity DESC, g.tag_name
            LIMIT $1
            "#,
            TAG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit.max(0))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .iter()
            .map(tag_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert_poll(
        &mut self,
        tweet_id: TweetId,
        ends_at: DateTime<Utc>,
        choices: &[String],
    ) -> TweetResult<Poll> {
        let poll_id: PollId = sqlx::query_scalar(
            r#"
            INSERT INTO polls (tweet_id, ends_at)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(tweet_id)
        .bind(ends_at)
        .fetch_one(&mut *self.tx)
        .await?;

        let mut poll = Poll {
            id: poll_id,
            ends_at,
            choices: Vec::with_capacity(choices.len()),
        };
        for choice in choices {
            let choice_id: PollChoiceId = sqlx::query_scalar(
                r#"
                INSERT INTO poll_choices (poll_id, choice)
                VALUES ($1, $2)
                RETURNING id
                "#,
            )
            .bind(poll_id)
            .bind(choice)
            .fetch_one(&mut *self.tx)
            .await?;
            poll.choices.push(PollChoice {
                id: choice_id,
                choice: choice.clone(),
                voted_user_ids: Vec::new(),
            });
        }

        debug!("Attached poll {} to tweet {}", poll_id, tweet_id);
        Ok(poll)
    }

    async fn add_poll_vote(
        &mut self,
        poll_id: PollId,
        choice_id: PollChoiceId,
        user_id: UserId,
    ) -> TweetResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO poll_votes (poll_id, choice_id, user_id)
            SELECT c.poll_id, c.id, $3
            FROM poll_choices c
            WHERE c.id = $2 AND c.poll_id = $1
            ON CONFLICT (poll_id, user_id) DO NOTHING
            "#,
        )
        .bind(poll_id)
        .bind(choice_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM interactions
            WHERE kind = $1 AND user_id = $2 AND tweet_id = $3
            "#,
        )
        .bind(kind.as_str())
        .bind(user_id)
        .bind(tweet_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_interaction(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
        tweet_id: TweetId,
    ) -> TweetResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (kind, user_id, tweet_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (kind, user_id, tweet_id) DO NOTHING
            "#,
        )
        .bind(kind.as_str())
        .bind(user_id)
        .bind(tweet_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn interacted_tweets(
        &mut self,
        kind: InteractionKind,
        user_id: UserId,
    ) -> TweetResult<Vec<Tweet>> {
        let sql = format!(
            r#"
            SELECT {} FROM interactions i
            JOIN tweets t ON t.id = i.tweet_id
            WHERE i.kind = $1 AND i.user_id = $2 AND t.scheduled_date IS NULL
            ORDER BY i.created_at DESC, i.id DESC
            "#,
            TWEET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        tweets_from_rows(&rows)
    }

    async fn commit(self: Box<Self>) -> TweetResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
