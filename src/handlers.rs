//! HTTP route handlers for the tweet service.
//!
//! This module contains the HTTP route handler functions that map incoming
//! requests onto [`TweetService`] operations, and the [`router`] wiring them
//! together. Errors are rendered by [`TweetError`]'s `IntoResponse`.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::TweetError;
use crate::identity::Identity;
use crate::models::{
    NewTweet, PageRequest, PollChoiceId, Tag, ToggleOutcome, Tweet, TweetId, User, UserId,
};
use crate::tweets::TweetService;

type ApiResult<T> = Result<Json<T>, TweetError>;

// Extractors whose rejections render as `TweetError`s.
type ApiQuery<T> = WithRejection<Query<T>, TweetError>;
type ApiPath<T> = WithRejection<Path<T>, TweetError>;
type ApiJson<T> = WithRejection<Json<T>, TweetError>;

/// Default number of trending tags returned.
const DEFAULT_TRENDS_LIMIT: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub choice_id: PollChoiceId,
}

/// Builds the application router with all routes bound to `service`.
pub fn router(service: TweetService) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/tweets", get(handle_timeline).post(handle_create))
        .route("/api/v1/tweets/media", get(handle_media_timeline))
        .route("/api/v1/tweets/video", get(handle_video_timeline))
        .route("/api/v1/tweets/search", get(handle_search))
        .route("/api/v1/tweets/scheduled", get(handle_scheduled))
        .route(
            "/api/v1/tweets/:tweet_id",
            get(handle_get_tweet).delete(handle_delete),
        )
        .route("/api/v1/tweets/:tweet_id/reply", post(handle_reply))
        .route("/api/v1/tweets/:tweet_id/replies", get(handle_replies))
        .route("/api/v1/tweets/:tweet_id/quotes", get(handle_quotes))
        .route("/api/v1/tweets/:tweet_id/like", post(handle_like))
        .route("/api/v1/tweets/:tweet_id/retweet", post(handle_retweet))
        .route("/api/v1/tweets/:tweet_id/bookmark", post(handle_bookmark))
        .route("/api/v1/tweets/:tweet_id/vote", post(handle_vote))
        .route("/api/v1/users/:user_id", get(handle_get_user))
        .route("/api/v1/users/:user_id/tweets", get(handle_user_tweets))
        .route("/api/v1/users/:user_id/replies", get(handle_user_replies))
        .route("/api/v1/users/:user_id/likes", get(handle_user_likes))
        .route("/api/v1/users/:user_id/media", get(handle_user_media))
        .route("/api/v1/bookmarks", get(handle_bookmarks))
        .route("/api/v1/tags/trends", get(handle_trends))
        .route("/api/v1/tags/:tag_name/tweets", get(handle_tag_tweets))
        .with_state(service)
}

/// Handles GET requests to the `/health` endpoint.
///
/// # Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "tweet-service"
/// }
/// ```
pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "tweet-service"}))
}

/// `GET /api/v1/tweets?page=0&size=15`: public timeline, newest first.
pub async fn handle_timeline(
    State(service): State<TweetService>,
    WithRejection(Query(page), _): ApiQuery<PageRequest>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.timeline(page).await?))
}

pub async fn handle_video_timeline(
    State(service): State<TweetService>,
    WithRejection(Query(page), _): ApiQuery<PageRequest>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.video_timeline(page).await?))
}

pub async fn handle_media_timeline(
    State(service): State<TweetService>,
    WithRejection(Query(page), _): ApiQuery<PageRequest>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.media_timeline(page).await?))
}

/// `POST /api/v1/tweets`: creates a tweet owned by the caller.
pub async fn handle_create(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Json(new_tweet), _): ApiJson<NewTweet>,
) -> ApiResult<Tweet> {
    info!("Create tweet request from {}", identity.email());
    Ok(Json(service.create(&identity, new_tweet).await?))
}

/// `GET /api/v1/tweets/search?text=...`
pub async fn handle_search(
    State(service): State<TweetService>,
    WithRejection(Query(query), _): ApiQuery<SearchQuery>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.search(&query.text).await?))
}

pub async fn handle_scheduled(
    State(service): State<TweetService>,
    identity: Identity,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.scheduled_tweets(&identity).await?))
}

pub async fn handle_get_tweet(
    State(service): State<TweetService>,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<Tweet> {
    Ok(Json(service.tweet(tweet_id).await?))
}

/// `DELETE /api/v1/tweets/:tweet_id`: returns the first page of the public timeline.
pub async fn handle_delete(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<Vec<Tweet>> {
    info!("Delete tweet {} request from {}", tweet_id, identity.email());
    Ok(Json(service.delete(&identity, tweet_id).await?))
}

/// `POST /api/v1/tweets/:tweet_id/reply`: returns the replied-to tweet.
pub async fn handle_reply(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
    WithRejection(Json(reply), _): ApiJson<NewTweet>,
) -> ApiResult<Tweet> {
    Ok(Json(service.reply(&identity, tweet_id, reply).await?))
}

pub async fn handle_replies(
    State(service): State<TweetService>,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.replies(tweet_id).await?))
}

pub async fn handle_quotes(
    State(service): State<TweetService>,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.quotes(tweet_id).await?))
}

pub async fn handle_like(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<ToggleOutcome> {
    Ok(Json(service.like(&identity, tweet_id).await?))
}

pub async fn handle_retweet(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<ToggleOutcome> {
    Ok(Json(service.retweet(&identity, tweet_id).await?))
}

pub async fn handle_bookmark(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
) -> ApiResult<ToggleOutcome> {
    Ok(Json(service.bookmark(&identity, tweet_id).await?))
}

/// `POST /api/v1/tweets/:tweet_id/vote` with `{"choiceId": 7}`: returns the
/// tweet with its updated poll.
pub async fn handle_vote(
    State(service): State<TweetService>,
    identity: Identity,
    WithRejection(Path(tweet_id), _): ApiPath<TweetId>,
    WithRejection(Json(vote), _): ApiJson<VoteRequest>,
) -> ApiResult<Tweet> {
    Ok(Json(service.vote(&identity, tweet_id, vote.choice_id).await?))
}

pub async fn handle_get_user(
    State(service): State<TweetService>,
    WithRejection(Path(user_id), _): ApiPath<UserId>,
) -> ApiResult<User> {
    Ok(Json(service.user(user_id).await?))
}

pub async fn handle_user_tweets(
    State(service): State<TweetService>,
    WithRejection(Path(user_id), _): ApiPath<UserId>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.user_tweets(user_id).await?))
}

pub async fn handle_user_replies(
    State(service): State<TweetService>,
    WithRejection(Path(user_id), _): ApiPath<UserId>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.user_replies(user_id).await?))
}

pub async fn handle_user_likes(
    State(service): State<TweetService>,
    WithRejection(Path(user_id), _): ApiPath<UserId>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.user_liked_tweets(user_id).await?))
}

pub async fn handle_user_media(
    State(service): State<TweetService>,
    WithRejection(Path(user_id), _): ApiPath<UserId>,
    WithRejection(Query(page), _): ApiQuery<PageRequest>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.user_media_tweets(user_id, page).await?))
}

pub async fn handle_bookmarks(
    State(service): State<TweetService>,
    identity: Identity,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.bookmarks(&identity).await?))
}

/// `GET /api/v1/tags/trends?limit=5`
pub async fn handle_trends(
    State(service): State<TweetService>,
    WithRejection(Query(query), _): ApiQuery<TrendsQuery>,
) -> ApiResult<Vec<Tag>> {
    let limit = query.limit.unwrap_or(DEFAULT_TRENDS_LIMIT);
    Ok(Json(service.trends(limit).await?))
}

pub async fn handle_tag_tweets(
    State(service): State<TweetService>,
    WithRejection(Path(tag_name), _): ApiPath<String>,
) -> ApiResult<Vec<Tweet>> {
    Ok(Json(service.tag_tweets(&tag_name).await?))
}
