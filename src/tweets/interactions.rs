//! Like / retweet / bookmark toggles.

use log::{debug, info};

use crate::error::{TweetError, TweetResult};
use crate::models::{InteractionKind, ToggleOutcome, TweetId, User};
use crate::store::StoreTx;

/// Flips the caller's `kind` interaction with a tweet.
///
/// The removal is attempted first as a single conditional delete; only when
/// nothing was removed is the interaction inserted, and the insert is a no-op
/// if a concurrent toggle already created it. The caller's tweet count moves
/// only for records that were actually added or removed, so two consecutive
/// toggles always restore the starting state.
///
/// # Errors
///
/// - [`TweetError::NotFound`] if the tweet does not exist
pub async fn toggle_interaction(
    tx: &mut dyn StoreTx,
    caller: &User,
    tweet_id: TweetId,
    kind: InteractionKind,
) -> TweetResult<ToggleOutcome> {
    if tx.find_tweet(tweet_id).await?.is_none() {
        return Err(TweetError::tweet_not_found(tweet_id));
    }

    let delta = kind.tweet_count_delta();
    let active = if tx.remove_interaction(kind, caller.id, tweet_id).await? {
        if delta != 0 {
            tx.adjust_tweet_count(caller.id, -delta).await?;
        }
        false
    } else {
        if tx.add_interaction(kind, caller.id, tweet_id).await? {
            if delta != 0 {
                tx.adjust_tweet_count(caller.id, delta).await?;
            }
        } else {
            debug!(
                "{} by user {} on tweet {} was added concurrently",
                kind, caller.id, tweet_id
            );
        }
        true
    };

    info!(
        "User {} {} {} on tweet {}",
        caller.id,
        if active { "added" } else { "removed" },
        kind,
        tweet_id
    );

    let tweet = tx
        .find_tweet(tweet_id)
        .await?
        .ok_or_else(|| TweetError::tweet_not_found(tweet_id))?;
    Ok(ToggleOutcome { tweet, active })
}
