//! Hashtag index maintenance.

use log::debug;

use super::parsing::extract_hashtags;
use crate::error::TweetResult;
use crate::models::{Tag, TweetId};
use crate::store::StoreTx;

/// Indexes every hashtag occurrence in `text` under `tweet_id`.
///
/// For each occurrence the tag is looked up by exact name. An existing tag
/// gets its quantity incremented and the tweet appended to its list; a new
/// tag is created with a quantity of 1 listing only this tweet. Occurrences
/// are not deduplicated, so `"#a #a"` counts twice.
///
/// Returns the tag state after each occurrence was indexed.
pub async fn index_hashtags(
    tx: &mut dyn StoreTx,
    tweet_id: TweetId,
    text: &str,
) -> TweetResult<Vec<Tag>> {
    let hashtags = extract_hashtags(text);
    let mut indexed = Vec::with_capacity(hashtags.len());

    for hashtag in hashtags {
        let tag = match tx.find_tag_by_name(&hashtag).await? {
            Some(existing) => tx.append_tag_tweet(existing.id, tweet_id).await?,
            None => {
                debug!("Creating tag {}", hashtag);
                tx.insert_tag(&hashtag, tweet_id).await?
            }
        };
        debug!(
            "Indexed tweet {} under {} (quantity {})",
            tweet_id, tag.tag_name, tag.tweets_quantity
        );
        indexed.push(tag);
    }

    Ok(indexed)
}
