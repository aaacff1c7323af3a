pub use crate::libs::core::models::MatchQuality;
use crate::libs::core::models::UserId;
use crate::libs::storage::database::storage_traits::MessageStore;
use crate::libs::storage::records::MessageRecord;
use crate::ChatError;
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub message: MessageRecord,
    pub quality: MatchQuality,
}

/// Literal, case-insensitive search over every thread `user` can read.
/// Ranking and the row limit are applied by the store.
pub fn search<S>(
    store: &mut S,
    user: UserId,
    query: &str,
    min_len: usize,
    limit: usize,
) -> Result<Vec<SearchHit>, ChatError>
where
    S: MessageStore + ?Sized,
{
    let query = query.trim();
    if query.chars().count() < min_len.max(1) {
        return Err(ChatError::InvalidInput("search query is too short"));
    }

    let hits: Vec<SearchHit> = store
        .search_messages(user, query, limit)?
        .into_iter()
        .map(|(message, quality)| SearchHit { message, quality })
        .collect();

    debug!(user = %user, hits = hits.len(), "message search finished");
    Ok(hits)
}
