use async_trait::async_trait;

use crate::{
    results::{IndexInfo, ResultItem},
    upload::{MediaFile, MediaKind},
};

use super::errors::SearchError;

/// The search service as the client sees it: embedding, indexing and ranking
/// all happen on the other side of this trait.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn index_info(&self) -> Result<IndexInfo, SearchError>;

    async fn search_text(&self, query: &str) -> Result<Vec<ResultItem>, SearchError>;

    /// Upload a file, have the backend embed it and return its nearest hits.
    async fn search_media(
        &self,
        kind: MediaKind,
        file: &MediaFile,
    ) -> Result<Vec<ResultItem>, SearchError>;
}
