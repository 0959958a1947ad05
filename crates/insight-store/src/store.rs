//! Card store contract
//!
//! Invariant shared by every implementation: for a given `(owner, source_node)`
//! at most one card is open, namely the most recently updated one still inside
//! the silence window. `upsert` either extends that card or starts a new one,
//! and the check-then-act is atomic per pair.

use crate::error::StoreError;
use async_trait::async_trait;
use insight_core::{Card, CardDraft, OwnerId};
use std::fmt::Debug;
use std::sync::Arc;

/// Owner-scoped persistence of feed cards
#[async_trait]
pub trait CardStore: Send + Sync + Debug {
    /// Extend the open card of `(owner, draft.source_node)` or insert a new one
    async fn upsert(&self, owner: &OwnerId, draft: CardDraft) -> Result<Card, StoreError>;

    /// The currently open card for a producer, if any
    async fn open_card(&self, owner: &OwnerId, source_node: &str)
        -> Result<Option<Card>, StoreError>;

    /// Most recently updated first, at most `limit` cards
    async fn get_feed(&self, owner: &OwnerId, limit: usize) -> Result<Vec<Card>, StoreError>;

    /// Remove every card of an owner; returns how many were removed
    async fn delete_feed(&self, owner: &OwnerId) -> Result<usize, StoreError>;
}

#[async_trait]
impl<S: CardStore + ?Sized> CardStore for Arc<S> {
    async fn upsert(&self, owner: &OwnerId, draft: CardDraft) -> Result<Card, StoreError> {
        (**self).upsert(owner, draft).await
    }

    async fn open_card(
        &self,
        owner: &OwnerId,
        source_node: &str,
    ) -> Result<Option<Card>, StoreError> {
        (**self).open_card(owner, source_node).await
    }

    async fn get_feed(&self, owner: &OwnerId, limit: usize) -> Result<Vec<Card>, StoreError> {
        (**self).get_feed(owner, limit).await
    }

    async fn delete_feed(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        (**self).delete_feed(owner).await
    }
}
