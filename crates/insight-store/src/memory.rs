//! In-memory card store
//!
//! Owners map to their own feed; inside a feed every producer has a lane of
//! cards in creation order, so the open card is always the lane's last entry.
//! An upsert holds the lane's map entry for its whole check-then-act, which
//! serializes writers of the same pair without a global lock.

use crate::error::StoreError;
use crate::store::CardStore;
use async_trait::async_trait;
use dashmap::DashMap;
use insight_core::{Card, CardDraft, Clock, OwnerId, SilenceWindow, SystemClock};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct OwnerFeed {
    lanes: DashMap<String, Vec<Card>>,
}

/// Card store backed by concurrent maps
#[derive(Debug)]
pub struct MemoryCardStore {
    owners: DashMap<OwnerId, Arc<OwnerFeed>>,
    clock: Arc<dyn Clock>,
    window: SilenceWindow,
}

impl MemoryCardStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, window: SilenceWindow) -> Self {
        Self {
            owners: DashMap::new(),
            clock,
            window,
        }
    }

    #[inline]
    #[must_use]
    pub fn window(&self) -> SilenceWindow {
        self.window
    }

    fn feed(&self, owner: &OwnerId) -> Arc<OwnerFeed> {
        if let Some(feed) = self.owners.get(owner) {
            return Arc::clone(feed.value());
        }
        Arc::clone(self.owners.entry(owner.clone()).or_default().value())
    }
}

impl Default for MemoryCardStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), SilenceWindow::default())
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn upsert(&self, owner: &OwnerId, draft: CardDraft) -> Result<Card, StoreError> {
        let feed = self.feed(owner);
        let now = self.clock.now();
        let mut lane = feed.lanes.entry(draft.source_node.clone()).or_default();

        if let Some(card) = lane.last_mut().filter(|c| self.window.is_open(c.updated_at, now)) {
            card.apply(draft, now);
            debug!(%owner, node = %card.source_node, card_id = %card.id, "card extended");
            return Ok(card.clone());
        }

        let card = draft.into_card(owner.clone(), now);
        debug!(%owner, node = %card.source_node, card_id = %card.id, "card created");
        lane.push(card.clone());
        Ok(card)
    }

    async fn open_card(
        &self,
        owner: &OwnerId,
        source_node: &str,
    ) -> Result<Option<Card>, StoreError> {
        let Some(feed) = self.owners.get(owner).map(|f| Arc::clone(f.value())) else {
            return Ok(None);
        };
        let now = self.clock.now();
        Ok(feed.lanes.get(source_node).and_then(|lane| {
            lane.last()
                .filter(|c| self.window.is_open(c.updated_at, now))
                .cloned()
        }))
    }

    async fn get_feed(&self, owner: &OwnerId, limit: usize) -> Result<Vec<Card>, StoreError> {
        let Some(feed) = self.owners.get(owner).map(|f| Arc::clone(f.value())) else {
            return Ok(Vec::new());
        };
        let mut cards: Vec<Card> = feed
            .lanes
            .iter()
            .flat_map(|lane| lane.value().clone())
            .collect();
        cards.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        cards.truncate(limit);
        Ok(cards)
    }

    async fn delete_feed(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        let Some(feed) = self.owners.get(owner).map(|f| Arc::clone(f.value())) else {
            return Ok(0);
        };
        let mut removed = 0;
        feed.lanes.retain(|_, lane| {
            removed += lane.len();
            false
        });
        debug!(%owner, removed, "feed cleared");
        Ok(removed)
    }
}
