//! Node accumulation engine
//!
//! Folds a run's event stream into one growing card per producer:
//!
//! 1. resolve the producer (tag, inherited sticky producer, inferred title)
//! 2. drop noise through [`SkipFilter`]
//! 3. append the message to the producer's lane, seeding a fresh lane from
//!    the store's open card so text keeps growing across runs
//! 4. classify `"<producer>: <lane text>"`, keep the lane's image stable
//! 5. upsert the unsaved tail of the lane, then pulse the owner's subscribers
//!
//! A failed upsert leaves its text unsaved, so the lane's next write carries
//! it again; the run goes on.

use crate::context::{NodeLane, RunContext, Styling};
use crate::filter::SkipFilter;
use chrono::{DateTime, Utc};
use insight_classifier::Classifier;
use insight_core::payload::normalize_producer;
use insight_core::{attr, Card, Clock, Event, EventKind, InsightConfig, SilenceWindow, SystemClock};
use insight_store::{CardStore, FeedNotifier};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Turns events into card upserts
#[derive(Debug, Clone)]
pub struct Accumulator {
    classifier: Arc<Classifier>,
    store: Arc<dyn CardStore>,
    notifier: FeedNotifier,
    filter: SkipFilter,
    clock: Arc<dyn Clock>,
    window: SilenceWindow,
    inherit_window: Duration,
    utility_nodes: Vec<String>,
}

impl Accumulator {
    #[must_use]
    pub fn new(
        config: &InsightConfig,
        classifier: Arc<Classifier>,
        store: Arc<dyn CardStore>,
        notifier: FeedNotifier,
    ) -> Self {
        Self {
            classifier,
            store,
            notifier,
            filter: SkipFilter::new(&config.accumulator),
            clock: Arc::new(SystemClock),
            window: config.store.silence_window(),
            inherit_window: config.accumulator.inherit_window(),
            utility_nodes: config.accumulator.utility_nodes.clone(),
        }
    }

    /// Replace the time source; must match the store's clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    #[must_use]
    pub fn notifier(&self) -> &FeedNotifier {
        &self.notifier
    }

    fn is_utility(&self, producer: &str) -> bool {
        self.utility_nodes.iter().any(|node| node == producer)
    }

    /// Fold one event into the run; returns the card it wrote, if any
    pub async fn accumulate(&self, event: &Event, ctx: &mut RunContext) -> Option<Card> {
        ctx.stats.events += 1;
        let message = event.display_text();

        match event.kind {
            EventKind::Done => {
                ctx.record_done(event.done_output());
                if message.trim().is_empty() {
                    return None;
                }
                ctx.record_output(&message);
            }
            EventKind::Error => {
                warn!(owner = %ctx.owner(), message = %message, "agent reported an error");
                ctx.stats.errors += 1;
                ctx.stats.dropped += 1;
                return None;
            }
            EventKind::Chunk => ctx.record_output(&message),
            EventKind::Log => {}
        }

        // a terminal frame carrying text is the producer's last chunk
        let kind = match event.kind {
            EventKind::Done => EventKind::Chunk,
            kind => kind,
        };
        let now = self.clock.now();
        let tagged = event
            .node
            .as_deref()
            .map(normalize_producer)
            .filter(|node| !node.is_empty());
        let producer = tagged.or_else(|| match kind {
            EventKind::Chunk => ctx
                .inherited_producer(now, self.inherit_window)
                .map(str::to_string),
            _ => None,
        });

        if let Some(reason) = self.filter.check(kind, &message, producer.as_deref()) {
            debug!(%kind, reason = reason.as_str(), "event skipped");
            ctx.stats.dropped += 1;
            return None;
        }

        let producer = producer.or_else(|| self.classifier.infer_title(&message).map(str::to_string));
        let Some(producer) = producer.filter(|p| !self.is_utility(p)) else {
            debug!(%kind, "event has no card producer");
            ctx.stats.dropped += 1;
            return None;
        };

        ctx.mark_active(&producer, now);
        self.prepare_lane(ctx, &producer, now).await;
        if let Some(lane) = ctx.lanes.get_mut(&producer) {
            lane.summary.push_str(strip_own_prefix(&message, &producer));
            lane.last_touch = now;
        }

        self.write(ctx, &producer).await
    }

    /// Make sure `producer` has a lane that is still inside the window
    ///
    /// A new or lapsed lane starts from the store's open card, so a card
    /// continued by a later run keeps its earlier text.
    async fn prepare_lane(&self, ctx: &mut RunContext, producer: &str, now: DateTime<Utc>) {
        let fresh = ctx
            .lanes
            .get(producer)
            .is_some_and(|lane| self.window.is_open(lane.last_touch, now));
        if fresh {
            return;
        }

        let mut summary = match self.store.open_card(ctx.owner(), producer).await {
            Ok(Some(card)) => {
                debug!(owner = %ctx.owner(), node = producer, card_id = %card.id, "continuing open card");
                card.summary().to_string()
            }
            Ok(None) => String::new(),
            Err(e) => {
                error!(owner = %ctx.owner(), node = producer, error = %e, "open card lookup failed");
                String::new()
            }
        };
        if !summary.is_empty() && !summary.ends_with(char::is_whitespace) {
            summary.push('\n');
        }
        ctx.lanes
            .insert(producer.to_string(), NodeLane::seeded(summary, now));
    }

    /// Classify the lane's full text and persist it
    ///
    /// The store appends only the unsaved tail of the lane, so text another
    /// run added to the same open card in the meantime is kept.
    async fn write(&self, ctx: &mut RunContext, producer: &str) -> Option<Card> {
        let (summary, delta, styling) = {
            let lane = ctx.lanes.get(producer)?;
            let (text, delta) = lane.pending();
            (text.to_string(), delta.to_string(), lane.styling.clone())
        };
        if summary.is_empty() {
            return None;
        }

        let known_image = ctx.images.get(producer).cloned();
        let text = format!("{producer}: {summary}");
        let mut classification = self
            .classifier
            .classify_with_image(&text, ctx.destination(), known_image.as_ref())
            .await;

        match (&styling, classification.is_default()) {
            (Some(styling), true) => styling.restore(&mut classification),
            (_, false) => {
                if let Some(lane) = ctx.lanes.get_mut(producer) {
                    lane.styling = Some(Styling::capture(&classification));
                }
            }
            (None, true) => {}
        }
        if known_image.is_none() {
            if let Some(image) = &classification.image {
                ctx.images.insert(producer.to_string(), image.clone());
            }
        }

        let mut draft = classification.into_draft(producer);
        if let Some(image) = ctx.images.get(producer) {
            image.apply_to(&mut draft.attributes);
        }
        draft.attributes.set_summary(summary.as_str());
        draft.attributes.set_title(producer);
        draft.attributes.insert(attr::NODE, producer);

        match self.store.upsert(ctx.owner(), draft.with_append(delta)).await {
            Ok(card) => {
                ctx.stats.cards_written += 1;
                if let Some(lane) = ctx.lanes.get_mut(producer) {
                    lane.saved = summary.len();
                    lane.card_id = Some(card.id);
                }
                let pulsed = self.notifier.publish(ctx.owner());
                debug!(
                    owner = %ctx.owner(),
                    node = producer,
                    card_id = %card.id,
                    card_type = %card.card_type,
                    pulsed,
                    "card written"
                );
                Some(card)
            }
            Err(e) => {
                ctx.stats.store_failures += 1;
                error!(owner = %ctx.owner(), node = producer, error = %e, "card upsert failed");
                None
            }
        }
    }

    /// Write every lane once more so stored cards hold the final text
    ///
    /// Lanes that already lapsed are left alone: their card is closed and a
    /// rewrite would start a duplicate.
    pub async fn flush(&self, ctx: &mut RunContext) -> usize {
        let now = self.clock.now();
        let pending: Vec<String> = ctx
            .producers()
            .into_iter()
            .filter(|producer| {
                ctx.lanes.get(*producer).is_some_and(|lane| {
                    !lane.summary.trim().is_empty() && self.window.is_open(lane.last_touch, now)
                })
            })
            .map(str::to_string)
            .collect();

        let mut flushed = 0;
        for producer in &pending {
            if self.write(ctx, producer).await.is_some() {
                flushed += 1;
            }
        }
        ctx.stats.flushed += flushed;
        debug!(owner = %ctx.owner(), flushed, "lanes flushed");
        flushed
    }
}

/// Drop a leading `"<producer>:"` that merely repeats the lane's name
fn strip_own_prefix<'m>(message: &'m str, producer: &str) -> &'m str {
    message
        .trim_start()
        .strip_prefix(producer)
        .and_then(|rest| rest.strip_prefix(':'))
        .map_or(message, str::trim_start)
}
