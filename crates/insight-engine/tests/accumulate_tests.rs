//! Accumulator properties over arbitrary chunkings
//!
//! Tenet: while a card is open its summary only ever grows, even when runs
//! overlap, and the number of cards depends on silence, never on how the text
//! was split.

use insight_classifier::Classifier;
use insight_core::{Card, InsightConfig, ManualClock, SilenceWindow};
use insight_engine::{Accumulator, RunContext};
use insight_store::{CardStore, FeedNotifier};
use insight_test_utils::{memory_store, owner, tagged};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn accumulator(clock: &Arc<ManualClock>) -> (Accumulator, Arc<dyn CardStore>) {
    let store: Arc<dyn CardStore> = memory_store(clock, SilenceWindow::from_secs(600));
    let config = InsightConfig::default().with_silence_window(Duration::from_secs(600));
    let accumulator = Accumulator::new(
        &config,
        Arc::new(Classifier::default()),
        Arc::clone(&store),
        FeedNotifier::default(),
    )
    .with_clock(clock.clone());
    (accumulator, store)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn summary_grows_monotonically(pieces in proptest::collection::vec("[a-z][a-z ,]{0,11}", 1..20)) {
        let clock = Arc::new(ManualClock::default());
        let (accumulator, _store) = accumulator(&clock);
        let mut ctx = RunContext::new(owner("u1"), "Lisbon, Portugal");

        let cards: Vec<Card> = runtime().block_on(async {
            let mut cards = Vec::new();
            for piece in &pieces {
                if let Some(card) = accumulator.accumulate(&tagged("CheckWeather", piece), &mut ctx).await {
                    cards.push(card);
                }
            }
            cards
        });

        for pair in cards.windows(2) {
            prop_assert_eq!(pair[0].id, pair[1].id);
            prop_assert!(pair[1].summary().starts_with(pair[0].summary()));
        }
        if let Some(last) = cards.last() {
            let joined = pieces.concat();
            prop_assert_eq!(last.summary(), joined.trim());
        }
    }

    #[test]
    fn card_count_follows_silence(gaps in proptest::collection::vec(0u64..900, 1..10)) {
        let clock = Arc::new(ManualClock::default());
        let (accumulator, store) = accumulator(&clock);
        let mut ctx = RunContext::new(owner("u1"), "");

        let expected = 1 + gaps.iter().skip(1).filter(|gap| **gap > 600).count();
        let feed = runtime().block_on(async {
            for gap in &gaps {
                clock.advance(Duration::from_secs(*gap));
                accumulator.accumulate(&tagged("NewsAlert", "Storm update"), &mut ctx).await;
            }
            accumulator.flush(&mut ctx).await;
            store.get_feed(&owner("u1"), 100).await.unwrap()
        });

        prop_assert_eq!(feed.len(), expected);
    }
}

#[tokio::test]
async fn flush_writes_each_open_lane_once() {
    let clock = Arc::new(ManualClock::default());
    let (accumulator, store) = accumulator(&clock);
    let mut ctx = RunContext::new(owner("u1"), "");

    accumulator.accumulate(&tagged("NewsAlert", "Storm incoming"), &mut ctx).await;
    accumulator.accumulate(&tagged("GeniusLoci", "Bow politely"), &mut ctx).await;

    assert_eq!(accumulator.flush(&mut ctx).await, 2);
    assert_eq!(ctx.stats().flushed, 2);
    assert_eq!(ctx.stats().cards_written, 4);
    assert_eq!(store.get_feed(&owner("u1"), 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn flush_leaves_lapsed_lanes_alone() {
    let clock = Arc::new(ManualClock::default());
    let (accumulator, store) = accumulator(&clock);
    let mut ctx = RunContext::new(owner("u1"), "");

    accumulator.accumulate(&tagged("NewsAlert", "Storm incoming"), &mut ctx).await;
    clock.advance(Duration::from_secs(601));

    assert_eq!(accumulator.flush(&mut ctx).await, 0);
    assert_eq!(store.get_feed(&owner("u1"), 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn overlapping_runs_keep_each_others_text() {
    let clock = Arc::new(ManualClock::default());
    let (accumulator, store) = accumulator(&clock);
    let mut run_a = RunContext::new(owner("u1"), "");
    let mut run_b = RunContext::new(owner("u1"), "");

    accumulator.accumulate(&tagged("NewsAlert", "alpha from run A\n"), &mut run_a).await;
    accumulator.accumulate(&tagged("NewsAlert", "bravo from run B\n"), &mut run_b).await;
    accumulator.accumulate(&tagged("NewsAlert", "charlie from run A\n"), &mut run_a).await;
    accumulator.flush(&mut run_a).await;
    accumulator.flush(&mut run_b).await;

    let feed = store.get_feed(&owner("u1"), 10).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(
        feed[0].summary(),
        "alpha from run A\nbravo from run B\ncharlie from run A"
    );
}

#[tokio::test]
async fn utility_nodes_are_ignored() {
    let clock = Arc::new(ManualClock::default());
    let (accumulator, _store) = accumulator(&clock);
    let mut ctx = RunContext::new(owner("u1"), "");

    let written = accumulator
        .accumulate(&tagged("Guardian Assistant:", "Great! Scanning your trip now"), &mut ctx)
        .await;

    assert!(written.is_none());
    assert_eq!(ctx.stats().dropped, 1);
    assert!(ctx.producers().is_empty());
}
