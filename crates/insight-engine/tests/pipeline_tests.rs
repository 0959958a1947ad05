//! End-to-end runs through the pipeline with scripted agents
//!
//! Tenet: every producer ends a run with exactly one card holding all of its
//! text, no matter how the text was chunked or what else the agent printed.

use async_trait::async_trait;
use insight_classifier::Classifier;
use insight_core::{
    attr, Card, CardDraft, CardType, Event, EventKind, InsightConfig, ManualClock, OwnerId, Priority,
    SilenceWindow,
};
use insight_engine::{schedule_agent, Pipeline, PipelineError, PROACTIVE_INPUT};
use insight_reader::{AgentManifest, ReaderError, RunRequest, Schedule};
use insight_store::{CardStore, MemoryCardStore, StoreError};
use insight_test_utils::{
    done, error_frame, final_frame, memory_store, owner, tagged, trip_script, untagged,
    ScriptedRunner, StaticImages, Step,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

struct Harness {
    pipeline: Pipeline,
    runner: Arc<ScriptedRunner>,
    store: Arc<MemoryCardStore>,
    images: Arc<StaticImages>,
}

fn harness_with(runner: ScriptedRunner, clock: Arc<ManualClock>) -> Harness {
    let runner = Arc::new(runner.with_clock(Arc::clone(&clock)));
    let store = memory_store(&clock, SilenceWindow::new(HOUR));
    let images = Arc::new(StaticImages::new("https://img.test/japan.jpg"));
    let pipeline = Pipeline::new(
        InsightConfig::default().with_silence_window(HOUR),
        runner.clone(),
        Classifier::new(images.clone()),
        store.clone(),
        clock,
    );
    Harness {
        pipeline,
        runner,
        store,
        images,
    }
}

fn harness(runner: ScriptedRunner) -> Harness {
    harness_with(runner, Arc::new(ManualClock::default()))
}

fn request() -> RunRequest {
    RunRequest::new("agents/trip.yaml", "Plan Kyoto")
}

fn by_node<'c>(cards: &'c [Card], node: &str) -> &'c Card {
    cards
        .iter()
        .find(|c| c.source_node == node)
        .unwrap_or_else(|| panic!("no card for {node}"))
}

#[tokio::test]
async fn trip_run_yields_one_card_per_producer() {
    let h = harness(ScriptedRunner::new(trip_script()));
    let owner = owner("device-1");

    let report = h.pipeline.run(&owner, &request(), "Kyoto, Japan").await.unwrap();

    assert_eq!(report.producers, vec!["CheckWeather", "GeniusLoci", "NewsAlert"]);
    assert_eq!(report.events, 8);
    assert_eq!(report.dropped, 2);
    assert_eq!(report.flushed, 3);
    assert_eq!(report.cards_written, 8);
    assert_eq!(report.final_output, "Report generated.");
    assert!(!report.binary_missing);

    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 3);

    let news = by_node(&feed, "NewsAlert");
    assert_eq!(news.summary(), "Storm incoming near the coast");
    assert_eq!(news.card_type, CardType::SafetyAlert);
    assert_eq!(news.priority, Priority::High);
    assert_eq!(news.attributes.title(), Some("NewsAlert"));
    assert_eq!(news.attributes.get(attr::NODE), Some("NewsAlert"));

    let weather = by_node(&feed, "CheckWeather");
    assert_eq!(weather.summary(), "Sunny in Kyoto, light rain by evening");
    assert_eq!(weather.card_type, CardType::Weather);
    assert_eq!(weather.attributes.image_url(), Some("https://img.test/japan.jpg"));

    let culture = by_node(&feed, "GeniusLoci");
    assert_eq!(culture.card_type, CardType::CulturalTip);

    // one lookup per producer with an image plan, then the run's cache
    assert_eq!(h.images.calls(), 2);
    assert_eq!(h.runner.requests()[0].input, "Plan Kyoto");
}

#[tokio::test]
async fn silence_starts_a_new_card() {
    let clock = Arc::new(ManualClock::default());
    let h = harness_with(
        ScriptedRunner::from_steps(vec![
            Step::Emit(tagged("NewsAlert", "Storm incoming")),
            Step::Advance(HOUR + Duration::from_secs(60)),
            Step::Emit(tagged("NewsAlert", "All clear now")),
        ]),
        clock,
    );
    let owner = owner("u1");

    h.pipeline.run(&owner, &request(), "").await.unwrap();

    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    let summaries: Vec<_> = feed.iter().map(Card::summary).collect();
    assert_eq!(summaries, vec!["All clear now", "Storm incoming"]);
    assert_ne!(feed[0].id, feed[1].id);
}

#[tokio::test]
async fn untagged_chunks_follow_the_last_producer_until_it_goes_quiet() {
    let clock = Arc::new(ManualClock::default());
    let h = harness_with(
        ScriptedRunner::from_steps(vec![
            Step::Emit(tagged("NewsAlert", "Storm incoming")),
            Step::Emit(untagged(" on the coast")),
            Step::Advance(Duration::from_secs(180)),
            Step::Emit(untagged("stray remark text")),
        ]),
        clock,
    );
    let owner = owner("u1");

    let report = h.pipeline.run(&owner, &request(), "").await.unwrap();

    assert_eq!(report.dropped, 1);
    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].summary(), "Storm incoming on the coast");
}

#[tokio::test]
async fn skip_filter_keeps_short_attributed_text() {
    let h = harness(ScriptedRunner::new(vec![
        untagged("---"),
        untagged("hi"),
        untagged(r#"{"type": "status"}"#),
        tagged("NewsAlert", "ok"),
    ]));
    let owner = owner("u1");

    let report = h.pipeline.run(&owner, &request(), "").await.unwrap();

    assert_eq!(report.dropped, 3);
    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].summary(), "ok");
}

#[tokio::test]
async fn producer_inferred_from_text_prefix() {
    let h = harness(ScriptedRunner::new(vec![untagged(
        "GenerateReport: Your trip at a glance",
    )]));
    let owner = owner("u1");

    h.pipeline.run(&owner, &request(), "Kyoto, Japan").await.unwrap();

    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed[0].source_node, "GenerateReport");
    assert_eq!(feed[0].summary(), "Your trip at a glance");
    assert_eq!(feed[0].attributes.get(attr::CATEGORY), Some("Report"));
}

#[tokio::test]
async fn error_frames_never_become_cards() {
    let h = harness(ScriptedRunner::new(vec![
        error_frame("upstream exploded"),
        Event::new(EventKind::Error, Some("GeniusLoci".into()), "quota exceeded for GeniusLoci"),
        tagged("NewsAlert", "Storm incoming"),
        done("finished"),
    ]));
    let owner = owner("u1");

    let report = h.pipeline.run(&owner, &request(), "").await.unwrap();

    assert_eq!(report.errors, 2);
    assert_eq!(report.producers, vec!["NewsAlert"]);
    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].source_node, "NewsAlert");
}

#[tokio::test]
async fn closing_frame_text_lands_on_its_producer_card() {
    let h = harness(ScriptedRunner::new(vec![
        tagged("GenerateReport", "Your trip at a glance\n"),
        final_frame("GenerateReport", "Final trip report ready", "Report generated."),
        final_frame("GeniusLoci", "Bow at every shrine gate", "Report generated."),
    ]));
    let owner = owner("u1");

    let report = h.pipeline.run(&owner, &request(), "Kyoto, Japan").await.unwrap();

    assert_eq!(report.final_output, "Report generated.");
    assert_eq!(report.dropped, 0);
    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(
        by_node(&feed, "GenerateReport").summary(),
        "Your trip at a glance\nFinal trip report ready"
    );
    let culture = by_node(&feed, "GeniusLoci");
    assert_eq!(culture.summary(), "Bow at every shrine gate");
    assert_eq!(culture.card_type, CardType::CulturalTip);
}

#[tokio::test]
async fn cached_image_stays_when_the_card_changes_type() {
    let h = harness(ScriptedRunner::new(vec![
        tagged("CheckWeather", "sunny skies all day\n"),
        tagged("CheckWeather", "Warning: hail later"),
    ]));
    let owner = owner("u1");

    h.pipeline.run(&owner, &request(), "Kyoto, Japan").await.unwrap();

    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 1);
    let card = &feed[0];
    assert_eq!(card.card_type, CardType::SafetyAlert);
    assert_eq!(card.summary(), "sunny skies all day\nWarning: hail later");
    assert_eq!(card.attributes.image_url(), Some("https://img.test/japan.jpg"));
    assert_eq!(card.attributes.get(attr::IMAGE_USER), Some("Tester"));
    assert_eq!(
        card.attributes.get(attr::IMAGE_USER_LINK),
        Some("https://example.com/@tester")
    );
    assert_eq!(h.images.calls(), 1);
}

#[tokio::test]
async fn a_later_run_continues_the_open_card() {
    let h = harness(ScriptedRunner::new(vec![tagged("NewsAlert", "Roads closed")]));
    let owner = owner("u1");
    h.store
        .upsert(
            &owner,
            CardDraft::new(
                "NewsAlert",
                CardType::SafetyAlert,
                Priority::High,
                [(attr::SUMMARY, "Storm incoming")].into_iter().collect(),
            ),
        )
        .await
        .unwrap();

    h.pipeline.run(&owner, &request(), "").await.unwrap();

    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].summary(), "Storm incoming\nRoads closed");
}

#[tokio::test]
async fn owners_never_see_each_other() {
    let h = harness(ScriptedRunner::new(trip_script()));
    let alice = owner("alice");
    let bob = owner("bob");

    let mut bob_sub = h.pipeline.subscribe(&bob);
    let mut alice_sub = h.pipeline.subscribe(&alice);
    h.pipeline.run(&alice, &request(), "").await.unwrap();

    assert!(alice_sub.try_changed());
    assert!(!bob_sub.try_changed());
    assert!(h.pipeline.feed(&bob, None).await.unwrap().is_empty());

    assert_eq!(h.pipeline.clear_feed(&alice).await.unwrap(), 3);
    assert_eq!(h.pipeline.clear_feed(&alice).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_process_still_flushes_then_reports() {
    let h = harness(
        ScriptedRunner::new(vec![tagged("CheckWeather", "Sunny"), tagged("CheckWeather", " all week")])
            .failing_with(1),
    );
    let owner = owner("u1");

    let err = h.pipeline.run(&owner, &request(), "").await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Reader(ReaderError::NonZeroExit { code: Some(1) })
    ));
    let feed = h.pipeline.feed(&owner, None).await.unwrap();
    assert_eq!(feed[0].summary(), "Sunny all week");
}

/// Store that rejects one chosen upsert
#[derive(Debug)]
struct FlakyStore {
    inner: MemoryCardStore,
    fail_on: usize,
    attempts: AtomicUsize,
}

#[async_trait]
impl CardStore for FlakyStore {
    async fn upsert(&self, owner: &OwnerId, draft: CardDraft) -> Result<Card, StoreError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(StoreError::WorkerGone);
        }
        self.inner.upsert(owner, draft).await
    }

    async fn open_card(&self, owner: &OwnerId, node: &str) -> Result<Option<Card>, StoreError> {
        self.inner.open_card(owner, node).await
    }

    async fn get_feed(&self, owner: &OwnerId, limit: usize) -> Result<Vec<Card>, StoreError> {
        self.inner.get_feed(owner, limit).await
    }

    async fn delete_feed(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        self.inner.delete_feed(owner).await
    }
}

#[tokio::test]
async fn flush_repairs_a_lost_update() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(FlakyStore {
        inner: MemoryCardStore::new(clock.clone(), SilenceWindow::new(HOUR)),
        fail_on: 2,
        attempts: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::new(
        InsightConfig::default(),
        Arc::new(ScriptedRunner::new(vec![
            tagged("GeniusLoci", "Bow when greeting"),
            tagged("GeniusLoci", " shopkeepers"),
        ])),
        Classifier::default(),
        store.clone(),
        clock,
    );
    let owner = owner("u1");

    let report = pipeline.run(&owner, &request(), "").await.unwrap();

    assert_eq!(report.cards_written, 2);
    assert_eq!(report.flushed, 1);
    let feed = store.get_feed(&owner, 10).await.unwrap();
    assert_eq!(feed[0].summary(), "Bow when greeting shopkeepers");
}

#[tokio::test]
async fn proactive_schedule_runs_for_the_broadcast_owner() {
    let manifest = AgentManifest {
        name: "trip-guardian".into(),
        schedule: Some(Schedule {
            interval: "40ms".into(),
            mode: "proactive".into(),
        }),
        ..AgentManifest::default()
    };
    let h = harness(ScriptedRunner::new(trip_script()).with_manifest(manifest));
    let pipeline = Arc::new(h.pipeline);

    let handle = schedule_agent(Arc::clone(&pipeline), Path::new("agents/trip.yaml"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    pipeline.cancel();
    let ticks = handle.await.unwrap();

    assert!(ticks >= 1);
    assert_eq!(h.runner.runs(), ticks);
    assert_eq!(h.runner.requests()[0].input, PROACTIVE_INPUT);
    let feed = pipeline.feed(&OwnerId::broadcast(), None).await.unwrap();
    assert_eq!(feed.len(), 3);
}

#[tokio::test]
async fn agents_without_a_proactive_schedule_are_not_scheduled() {
    let manifest = AgentManifest {
        name: "one-shot".into(),
        ..AgentManifest::default()
    };
    let h = harness(ScriptedRunner::default().with_manifest(manifest));

    let err = schedule_agent(Arc::new(h.pipeline), Path::new("agents/one.yaml"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotScheduled(name) if name == "one-shot"));
}
