//! Classifier behavior through the public API
//!
//! Tenet: the same text and destination always yield the same card shape,
//! and image lookups never decide whether a card is produced.

use async_trait::async_trait;
use insight_classifier::{
    CachedLookup, Classifier, ImageError, ImageLookup, ImageRef, DEFAULT_RULE,
};
use insight_core::{attr, CardType, Priority};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct CountingLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageLookup for CountingLookup {
    async fn lookup(&self, query: &str) -> Result<Option<ImageRef>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ImageRef::new(format!("https://img/{query}.jpg"))))
    }
}

#[tokio::test]
async fn producer_prefixes_decide_the_type() {
    let classifier = Classifier::default();
    let cases = [
        ("CheckWeather: sunny", CardType::Weather, Priority::Medium),
        ("SAFETY: flood warning", CardType::SafetyAlert, Priority::High),
        ("NewsAlert: protest at the station", CardType::SafetyAlert, Priority::High),
        ("ReviewSummarizer: locals love the ramen", CardType::CulturalTip, Priority::Medium),
        ("GenerateReport: your trip at a glance", CardType::Article, Priority::Medium),
        ("nothing in particular", CardType::Article, Priority::Medium),
    ];

    for (text, card_type, priority) in cases {
        let result = classifier.classify(text, "Kyoto, Japan").await;
        assert_eq!(result.card_type, card_type, "{text}");
        assert_eq!(result.priority, priority, "{text}");
        assert!(result.attributes.get(attr::CATEGORY).is_some(), "{text}");
        assert!(result.attributes.get(attr::COLOR_THEME).is_some(), "{text}");
    }
}

#[tokio::test]
async fn cached_lookup_serves_repeat_queries() {
    let counting = Arc::new(CountingLookup::default());
    let cached = CachedLookup::new(Arc::clone(&counting), 32, Duration::from_secs(60));
    let classifier = Classifier::new(Arc::new(cached));

    let first = classifier.classify("CheckWeather: clear", "Kyoto, Japan").await;
    let second = classifier.classify("GeniusLoci: bow", "Osaka, Japan").await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.attributes.image_url(), Some("https://img/Japan.jpg"));
    assert_eq!(second.attributes.image_url(), Some("https://img/Japan.jpg"));
}

#[tokio::test]
async fn default_branch_never_looks_up_images() {
    let counting = Arc::new(CountingLookup::default());
    let classifier = Classifier::new(counting.clone());

    let result = classifier.classify("plain remark", "Kyoto, Japan").await;

    assert_eq!(result.rule, DEFAULT_RULE);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    assert!(result.attributes.image_url().is_none());
}

proptest! {
    #[test]
    fn summary_is_always_present(text in ".{0,80}", dest in "[A-Za-z, ]{0,30}") {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = runtime.block_on(Classifier::default().classify(&text, &dest));
        prop_assert!(result.attributes.summary().is_some());
        prop_assert!(result.attributes.get(attr::CATEGORY).is_some());
    }
}
