//! Event classifier
//!
//! Maps a message plus destination hint to a card type, priority and
//! presentation attributes. Pure apart from the image lookup, which is bounded
//! by a timeout and degrades to the rule's placeholder image.

use crate::image::{CachedLookup, ImageError, ImageLookup, ImageRef, NoImages};
use crate::rules::{first_match, Extra, ImagePlan, Outcome, Rule, DEFAULT_OUTCOME, DEFAULT_RULE, RULES};
use crate::text::{clean_message, geographic_token};
use crate::unsplash::UnsplashLookup;
use insight_core::{attr, Attributes, CardDraft, CardType, InsightConfig, Priority, ProducerTable};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub card_type: CardType,
    pub priority: Priority,
    /// Presentation attributes, always holding `summary`
    pub attributes: Attributes,
    /// Producer recognized from a `Name:` prefix in the text
    pub title: Option<String>,
    /// Name of the rule that decided
    pub rule: &'static str,
    /// Image written into the attributes, if the rule wanted one
    pub image: Option<ImageRef>,
}

impl Classification {
    /// Whether no rule matched
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.rule == DEFAULT_RULE
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        self.attributes.summary().unwrap_or_default()
    }

    #[must_use]
    pub fn into_draft(self, source_node: impl Into<String>) -> CardDraft {
        CardDraft::new(source_node, self.card_type, self.priority, self.attributes)
    }
}

/// Rule-table classifier with optional image enrichment
#[derive(Clone)]
pub struct Classifier {
    producers: Arc<ProducerTable>,
    rules: Vec<Rule>,
    images: Arc<dyn ImageLookup>,
    image_timeout: Duration,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("producers", &self.producers.len())
            .field("rules", &self.rules.iter().map(|r| r.name).collect::<Vec<_>>())
            .field("image_timeout", &self.image_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(NoImages))
    }
}

impl Classifier {
    /// Built-in rules and producers around an image lookup
    #[must_use]
    pub fn new(images: Arc<dyn ImageLookup>) -> Self {
        Self {
            producers: Arc::new(ProducerTable::default()),
            rules: RULES.to_vec(),
            images,
            image_timeout: Duration::from_secs(5),
        }
    }

    /// Build from configuration; image lookup is enabled only with a credential
    ///
    /// # Errors
    /// - `ImageError::Http` if the HTTP client cannot be built
    pub fn from_config(config: &InsightConfig) -> Result<Self, ImageError> {
        let settings = &config.classifier;
        let images: Arc<dyn ImageLookup> = match settings.unsplash_access_key.as_deref() {
            Some(key) => Arc::new(CachedLookup::new(
                UnsplashLookup::new(key, settings.image_timeout())?,
                settings.image_cache_capacity,
                Duration::from_secs(settings.image_cache_ttl_secs),
            )),
            None => {
                info!("no image credential configured, using placeholder images");
                Arc::new(NoImages)
            }
        };
        Ok(Self::new(images)
            .with_producers(config.producer_table())
            .with_image_timeout(settings.image_timeout()))
    }

    #[must_use]
    pub fn with_producers(mut self, producers: ProducerTable) -> Self {
        self.producers = Arc::new(producers);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn producers(&self) -> &ProducerTable {
        &self.producers
    }

    /// Producer named by a `Name:` prefix anywhere in the text
    #[must_use]
    pub fn infer_title(&self, text: &str) -> Option<&str> {
        self.producers.find(text).map(|(name, _)| name)
    }

    /// Split a recognized producer prefix off the text
    ///
    /// The remainder is trimmed only when a prefix was removed.
    #[must_use]
    pub fn split_prefix<'t>(&'t self, text: &str) -> (Option<&'t str>, String) {
        match self.producers.find(text) {
            Some((name, at)) => {
                let end = at + name.len() + 1;
                let rest = format!("{}{}", &text[..at], &text[end..]);
                (Some(name), rest.trim().to_string())
            }
            None => (None, text.to_string()),
        }
    }

    /// Classify a message for a destination
    pub async fn classify(&self, text: &str, destination: &str) -> Classification {
        self.classify_with_image(text, destination, None).await
    }

    /// Classify, reusing `known_image` instead of looking one up
    pub async fn classify_with_image(
        &self,
        text: &str,
        destination: &str,
        known_image: Option<&ImageRef>,
    ) -> Classification {
        let (title, summary) = self.split_prefix(text);
        let (rule, outcome) = match first_match(&self.rules, title, &summary) {
            Some(rule) => (rule.name, rule.outcome),
            None => (DEFAULT_RULE, DEFAULT_OUTCOME),
        };
        debug!(rule, title = ?title, "classified");

        let mut attributes = base_attributes(&outcome, title, &summary);
        let image = match outcome.image {
            Some(plan) => {
                let image = match known_image {
                    Some(image) => image.clone(),
                    None => self
                        .find_image(&plan, destination)
                        .await
                        .unwrap_or_else(|| ImageRef::new(plan.fallback_url)),
                };
                image.apply_to(&mut attributes);
                Some(image)
            }
            None => None,
        };

        Classification {
            card_type: outcome.card_type,
            priority: outcome.priority,
            attributes,
            title: title.map(str::to_string),
            rule,
            image,
        }
    }

    async fn find_image(&self, plan: &ImagePlan, destination: &str) -> Option<ImageRef> {
        let query = geographic_token(destination).unwrap_or(plan.default_query);
        match tokio::time::timeout(self.image_timeout, self.images.lookup(query)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(query, error = %e, "image lookup failed");
                None
            }
            Err(_) => {
                warn!(query, timeout = ?self.image_timeout, "image lookup timed out");
                None
            }
        }
    }
}

fn base_attributes(outcome: &Outcome, title: Option<&str>, summary: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.set_summary(summary);
    if let Some(title) = title {
        attributes.set_title(title);
    }
    attributes.insert(attr::CATEGORY, outcome.category);
    attributes.insert(attr::COLOR_THEME, outcome.color_theme);
    attributes.insert(attr::SOURCE, outcome.source);
    for (key, extra) in outcome.extras {
        let value = match extra {
            Extra::Fixed(value) => (*value).to_string(),
            Extra::Summary => summary.to_string(),
            Extra::CleanSummary => clean_message(summary),
        };
        attributes.insert(*key, value);
    }
    attributes
}
