//! Ordered classification rules
//!
//! A rule is a `(predicate, outcome)` pair. Rules are evaluated in order and
//! the first match decides; text that matches nothing gets [`DEFAULT_OUTCOME`].
//! Vocabulary checks are case-sensitive and run on the text after the
//! producer prefix was removed.

use insight_core::{CardType, Priority};

pub const WEATHER_FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1592210454359-9043f067919b?auto=format&fit=crop&w=800&q=80";
pub const CULTURE_FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1528642474498-1af0c17fd8c3?auto=format&fit=crop&w=800&q=80";
pub const REPORT_FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1469854523086-cc02fe5d8800?auto=format&fit=crop&w=800&q=80";

/// When a rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicate {
    /// Producer titles that select the rule
    pub titles: &'static [&'static str],
    /// Phrases that select the rule wherever they appear in the text
    pub phrases: &'static [&'static str],
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, title: Option<&str>, text: &str) -> bool {
        let by_title = title.is_some_and(|t| self.titles.iter().any(|c| c.eq_ignore_ascii_case(t)));
        by_title || self.phrases.iter().any(|p| text.contains(p))
    }
}

/// How an extra attribute is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extra {
    Fixed(&'static str),
    /// Copy of the summary
    Summary,
    /// Summary with output markers removed
    CleanSummary,
}

/// Image enrichment of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlan {
    /// Query used when the destination has no geographic token
    pub default_query: &'static str,
    /// Placeholder when lookup fails or finds nothing
    pub fallback_url: &'static str,
}

/// What a matching rule produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub card_type: CardType,
    pub priority: Priority,
    pub category: &'static str,
    pub color_theme: &'static str,
    pub source: &'static str,
    pub image: Option<ImagePlan>,
    pub extras: &'static [(&'static str, Extra)],
}

/// One entry of the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub outcome: Outcome,
}

pub const DEFAULT_RULE: &str = "default";

pub const DEFAULT_OUTCOME: Outcome = Outcome {
    card_type: CardType::Article,
    priority: Priority::Medium,
    category: "General",
    color_theme: "gray",
    source: "Agent",
    image: None,
    extras: &[],
};

/// The built-in table
pub const RULES: &[Rule] = &[
    Rule {
        name: "safety",
        predicate: Predicate {
            titles: &["NewsAlert"],
            phrases: &["SAFETY:", "Warning"],
        },
        outcome: Outcome {
            card_type: CardType::SafetyAlert,
            priority: Priority::High,
            category: "Safety",
            color_theme: "red",
            source: "News Alert",
            image: None,
            extras: &[("message", Extra::CleanSummary), ("level", Extra::Fixed("warning"))],
        },
    },
    Rule {
        name: "weather",
        predicate: Predicate {
            titles: &["CheckWeather"],
            phrases: &["Weather"],
        },
        outcome: Outcome {
            card_type: CardType::Weather,
            priority: Priority::Medium,
            category: "Weather",
            color_theme: "blue",
            source: "Weather Agent",
            image: Some(ImagePlan {
                default_query: "landscape",
                fallback_url: WEATHER_FALLBACK_IMAGE,
            }),
            extras: &[
                ("description", Extra::Summary),
                ("temp", Extra::Fixed("22°C")),
                ("location", Extra::Fixed("Destination")),
                ("condition", Extra::Fixed("Cloudy")),
            ],
        },
    },
    Rule {
        name: "culture",
        predicate: Predicate {
            titles: &["GeniusLoci", "KnowledgeCheck", "ReviewSummarizer"],
            phrases: &[],
        },
        outcome: Outcome {
            card_type: CardType::CulturalTip,
            priority: Priority::Medium,
            category: "Culture",
            color_theme: "purple",
            source: "Genius Loci",
            image: Some(ImagePlan {
                default_query: "culture",
                fallback_url: CULTURE_FALLBACK_IMAGE,
            }),
            extras: &[],
        },
    },
    Rule {
        name: "report",
        predicate: Predicate {
            titles: &["GenerateReport"],
            phrases: &[],
        },
        outcome: Outcome {
            card_type: CardType::Article,
            priority: Priority::Medium,
            category: "Report",
            color_theme: "green",
            source: "Final Synthesis",
            image: Some(ImagePlan {
                default_query: "travel",
                fallback_url: REPORT_FALLBACK_IMAGE,
            }),
            extras: &[],
        },
    },
];

/// First matching rule, if any
#[must_use]
pub fn first_match<'a>(rules: &'a [Rule], title: Option<&str>, text: &str) -> Option<&'a Rule> {
    rules.iter().find(|rule| rule.predicate.matches(title, text))
}
