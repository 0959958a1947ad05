//! Small text helpers shared by the rules

/// Display markers stripped by [`clean_message`]
pub const DISPLAY_MARKERS: &[&str] = &[
    "CheckWeather_output:",
    "GeniusLoci_output:",
    "NewsAlert_output:",
    "GenerateReport_output:",
    "output:",
    "result:",
    "SAFETY:",
    "CULTURE:",
    "REPORT:",
    "REVIEW:",
];

/// Geographic token of a destination: the text after the last comma,
/// or the whole destination when there is none. `None` for a blank destination.
///
/// `"Delhi, India"` → `"India"`, `"Pasikuda, Sri Lanka"` → `"Sri Lanka"`
#[must_use]
pub fn geographic_token(destination: &str) -> Option<&str> {
    let destination = destination.trim();
    if destination.is_empty() {
        return None;
    }
    let token = match destination.rfind(',') {
        Some(at) if at > 0 => destination[at + 1..].trim(),
        _ => destination,
    };
    if !token.is_empty() {
        return Some(token);
    }
    Some(destination.trim_end_matches(',').trim()).filter(|head| !head.is_empty())
}

/// Remove agent output markers for a display-only copy of a message
#[must_use]
pub fn clean_message(message: &str) -> String {
    let mut cleaned = message.to_string();
    for marker in DISPLAY_MARKERS {
        if cleaned.contains(marker) {
            cleaned = cleaned.replace(marker, "");
        }
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn token_after_last_comma() {
        assert_eq!(geographic_token("Delhi, India"), Some("India"));
        assert_eq!(geographic_token("Pasikuda, Eastern Province, Sri Lanka"), Some("Sri Lanka"));
        assert_eq!(geographic_token("Kyoto"), Some("Kyoto"));
        assert_eq!(geographic_token("   "), None);
    }

    #[test]
    fn trailing_comma_falls_back_to_head() {
        assert_eq!(geographic_token("Lima,"), Some("Lima"));
        assert_eq!(geographic_token(",,"), None);
    }

    #[test]
    fn clean_message_strips_markers() {
        assert_eq!(clean_message("SAFETY: flood warning"), "flood warning");
        assert_eq!(clean_message("NewsAlert_output: result: calm"), "calm");
        assert_eq!(clean_message("no markers"), "no markers");
    }

    proptest! {
        #[test]
        fn token_is_a_nonempty_substring(dest in "[A-Za-z ,]{0,40}") {
            if let Some(token) = geographic_token(&dest) {
                prop_assert!(!token.is_empty());
                prop_assert!(dest.contains(token));
            }
        }
    }
}
