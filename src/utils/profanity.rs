use std::sync::OnceLock;

use regex::Regex;

/// Seed dictionary, Russian + English. Each term matches at a word start and
/// swallows trailing word characters, which covers inflected forms.
const DICTIONARY: &[&str] = &[
    "блять",
    "бля",
    "хуй",
    "хуе",
    "пизд",
    "ебат",
    "ебан",
    "сука",
    "суки",
    "мудак",
    "гандон",
    "долбоеб",
    "fuck",
    "shit",
    "bitch",
    "asshole",
    "bastard",
    "cunt",
];

const REPLACEMENT: &str = "***";

fn patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        DICTIONARY
            .iter()
            .map(|term| {
                Regex::new(&format!(r"(?i)\b{}\w*", regex::escape(term)))
                    .expect("profanity pattern must compile")
            })
            .collect()
    })
}

/// Mask dictionary terms in `text`. Returns the filtered text and whether
/// anything was replaced, so callers can log a moderation event without
/// re-scanning.
pub fn filter(text: &str) -> (String, bool) {
    if text.is_empty() {
        return (text.to_string(), false);
    }

    let mut out = text.to_string();
    let mut was_filtered = false;

    for re in patterns() {
        if re.is_match(&out) {
            out = re.replace_all(&out, REPLACEMENT).into_owned();
            was_filtered = true;
        }
    }

    (out, was_filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_russian_profanity() {
        let (filtered, flagged) = filter("Это блять тест");
        assert_eq!(filtered, "Это *** тест");
        assert!(flagged);
    }

    #[test]
    fn masks_inflected_forms() {
        let (filtered, flagged) = filter("сукааа");
        assert_eq!(filtered, "***");
        assert!(flagged);
    }

    #[test]
    fn masks_english_terms_case_insensitive() {
        let (filtered, flagged) = filter("What the FUCK is this");
        assert_eq!(filtered, "What the *** is this");
        assert!(flagged);
    }

    #[test]
    fn clean_text_passes_through() {
        let (filtered, flagged) = filter("Добрый день, выезжаем");
        assert_eq!(filtered, "Добрый день, выезжаем");
        assert!(!flagged);
    }

    #[test]
    fn empty_input_returns_unchanged() {
        let (filtered, flagged) = filter("");
        assert_eq!(filtered, "");
        assert!(!flagged);
    }

    #[test]
    fn word_boundary_respected() {
        // Terms inside another word are not matched from mid-word.
        let (_, flagged) = filter("заслуживает");
        assert!(!flagged);
    }
}
