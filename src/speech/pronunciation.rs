//! Acronym pronunciation hints applied before synthesis.

use regex::Regex;
use std::sync::LazyLock;

/// Acronyms the voice model mispronounces, in application order.
const HINTS: &[(&str, &str)] = &[
    ("CENTCOM", "SENT-kom"),
    ("NATO", "NAY-toh"),
    ("FEMA", "FEE-muh"),
    ("CISA", "SIZ-uh"),
    ("DHS", "D H S"),
    ("TSA", "T S A"),
    ("FAA", "F A A"),
    ("EPA", "E P A"),
    ("DOJ", "D O J"),
    ("FBI", "F B I"),
    ("NTSB", "N T S B"),
    ("CBP", "C B P"),
    ("ICE", "I C E"),
];

static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    HINTS
        .iter()
        .filter_map(|(acronym, spoken)| {
            Regex::new(&format!(r"\b{}\b", regex::escape(acronym)))
                .ok()
                .map(|re| (re, *spoken))
        })
        .collect()
});

/// Rewrite known acronyms into phonetic spellings and collapse whitespace.
pub fn apply_pronunciation_hints(text: &str) -> String {
    let mut updated = text.to_string();
    for (pattern, spoken) in RULES.iter() {
        updated = pattern.replace_all(&updated, *spoken).into_owned();
    }
    updated.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_hint_compiles() {
        assert_eq!(RULES.len(), HINTS.len());
    }

    #[test]
    fn test_replaces_whole_words_only() {
        assert_eq!(
            apply_pronunciation_hints("NATO and FEMA met NATOS officials"),
            "NAY-toh and FEE-muh met NATOS officials"
        );
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(apply_pronunciation_hints("Ice on the nato base"), "Ice on the nato base");
        assert_eq!(apply_pronunciation_hints("ICE agents"), "I C E agents");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            apply_pronunciation_hints("  The FBI\n\nsaid\tnothing.  "),
            "The F B I said nothing."
        );
    }

    #[test]
    fn test_idempotent_without_acronyms() {
        let text = "Warm water bleaches coral across the reef.";
        let once = apply_pronunciation_hints(text);
        assert_eq!(once, text);
        assert_eq!(apply_pronunciation_hints(&once), once);
    }

    #[test]
    fn test_punctuation_boundaries() {
        assert_eq!(apply_pronunciation_hints("(CENTCOM), EPA."), "(SENT-kom), E P A.");
    }
}
