//! Placeholder code-mapping suggestions.
//!
//! Scoring is fixed: every source code gets the same three candidate tiers,
//! keyed on the first five digits found in the code.

use crate::domain::{MappingCandidate, MappingSuggestion};

const BASE_DIGITS: usize = 5;
const FALLBACK_BASE: &str = "00000";

/// Suggest pharmacy catalogue targets for a source-system drug code.
pub fn suggest_mappings(source_code: &str) -> MappingSuggestion {
    let digits: String = source_code
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(BASE_DIGITS)
        .collect();
    let base = if digits.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        digits
    };

    let tiers = [
        ('A', 0.93, "Generic Base A"),
        ('B', 0.81, "Brand Alt"),
        ('C', 0.67, "Legacy Code"),
    ];

    MappingSuggestion {
        source_code: source_code.to_string(),
        candidates: tiers
            .iter()
            .map(|(suffix, confidence, label)| MappingCandidate {
                target_id: format!("DRUG-{}{}", base, suffix),
                confidence: *confidence,
                label: format!("{} {}", label, base),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_use_first_five_digits() {
        let suggestion = suggest_mappings("RX-1234567");
        let ids: Vec<_> = suggestion
            .candidates
            .iter()
            .map(|c| c.target_id.as_str())
            .collect();
        assert_eq!(ids, vec!["DRUG-12345A", "DRUG-12345B", "DRUG-12345C"]);
        assert_eq!(suggestion.candidates[1].label, "Brand Alt 12345");
    }

    #[test]
    fn code_without_digits_falls_back() {
        let suggestion = suggest_mappings("ABC");
        assert_eq!(suggestion.candidates[0].target_id, "DRUG-00000A");
        assert_eq!(suggestion.candidates[0].label, "Generic Base A 00000");
    }

    #[test]
    fn confidences_descend() {
        let suggestion = suggest_mappings("67890");
        let confidences: Vec<f64> = suggestion.candidates.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, vec![0.93, 0.81, 0.67]);
        assert_eq!(suggestion.source_code, "67890");
    }
}
