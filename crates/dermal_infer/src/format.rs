//! Ranked result formatting.

use serde::{Deserialize, Serialize};

use dermal_core::class_label;

/// One ranked classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassResult {
    /// Human-readable condition name.
    pub class: String,
    /// Confidence as a percentage in `[0, 100]`.
    pub probability: f32,
}

/// Turn raw class probabilities into ranked, labeled percentages.
///
/// Labels come from the fixed condition list, with a synthetic `class_N`
/// for any index beyond it. Probabilities scale to `0..=100`. The sort is
/// stable and descending, so ties keep class-index order, and the list is
/// truncated to `top_k`.
#[must_use]
pub fn format_predictions(probs: &[f32], top_k: usize) -> Vec<ClassResult> {
    let mut results: Vec<ClassResult> = probs
        .iter()
        .enumerate()
        .map(|(i, &p)| ClassResult {
            class: class_label(i),
            probability: p * 100.0,
        })
        .collect();

    results.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use dermal_core::CLASS_NAMES;

    #[test]
    fn test_sorted_descending_and_scaled() {
        let probs = [0.1, 0.5, 0.05, 0.2, 0.05, 0.05, 0.05];
        let results = format_predictions(&probs, 7);

        assert_eq!(results.len(), 7);
        assert_eq!(results[0].class, CLASS_NAMES[1]);
        assert!((results[0].probability - 50.0).abs() < 1e-4);
        for pair in results.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    fn test_ties_keep_index_order() {
        let probs = [0.25, 0.25, 0.25, 0.25];
        let results = format_predictions(&probs, 4);
        assert_eq!(results[0].class, CLASS_NAMES[0]);
        assert_eq!(results[1].class, CLASS_NAMES[1]);
        assert_eq!(results[2].class, CLASS_NAMES[2]);
        assert_eq!(results[3].class, CLASS_NAMES[3]);
    }

    #[test]
    fn test_truncated_to_top_k() {
        let probs = [0.1, 0.2, 0.3, 0.15, 0.1, 0.1, 0.05];
        let results = format_predictions(&probs, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].class, CLASS_NAMES[2]);
    }

    #[test]
    fn test_synthetic_labels_beyond_known_classes() {
        let probs = [0.0; 9];
        let results = format_predictions(&probs, 9);
        assert_eq!(results[7].class, "class_7");
        assert_eq!(results[8].class, "class_8");
    }

    #[test]
    fn test_serializes_to_json() {
        let results = format_predictions(&[1.0], 1);
        let json = serde_json::to_string(&results).unwrap();
        assert!(json.contains("\"probability\":100.0"));
    }
}
