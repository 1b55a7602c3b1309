//! The fixed class label set.
//!
//! Position in this list corresponds to the classifier's output index and
//! must exactly match the order used at training time.

/// Number of known skin-condition classes.
pub const N_CLASSES: usize = 7;

/// Ordered condition names, index-aligned with the classifier output.
pub const CLASS_NAMES: [&str; N_CLASSES] = [
    "Acne and Rosacea Photos",
    "Eczema Photos",
    "Heathy",
    "Psoriasis pictures Lichen Planus and related diseases",
    "Scabies Lyme Disease and other Infestations and Bites",
    "Seborrheic Keratoses and other Benign Tumors",
    "Warts Molluscum and other Viral Infections",
];

/// Human label for a class index.
///
/// Indices beyond the known label list get a synthetic `class_N` label, a
/// guard against a label/model mismatch.
#[must_use]
pub fn class_label(index: usize) -> String {
    CLASS_NAMES
        .get(index)
        .map(|s| (*s).to_string())
        .unwrap_or_else(|| format!("class_{index}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(class_label(0), "Acne and Rosacea Photos");
        assert_eq!(class_label(2), "Heathy");
        assert_eq!(class_label(6), "Warts Molluscum and other Viral Infections");
    }

    #[test]
    fn test_synthetic_label_beyond_list() {
        assert_eq!(class_label(7), "class_7");
        assert_eq!(class_label(42), "class_42");
    }
}
