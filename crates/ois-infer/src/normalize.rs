//! Header text normalization.

/// Normalize a header for comparison: lowercase, separators to spaces,
/// collapsed whitespace. Idempotent.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-', '.', '/', '\\', ':', '#'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_separators_and_case() {
        assert_eq!(normalize_header("  Item_Code "), "item code");
        assert_eq!(normalize_header("Unit-Price"), "unit price");
        assert_eq!(normalize_header("QTY"), "qty");
        assert_eq!(normalize_header("Item   No."), "item no");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in ".{0,64}") {
            let once = normalize_header(&raw);
            prop_assert_eq!(normalize_header(&once), once);
        }
    }
}
