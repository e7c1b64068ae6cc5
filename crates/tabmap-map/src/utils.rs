//! Text normalization shared by the matchers.

/// Lower-cases and strips everything that is not alphanumeric, so that
/// `"Brand Name"`, `"brand_name"` and `"BRAND-NAME"` compare equal.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lower-cases and collapses separators to single spaces. Used for fuzzy
/// scoring, where word boundaries still matter.
pub fn normalize_text(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-', '.', '/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalization_ignores_separators_and_case() {
        assert_eq!(normalize_key("Brand Name"), "brandname");
        assert_eq!(normalize_key("brand_name"), "brandname");
        assert_eq!(normalize_key(" BRAND-NAME! "), "brandname");
        assert_eq!(normalize_key("--"), "");
    }

    #[test]
    fn text_normalization_keeps_word_boundaries() {
        assert_eq!(normalize_text("  Seller_SKU / id "), "seller sku id");
    }
}
