//! Inventory category catalogue.

/// Slug used when nothing better is known
pub const DEFAULT_CATEGORY: &str = "pantry";

/// Every category an inventory item can carry, with its display label
pub const CATEGORY_OPTIONS: [(&str, &str); 14] = [
    ("fresh_produce", "Fresh Produce"),
    ("dairy_eggs", "Dairy & Eggs"),
    ("proteins", "Proteins"),
    ("seafood", "Seafood"),
    ("bakery", "Bakery"),
    ("pantry", "Pantry Staples"),
    ("spices_condiments", "Spices & Condiments"),
    ("frozen", "Frozen"),
    ("ready_meals", "Ready Meals"),
    ("beverages", "Beverages"),
    ("snacks", "Snacks & Treats"),
    ("baby", "Baby"),
    ("personal_care", "Personal Care"),
    ("household", "Household"),
];

/// Display label for a category slug. Unknown or missing slugs read as pantry staples.
pub fn category_label(category: Option<&str>) -> &'static str {
    category
        .and_then(|slug| {
            CATEGORY_OPTIONS
                .iter()
                .find(|(id, _)| *id == slug)
                .map(|(_, label)| *label)
        })
        .unwrap_or("Pantry Staples")
}

pub fn is_known_category(slug: &str) -> bool {
    CATEGORY_OPTIONS.iter().any(|(id, _)| *id == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_label() {
        assert_eq!(category_label(Some("dairy_eggs")), "Dairy & Eggs");
        assert_eq!(category_label(Some("unknown")), "Pantry Staples");
        assert_eq!(category_label(None), "Pantry Staples");
    }

    #[test]
    fn test_default_category_is_known() {
        assert!(is_known_category(DEFAULT_CATEGORY));
        assert!(!is_known_category("fruit"));
    }
}
