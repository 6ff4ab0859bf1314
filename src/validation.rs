//! Validation module for capture wizard input
//!
//! Reusable validation functions for:
//!
//! - Barcode normalization
//! - Item names
//! - Categories
//! - Quantity labels

use crate::categories::is_known_category;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("Invalid whitespace regex pattern");
}

/// Longest item name the inventory accepts
pub const MAX_ITEM_NAME_LEN: usize = 255;
/// Longest quantity label the inventory accepts
pub const MAX_QUANTITY_LABEL_LEN: usize = 50;

/// Normalize a scanned barcode: trim it and strip every whitespace character
///
/// # Examples
/// ```
/// use stockpit_core::validation::normalize_barcode;
///
/// assert_eq!(normalize_barcode(" 8710 4000 1234 5 \n"), "8710400012345");
/// assert_eq!(normalize_barcode("   "), "");
/// ```
pub fn normalize_barcode(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), "").into_owned()
}

/// Validates an item name
///
/// # Returns
/// * `Ok(&str)` - The trimmed name if valid
/// * `Err(&str)` - Error type: "empty" or "too_long"
///
/// # Examples
/// ```
/// use stockpit_core::validation::validate_item_name;
///
/// assert_eq!(validate_item_name("  verse koriander "), Ok("verse koriander"));
/// assert_eq!(validate_item_name(""), Err("empty"));
/// assert_eq!(validate_item_name(&"a".repeat(256)), Err("too_long"));
/// ```
pub fn validate_item_name(name: &str) -> Result<&str, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_ITEM_NAME_LEN {
        return Err("too_long");
    }

    Ok(trimmed)
}

/// Validates a category slug chosen in the wizard
///
/// # Examples
/// ```
/// use stockpit_core::validation::validate_category;
///
/// assert_eq!(validate_category("dairy_eggs"), Ok("dairy_eggs"));
/// assert_eq!(validate_category(" "), Err("empty"));
/// assert_eq!(validate_category("rocks"), Err("unknown_category"));
/// ```
pub fn validate_category(category: &str) -> Result<&str, &'static str> {
    let trimmed = category.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if !is_known_category(trimmed) {
        return Err("unknown_category");
    }

    Ok(trimmed)
}

/// Validates a quantity label such as "500 g" or "pieces"
pub fn validate_quantity_label(label: &str) -> Result<&str, &'static str> {
    let trimmed = label.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_QUANTITY_LABEL_LEN {
        return Err("too_long");
    }

    Ok(trimmed)
}

/// Build the quantity label from the wizard's value and unit fields
///
/// # Examples
/// ```
/// use stockpit_core::validation::format_quantity_label;
///
/// assert_eq!(format_quantity_label("2", "pieces"), "2 pieces");
/// assert_eq!(format_quantity_label("  ", "pieces"), "pieces");
/// ```
pub fn format_quantity_label(value: &str, unit: &str) -> String {
    let value = value.trim();
    let unit = unit.trim();
    match (value.is_empty(), unit.is_empty()) {
        (true, _) => unit.to_string(),
        (false, true) => value.to_string(),
        (false, false) => format!("{} {}", value, unit),
    }
}
