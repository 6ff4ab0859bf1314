//! # Ingredient Normalization
//!
//! Recipe collaborators hand ingredients over in loose shapes: sometimes a plain
//! text line ("200g bloem"), sometimes an object with `name`, `quantity` and
//! `unit`, and quantities arrive as numbers or strings. This module turns all of
//! them into [`IngredientRequirement`] values at the boundary so the resolver only
//! ever sees one canonical shape.

use crate::errors::AppResult;
use crate::model::IngredientRequirement;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    /// "2 eetlepels olijfolie", "200g bloem", "1,5 liter melk"
    static ref QUANTITY_UNIT_NAME: Regex = Regex::new(
        r"(?i)^(\d+(?:[.,]\d+)?)\s*(eetlepels?|theelepels?|kopjes?|cups?|kilogram|gram|liter|stuks|st|el|tl|ml|dl|cl|kg|g|l)\s+(.+)$"
    )
    .expect("Invalid quantity/unit regex pattern");
    /// "2 uien"
    static ref QUANTITY_NAME: Regex =
        Regex::new(r"^(\d+(?:[.,]\d+)?)\s+(.+)$").expect("Invalid quantity regex pattern");
}

/// Quantity as collaborators send it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
}

impl RawQuantity {
    fn normalized(&self) -> Option<String> {
        match self {
            RawQuantity::Number(value) if value.fract() == 0.0 => Some(format!("{}", *value as i64)),
            RawQuantity::Number(value) => Some(value.to_string()),
            RawQuantity::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.replace(',', "."))
                }
            }
        }
    }
}

/// One ingredient entry as received from a recipe collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawIngredient {
    TextLine(String),
    Structured {
        name: String,
        #[serde(default)]
        quantity: Option<RawQuantity>,
        #[serde(default)]
        unit: Option<String>,
    },
}

/// Parse a free-text ingredient line. Lines shorter than two characters are noise.
pub fn parse_ingredient_line(line: &str) -> Option<IngredientRequirement> {
    let line = line.trim();
    if line.chars().count() < 2 {
        return None;
    }

    if let Some(caps) = QUANTITY_UNIT_NAME.captures(line) {
        return Some(IngredientRequirement {
            name: caps[3].trim().to_string(),
            quantity: Some(caps[1].replace(',', ".")),
            unit: Some(caps[2].to_string()),
        });
    }

    if let Some(caps) = QUANTITY_NAME.captures(line) {
        return Some(IngredientRequirement {
            name: caps[2].trim().to_string(),
            quantity: Some(caps[1].replace(',', ".")),
            unit: None,
        });
    }

    Some(IngredientRequirement::named(line))
}

/// Convert a single raw entry. Entries without a usable name are dropped.
pub fn normalize_ingredient(raw: &RawIngredient) -> Option<IngredientRequirement> {
    match raw {
        RawIngredient::TextLine(line) => parse_ingredient_line(line),
        RawIngredient::Structured {
            name,
            quantity,
            unit,
        } => {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(IngredientRequirement {
                name: name.to_string(),
                quantity: quantity.as_ref().and_then(RawQuantity::normalized),
                unit: unit
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string),
            })
        }
    }
}

/// Normalize a full ingredient list, preserving display order
pub fn normalize_ingredients(raw: &[RawIngredient]) -> Vec<IngredientRequirement> {
    let requirements: Vec<IngredientRequirement> =
        raw.iter().filter_map(normalize_ingredient).collect();
    debug!(
        received = raw.len(),
        kept = requirements.len(),
        "Normalized recipe ingredients"
    );
    requirements
}

/// Parse a JSON array of mixed text lines and objects
pub fn parse_ingredients_json(json: &str) -> AppResult<Vec<IngredientRequirement>> {
    let raw: Vec<RawIngredient> = serde_json::from_str(json)?;
    Ok(normalize_ingredients(&raw))
}

/// Render a requirement the way recipe cards show it: "quantity unit name"
pub fn display_line(requirement: &IngredientRequirement) -> String {
    [
        requirement.quantity.as_deref(),
        requirement.unit.as_deref(),
        Some(requirement.name.as_str()),
    ]
    .iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
}
