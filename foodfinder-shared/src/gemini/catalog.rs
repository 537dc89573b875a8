use std::collections::HashSet;

use super::types::ListModelsResponse;

/// Listed model names tried first, cheapest and fastest ahead.
pub const DEFAULT_PREFERRED_MODELS: &[&str] = &[
    "models/gemini-2.0-flash-lite",
    "models/gemini-2.0-flash",
    "models/gemini-1.5-flash",
    "models/gemini-1.5-pro",
    "models/gemini-1.0-pro",
];

/// Model names tried blindly when discovery fails.
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-1.0-pro",
];

const MODEL_PREFIX: &str = "models/";

/// Orders the `generateContent`-capable models of a listing.
///
/// Preferred names that were listed come first in preferred order, then the
/// remaining candidates in listing order. Duplicates keep their first position.
#[must_use]
pub fn ordered_models_from_list(listing: &ListModelsResponse, preferred: &[String]) -> Vec<String> {
    let candidates: Vec<&str> = listing
        .models
        .iter()
        .filter(|model| model.supports_generate_content())
        .filter_map(|model| model.name.as_deref())
        .filter(|name| !name.is_empty())
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let preferred_present = preferred
        .iter()
        .map(String::as_str)
        .filter(|name| candidates.contains(name));
    let others = candidates
        .iter()
        .copied()
        .filter(|name| !preferred.iter().any(|p| p == name));

    let mut seen = HashSet::new();
    preferred_present
        .chain(others)
        .filter(|name| seen.insert(*name))
        .map(ToString::to_string)
        .collect()
}

/// Strips the `models/` resource prefix.
#[must_use]
pub fn normalize_model_name(name: &str) -> &str {
    name.strip_prefix(MODEL_PREFIX).unwrap_or(name)
}
