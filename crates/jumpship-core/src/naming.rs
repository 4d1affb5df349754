//! Endpoint name derivation.
//!
//! Names are a sanitized base followed by a millisecond UTC timestamp, so two
//! deployments of the same model never collide while a given base and instant
//! always produce the same name.

use chrono::{DateTime, Utc};

use crate::types::{EndpointName, ModelId};

/// Length of the timestamp suffix, `YYYY-MM-DD-HH-MM-SS-mmm`.
pub const TIMESTAMP_LEN: usize = 23;

const FALLBACK_BASE: &str = "endpoint";

/// Format a timestamp the way endpoint names carry it.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H-%M-%S-%3f").to_string()
}

/// Reduce an arbitrary string to characters allowed in endpoint names.
///
/// Disallowed characters become hyphens and leading/trailing hyphens are
/// dropped. An input with nothing usable left becomes `endpoint`.
#[must_use]
pub fn sanitize_base(base: &str) -> String {
    let mapped: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = mapped.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_BASE.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Append a timestamp to `base`, trimming the base so the result fits in
/// [`EndpointName::MAX_LEN`] characters.
#[must_use]
pub fn name_from_base(base: &str, at: DateTime<Utc>) -> EndpointName {
    let base = sanitize_base(base);
    let keep = EndpointName::MAX_LEN - TIMESTAMP_LEN - 1;
    let trimmed = base[..base.len().min(keep)].trim_end_matches('-');

    EndpointName::from_sanitized(format!("{trimmed}-{}", timestamp(at)))
}

/// Endpoint name for deploying `model_id` under `prefix`.
#[must_use]
pub fn endpoint_name(prefix: &str, model_id: &ModelId, at: DateTime<Utc>) -> EndpointName {
    name_from_base(&format!("{prefix}-{model_id}"), at)
}
