//! Physical names for resources declared without an explicit `name`

use uuid::Uuid;

/// Longest name the API accepts
pub const MAX_NAME_LEN: usize = 255;

const SUFFIX_LEN: usize = 7;

/// `<logical>-<7 hex chars>`, truncated so the result fits [`MAX_NAME_LEN`]
pub fn autoname(logical: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    let suffix = &hex[..SUFFIX_LEN];

    let budget = MAX_NAME_LEN - SUFFIX_LEN - 1;
    let base: String = logical.chars().take(budget).collect();
    format!("{}-{}", base, suffix)
}
