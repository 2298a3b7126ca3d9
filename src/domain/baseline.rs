//! Placeholder content shipped with the site before any user edit.

use super::content::ContentSnapshot;
use super::error::DomainError;

const BUILTIN_BASELINE: &str = include_str!("../../assets/default_content.json");

/// Parse a baseline snapshot from JSON text.
pub fn parse(text: &str) -> Result<ContentSnapshot, DomainError> {
    let snapshot: ContentSnapshot = serde_json::from_str(text)
        .map_err(|err| DomainError::validation(format!("baseline is not valid content: {err}")))?;
    if snapshot.is_empty() {
        return Err(DomainError::invariant("baseline contains no blocks"));
    }
    snapshot.validate()?;
    Ok(snapshot)
}

/// The baseline packaged with this crate.
pub fn builtin() -> Result<ContentSnapshot, DomainError> {
    parse(BUILTIN_BASELINE)
}
