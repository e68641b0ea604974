use super::Identity;
use crate::error::ApiError;

/// Folds a subject (account email) to the form used for storage and comparison.
pub fn normalize_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// The one comparison used for subjects everywhere: ownership, `/mine`, and email
/// uniqueness. Mirrors `LOWER(a) = LOWER(b)` on the Postgres side.
pub fn same_subject(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// can_edit
///
/// Ownership rule: the caller may edit a resource iff its subject equals the recorded owner,
/// compared case-insensitively. A missing or empty caller subject never owns anything.
pub fn can_edit(owner: &str, caller: Option<&str>) -> bool {
    match caller {
        Some(subject) if !subject.is_empty() => same_subject(owner, subject),
        _ => false,
    }
}

/// Guard evaluated before every update/delete. A non-owner gets `Forbidden`, which is
/// distinct from the 401 an anonymous caller gets.
pub fn ensure_can_edit(owner: &str, caller: &Identity) -> Result<(), ApiError> {
    if can_edit(owner, Some(&caller.subject)) {
        Ok(())
    } else {
        tracing::info!(caller = %caller.subject, "mutation refused: caller is not the owner");
        Err(ApiError::Forbidden("Forbidden: not the owner".to_string()))
    }
}

/// Visibility rule for route geometry: shown when the route is public or the viewer owns it.
pub fn include_geometry(is_public: bool, can_edit: bool) -> bool {
    is_public || can_edit
}
