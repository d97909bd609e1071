//! Student identity resolution across the two keys a reference may carry.
//!
//! Lookup order is fixed: identifier first, display name second. A value in
//! the name slot that has the hyphenated UUID shape is tried as an identifier
//! before it is compared as a name; that heuristic lives only in
//! [`lookup_order`].

use uuid::Uuid;

use super::domain::{Student, StudentId, StudentRef};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("student reference carries neither an id nor a name")]
    EmptyReference,
    #[error("no student matches '{0}'")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupKey<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// `true` for the canonical 8-4-4-4-12 hexadecimal form only.
pub fn looks_like_uuid(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() == 36 && Uuid::try_parse(trimmed).is_ok()
}

pub(crate) fn lookup_order(reference: &StudentRef) -> Vec<LookupKey<'_>> {
    let mut keys = Vec::with_capacity(3);

    if let Some(id) = reference.id.as_ref().map(|id| id.0.trim()) {
        if !id.is_empty() {
            keys.push(LookupKey::Id(id));
        }
    }

    if let Some(name) = reference.name.as_deref().map(str::trim) {
        if !name.is_empty() {
            if looks_like_uuid(name) && !keys.contains(&LookupKey::Id(name)) {
                keys.push(LookupKey::Id(name));
            }
            keys.push(LookupKey::Name(name));
        }
    }

    keys
}

fn matches(student: &Student, key: LookupKey<'_>) -> bool {
    match key {
        LookupKey::Id(id) => student.id.as_ref().is_some_and(|own| own.0.trim() == id),
        LookupKey::Name(name) => student.display_name() == name,
    }
}

/// Position of the canonical record for `reference` inside `candidates`.
pub fn resolve_position(
    reference: &StudentRef,
    candidates: &[Student],
) -> Result<usize, IdentityError> {
    let keys = lookup_order(reference);
    if keys.is_empty() {
        return Err(IdentityError::EmptyReference);
    }

    keys.into_iter()
        .find_map(|key| candidates.iter().position(|student| matches(student, key)))
        .ok_or_else(|| IdentityError::NotFound(reference.label()))
}

pub fn resolve_student<'a>(
    reference: &StudentRef,
    candidates: &'a [Student],
) -> Result<&'a Student, IdentityError> {
    resolve_position(reference, candidates).map(|index| &candidates[index])
}

/// Same preference order as [`resolve_student`], driven by point lookups
/// against a store instead of an in-memory snapshot.
pub fn resolve_via<E, I, N>(
    reference: &StudentRef,
    mut by_id: I,
    mut by_name: N,
) -> Result<Option<Student>, E>
where
    I: FnMut(&StudentId) -> Result<Option<Student>, E>,
    N: FnMut(&str) -> Result<Option<Student>, E>,
{
    for key in lookup_order(reference) {
        let found = match key {
            LookupKey::Id(id) => by_id(&StudentId(id.to_string()))?,
            LookupKey::Name(name) => by_name(name)?,
        };
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}
