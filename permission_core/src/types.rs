use std::collections::{BTreeMap, BTreeSet};

/// Ordered, de-duplicated set of platform permission identifiers
pub type PermissionSet = BTreeSet<String>;

/// Per-identifier answer yielded by the platform authorization primitive
pub type AuthorizationResponse = BTreeMap<String, bool>;

/// Build a [`PermissionSet`] from anything that yields string-like items
pub fn permission_set<I, S>(identifiers: I) -> PermissionSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    identifiers.into_iter().map(Into::into).collect()
}
