//! Permission identifiers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An opaque, named capability granted by the host authority.
///
/// Compared by exact string equality. No ordering is implied between
/// permissions; collections of them are treated as sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Permission(Arc<str>);

impl Permission {
    /// Create a permission from its host-namespace name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The permission's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Permission {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.as_str().to_owned()
    }
}

impl From<&Self> for Permission {
    fn from(permission: &Self) -> Self {
        permission.clone()
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collect permissions from any iterable of names, dropping duplicates while
/// keeping first-seen order.
pub fn dedup_permissions<I, P>(permissions: I) -> Vec<Permission>
where
    I: IntoIterator<Item = P>,
    P: Into<Permission>,
{
    let mut out: Vec<Permission> = Vec::new();
    for permission in permissions {
        let permission = permission.into();
        if !out.contains(&permission) {
            out.push(permission);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_name() {
        assert_eq!(Permission::new("CAMERA"), Permission::from("CAMERA"));
        assert_ne!(Permission::new("CAMERA"), Permission::new("camera"));
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let perms = dedup_permissions(["CAMERA", "CONTACTS", "CAMERA", "CALENDAR"]);
        let names: Vec<&str> = perms.iter().map(Permission::as_str).collect();
        assert_eq!(names, vec!["CAMERA", "CONTACTS", "CALENDAR"]);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Permission::new("CAMERA")).unwrap_or_default();
        assert_eq!(json, "\"CAMERA\"");
    }

    #[test]
    fn deserializes_from_plain_string() {
        let perms: Vec<Permission> =
            serde_json::from_str(r#"["CAMERA","SMS"]"#).unwrap_or_default();
        assert_eq!(perms, vec![Permission::new("CAMERA"), Permission::new("SMS")]);
    }
}
