//! Per-request permission outcomes.
//!
//! A [`ResultSet`] tracks one outcome per requested permission. Its key set
//! is fixed when the request is created; later updates only ever overwrite
//! outcomes for permissions it already tracks.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use serde::ser::SerializeMap;

use crate::host::HostBridge;
use crate::permission::{Permission, dedup_permissions};

/// Outcome of a single permission within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// No answer yet. Treated as "not granted" by every boolean query.
    #[default]
    Unresolved,
    /// The host granted the permission.
    Granted,
    /// The host denied the permission.
    Denied,
}

impl Outcome {
    /// Map a host boolean onto an outcome.
    pub const fn from_granted(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Denied }
    }

    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// The outcome of one logical permission request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    /// Outcomes in creation order. Keys never change after construction.
    entries: Vec<(Permission, Outcome)>,
}

impl ResultSet {
    /// Create a result set tracking `permissions`, all unresolved.
    ///
    /// Duplicate names collapse into a single entry.
    pub fn new<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        let entries = dedup_permissions(permissions)
            .into_iter()
            .map(|p| (p, Outcome::Unresolved))
            .collect();
        Self { entries }
    }

    /// Mark the given permissions as granted. Unknown permissions are ignored.
    pub fn mark_granted<'a, I>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = &'a Permission>,
    {
        for permission in permissions {
            if let Some(outcome) = self.outcome_mut(permission) {
                *outcome = Outcome::Granted;
            }
        }
    }

    /// Overwrite outcomes from a host result. Permissions this set does not
    /// track are ignored; tracked permissions not mentioned keep their value.
    pub fn apply_host_result<'a, I>(&mut self, results: I)
    where
        I: IntoIterator<Item = (&'a Permission, bool)>,
    {
        for (permission, granted) in results {
            if let Some(outcome) = self.outcome_mut(permission) {
                *outcome = Outcome::from_granted(granted);
            }
        }
    }

    /// Whether `permission` was granted. False for permissions not tracked here.
    pub fn is_granted(&self, permission: &Permission) -> bool {
        self.outcome(permission).is_some_and(Outcome::is_granted)
    }

    /// Whether `permission` was explicitly denied by the host.
    pub fn is_denied(&self, permission: &Permission) -> bool {
        self.outcome(permission) == Some(Outcome::Denied)
    }

    /// The tri-state outcome for `permission`, if tracked.
    pub fn outcome(&self, permission: &Permission) -> Option<Outcome> {
        self.entries
            .iter()
            .find(|(p, _)| p == permission)
            .map(|(_, o)| *o)
    }

    /// True iff every tracked permission is granted. Vacuously true when empty.
    pub fn all_granted(&self) -> bool {
        self.entries.iter().all(|(_, o)| o.is_granted())
    }

    /// True when no tracked permission is still unresolved.
    pub fn is_fully_resolved(&self) -> bool {
        self.entries.iter().all(|(_, o)| *o != Outcome::Unresolved)
    }

    /// Permissions not currently granted, in creation order.
    pub fn ungranted(&self) -> Vec<Permission> {
        self.entries
            .iter()
            .filter(|(_, o)| !o.is_granted())
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Ungranted permissions for which the host recommends a rationale.
    pub fn permissions_needing_rationale<H: HostBridge>(
        &self,
        host: &H,
        context: &H::Context,
    ) -> Vec<Permission> {
        self.ungranted()
            .into_iter()
            .filter(|p| host.needs_rationale(context, p))
            .collect()
    }

    /// True iff every permission in `other.ungranted()` is a tracked key of
    /// this set. Grant status on this side is not considered.
    pub fn superset_of_ungranted(&self, other: &Self) -> bool {
        other
            .entries
            .iter()
            .filter(|(_, o)| !o.is_granted())
            .all(|(p, _)| self.contains(p))
    }

    /// Copy outcomes for each of this set's ungranted permissions out of a
    /// resolved set. Permissions the resolved set does not track stay as-is.
    pub fn copy_ungranted_from(&mut self, resolved: &Self) {
        for (permission, outcome) in &mut self.entries {
            if outcome.is_granted() {
                continue;
            }
            if let Some(source) = resolved.outcome(permission) {
                *outcome = source;
            }
        }
    }

    /// Whether this set tracks `permission`.
    pub fn contains(&self, permission: &Permission) -> bool {
        self.entries.iter().any(|(p, _)| p == permission)
    }

    /// Tracked permissions in creation order.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Iterate `(permission, outcome)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (&Permission, Outcome)> {
        self.entries.iter().map(|(p, o)| (p, *o))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A plain map view: `true` for granted, `false` otherwise.
    pub fn to_map(&self) -> HashMap<Permission, bool> {
        self.entries
            .iter()
            .map(|(p, o)| (p.clone(), o.is_granted()))
            .collect()
    }

    fn outcome_mut(&mut self, permission: &Permission) -> Option<&mut Outcome> {
        self.entries
            .iter_mut()
            .find(|(p, _)| p == permission)
            .map(|(_, o)| o)
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (permission, outcome) in &self.entries {
            map.serialize_entry(permission.as_str(), outcome)?;
        }
        map.end()
    }
}
