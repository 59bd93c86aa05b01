//! Persisted row types and mutation payloads for the Mirage resource store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::{Attr, BackendRef, EntityId, ModelKind, ProviderId};

// ── Providers ──────────────────────────────────────────────────────

/// A registered cloud backend: driver identifier plus endpoint URL.
/// The scoping root for all entities. Never mutated after registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRow {
    pub id: ProviderId,
    pub driver: String,
    pub url: Option<String>,
}

impl ProviderRow {
    /// Natural key for the uniqueness index. An absent url indexes as "".
    pub fn natural_key(&self) -> (&str, &str) {
        (self.url.as_deref().unwrap_or(""), &self.driver)
    }
}

// ── Entities ───────────────────────────────────────────────────────

/// One row of the polymorphic entity table.
///
/// The kind-specific attribute set is sparse: which `attrs` keys are
/// meaningful for which model kind is the mappers' contract, not the
/// store's. Cross-entity references are carried as plain id strings inside
/// `attrs` and are never enforced here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRow {
    pub id: EntityId,
    pub provider_id: ProviderId,
    /// Unix timestamp (seconds) when the row was created.
    pub created_at: u64,
    /// Logical resource kind. Fixed at creation, never mutated.
    pub model: ModelKind,
    /// Identity of the backing driver-native object, if mapped.
    pub backend: Option<BackendRef>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Encoded property bag (see `mirage_core::props`).
    pub properties: Option<String>,
    pub attrs: BTreeMap<Attr, String>,
}

/// Column subset supplied when creating an entity. The store persists
/// whatever is given and leaves the rest unset; it does not check that the
/// attrs fit the model kind.
#[derive(Debug, Clone, Default)]
pub struct NewEntity {
    pub backend: Option<BackendRef>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub properties: Option<String>,
    pub attrs: BTreeMap<Attr, String>,
}

/// Partial update of an entity row: only supplied columns change.
///
/// An attr entry of `Some(v)` sets that attribute, `None` clears it; attrs
/// not mentioned are left alone. The model tag and creation timestamp are
/// not updatable.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    pub backend: Option<BackendRef>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub properties: Option<String>,
    pub attrs: BTreeMap<Attr, Option<String>>,
}

impl EntityUpdate {
    pub(crate) fn apply(self, row: &mut EntityRow) {
        if let Some(backend) = self.backend {
            row.backend = Some(backend);
        }
        if let Some(name) = self.name {
            row.name = Some(name);
        }
        if let Some(description) = self.description {
            row.description = Some(description);
        }
        if let Some(properties) = self.properties {
            row.properties = Some(properties);
        }
        for (attr, value) in self.attrs {
            match value {
                Some(v) => {
                    row.attrs.insert(attr, v);
                }
                None => {
                    row.attrs.remove(&attr);
                }
            }
        }
    }
}
