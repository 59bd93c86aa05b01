//! mirage-mapper — typed access to the polymorphic entity table.
//!
//! Each mapper owns one model kind and the fixed slice of the sparse
//! attribute set that belongs to it. It validates kind-specific required
//! fields before any write, checks the model tag on every read, and
//! otherwise delegates to [`mirage_state::Store`]. The store handle is
//! passed in explicitly; mappers hold a cheap clone of it.

pub mod address_template;
pub mod error;
pub mod machine;
pub mod machine_template;
pub mod volume_configuration;
pub mod volume_template;

pub use address_template::{AddressTemplate, AddressTemplateMapper};
pub use error::{MapperError, MapperResult};
pub use machine::{Machine, MachineMapper};
pub use machine_template::{MachineTemplate, MachineTemplateMapper};
pub use volume_configuration::{VolumeConfiguration, VolumeConfigurationMapper};
pub use volume_template::{VolumeTemplate, VolumeTemplateMapper};

use std::collections::BTreeMap;

use tracing::debug;

use mirage_core::{Attr, EntityId, ModelKind, ProviderId, ResourceRef};
use mirage_state::{EntityRow, EntityUpdate, NewEntity, Store};

/// Shared capability set of every domain mapper.
pub trait Mapper {
    type Object;

    /// The model tag this mapper owns.
    fn kind(&self) -> ModelKind;

    /// Read a typed object by entity id. Fails with `TypeMismatch` if the
    /// row was minted under another kind.
    fn load(&self, id: EntityId) -> MapperResult<Self::Object>;

    /// Validate, then persist. Returns the entity id. Nothing is written
    /// when validation fails.
    fn save(&self, object: &Self::Object) -> MapperResult<EntityId>;

    /// Kind-checked hard delete.
    fn delete(&self, id: EntityId) -> MapperResult<()>;

    /// All objects of this kind under one provider, id-ascending.
    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<Self::Object>>;

    /// Check kind-specific required fields without touching the store.
    fn validate(&self, object: &Self::Object) -> MapperResult<()>;
}

/// Resolve a weak reference to its entity row.
///
/// A dangling or unparsable id is `NotFound`; a referent minted under a
/// different kind than the reference expects is `TypeMismatch`.
pub fn resolve(store: &Store, reference: &ResourceRef) -> MapperResult<EntityRow> {
    let id = reference
        .entity_id()
        .ok_or_else(|| MapperError::NotFound(format!("entity {}", reference.id)))?;
    fetch_kind(store, id, reference.kind)
}

/// Fetch a row and insist it carries the expected model tag.
pub(crate) fn fetch_kind(
    store: &Store,
    id: EntityId,
    expected: ModelKind,
) -> MapperResult<EntityRow> {
    let row = store
        .get_entity(id)?
        .ok_or_else(|| MapperError::NotFound(format!("entity {id}")))?;
    if row.model != expected {
        return Err(MapperError::TypeMismatch {
            id,
            expected,
            actual: row.model,
        });
    }
    Ok(row)
}

/// Persist a validated object: update in place when the id resolves to a row
/// of the mapper's own kind, create a fresh row otherwise.
///
/// Model tags are immutable, so a kind clash on save never rewrites the
/// stored tag; it targets creation of a new entity instead.
pub(crate) fn save_row(
    store: &Store,
    kind: ModelKind,
    provider_id: ProviderId,
    id: Option<EntityId>,
    new: NewEntity,
) -> MapperResult<EntityId> {
    if let Some(id) = id {
        if let Some(row) = store.get_entity(id)? {
            if row.model == kind {
                let mut attrs: BTreeMap<Attr, Option<String>> = BTreeMap::new();
                // Touch every attr the kind owns, so attrs the object no
                // longer carries are cleared. Foreign groups stay untouched.
                for group in kind.groups() {
                    for attr in group.members() {
                        attrs.insert(*attr, new.attrs.get(attr).cloned());
                    }
                }
                store.update_entity(
                    id,
                    EntityUpdate {
                        backend: new.backend,
                        name: new.name,
                        description: new.description,
                        properties: new.properties,
                        attrs,
                    },
                )?;
                debug!(id, model = %kind, "entity updated in place");
                return Ok(id);
            }
        }
    }
    let id = store.create_entity(provider_id, kind, new)?;
    Ok(id)
}
