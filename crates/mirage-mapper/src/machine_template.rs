//! Machine template mapper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::props::{self, PropertyBag};
use mirage_core::{Attr, EntityId, ModelKind, ProviderId, ResourceRef};
use mirage_state::{EntityRow, NewEntity, Store};

use crate::error::{MapperError, MapperResult};
use crate::{fetch_kind, save_row, Mapper};

/// A reusable machine shape: which configuration to apply to which image.
/// Both references are required before a template may be persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineTemplate {
    pub id: Option<EntityId>,
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub machine_config: Option<ResourceRef>,
    pub machine_image: Option<ResourceRef>,
    pub properties: PropertyBag,
}

/// Mapper for `machine_template` rows.
#[derive(Clone)]
pub struct MachineTemplateMapper {
    store: Store,
}

impl MachineTemplateMapper {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn from_row(row: EntityRow) -> MapperResult<MachineTemplate> {
        let properties = match row.properties.as_deref() {
            Some(blob) => props::decode(blob)?,
            None => PropertyBag::new(),
        };
        Ok(MachineTemplate {
            id: Some(row.id),
            provider_id: row.provider_id,
            name: row.name,
            description: row.description,
            machine_config: row
                .attrs
                .get(&Attr::MachineConfig)
                .map(|id| ResourceRef::new(id, ModelKind::MachineConfiguration)),
            machine_image: row
                .attrs
                .get(&Attr::MachineImage)
                .map(|id| ResourceRef::new(id, ModelKind::MachineImage)),
            properties,
        })
    }

    fn to_new(template: &MachineTemplate) -> NewEntity {
        let mut attrs = BTreeMap::new();
        if let Some(r) = &template.machine_config {
            attrs.insert(Attr::MachineConfig, r.id.clone());
        }
        if let Some(r) = &template.machine_image {
            attrs.insert(Attr::MachineImage, r.id.clone());
        }
        NewEntity {
            name: template.name.clone(),
            description: template.description.clone(),
            properties: Some(props::encode(&template.properties)),
            attrs,
            ..Default::default()
        }
    }
}

impl Mapper for MachineTemplateMapper {
    type Object = MachineTemplate;

    fn kind(&self) -> ModelKind {
        ModelKind::MachineTemplate
    }

    fn load(&self, id: EntityId) -> MapperResult<MachineTemplate> {
        Self::from_row(fetch_kind(&self.store, id, self.kind())?)
    }

    fn save(&self, template: &MachineTemplate) -> MapperResult<EntityId> {
        self.validate(template)?;
        save_row(
            &self.store,
            self.kind(),
            template.provider_id,
            template.id,
            Self::to_new(template),
        )
    }

    fn delete(&self, id: EntityId) -> MapperResult<()> {
        fetch_kind(&self.store, id, self.kind())?;
        self.store.delete_entity(id)?;
        Ok(())
    }

    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<MachineTemplate>> {
        self.store
            .query_entities(provider_id, Some(self.kind()), None)?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    fn validate(&self, template: &MachineTemplate) -> MapperResult<()> {
        let mut fields = Vec::new();
        if template.machine_config.is_none() {
            fields.push("machine_config");
        }
        if template.machine_image.is_none() {
            fields.push("machine_image");
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(MapperError::Validation { fields })
        }
    }
}
