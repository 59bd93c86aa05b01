//! Volume configuration mapper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::props::{self, PropertyBag};
use mirage_core::{Attr, EntityId, ModelKind, ProviderId};
use mirage_state::{EntityRow, NewEntity, Store};

use crate::error::{MapperError, MapperResult};
use crate::{fetch_kind, save_row, Mapper};

/// Disk format applied when none is given.
const DEFAULT_FORMAT: &str = "raw";

/// The shape of a volume: format plus capacity. Capacity is required;
/// format defaults to `raw` on save.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeConfiguration {
    pub id: Option<EntityId>,
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,
    /// Capacity in bytes, carried as a decimal string.
    pub capacity: Option<String>,
    pub properties: PropertyBag,
}

/// Mapper for `volume_configuration` rows.
#[derive(Clone)]
pub struct VolumeConfigurationMapper {
    store: Store,
}

impl VolumeConfigurationMapper {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn from_row(row: EntityRow) -> MapperResult<VolumeConfiguration> {
        let properties = match row.properties.as_deref() {
            Some(blob) => props::decode(blob)?,
            None => PropertyBag::new(),
        };
        Ok(VolumeConfiguration {
            id: Some(row.id),
            provider_id: row.provider_id,
            name: row.name,
            description: row.description,
            format: row.attrs.get(&Attr::Format).cloned(),
            capacity: row.attrs.get(&Attr::Capacity).cloned(),
            properties,
        })
    }

    fn to_new(config: &VolumeConfiguration) -> NewEntity {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            Attr::Format,
            config
                .format
                .clone()
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        );
        if let Some(capacity) = &config.capacity {
            attrs.insert(Attr::Capacity, capacity.clone());
        }
        NewEntity {
            name: config.name.clone(),
            description: config.description.clone(),
            properties: Some(props::encode(&config.properties)),
            attrs,
            ..Default::default()
        }
    }
}

impl Mapper for VolumeConfigurationMapper {
    type Object = VolumeConfiguration;

    fn kind(&self) -> ModelKind {
        ModelKind::VolumeConfiguration
    }

    fn load(&self, id: EntityId) -> MapperResult<VolumeConfiguration> {
        Self::from_row(fetch_kind(&self.store, id, self.kind())?)
    }

    fn save(&self, config: &VolumeConfiguration) -> MapperResult<EntityId> {
        self.validate(config)?;
        save_row(
            &self.store,
            self.kind(),
            config.provider_id,
            config.id,
            Self::to_new(config),
        )
    }

    fn delete(&self, id: EntityId) -> MapperResult<()> {
        fetch_kind(&self.store, id, self.kind())?;
        self.store.delete_entity(id)?;
        Ok(())
    }

    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<VolumeConfiguration>> {
        self.store
            .query_entities(provider_id, Some(self.kind()), None)?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    fn validate(&self, config: &VolumeConfiguration) -> MapperResult<()> {
        if config.capacity.is_none() {
            return Err(MapperError::Validation {
                fields: vec!["capacity"],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_core::AttrGroup;

    fn fixture() -> (Store, ProviderId) {
        let store = Store::open_in_memory().unwrap();
        let provider = store.register_provider("mock", None).unwrap();
        (store, provider.id)
    }

    #[test]
    fn save_and_load_round_trip() {
        let (store, provider_id) = fixture();
        let mapper = VolumeConfigurationMapper::new(store.clone());

        let config = VolumeConfiguration {
            provider_id,
            name: Some("fast-ssd".to_string()),
            format: Some("qcow2".to_string()),
            capacity: Some("1073741824".to_string()),
            ..Default::default()
        };
        let id = mapper.save(&config).unwrap();
        let loaded = mapper.load(id).unwrap();

        assert_eq!(loaded.format.as_deref(), Some("qcow2"));
        assert_eq!(loaded.capacity.as_deref(), Some("1073741824"));

        let row = store.get_entity(id).unwrap().unwrap();
        assert!(row.attrs.keys().all(|a| a.group() == AttrGroup::VolumeShape));
    }

    #[test]
    fn format_defaults_to_raw() {
        let (store, provider_id) = fixture();
        let mapper = VolumeConfigurationMapper::new(store);

        let config = VolumeConfiguration {
            provider_id,
            capacity: Some("2147483648".to_string()),
            ..Default::default()
        };
        let id = mapper.save(&config).unwrap();

        assert_eq!(mapper.load(id).unwrap().format.as_deref(), Some("raw"));
    }

    #[test]
    fn capacity_is_required() {
        let (store, provider_id) = fixture();
        let mapper = VolumeConfigurationMapper::new(store.clone());

        let config = VolumeConfiguration {
            provider_id,
            format: Some("raw".to_string()),
            ..Default::default()
        };
        match mapper.save(&config) {
            Err(MapperError::Validation { fields }) => assert_eq!(fields, vec!["capacity"]),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.query_entities(provider_id, None, None).unwrap().is_empty());
    }
}
