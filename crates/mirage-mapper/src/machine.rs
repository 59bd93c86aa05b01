//! Machine mapper.
//!
//! A machine row backs one driver-native instance; the `backend` pair records
//! that mapping. Lifecycle state (running, stopped, …) is ordinary data in
//! the property bag, owned by the surrounding mock driver — there is no state
//! machine at this layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::props::{self, PropertyBag};
use mirage_core::{Attr, BackendRef, EntityId, ModelKind, ProviderId, ResourceRef};
use mirage_state::{EntityRow, NewEntity, Store};

use crate::error::{MapperError, MapperResult};
use crate::{fetch_kind, save_row, Mapper};

/// A provider-scoped compute instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Machine {
    pub id: Option<EntityId>,
    pub provider_id: ProviderId,
    /// Required; the driver always names a machine at launch.
    pub name: Option<String>,
    pub description: Option<String>,
    pub machine_config: Option<ResourceRef>,
    pub machine_image: Option<ResourceRef>,
    /// Identity of the driver-native object this machine maps to.
    pub backend: Option<BackendRef>,
    pub properties: PropertyBag,
}

/// Mapper for `machine` rows.
#[derive(Clone)]
pub struct MachineMapper {
    store: Store,
}

impl MachineMapper {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn from_row(row: EntityRow) -> MapperResult<Machine> {
        let properties = match row.properties.as_deref() {
            Some(blob) => props::decode(blob)?,
            None => PropertyBag::new(),
        };
        Ok(Machine {
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
            backend: row.backend,
            properties,
        })
    }

    fn to_new(machine: &Machine) -> NewEntity {
        let mut attrs = BTreeMap::new();
        if let Some(r) = &machine.machine_config {
            attrs.insert(Attr::MachineConfig, r.id.clone());
        }
        if let Some(r) = &machine.machine_image {
            attrs.insert(Attr::MachineImage, r.id.clone());
        }
        NewEntity {
            backend: machine.backend.clone(),
            name: machine.name.clone(),
            description: machine.description.clone(),
            properties: Some(props::encode(&machine.properties)),
            attrs,
        }
    }
}

impl Mapper for MachineMapper {
    type Object = Machine;

    fn kind(&self) -> ModelKind {
        ModelKind::Machine
    }

    fn load(&self, id: EntityId) -> MapperResult<Machine> {
        Self::from_row(fetch_kind(&self.store, id, self.kind())?)
    }

    fn save(&self, machine: &Machine) -> MapperResult<EntityId> {
        self.validate(machine)?;
        save_row(
            &self.store,
            self.kind(),
            machine.provider_id,
            machine.id,
            Self::to_new(machine),
        )
    }

    fn delete(&self, id: EntityId) -> MapperResult<()> {
        fetch_kind(&self.store, id, self.kind())?;
        self.store.delete_entity(id)?;
        Ok(())
    }

    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<Machine>> {
        self.store
            .query_entities(provider_id, Some(self.kind()), None)?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    fn validate(&self, machine: &Machine) -> MapperResult<()> {
        if machine.name.as_deref().is_none_or(str::is_empty) {
            return Err(MapperError::Validation { fields: vec!["name"] });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Store, ProviderId) {
        let store = Store::open_in_memory().unwrap();
        let provider = store.register_provider("mock", None).unwrap();
        (store, provider.id)
    }

    fn machine(provider_id: ProviderId, name: &str) -> Machine {
        Machine {
            provider_id,
            name: Some(name.to_string()),
            machine_image: Some(ResourceRef::new("3", ModelKind::MachineImage)),
            backend: Some(BackendRef::new("instance", format!("inst-{name}"))),
            properties: PropertyBag::from([("state".to_string(), "STARTED".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let (store, provider_id) = fixture();
        let mapper = MachineMapper::new(store);

        let id = mapper.save(&machine(provider_id, "web")).unwrap();
        let loaded = mapper.load(id).unwrap();

        assert_eq!(loaded.name.as_deref(), Some("web"));
        assert_eq!(loaded.backend, Some(BackendRef::new("instance", "inst-web")));
        assert_eq!(loaded.properties.get("state").map(String::as_str), Some("STARTED"));
        assert!(loaded.machine_config.is_none());
    }

    #[test]
    fn a_machine_must_be_named() {
        let (store, provider_id) = fixture();
        let mapper = MachineMapper::new(store.clone());

        for name in [None, Some(String::new())] {
            let m = Machine {
                provider_id,
                name,
                ..Default::default()
            };
            match mapper.save(&m) {
                Err(MapperError::Validation { fields }) => assert_eq!(fields, vec!["name"]),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
        assert!(store.query_entities(provider_id, None, None).unwrap().is_empty());
    }

    #[test]
    fn state_transitions_travel_through_the_property_bag() {
        let (store, provider_id) = fixture();
        let mapper = MachineMapper::new(store);

        let id = mapper.save(&machine(provider_id, "web")).unwrap();
        let mut m = mapper.load(id).unwrap();
        m.properties.insert("state".to_string(), "STOPPED".to_string());
        mapper.save(&m).unwrap();

        let again = mapper.load(id).unwrap();
        assert_eq!(again.properties.get("state").map(String::as_str), Some("STOPPED"));
    }

    #[test]
    fn list_returns_machines_in_id_order() {
        let (store, provider_id) = fixture();
        let mapper = MachineMapper::new(store);

        let a = mapper.save(&machine(provider_id, "a")).unwrap();
        let b = mapper.save(&machine(provider_id, "b")).unwrap();

        let ids: Vec<_> = mapper
            .list(provider_id)
            .unwrap()
            .iter()
            .filter_map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }
}
