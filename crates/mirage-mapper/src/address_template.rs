//! Address template mapper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::props::{self, PropertyBag};
use mirage_core::{Attr, EntityId, ModelKind, ProviderId};
use mirage_state::{EntityRow, NewEntity, Store};

use crate::error::{MapperError, MapperResult};
use crate::{fetch_kind, save_row, Mapper};

/// A reusable network address shape. At least one of `allocation` and
/// `protocol` must be set before a template may be persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressTemplate {
    pub id: Option<EntityId>,
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub network: Option<String>,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    /// Allocation mode, e.g. "static" or "dynamic".
    pub allocation: Option<String>,
    pub default_gateway: Option<String>,
    pub dns: Option<String>,
    /// Address protocol, e.g. "IPv4".
    pub protocol: Option<String>,
    pub mask: Option<String>,
    pub properties: PropertyBag,
}

/// Mapper for `address_template` rows.
#[derive(Clone)]
pub struct AddressTemplateMapper {
    store: Store,
}

impl AddressTemplateMapper {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn from_row(row: EntityRow) -> MapperResult<AddressTemplate> {
        let properties = match row.properties.as_deref() {
            Some(blob) => props::decode(blob)?,
            None => PropertyBag::new(),
        };
        let attr = |a: Attr| row.attrs.get(&a).cloned();
        Ok(AddressTemplate {
            id: Some(row.id),
            provider_id: row.provider_id,
            name: row.name,
            description: row.description,
            network: attr(Attr::Network),
            ip: attr(Attr::Ip),
            hostname: attr(Attr::Hostname),
            allocation: attr(Attr::Allocation),
            default_gateway: attr(Attr::DefaultGateway),
            dns: attr(Attr::Dns),
            protocol: attr(Attr::Protocol),
            mask: attr(Attr::Mask),
            properties,
        })
    }

    fn to_new(template: &AddressTemplate) -> NewEntity {
        let mut attrs = BTreeMap::new();
        let mut put = |a: Attr, v: &Option<String>| {
            if let Some(v) = v {
                attrs.insert(a, v.clone());
            }
        };
        put(Attr::Network, &template.network);
        put(Attr::Ip, &template.ip);
        put(Attr::Hostname, &template.hostname);
        put(Attr::Allocation, &template.allocation);
        put(Attr::DefaultGateway, &template.default_gateway);
        put(Attr::Dns, &template.dns);
        put(Attr::Protocol, &template.protocol);
        put(Attr::Mask, &template.mask);
        NewEntity {
            name: template.name.clone(),
            description: template.description.clone(),
            properties: Some(props::encode(&template.properties)),
            attrs,
            ..Default::default()
        }
    }
}

impl Mapper for AddressTemplateMapper {
    type Object = AddressTemplate;

    fn kind(&self) -> ModelKind {
        ModelKind::AddressTemplate
    }

    fn load(&self, id: EntityId) -> MapperResult<AddressTemplate> {
        Self::from_row(fetch_kind(&self.store, id, self.kind())?)
    }

    fn save(&self, template: &AddressTemplate) -> MapperResult<EntityId> {
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

    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<AddressTemplate>> {
        self.store
            .query_entities(provider_id, Some(self.kind()), None)?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    fn validate(&self, template: &AddressTemplate) -> MapperResult<()> {
        if template.allocation.is_none() && template.protocol.is_none() {
            return Err(MapperError::Validation {
                fields: vec!["allocation", "protocol"],
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
        let mapper = AddressTemplateMapper::new(store.clone());

        let template = AddressTemplate {
            provider_id,
            name: Some("lan".to_string()),
            network: Some("10.0.0.0/24".to_string()),
            allocation: Some("dynamic".to_string()),
            default_gateway: Some("10.0.0.1".to_string()),
            dns: Some("10.0.0.53".to_string()),
            protocol: Some("IPv4".to_string()),
            mask: Some("255.255.255.0".to_string()),
            ..Default::default()
        };
        let id = mapper.save(&template).unwrap();
        let loaded = mapper.load(id).unwrap();

        assert_eq!(loaded.allocation.as_deref(), Some("dynamic"));
        assert_eq!(loaded.protocol.as_deref(), Some("IPv4"));
        assert_eq!(loaded.mask.as_deref(), Some("255.255.255.0"));
        assert!(loaded.ip.is_none());

        // only the network group is populated on the row
        let row = store.get_entity(id).unwrap().unwrap();
        assert!(row.attrs.keys().all(|a| a.group() == AttrGroup::Network));
    }

    #[test]
    fn allocation_or_protocol_is_required() {
        let (store, provider_id) = fixture();
        let mapper = AddressTemplateMapper::new(store.clone());

        let bare = AddressTemplate {
            provider_id,
            name: Some("lan".to_string()),
            ..Default::default()
        };
        match mapper.save(&bare) {
            Err(MapperError::Validation { fields }) => {
                assert_eq!(fields, vec!["allocation", "protocol"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.query_entities(provider_id, None, None).unwrap().is_empty());
    }

    #[test]
    fn one_of_allocation_and_protocol_suffices() {
        let (store, provider_id) = fixture();
        let mapper = AddressTemplateMapper::new(store);

        let only_allocation = AddressTemplate {
            provider_id,
            allocation: Some("static".to_string()),
            ..Default::default()
        };
        assert!(mapper.save(&only_allocation).is_ok());

        let only_protocol = AddressTemplate {
            provider_id,
            protocol: Some("IPv6".to_string()),
            ..Default::default()
        };
        assert!(mapper.save(&only_protocol).is_ok());
    }

    #[test]
    fn update_clears_dropped_fields() {
        let (store, provider_id) = fixture();
        let mapper = AddressTemplateMapper::new(store);

        let template = AddressTemplate {
            provider_id,
            allocation: Some("dynamic".to_string()),
            hostname: Some("node0".to_string()),
            ..Default::default()
        };
        let id = mapper.save(&template).unwrap();

        let mut loaded = mapper.load(id).unwrap();
        loaded.hostname = None;
        mapper.save(&loaded).unwrap();

        assert!(mapper.load(id).unwrap().hostname.is_none());
    }
}
