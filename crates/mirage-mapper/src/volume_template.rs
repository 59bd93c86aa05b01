//! Volume template mapper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mirage_core::props::{self, PropertyBag};
use mirage_core::{Attr, EntityId, ModelKind, ProviderId, ResourceRef};
use mirage_state::{EntityRow, NewEntity, Store};

use crate::error::{MapperError, MapperResult};
use crate::{fetch_kind, save_row, Mapper};

/// A reusable volume shape: which configuration to realize, optionally from
/// an image. The configuration reference is required.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeTemplate {
    pub id: Option<EntityId>,
    pub provider_id: ProviderId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub volume_config: Option<ResourceRef>,
    pub volume_image: Option<ResourceRef>,
    pub properties: PropertyBag,
}

/// Mapper for `volume_template` rows.
#[derive(Clone)]
pub struct VolumeTemplateMapper {
    store: Store,
}

impl VolumeTemplateMapper {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn from_row(row: EntityRow) -> MapperResult<VolumeTemplate> {
        let properties = match row.properties.as_deref() {
            Some(blob) => props::decode(blob)?,
            None => PropertyBag::new(),
        };
        Ok(VolumeTemplate {
            id: Some(row.id),
            provider_id: row.provider_id,
            name: row.name,
            description: row.description,
            volume_config: row
                .attrs
                .get(&Attr::VolumeConfig)
                .map(|id| ResourceRef::new(id, ModelKind::VolumeConfiguration)),
            volume_image: row
                .attrs
                .get(&Attr::VolumeImage)
                .map(|id| ResourceRef::new(id, ModelKind::VolumeImage)),
            properties,
        })
    }

    fn to_new(template: &VolumeTemplate) -> NewEntity {
        let mut attrs = BTreeMap::new();
        if let Some(r) = &template.volume_config {
            attrs.insert(Attr::VolumeConfig, r.id.clone());
        }
        if let Some(r) = &template.volume_image {
            attrs.insert(Attr::VolumeImage, r.id.clone());
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

impl Mapper for VolumeTemplateMapper {
    type Object = VolumeTemplate;

    fn kind(&self) -> ModelKind {
        ModelKind::VolumeTemplate
    }

    fn load(&self, id: EntityId) -> MapperResult<VolumeTemplate> {
        Self::from_row(fetch_kind(&self.store, id, self.kind())?)
    }

    fn save(&self, template: &VolumeTemplate) -> MapperResult<EntityId> {
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

    fn list(&self, provider_id: ProviderId) -> MapperResult<Vec<VolumeTemplate>> {
        self.store
            .query_entities(provider_id, Some(self.kind()), None)?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    fn validate(&self, template: &VolumeTemplate) -> MapperResult<()> {
        if template.volume_config.is_none() {
            return Err(MapperError::Validation {
                fields: vec!["volume_config"],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume_configuration::{VolumeConfiguration, VolumeConfigurationMapper};
    use crate::{resolve, Mapper};

    fn fixture() -> (Store, ProviderId) {
        let store = Store::open_in_memory().unwrap();
        let provider = store.register_provider("mock", None).unwrap();
        (store, provider.id)
    }

    #[test]
    fn save_and_load_round_trip() {
        let (store, provider_id) = fixture();
        let mapper = VolumeTemplateMapper::new(store);

        let template = VolumeTemplate {
            provider_id,
            name: Some("scratch".to_string()),
            volume_config: Some(ResourceRef::new("5", ModelKind::VolumeConfiguration)),
            ..Default::default()
        };
        let id = mapper.save(&template).unwrap();
        let loaded = mapper.load(id).unwrap();

        assert_eq!(
            loaded.volume_config,
            Some(ResourceRef::new("5", ModelKind::VolumeConfiguration))
        );
        assert!(loaded.volume_image.is_none());
    }

    #[test]
    fn volume_config_reference_is_required() {
        let (store, provider_id) = fixture();
        let mapper = VolumeTemplateMapper::new(store.clone());

        let bare = VolumeTemplate {
            provider_id,
            volume_image: Some(ResourceRef::new("9", ModelKind::VolumeImage)),
            ..Default::default()
        };
        match mapper.save(&bare) {
            Err(MapperError::Validation { fields }) => {
                assert_eq!(fields, vec!["volume_config"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.query_entities(provider_id, None, None).unwrap().is_empty());
    }

    #[test]
    fn template_reference_resolves_to_a_saved_configuration() {
        let (store, provider_id) = fixture();
        let configs = VolumeConfigurationMapper::new(store.clone());
        let templates = VolumeTemplateMapper::new(store.clone());

        let config_id = configs
            .save(&VolumeConfiguration {
                provider_id,
                capacity: Some("1073741824".to_string()),
                ..Default::default()
            })
            .unwrap();

        let template = VolumeTemplate {
            provider_id,
            volume_config: Some(ResourceRef::new(
                config_id.to_string(),
                ModelKind::VolumeConfiguration,
            )),
            ..Default::default()
        };
        let id = templates.save(&template).unwrap();

        let loaded = templates.load(id).unwrap();
        let referent = resolve(&store, loaded.volume_config.as_ref().unwrap()).unwrap();
        assert_eq!(referent.id, config_id);
        assert_eq!(referent.model, ModelKind::VolumeConfiguration);
    }

    #[test]
    fn deleting_the_referent_leaves_a_dangling_reference() {
        let (store, provider_id) = fixture();
        let configs = VolumeConfigurationMapper::new(store.clone());
        let templates = VolumeTemplateMapper::new(store.clone());

        let config_id = configs
            .save(&VolumeConfiguration {
                provider_id,
                capacity: Some("1".to_string()),
                ..Default::default()
            })
            .unwrap();
        let id = templates
            .save(&VolumeTemplate {
                provider_id,
                volume_config: Some(ResourceRef::new(
                    config_id.to_string(),
                    ModelKind::VolumeConfiguration,
                )),
                ..Default::default()
            })
            .unwrap();

        // weak reference: nothing stops the referent from going away
        configs.delete(config_id).unwrap();

        let loaded = templates.load(id).unwrap();
        assert!(matches!(
            resolve(&store, loaded.volume_config.as_ref().unwrap()),
            Err(MapperError::NotFound(_))
        ));
    }
}
