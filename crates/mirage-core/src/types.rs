//! Shared vocabulary types used across Mirage crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a registered provider.
pub type ProviderId = u64;

/// Unique identifier for an entity row.
pub type EntityId = u64;

// ── Model kinds ────────────────────────────────────────────────────

/// Logical resource kind an entity row represents.
///
/// Rows are tagged at creation and the tag never changes. Mappers exist for
/// the kinds that carry kind-specific attributes; the remaining kinds are
/// valid tags for rows that only serve as weak-reference targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Generic default tag for rows not claimed by a concrete kind.
    #[default]
    Entity,
    Machine,
    MachineConfiguration,
    MachineImage,
    MachineTemplate,
    Address,
    AddressTemplate,
    Volume,
    VolumeConfiguration,
    VolumeImage,
    VolumeTemplate,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Entity => "entity",
            ModelKind::Machine => "machine",
            ModelKind::MachineConfiguration => "machine_configuration",
            ModelKind::MachineImage => "machine_image",
            ModelKind::MachineTemplate => "machine_template",
            ModelKind::Address => "address",
            ModelKind::AddressTemplate => "address_template",
            ModelKind::Volume => "volume",
            ModelKind::VolumeConfiguration => "volume_configuration",
            ModelKind::VolumeImage => "volume_image",
            ModelKind::VolumeTemplate => "volume_template",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entity" => Some(ModelKind::Entity),
            "machine" => Some(ModelKind::Machine),
            "machine_configuration" => Some(ModelKind::MachineConfiguration),
            "machine_image" => Some(ModelKind::MachineImage),
            "machine_template" => Some(ModelKind::MachineTemplate),
            "address" => Some(ModelKind::Address),
            "address_template" => Some(ModelKind::AddressTemplate),
            "volume" => Some(ModelKind::Volume),
            "volume_configuration" => Some(ModelKind::VolumeConfiguration),
            "volume_image" => Some(ModelKind::VolumeImage),
            "volume_template" => Some(ModelKind::VolumeTemplate),
            _ => None,
        }
    }

    /// Attribute groups a row of this kind is expected to populate.
    /// Every other group must stay empty on a well-formed row.
    pub fn groups(&self) -> &'static [AttrGroup] {
        match self {
            ModelKind::Machine | ModelKind::MachineTemplate => &[AttrGroup::Compute],
            ModelKind::Address | ModelKind::AddressTemplate => &[AttrGroup::Network],
            ModelKind::VolumeConfiguration => &[AttrGroup::VolumeShape],
            ModelKind::Volume | ModelKind::VolumeTemplate => &[AttrGroup::Volume],
            _ => &[],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sparse attributes ──────────────────────────────────────────────

/// Kind-specific attribute names an entity row may carry.
///
/// Each attribute belongs to exactly one group; which groups a given row is
/// allowed to populate follows from its model kind. The store itself never
/// checks this — the mappers do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Attr {
    // compute
    MachineConfig,
    MachineImage,
    // network
    Network,
    Ip,
    Hostname,
    Allocation,
    DefaultGateway,
    Dns,
    Protocol,
    Mask,
    // volume shape
    Format,
    Capacity,
    // volume
    VolumeConfig,
    VolumeImage,
}

impl Attr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attr::MachineConfig => "machine_config",
            Attr::MachineImage => "machine_image",
            Attr::Network => "network",
            Attr::Ip => "ip",
            Attr::Hostname => "hostname",
            Attr::Allocation => "allocation",
            Attr::DefaultGateway => "default_gateway",
            Attr::Dns => "dns",
            Attr::Protocol => "protocol",
            Attr::Mask => "mask",
            Attr::Format => "format",
            Attr::Capacity => "capacity",
            Attr::VolumeConfig => "volume_config",
            Attr::VolumeImage => "volume_image",
        }
    }

    pub fn group(&self) -> AttrGroup {
        match self {
            Attr::MachineConfig | Attr::MachineImage => AttrGroup::Compute,
            Attr::Network
            | Attr::Ip
            | Attr::Hostname
            | Attr::Allocation
            | Attr::DefaultGateway
            | Attr::Dns
            | Attr::Protocol
            | Attr::Mask => AttrGroup::Network,
            Attr::Format | Attr::Capacity => AttrGroup::VolumeShape,
            Attr::VolumeConfig | Attr::VolumeImage => AttrGroup::Volume,
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disjoint attribute groups of the sparse-union row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrGroup {
    Compute,
    Network,
    VolumeShape,
    Volume,
}

impl AttrGroup {
    pub fn members(&self) -> &'static [Attr] {
        match self {
            AttrGroup::Compute => &[Attr::MachineConfig, Attr::MachineImage],
            AttrGroup::Network => &[
                Attr::Network,
                Attr::Ip,
                Attr::Hostname,
                Attr::Allocation,
                Attr::DefaultGateway,
                Attr::Dns,
                Attr::Protocol,
                Attr::Mask,
            ],
            AttrGroup::VolumeShape => &[Attr::Format, Attr::Capacity],
            AttrGroup::Volume => &[Attr::VolumeConfig, Attr::VolumeImage],
        }
    }
}

// ── References ─────────────────────────────────────────────────────

/// Weak reference to another entity: a plain id string plus the kind the
/// referent is expected to have.
///
/// Relation-only, never ownership. Nothing at the storage layer keeps the
/// referent alive; resolution happens lazily and may fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    pub kind: ModelKind,
}

impl ResourceRef {
    pub fn new(id: impl Into<String>, kind: ModelKind) -> Self {
        Self { id: id.into(), kind }
    }

    /// Parse the carried id string into an entity id, if well-formed.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.id.parse().ok()
    }
}

/// Identity of the backing driver-native object mapped to an entity
/// (like: a `machine` row backing a mock driver instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRef {
    pub kind: String,
    pub id: String,
}

impl BackendRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self { kind: kind.into(), id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_str_round_trip() {
        for kind in [
            ModelKind::Entity,
            ModelKind::Machine,
            ModelKind::MachineConfiguration,
            ModelKind::MachineImage,
            ModelKind::MachineTemplate,
            ModelKind::Address,
            ModelKind::AddressTemplate,
            ModelKind::Volume,
            ModelKind::VolumeConfiguration,
            ModelKind::VolumeImage,
            ModelKind::VolumeTemplate,
        ] {
            assert_eq!(ModelKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ModelKind::parse("blob"), None);
    }

    #[test]
    fn default_model_kind_is_generic() {
        assert_eq!(ModelKind::default(), ModelKind::Entity);
        assert_eq!(ModelKind::default().as_str(), "entity");
    }

    #[test]
    fn attr_groups_are_disjoint_and_complete() {
        let all = [
            AttrGroup::Compute,
            AttrGroup::Network,
            AttrGroup::VolumeShape,
            AttrGroup::Volume,
        ];
        let mut seen = std::collections::BTreeSet::new();
        for group in all {
            for attr in group.members() {
                assert_eq!(attr.group(), group);
                assert!(seen.insert(*attr), "{attr} listed in two groups");
            }
        }
        assert_eq!(seen.len(), 14);
    }

    #[test]
    fn template_kinds_own_expected_groups() {
        assert_eq!(ModelKind::MachineTemplate.groups(), &[AttrGroup::Compute]);
        assert_eq!(ModelKind::AddressTemplate.groups(), &[AttrGroup::Network]);
        assert_eq!(ModelKind::VolumeConfiguration.groups(), &[AttrGroup::VolumeShape]);
        assert_eq!(ModelKind::VolumeTemplate.groups(), &[AttrGroup::Volume]);
        assert!(ModelKind::Entity.groups().is_empty());
    }

    #[test]
    fn resource_ref_parses_entity_ids() {
        let r = ResourceRef::new("42", ModelKind::MachineImage);
        assert_eq!(r.entity_id(), Some(42));

        let dangling = ResourceRef::new("img-1", ModelKind::MachineImage);
        assert_eq!(dangling.entity_id(), None);
    }
}
