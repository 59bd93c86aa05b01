//! Store — redb-backed polymorphic resource persistence.
//!
//! One handle serves the two storage-facing contracts of the mock backend:
//! the provider registry (the scoping root) and the generic entity store.
//! Rows are JSON-serialized into redb's `&[u8]` value columns under
//! monotonically allocated `u64` ids, so plain table iteration yields
//! id-ascending order.
//!
//! The store never interprets kind-specific attribute semantics. Which attrs
//! belong to which model kind is the mappers' discipline; keeping that out of
//! the physical layer is what lets new kinds land without schema changes.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use mirage_core::{EntityId, ModelKind, ProviderId};

use crate::error::{StoreError, StoreResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe resource store backed by redb.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "resource store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory resource store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        txn.open_table(PROVIDER_KEYS).map_err(map_err!(Table))?;
        txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Allocate the next id from a named counter, within the caller's
    /// transaction. Ids start at 1 and are never reused.
    fn next_id(txn: &WriteTransaction, counter: &str) -> StoreResult<u64> {
        let mut counters = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        let next = counters
            .get(counter)
            .map_err(map_err!(Read))?
            .map(|g| g.value())
            .unwrap_or(0)
            + 1;
        counters.insert(counter, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    // ── Providers ──────────────────────────────────────────────────

    /// Register a provider, or return the existing row for the same
    /// (url, driver) pair unchanged.
    ///
    /// The natural-key index is read and written inside one write
    /// transaction, so concurrent registrations of the same pair resolve to
    /// a single surviving row without any caller-side coordination.
    pub fn register_provider(
        &self,
        driver: &str,
        url: Option<&str>,
    ) -> StoreResult<ProviderRow> {
        if driver.is_empty() {
            return Err(StoreError::Constraint(
                "provider driver must not be empty".to_string(),
            ));
        }
        let key_url = url.unwrap_or("");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let row = {
            let mut keys = txn.open_table(PROVIDER_KEYS).map_err(map_err!(Table))?;
            let existing = keys
                .get((key_url, driver))
                .map_err(map_err!(Read))?
                .map(|g| g.value());
            match existing {
                Some(id) => {
                    let providers = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
                    let guard = providers.get(id).map_err(map_err!(Read))?.ok_or_else(|| {
                        StoreError::Constraint(format!(
                            "provider index references missing row {id}"
                        ))
                    })?;
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => {
                    let id = Self::next_id(&txn, "providers")?;
                    let row = ProviderRow {
                        id,
                        driver: driver.to_string(),
                        url: url.map(str::to_string),
                    };
                    let value = serde_json::to_vec(&row).map_err(map_err!(Serialize))?;
                    let mut providers =
                        txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
                    providers
                        .insert(id, value.as_slice())
                        .map_err(map_err!(Write))?;
                    keys.insert((key_url, driver), id).map_err(map_err!(Write))?;
                    row
                }
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = row.id, driver, "provider registered");
        Ok(row)
    }

    /// Get a provider by id.
    pub fn get_provider(&self, id: ProviderId) -> StoreResult<Option<ProviderRow>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let row: ProviderRow =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// List providers in id-ascending order, optionally restricted to one
    /// driver.
    pub fn list_providers(&self, driver: Option<&str>) -> StoreResult<Vec<ProviderRow>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let row: ProviderRow =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if driver.map_or(true, |d| row.driver == d) {
                results.push(row);
            }
        }
        Ok(results)
    }

    /// Delete a provider by id. Returns true if it existed.
    ///
    /// Refused with `Conflict` while any entity still references the
    /// provider; the row persists in that case.
    pub fn delete_provider(&self, id: ProviderId) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let entities = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            for entry in entities.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let row: EntityRow =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if row.provider_id == id {
                    return Err(StoreError::Conflict(format!(
                        "provider {id} is still referenced by entity {}",
                        row.id
                    )));
                }
            }
            drop(entities);
            let mut providers = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
            let old: Option<ProviderRow> = providers
                .remove(id)
                .map_err(map_err!(Write))?
                .map(|g| serde_json::from_slice(g.value()))
                .transpose()
                .map_err(map_err!(Deserialize))?;
            drop(providers);
            if let Some(row) = &old {
                let mut keys = txn.open_table(PROVIDER_KEYS).map_err(map_err!(Table))?;
                keys.remove(row.natural_key()).map_err(map_err!(Write))?;
            }
            old.is_some()
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "provider deleted");
        Ok(existed)
    }

    // ── Entities ───────────────────────────────────────────────────

    /// Create an entity under a provider with a fixed model tag.
    ///
    /// Fails with `Constraint` if the provider does not resolve. The id and
    /// creation timestamp are generated here.
    pub fn create_entity(
        &self,
        provider_id: ProviderId,
        model: ModelKind,
        new: NewEntity,
    ) -> StoreResult<EntityId> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id = {
            let providers = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
            if providers.get(provider_id).map_err(map_err!(Read))?.is_none() {
                return Err(StoreError::Constraint(format!(
                    "entity references unknown provider {provider_id}"
                )));
            }
            drop(providers);
            let id = Self::next_id(&txn, "entities")?;
            let row = EntityRow {
                id,
                provider_id,
                created_at: epoch_secs(),
                model,
                backend: new.backend,
                name: new.name,
                description: new.description,
                properties: new.properties,
                attrs: new.attrs,
            };
            let value = serde_json::to_vec(&row).map_err(map_err!(Serialize))?;
            let mut entities = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            entities
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            id
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, model = %model, "entity created");
        Ok(id)
    }

    /// Get an entity by id.
    pub fn get_entity(&self, id: EntityId) -> StoreResult<Option<EntityRow>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let row: EntityRow =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Partially update an entity: only supplied columns change. The model
    /// tag is never touched.
    pub fn update_entity(&self, id: EntityId, update: EntityUpdate) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut entities = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            let mut row: EntityRow = match entities.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StoreError::NotFound(format!("entity {id}"))),
            };
            update.apply(&mut row);
            let value = serde_json::to_vec(&row).map_err(map_err!(Serialize))?;
            entities
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, "entity updated");
        Ok(())
    }

    /// Hard-delete an entity by id. Returns true if it existed.
    pub fn delete_entity(&self, id: EntityId) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut entities = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            existed = entities.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "entity deleted");
        Ok(existed)
    }

    /// Query entities under one provider, in id-ascending order.
    ///
    /// Filters are conjunctive; an absent filter means any. Callers that
    /// poll for an expected state after a create/update should bound their
    /// retries; the store reports current state and never blocks.
    pub fn query_entities(
        &self,
        provider_id: ProviderId,
        model: Option<ModelKind>,
        be_kind: Option<&str>,
    ) -> StoreResult<Vec<EntityRow>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let row: EntityRow =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if row.provider_id != provider_id {
                continue;
            }
            if let Some(m) = model {
                if row.model != m {
                    continue;
                }
            }
            if let Some(k) = be_kind {
                if row.backend.as_ref().map(|b| b.kind.as_str()) != Some(k) {
                    continue;
                }
            }
            results.push(row);
        }
        Ok(results)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
