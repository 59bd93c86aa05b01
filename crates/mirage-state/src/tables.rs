//! redb table definitions for the Mirage resource store.
//!
//! Row tables use generated `u64` keys and `&[u8]` values (JSON-serialized
//! row types). `u64` keys iterate in ascending id order, which is the
//! ordering contract of every list/query operation.

use redb::TableDefinition;

/// Provider rows keyed by generated id.
pub const PROVIDERS: TableDefinition<u64, &[u8]> = TableDefinition::new("providers");

/// Provider natural-key index: (url, driver) → provider id. An absent url
/// indexes as the empty string. Registration upserts through this table,
/// which is what keeps the (url, driver) pair unique.
pub const PROVIDER_KEYS: TableDefinition<(&str, &str), u64> =
    TableDefinition::new("provider_keys");

/// Entity rows keyed by generated id.
pub const ENTITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entities");

/// Monotonic id counters keyed by row-table name.
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
