//! redb table definitions for the gatesync state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Table with string keys and JSON-encoded values.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Raw subscription records keyed by subscription id.
pub const SUBSCRIPTIONS: JsonTable = TableDefinition::new("subscriptions");

/// Raw API key records keyed by key id.
pub const API_KEYS: JsonTable = TableDefinition::new("api_keys");

/// Outbox commands keyed by command id.
pub const COMMANDS: JsonTable = TableDefinition::new("commands");

/// Distributed events keyed by `{kind}:{id}`.
pub const DISTRIBUTED_EVENTS: JsonTable =
    TableDefinition::new("distributed_events");
