//! Process-wide registry mapping schema ids to schema roots.
//!
//! External `$ref` URIs (`some-id` or `some-id#/pointer`) resolve through
//! this registry. Entries live until explicitly unregistered or process
//! teardown; shared ownership with live schema handles is expected.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use ahash::AHashMap;
use tracing::warn;

use crate::schema::Schema;

static REGISTRY: LazyLock<Mutex<AHashMap<String, Arc<Schema>>>> =
    LazyLock::new(|| Mutex::new(AHashMap::new()));

fn lock_registry() -> MutexGuard<'static, AHashMap<String, Arc<Schema>>> {
    REGISTRY.lock().unwrap_or_else(|err| err.into_inner())
}

/// Register a schema under `id`, or under its own `$id` when no explicit id
/// is given.
///
/// An explicit id that conflicts with the schema's `$id` wins but logs a
/// warning, since same-document `$ref`s will keep using the `$id`. Returns
/// `false` when no id is available or the id is already taken.
pub fn register_schema(schema: &Arc<Schema>, id: Option<&str>) -> bool {
    let registration_id = match id {
        Some(explicit) if !explicit.is_empty() => {
            if let Some(own_id) = schema.id() {
                if !own_id.is_empty() && own_id != explicit {
                    warn!(
                        explicit,
                        own_id,
                        "registering schema under an id that differs from its $id; \
                         reference resolution against $id may fail"
                    );
                }
            }
            explicit.to_string()
        }
        _ => match schema.id() {
            Some(own_id) if !own_id.is_empty() => own_id.to_string(),
            _ => {
                warn!("schema has no $id and no explicit id was provided for registration");
                return false;
            }
        },
    };

    let mut registry = lock_registry();
    if registry.contains_key(&registration_id) {
        warn!(id = registration_id, "schema already registered");
        return false;
    }
    registry.insert(registration_id, schema.clone());
    true
}

/// Remove a registry entry. Returns `false` when the id was not registered.
pub fn unregister_schema(id: &str) -> bool {
    lock_registry().remove(id).is_some()
}

pub fn is_schema_registered(id: &str) -> bool {
    lock_registry().contains_key(id)
}

pub fn registered_schema(id: &str) -> Option<Arc<Schema>> {
    lock_registry().get(id).cloned()
}

/// All registered ids, in no particular order.
pub fn registered_ids() -> Vec<String> {
    lock_registry().keys().cloned().collect()
}
