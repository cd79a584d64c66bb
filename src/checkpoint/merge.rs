use serde_json::{Map, Value};

/// Recursively merges `partial` into `base`
///
/// Keys holding objects on both sides are merged key by key; any other value
/// in `partial` replaces the one in `base`. Keys absent from `partial` are
/// left untouched, so merging the same partial twice is a no-op the second time.
pub fn merge_into(base: &mut Map<String, Value>, partial: &Map<String, Value>) {
    for (key, incoming) in partial {
        match (base.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_into(existing, nested);
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}
