//! Short random identifiers.

/// Generate a prefixed random id, e.g. `rt-a1b2c3d4e5f60718`.
pub fn new_id(prefix: &str) -> String {
    let bytes: [u8; 8] = rand::random();
    format!("{}-{}", prefix, hex::encode(bytes))
}
