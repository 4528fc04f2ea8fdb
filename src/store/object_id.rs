use rand::Rng;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::store::traits::{IdGenerator, IdentifierDriver};

/// Extended JSON key of an object identifier.
pub const OID_KEY: &str = "$oid";

const OBJECT_ID_BYTES: usize = 12;
const COUNTER_MASK: u32 = 0x00ff_ffff;

fn is_hex_object_id(value: &str) -> bool {
    value.len() == OBJECT_ID_BYTES * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Storage form of an object identifier given as 24 hex digits.
pub fn object_id_value(hex_digits: &str) -> Value {
    json!({ OID_KEY: hex_digits.to_ascii_lowercase() })
}

/// Hex digits of an already-built `{"$oid": ...}` value.
pub fn object_id_hex(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(OID_KEY)?.as_str().filter(|hex| is_hex_object_id(hex))
}

/// Accepts what a MongoDB driver accepts as an ObjectId source: 24 hex
/// digits, 12-byte strings, numeric timestamps and built identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexObjectIdDriver;

impl IdentifierDriver for HexObjectIdDriver {
    fn is_valid_id(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => is_hex_object_id(s) || s.len() == OBJECT_ID_BYTES,
            Value::Number(n) => n.as_u64().map(|ts| ts <= u64::from(u32::MAX)).unwrap_or(false),
            Value::Object(_) => object_id_hex(value).is_some(),
            _ => false,
        }
    }

    fn make_id(&self, value: &Value) -> Option<Value> {
        if !self.is_valid_id(value) {
            return None;
        }
        match value {
            Value::String(s) if is_hex_object_id(s) => Some(object_id_value(s)),
            Value::String(s) => Some(object_id_value(&hex::encode(s.as_bytes()))),
            Value::Number(n) => {
                let timestamp = u32::try_from(n.as_u64()?).ok()?;
                let mut bytes = [0u8; OBJECT_ID_BYTES];
                bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
                Some(object_id_value(&hex::encode(bytes)))
            }
            Value::Object(_) => object_id_hex(value).map(object_id_value),
            _ => None,
        }
    }
}

/// Timestamp + per-process random + counter, the ObjectId layout.
#[derive(Debug)]
pub struct ObjectIdGenerator {
    process_unique: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            process_unique: rng.gen(),
            counter: AtomicU32::new(rng.gen::<u32>() & COUNTER_MASK),
        }
    }

    fn next_bytes(&self, timestamp: u32) -> [u8; OBJECT_ID_BYTES] {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        let mut bytes = [0u8; OBJECT_ID_BYTES];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process_unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        bytes
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for ObjectIdGenerator {
    fn generate(&self) -> Value {
        let timestamp = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
        object_id_value(&hex::encode(self.next_bytes(timestamp)))
    }
}

/// Random v4 UUIDs, used when `_id` is declared as a plain string.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Value {
        Value::String(uuid::Uuid::new_v4().to_string())
    }
}
