//! Portcullis: a gate that slides vertically out of its frame.
//!
//! Built as a `cdylib` and loaded by the structure type host. Ship
//! `portcullis.toml` next to the library, renamed to the library's file stem.

use serde_json::{json, Map, Value};
use structure_type_api::{export_extension, DataSerializer, Extension, ExtensionError};
use tracing::debug;

pub const TYPE_NAME: &str = "Portcullis";
pub const VERSION: u32 = 2;

const PROPERTIES: [&str; 3] = ["open_speed", "block_height", "open_direction"];

pub struct Portcullis {
    default_speed: f64,
}

impl Portcullis {
    pub fn new() -> Self {
        debug!("🏰 Portcullis: creating type instance");
        Self { default_speed: 1.0 }
    }

    /// Property values for a newly placed portcullis.
    pub fn default_properties(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert("open_speed".to_string(), json!(self.default_speed));
        values.insert("block_height".to_string(), json!(0));
        values.insert("open_direction".to_string(), json!("up"));
        values
    }
}

impl Default for Portcullis {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for Portcullis {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
        DataSerializer::new(TYPE_NAME, PROPERTIES)
    }
}

export_extension! {
    create_portcullis => Portcullis::new(),
}
