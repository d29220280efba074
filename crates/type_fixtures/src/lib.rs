//! Extensions built into one library for exercising the real loading path.
//!
//! - `create_sentry`: well behaved.
//! - `create_jammed`: its constructor panics, so the entry point returns null.
//! - `create_babbler`: its `type_name` panics after construction.

use structure_type_api::{export_extension, DataSerializer, Extension, ExtensionError};

pub struct Sentry;

impl Extension for Sentry {
    fn type_name(&self) -> &str {
        "Sentry"
    }

    fn version(&self) -> u32 {
        1
    }

    fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
        DataSerializer::new("Sentry", ["watch_radius"])
    }
}

pub struct Babbler;

impl Extension for Babbler {
    fn type_name(&self) -> &str {
        panic!("babbler forgot its name")
    }

    fn version(&self) -> u32 {
        1
    }

    fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
        DataSerializer::new("Babbler", ["volume"])
    }
}

fn jammed() -> Sentry {
    panic!("jammed during construction")
}

export_extension! {
    create_sentry => Sentry,
    create_jammed => jammed(),
    create_babbler => Babbler,
}
