//! In-memory registry of loaded structure types.

use dashmap::DashMap;
use structure_type_api::DataSerializer;
use tracing::{info, warn};
use type_loader::{ExtensionDescriptor, ExtensionInstance, LoadedExtension};

/// A type available to the rest of the host.
pub struct RegisteredType {
    pub descriptor: ExtensionDescriptor,
    pub serializer: DataSerializer,
    pub instance: ExtensionInstance,
}

/// Structure types keyed by canonical name.
///
/// Must be cleared before the loader's session is torn down.
#[derive(Default)]
pub struct TypeRegistry {
    types: DashMap<String, RegisteredType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers loader output in order. Returns how many types were added.
    ///
    /// Uses the serializer validated by the loader; extensions are not called
    /// again here.
    pub fn register_all(&self, extensions: Vec<LoadedExtension>) -> usize {
        let mut registered = 0;
        for extension in extensions {
            let (descriptor, serializer, instance) = extension.into_parts();

            let name = descriptor.name().to_string();
            if self.types.contains_key(&name) {
                warn!("⚠️ Replacing registered structure type '{}'", name);
            }
            self.types.insert(
                name,
                RegisteredType {
                    descriptor,
                    serializer,
                    instance,
                },
            );
            registered += 1;
        }
        info!("📚 Registered {} structure types", registered);
        registered
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&type_loader::canonical_name(name))
    }

    pub fn version_of(&self, name: &str) -> Option<u32> {
        self.types
            .get(&type_loader::canonical_name(name))
            .map(|entry| entry.descriptor.version())
    }

    pub fn serializer_for(&self, name: &str) -> Option<DataSerializer> {
        self.types
            .get(&type_loader::canonical_name(name))
            .map(|entry| entry.serializer.clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Drops every registered instance. Returns how many were released.
    pub fn clear(&self) -> usize {
        let released = self.types.len();
        self.types.clear();
        if released > 0 {
            info!("🧹 Released {} structure types", released);
        }
        released
    }
}
