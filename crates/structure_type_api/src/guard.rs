//! Panic isolation for extension methods called across the library boundary.

use crate::extension::{Extension, ExtensionError};
use crate::serializer::DataSerializer;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

/// Wraps an extension so none of its methods unwind into the host.
///
/// A panic in [`Extension::type_name`] or [`Extension::version`] yields a
/// fallback value and is remembered; every later [`Extension::serializer`]
/// call then fails with [`ExtensionError::Panicked`], so the loader rejects
/// the extension during its smoke test.
pub struct GuardedExtension<E> {
    inner: E,
    fault: OnceLock<String>,
}

impl<E: Extension> GuardedExtension<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            fault: OnceLock::new(),
        }
    }

    /// Message of the first panic caught, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.get().map(String::as_str)
    }

    fn record(&self, method: &str, payload: Box<dyn Any + Send>) {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("{} panicked: {}", method, s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("{} panicked: {}", method, s)
        } else {
            format!("{} panicked with unknown error", method)
        };
        let _ = self.fault.set(message);
    }
}

impl<E: Extension> Extension for GuardedExtension<E> {
    fn type_name(&self) -> &str {
        match catch_unwind(AssertUnwindSafe(|| self.inner.type_name())) {
            Ok(name) => name,
            Err(payload) => {
                self.record("type_name", payload);
                "unknown-type"
            }
        }
    }

    fn version(&self) -> u32 {
        match catch_unwind(AssertUnwindSafe(|| self.inner.version())) {
            Ok(version) => version,
            Err(payload) => {
                self.record("version", payload);
                0
            }
        }
    }

    fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
        if let Some(fault) = self.fault() {
            return Err(ExtensionError::Panicked(fault.to_string()));
        }
        match catch_unwind(AssertUnwindSafe(|| self.inner.serializer())) {
            Ok(result) => result,
            Err(payload) => {
                self.record("serializer", payload);
                Err(ExtensionError::Panicked(
                    self.fault().unwrap_or("serializer panicked").to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wobbly {
        name_panics: bool,
    }

    impl Extension for Wobbly {
        fn type_name(&self) -> &str {
            if self.name_panics {
                panic!("name exploded");
            }
            "Wobbly"
        }

        fn version(&self) -> u32 {
            3
        }

        fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
            DataSerializer::new("Wobbly", ["tilt"])
        }
    }

    #[test]
    fn test_healthy_extension_passes_through() {
        let guarded = GuardedExtension::new(Wobbly { name_panics: false });
        assert_eq!(guarded.type_name(), "Wobbly");
        assert_eq!(guarded.version(), 3);
        assert!(guarded.serializer().is_ok());
        assert!(guarded.fault().is_none());
    }

    #[test]
    fn test_panicking_name_poisons_serializer() {
        let guarded = GuardedExtension::new(Wobbly { name_panics: true });
        assert_eq!(guarded.type_name(), "unknown-type");
        assert!(guarded.fault().unwrap().contains("name exploded"));
        match guarded.serializer() {
            Err(ExtensionError::Panicked(message)) => assert!(message.contains("type_name")),
            other => panic!("expected a panic error, got {:?}", other.map(|s| s.properties().len())),
        }
    }
}
