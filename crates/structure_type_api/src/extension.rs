//! The extension trait implemented by every loadable structure type.

use crate::serializer::DataSerializer;

/// A loadable structure type.
///
/// Instances are created by the library's entry point and handed to the host's
/// type registry. The loader calls [`Extension::serializer`] right after
/// construction; an extension whose serializer cannot be built is rejected
/// before anything else sees it.
pub trait Extension: Send + Sync {
    /// Name of the type this extension provides.
    fn type_name(&self) -> &str;

    /// Version of the type implementation.
    fn version(&self) -> u32;

    /// Builds the serializer for this type's persistent properties.
    fn serializer(&self) -> Result<DataSerializer, ExtensionError>;
}

/// Errors raised by extensions.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The type declares a property the serializer cannot handle
    #[error("Invalid property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    /// The type is internally misconfigured
    #[error("Extension misconfigured: {0}")]
    Misconfigured(String),

    /// Property values did not match the serializer's layout
    #[error("Property mismatch: {0}")]
    PropertyMismatch(String),

    /// A method of the extension panicked
    #[error("Extension panicked: {0}")]
    Panicked(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Placeholder type used to build a null `*mut dyn Extension`.
///
/// Entry points generated by [`export_extension!`](crate::export_extension)
/// return a null pointer of this type when construction panics.
#[doc(hidden)]
pub struct NullExtension;

impl Extension for NullExtension {
    fn type_name(&self) -> &str {
        "null"
    }

    fn version(&self) -> u32 {
        0
    }

    fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
        Err(ExtensionError::Misconfigured("null extension".to_string()))
    }
}
