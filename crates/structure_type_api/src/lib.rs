//! # Structure Type API
//!
//! The contract shared between the structure type loader and the extensions it
//! loads from dynamic libraries. An extension crate is built as a `cdylib`,
//! implements [`Extension`] for its type and exports a zero-argument entry point
//! with [`export_extension!`].
//!
//! ## ABI Compatibility
//!
//! Trait objects cross the library boundary, so host and extension must agree on
//! both this crate's version and the compiler that built them. [`ABI_VERSION`]
//! captures both and is exported by every extension under
//! [`ABI_VERSION_SYMBOL`] so the loader can reject incompatible binaries before
//! calling into them.

pub mod extension;
pub mod guard;
pub mod macros;
pub mod serializer;

pub use extension::{Extension, ExtensionError, NullExtension};
pub use guard::GuardedExtension;
pub use serializer::DataSerializer;

/// ABI version for extension compatibility validation.
///
/// Format: `"crate_version:rust_version"`, e.g. `"0.4.0:1.75.0"` or `"0.4.0:unknown"`.
pub const ABI_VERSION: &str = {
    const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Set by build.rs
    const RUST_VERSION: &str = env!("STRUCTURE_TYPE_RUSTC_VERSION");

    const_format::concatcp!(CRATE_VERSION, ":", RUST_VERSION)
};

/// [`ABI_VERSION`] with a trailing nul, handed out across the C boundary.
pub const ABI_VERSION_CSTR: &str = const_format::concatcp!(ABI_VERSION, "\0");

/// Symbol every extension library exports to report the ABI it was built against.
pub const ABI_VERSION_SYMBOL: &str = "extension_abi_version";

/// Returns build info string with version and Rust compiler version.
pub fn build_info() -> String {
    format!(
        "Structure Type API v{} with Rust compiler v{}",
        env!("CARGO_PKG_VERSION"),
        env!("STRUCTURE_TYPE_RUSTC_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_version_format() {
        let parts: Vec<&str> = ABI_VERSION.split(':').collect();
        assert_eq!(parts.len(), 2, "ABI version should have exactly 2 parts separated by ':'");
        assert_eq!(parts[0], env!("CARGO_PKG_VERSION"));
        assert!(!parts[1].is_empty(), "Rust version should not be empty");
    }

    #[test]
    fn test_abi_version_cstr_is_nul_terminated() {
        assert!(ABI_VERSION_CSTR.ends_with('\0'));
        assert_eq!(&ABI_VERSION_CSTR[..ABI_VERSION_CSTR.len() - 1], ABI_VERSION);
    }
}
