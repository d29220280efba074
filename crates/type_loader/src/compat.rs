//! ABI compatibility policy for extension archives.

use crate::error::LoaderError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Overrides for the ABI check performed when an archive is registered.
///
/// The defaults reject any archive whose ABI string differs in crate
/// major.minor or in compiler version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    /// Ignore Rust compiler version differences between extension and host.
    /// WARNING: trait object layouts may differ and crash the host.
    pub allow_rustc_mismatch: bool,

    /// Ignore crate version differences between extension and host.
    pub allow_abi_mismatch: bool,

    /// Require the exact crate version, patch included.
    pub strict_versioning: bool,
}

impl CompatibilityConfig {
    /// Checks an extension's ABI string against the host's.
    ///
    /// Both strings have the form `crate_version:rustc_version`. A rustc version
    /// of `unknown` on either side is accepted.
    pub fn validate(&self, extension_abi: &str, host_abi: &str) -> Result<(), LoaderError> {
        let (Some((ext_crate, ext_rustc)), Some((host_crate, host_rustc))) =
            (split_abi(extension_abi), split_abi(host_abi))
        else {
            return Err(LoaderError::VersionMismatch(format!(
                "invalid ABI version format, expected 'crate:rustc', got extension='{}', host='{}'",
                extension_abi, host_abi
            )));
        };

        let crate_compatible = if self.strict_versioning {
            ext_crate == host_crate
        } else {
            major_minor_compatible(ext_crate, host_crate)
        };

        if !crate_compatible && !self.allow_abi_mismatch {
            let comparison = if self.strict_versioning { "exact" } else { "major.minor" };
            return Err(LoaderError::VersionMismatch(format!(
                "extension built against structure_type_api v{}, host uses v{} ({} match required). \
                 Rebuild the extension or enable allow_abi_mismatch (NOT RECOMMENDED)",
                ext_crate, host_crate, comparison
            )));
        }

        let rustc_differs =
            ext_rustc != host_rustc && ext_rustc != "unknown" && host_rustc != "unknown";
        if rustc_differs && !self.allow_rustc_mismatch {
            return Err(LoaderError::VersionMismatch(format!(
                "extension built with Rust {}, host built with Rust {}. \
                 Rebuild with the same compiler or enable allow_rustc_mismatch (MAY CAUSE CRASHES)",
                ext_rustc, host_rustc
            )));
        }

        if self.allow_abi_mismatch && ext_crate != host_crate {
            warn!(
                "⚠️ Accepting extension with ABI version mismatch (override enabled): v{} != v{}",
                ext_crate, host_crate
            );
        }
        if rustc_differs {
            warn!(
                "⚠️ Accepting extension built with a different compiler (override enabled): {} != {}",
                ext_rustc, host_rustc
            );
        }

        Ok(())
    }
}

fn split_abi(abi: &str) -> Option<(&str, &str)> {
    let (crate_version, rustc_version) = abi.split_once(':')?;
    if crate_version.is_empty() || rustc_version.is_empty() || rustc_version.contains(':') {
        return None;
    }
    Some((crate_version, rustc_version))
}

/// Compares `major.minor`, ignoring patch. Unparseable versions fall back to
/// exact comparison.
fn major_minor_compatible(extension: &str, host: &str) -> bool {
    let major_minor = |version: &str| -> Option<(u32, u32)> {
        let mut parts = version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some((major, minor))
    };

    match (major_minor(extension), major_minor(host)) {
        (Some(ext), Some(host)) => ext == host,
        _ => extension == host,
    }
}
