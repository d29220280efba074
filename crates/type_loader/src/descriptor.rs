//! Extension descriptors and the archive manifests they are read from.
//!
//! Every extension archive (a dynamic library) ships with a TOML manifest next
//! to it sharing the library's file stem. The manifest names the entry point and
//! carries a family-specific section with the type's identity:
//!
//! ```toml
//! entry_point = "create_portcullis"
//!
//! [structure_type]
//! type_name = "Portcullis"
//! version = 2
//! dependencies = "bigdoor1;3"
//! ```

use crate::error::{LoaderError, ManifestError};
use crate::requirement::{parse_dependencies, Requirement};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Lower-cases and trims an extension name. All graph lookups use this form.
pub fn canonical_name(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Identity and declared requirements of one discovered extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    name: String,
    version: u32,
    entry_point: String,
    archive: PathBuf,
    requirements: Vec<Requirement>,
}

impl ExtensionDescriptor {
    pub fn new(
        name: &str,
        version: u32,
        entry_point: &str,
        archive: PathBuf,
        requirements: Vec<Requirement>,
    ) -> Self {
        Self {
            name: canonical_name(name),
            version,
            entry_point: entry_point.to_string(),
            archive,
            requirements,
        }
    }

    /// Builds a descriptor from a raw dependency declaration string.
    pub fn with_dependencies(
        name: &str,
        version: u32,
        entry_point: &str,
        archive: PathBuf,
        dependencies: &str,
    ) -> Self {
        let requirements = parse_dependencies(dependencies, &canonical_name(name));
        Self::new(name, version, entry_point, archive, requirements)
    }

    /// Reads the manifest that accompanies `archive` and builds its descriptor.
    pub fn from_archive(archive: &Path, section: &str) -> Result<Self, LoaderError> {
        let manifest_path = manifest_path(archive);
        let content = std::fs::read_to_string(&manifest_path)?;
        let manifest = ArchiveManifest::parse(&content, section).map_err(|source| {
            LoaderError::ManifestError {
                path: manifest_path.clone(),
                source,
            }
        })?;
        Ok(manifest.into_descriptor(archive.to_path_buf()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}

/// Path of the manifest belonging to an archive: same directory and stem, `.toml`.
pub fn manifest_path(archive: &Path) -> PathBuf {
    archive.with_extension("toml")
}

/// Parsed package metadata of one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub entry_point: String,
    pub type_name: String,
    pub version: u32,
    pub dependencies: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypeSection {
    type_name: Option<String>,
    version: Option<VersionField>,
    dependencies: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionField {
    Integer(i64),
    Text(String),
}

impl VersionField {
    fn to_version(&self) -> Result<u32, ManifestError> {
        match self {
            VersionField::Integer(value) => {
                u32::try_from(*value).map_err(|_| ManifestError::InvalidVersion(value.to_string()))
            }
            VersionField::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ManifestError::InvalidVersion(text.clone())),
        }
    }
}

impl ArchiveManifest {
    /// Parses manifest text, reading the type identity from `[section]`.
    pub fn parse(content: &str, section: &str) -> Result<Self, ManifestError> {
        let table: toml::Table = toml::from_str(content)?;

        let entry_point = table
            .get("entry_point")
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ManifestError::MissingEntryPoint)?
            .to_string();

        let type_section: TypeSection = table
            .get(section)
            .cloned()
            .ok_or_else(|| ManifestError::MissingSection(section.to_string()))?
            .try_into()?;

        let type_name = type_section
            .type_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ManifestError::MissingTypeName(section.to_string()))?;

        let version = type_section
            .version
            .ok_or_else(|| ManifestError::MissingVersion(section.to_string()))?
            .to_version()?;

        Ok(Self {
            entry_point,
            type_name,
            version,
            dependencies: type_section.dependencies,
        })
    }

    pub fn into_descriptor(self, archive: PathBuf) -> ExtensionDescriptor {
        ExtensionDescriptor::with_dependencies(
            &self.type_name,
            self.version,
            &self.entry_point,
            archive,
            self.dependencies.as_deref().unwrap_or(""),
        )
    }
}
