//! Discovery of extension archives in a directory.

use crate::descriptor::ExtensionDescriptor;
use crate::error::LoaderError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dynamic library extension on this platform.
#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSION: &str = "dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_EXTENSION: &str = "so";

pub fn is_library_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(LIBRARY_EXTENSION))
            .unwrap_or(false)
}

/// Lists the library files directly inside `directory`, sorted by path.
pub fn discover_library_files(directory: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if is_library_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Builds descriptors for every valid archive directly inside `directory`.
///
/// A missing directory yields nothing. Archives with a missing or malformed
/// manifest are skipped with a warning. When several archives declare the
/// same type, the highest version wins and the first one found wins ties.
pub fn discover_archives(directory: &Path, section: &str) -> Result<Vec<ExtensionDescriptor>, LoaderError> {
    if !directory.exists() {
        warn!(
            "📁 Extension directory {} does not exist, nothing to load",
            directory.display()
        );
        return Ok(Vec::new());
    }
    if !directory.is_dir() {
        return Err(LoaderError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", directory.display()),
        )));
    }

    let files = discover_library_files(directory)?;
    info!(
        "🔍 Found {} candidate archives in {}",
        files.len(),
        directory.display()
    );

    let mut descriptors: Vec<ExtensionDescriptor> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for path in files {
        let descriptor = match ExtensionDescriptor::from_archive(&path, section) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("⚠️ Skipping archive {}: {}", path.display(), e);
                continue;
            }
        };
        debug!(
            "📄 {} declares '{}' v{} with {} dependencies",
            path.display(),
            descriptor.name(),
            descriptor.version(),
            descriptor.requirements().len()
        );

        match by_name.get(descriptor.name()) {
            Some(&index) => {
                let kept = &descriptors[index];
                if descriptor.version() > kept.version() {
                    warn!(
                        "⚠️ '{}' v{} in {} supersedes v{} in {}",
                        descriptor.name(),
                        descriptor.version(),
                        descriptor.archive().display(),
                        kept.version(),
                        kept.archive().display()
                    );
                    descriptors[index] = descriptor;
                } else {
                    warn!(
                        "⚠️ Ignoring '{}' v{} in {}, v{} from {} is already selected",
                        descriptor.name(),
                        descriptor.version(),
                        descriptor.archive().display(),
                        kept.version(),
                        kept.archive().display()
                    );
                }
            }
            None => {
                by_name.insert(descriptor.name().to_string(), descriptors.len());
                descriptors.push(descriptor);
            }
        }
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SECTION: &str = "structure_type";

    fn write_archive(dir: &Path, stem: &str, manifest: Option<&str>) -> PathBuf {
        let archive = dir.join(format!("{}.{}", stem, LIBRARY_EXTENSION));
        fs::write(&archive, "dummy content").unwrap();
        if let Some(manifest) = manifest {
            fs::write(dir.join(format!("{}.toml", stem)), manifest).unwrap();
        }
        archive
    }

    fn manifest(type_name: &str, version: u32) -> String {
        format!(
            "entry_point = \"create_{}\"\n[structure_type]\ntype_name = \"{}\"\nversion = {}\n",
            type_name.to_lowercase(),
            type_name,
            version
        )
    }

    #[test]
    fn test_library_file_discovery() {
        let temp_dir = TempDir::new().unwrap();
        let archive = write_archive(temp_dir.path(), "gate", None);
        fs::write(temp_dir.path().join("not_an_archive.txt"), "dummy").unwrap();
        fs::create_dir(temp_dir.path().join(format!("nested.{}", LIBRARY_EXTENSION))).unwrap();

        let files = discover_library_files(temp_dir.path()).unwrap();
        assert_eq!(files, vec![archive]);
    }

    #[test]
    fn test_discovery_is_not_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_archive(&nested, "gate", Some(&manifest("Gate", 1)));

        assert!(discover_archives(temp_dir.path(), SECTION).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_archives_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_archive(temp_dir.path(), "good", Some(&manifest("Good", 1)));
        write_archive(temp_dir.path(), "nomanifest", None);
        write_archive(temp_dir.path(), "broken", Some("entry_point = [oops"));
        write_archive(
            temp_dir.path(),
            "noversion",
            Some("entry_point = \"e\"\n[structure_type]\ntype_name = \"NoVersion\"\n"),
        );

        let descriptors = discover_archives(temp_dir.path(), SECTION).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name(), "good");
    }

    #[test]
    fn test_highest_version_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_archive(temp_dir.path(), "a_door", Some(&manifest("Door", 1)));
        let newest = write_archive(temp_dir.path(), "b_door", Some(&manifest("Door", 3)));
        write_archive(temp_dir.path(), "c_door", Some(&manifest("door", 2)));
        write_archive(temp_dir.path(), "d_door", Some(&manifest("DOOR", 3)));

        let descriptors = discover_archives(temp_dir.path(), SECTION).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].version(), 3);
        assert_eq!(descriptors[0].archive(), newest.as_path());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(discover_archives(&missing, SECTION).unwrap().is_empty());
    }

    #[test]
    fn test_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            discover_archives(&file, SECTION),
            Err(LoaderError::IoError(_))
        ));
    }

    #[test]
    fn test_custom_section() {
        let temp_dir = TempDir::new().unwrap();
        write_archive(
            temp_dir.path(),
            "lift",
            Some("entry_point = \"create_lift\"\n[movable]\ntype_name = \"Lift\"\nversion = 1\n"),
        );

        assert!(discover_archives(temp_dir.path(), SECTION).unwrap().is_empty());
        let descriptors = discover_archives(temp_dir.path(), "movable").unwrap();
        assert_eq!(descriptors[0].name(), "lift");
    }
}
