//! Loading contexts: the boundary entry points are resolved through.
//!
//! A session owns exactly one context. Archives are registered into it one at a
//! time and entry points are looked up only among those archives and a fixed
//! parent table of built-in factories. Closing the context releases the
//! archives, after which nothing resolves through it any more.

use crate::compat::CompatibilityConfig;
use crate::error::LoaderError;
use libloading::Library;
use std::any::Any;
use std::collections::HashMap;
use std::ffi::CStr;
use std::fmt;
use std::ops::Deref;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structure_type_api::{Extension, ABI_VERSION, ABI_VERSION_SYMBOL};
use tracing::{debug, info};

/// Zero-argument constructor for a built-in extension.
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// Built-in entry points, consulted after every registered archive.
#[derive(Clone, Default)]
pub struct SymbolTable {
    factories: HashMap<String, ExtensionFactory>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `entry_point`, replacing any previous one.
    pub fn register<F>(&mut self, entry_point: &str, factory: F)
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.factories.insert(entry_point.to_string(), Arc::new(factory));
    }

    pub fn get(&self, entry_point: &str) -> Option<ExtensionFactory> {
        self.factories.get(entry_point).cloned()
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.factories.contains_key(entry_point)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("SymbolTable").field("entry_points", &names).finish()
    }
}

/// A live extension together with the library its code lives in.
///
/// The instance is dropped before the library handle, so an instance can
/// safely outlive the context that created it.
pub struct ExtensionInstance {
    extension: Box<dyn Extension>,
    library: Option<Arc<Library>>,
}

impl ExtensionInstance {
    /// Wraps an extension whose code is linked into the host.
    pub fn builtin(extension: Box<dyn Extension>) -> Self {
        Self {
            extension,
            library: None,
        }
    }

    fn from_library(extension: Box<dyn Extension>, library: Arc<Library>) -> Self {
        Self {
            extension,
            library: Some(library),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.library.is_none()
    }
}

impl Deref for ExtensionInstance {
    type Target = dyn Extension;

    fn deref(&self) -> &Self::Target {
        self.extension.as_ref()
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("type_name", &self.extension.type_name())
            .field("version", &self.extension.version())
            .field("builtin", &self.is_builtin())
            .finish()
    }
}

/// Aggregation boundary for one loading session.
pub trait LoadingContext: Send {
    /// Adds an archive whose entry points become resolvable.
    fn register_archive(&mut self, archive: &Path) -> Result<(), LoaderError>;

    /// Resolves `entry_point` and invokes it.
    fn instantiate(&mut self, entry_point: &str) -> Result<ExtensionInstance, LoaderError>;

    /// Releases every registered archive. Further calls fail with
    /// [`LoaderError::ContextClosed`].
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn archive_count(&self) -> usize;
}

/// [`LoadingContext`] backed by dynamic libraries.
pub struct IsolatedContext {
    parent: Arc<SymbolTable>,
    archives: Vec<(PathBuf, Arc<Library>)>,
    compatibility: CompatibilityConfig,
    host_abi: String,
    closed: bool,
}

impl IsolatedContext {
    pub fn new(parent: Arc<SymbolTable>, compatibility: CompatibilityConfig) -> Self {
        Self {
            parent,
            archives: Vec::new(),
            compatibility,
            host_abi: ABI_VERSION.to_string(),
            closed: false,
        }
    }

    /// Validates archives against `host_abi` instead of this build's
    /// [`ABI_VERSION`].
    pub fn expecting_abi(mut self, host_abi: impl Into<String>) -> Self {
        self.host_abi = host_abi.into();
        self
    }

    fn check_abi(&self, library: &Library, archive: &Path) -> Result<(), LoaderError> {
        let abi_version = unsafe {
            let symbol = library
                .get::<unsafe extern "C" fn() -> *const c_char>(ABI_VERSION_SYMBOL.as_bytes())
                .map_err(|e| {
                    LoaderError::LibraryError(format!(
                        "{} does not export '{}': {}",
                        archive.display(),
                        ABI_VERSION_SYMBOL,
                        e
                    ))
                })?;
            let version_ptr = symbol();
            if version_ptr.is_null() {
                return Err(LoaderError::LibraryError(format!(
                    "{} returned a null ABI version",
                    archive.display()
                )));
            }
            CStr::from_ptr(version_ptr).to_string_lossy().into_owned()
        };
        self.compatibility.validate(&abi_version, &self.host_abi)
    }
}

impl LoadingContext for IsolatedContext {
    fn register_archive(&mut self, archive: &Path) -> Result<(), LoaderError> {
        if self.closed {
            return Err(LoaderError::ContextClosed);
        }
        if self.archives.iter().any(|(path, _)| path == archive) {
            return Ok(());
        }

        let library = unsafe {
            Library::new(archive).map_err(|e| {
                LoaderError::LibraryError(format!("Failed to load {}: {}", archive.display(), e))
            })?
        };
        self.check_abi(&library, archive)?;

        debug!("📦 Registered archive {}", archive.display());
        self.archives.push((archive.to_path_buf(), Arc::new(library)));
        Ok(())
    }

    fn instantiate(&mut self, entry_point: &str) -> Result<ExtensionInstance, LoaderError> {
        if self.closed {
            return Err(LoaderError::ContextClosed);
        }

        // Most recently registered archive wins.
        for (path, library) in self.archives.iter().rev() {
            let constructor = match unsafe {
                library.get::<unsafe extern "C" fn() -> *mut dyn Extension>(entry_point.as_bytes())
            } {
                Ok(symbol) => *symbol,
                Err(_) => continue,
            };

            // Unwinding cannot cross an `extern "C"` frame; exported entry
            // points catch their own panics and return null instead.
            let extension_ptr = unsafe { constructor() };
            if extension_ptr.is_null() {
                return Err(LoaderError::InstantiationError(format!(
                    "entry point '{}' in {} returned null",
                    entry_point,
                    path.display()
                )));
            }

            let extension = unsafe { Box::from_raw(extension_ptr) };
            return Ok(ExtensionInstance::from_library(extension, library.clone()));
        }

        let factory = self
            .parent
            .get(entry_point)
            .ok_or_else(|| LoaderError::SymbolNotFound(entry_point.to_string()))?;
        let extension = catch_unwind(AssertUnwindSafe(|| (*factory)())).map_err(|payload| {
            LoaderError::InstantiationError(format!(
                "built-in entry point '{}' panicked: {}",
                entry_point,
                panic_message(payload.as_ref())
            ))
        })?;
        Ok(ExtensionInstance::builtin(extension))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        let released = self.archives.len();
        self.archives.clear();
        self.closed = true;
        info!("🔒 Loading context closed, released {} archives", released);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn archive_count(&self) -> usize {
        self.archives.len()
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for IsolatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let archives: Vec<&PathBuf> = self.archives.iter().map(|(path, _)| path).collect();
        f.debug_struct("IsolatedContext")
            .field("archives", &archives)
            .field("parent", &self.parent)
            .field("host_abi", &self.host_abi)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
