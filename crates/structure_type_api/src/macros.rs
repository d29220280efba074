//! # Extension Export Macros
//!
//! Extension libraries must expose their entry points with C linkage and a
//! stable symbol name, since the loader looks them up by the name written in
//! the archive manifest. [`export_extension!`] generates those exports.

/// Exports one or more extension entry points plus the ABI version symbol.
///
/// Each `symbol => constructor` pair becomes an `extern "C"` function named
/// `symbol` that builds the extension with `constructor` and hands ownership of
/// the boxed trait object to the caller. Panics during construction are caught
/// at the FFI boundary and reported to the loader as a null pointer. The
/// extension is wrapped in [`GuardedExtension`](crate::GuardedExtension), so
/// panics in its methods never unwind into the host either.
///
/// Use it once per library:
///
/// ```rust,ignore
/// use structure_type_api::{export_extension, DataSerializer, Extension, ExtensionError};
///
/// struct Portcullis;
///
/// impl Extension for Portcullis {
///     fn type_name(&self) -> &str { "Portcullis" }
///     fn version(&self) -> u32 { 2 }
///     fn serializer(&self) -> Result<DataSerializer, ExtensionError> {
///         DataSerializer::new("Portcullis", ["open_speed"])
///     }
/// }
///
/// export_extension! {
///     create_portcullis => Portcullis,
/// }
/// ```
#[macro_export]
macro_rules! export_extension {
    ($($entry_point:ident => $constructor:expr),+ $(,)?) => {
        /// Reports the ABI this library was built against.
        #[no_mangle]
        pub extern "C" fn extension_abi_version() -> *const ::std::os::raw::c_char {
            $crate::ABI_VERSION_CSTR.as_ptr() as *const ::std::os::raw::c_char
        }

        $(
            /// Extension entry point. Returns null if construction panicked.
            ///
            /// # Safety
            ///
            /// The returned pointer owns a boxed extension and must be released
            /// with `Box::from_raw` by a host built against the same ABI.
            #[no_mangle]
            pub unsafe extern "C" fn $entry_point() -> *mut dyn $crate::Extension {
                match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                    let extension: ::std::boxed::Box<dyn $crate::Extension> =
                        ::std::boxed::Box::new($crate::GuardedExtension::new($constructor));
                    ::std::boxed::Box::into_raw(extension)
                })) {
                    Ok(extension_ptr) => extension_ptr,
                    Err(_) => {
                        ::std::ptr::null_mut::<$crate::NullExtension>() as *mut dyn $crate::Extension
                    }
                }
            }
        )+
    };
}
