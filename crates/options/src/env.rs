//! Host environment abstraction for factory and registry operations.
//!
//! The engine itself only needs one platform service: resolving shared
//! libraries for dynamically registered object factories. Hosts with
//! their own loading rules (bundled plugin directories, sandboxing)
//! implement [`Env`]; everyone else uses [`HostEnv`].

// Shared-library loading is inherently unsafe; it is confined to this
// module so the rest of the crate can stay `deny(unsafe_code)`.
#![allow(unsafe_code)]

use std::sync::Arc;

use crate::error::Result;

/// A loaded shared library.
///
/// The handle must outlive every function pointer resolved from it; the
/// object registry keeps the owning [`DynamicLibrary`] alive alongside
/// any factories it registered.
pub struct DynamicLibrary {
    name: String,
    library: libloading::Library,
}

impl DynamicLibrary {
    /// The name this library was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves `symbol` as a value of type `T` (typically an
    /// `extern "C"` function pointer).
    ///
    /// The caller asserts that the exported symbol really has type `T`;
    /// a mismatch is undefined behavior, exactly as with any foreign
    /// function interface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the symbol is absent.
    pub fn symbol<T: Copy>(&self, symbol: &str) -> Result<T> {
        let resolved = unsafe { self.library.get::<T>(symbol.as_bytes()) }
            .map_err(|source| crate::Error::io(format!("cannot resolve symbol '{symbol}' in '{}': {source}", self.name)))?;
        Ok(*resolved)
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary").field("name", &self.name).finish()
    }
}

/// Platform services available to the engine and to object factories.
pub trait Env: Send + Sync {
    /// Loads the named shared library.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the library cannot be
    /// found or loaded.
    fn load_library(&self, name: &str) -> Result<Arc<DynamicLibrary>>;
}

/// Default [`Env`] backed by the platform dynamic loader.
///
/// A bare name (no path separator and no extension) is decorated with
/// the platform library prefix and suffix (`libfoo.so`, `libfoo.dylib`,
/// `foo.dll`); anything else is passed to the loader verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostEnv;

impl Env for HostEnv {
    fn load_library(&self, name: &str) -> Result<Arc<DynamicLibrary>> {
        let candidate = if name.contains(std::path::MAIN_SEPARATOR) || name.contains('.') {
            name.to_string()
        } else {
            format!("{}{}{}", std::env::consts::DLL_PREFIX, name, std::env::consts::DLL_SUFFIX)
        };
        let library = unsafe { libloading::Library::new(&candidate) }
            .map_err(|source| crate::Error::io(format!("cannot load library '{candidate}': {source}")))?;
        tracing::debug!(library = %candidate, "loaded dynamic library");
        Ok(Arc::new(DynamicLibrary { name: candidate, library }))
    }
}

/// Invokes a dynamic registration entry point.
///
/// The caller guarantees `registrar` was resolved from a library that
/// outlives this call (the registry keeps the handle alive alongside
/// the receiving [`ObjectLibrary`](crate::ObjectLibrary)).
pub(crate) fn invoke_registrar(
    registrar: crate::registry::DynamicRegistrarFn,
    library: &crate::registry::ObjectLibrary,
    arg: &std::ffi::CStr,
) {
    unsafe { registrar(library, arg.as_ptr()) }
}
