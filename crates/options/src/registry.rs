//! Factories for customizable objects: libraries, patterns, and the
//! registry.
//!
//! An [`ObjectLibrary`] is a named set of factories, each keyed by an
//! [`ObjectPattern`] and producing one family of objects (discriminated
//! by [`ObjectKind`]). An [`ObjectRegistry`] is a stack of libraries
//! with copy-on-write inheritance: [`ObjectRegistry::clone_registry`]
//! yields a child that sees every parent factory but registers its own
//! without perturbing the parent, so sibling configure paths never
//! observe partial registrations.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::ConfigOptions;
use crate::env::{DynamicLibrary, Env};
use crate::error::{Error, Result};

/// Compile-time discriminator for a family of customizable objects.
///
/// Implemented for the `dyn` trait object of each family:
///
/// ```ignore
/// impl ObjectKind for dyn FilterPolicy {
///     const KIND: &'static str = "filter-policy";
/// }
/// ```
pub trait ObjectKind: 'static {
    /// The registry type tag for this family.
    const KIND: &'static str;
}

/// Identifier pattern a factory is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectPattern {
    /// Matches exactly one identifier.
    Exact(String),
    /// Matches the bare name, or the name followed by the separator and
    /// a non-empty suffix (`fixed` with separator `:` matches `fixed`
    /// and `fixed:16`).
    Prefix {
        /// The base name.
        name: String,
        /// Separator between the name and the suffix.
        separator: char,
    },
}

impl ObjectPattern {
    /// Builds an exact pattern.
    pub fn exact(name: impl Into<String>) -> Self {
        ObjectPattern::Exact(name.into())
    }

    /// Builds a prefixed pattern with a suffix separator.
    pub fn prefixed(name: impl Into<String>, separator: char) -> Self {
        ObjectPattern::Prefix { name: name.into(), separator }
    }

    /// True if `target` matches this pattern.
    pub fn matches(&self, target: &str) -> bool {
        match self {
            ObjectPattern::Exact(name) => name == target,
            ObjectPattern::Prefix { name, separator } => {
                target == name
                    || target
                        .strip_prefix(name.as_str())
                        .and_then(|rest| rest.strip_prefix(*separator))
                        .is_some_and(|suffix| !suffix.is_empty())
            }
        }
    }
}

impl std::fmt::Display for ObjectPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectPattern::Exact(name) => f.write_str(name),
            ObjectPattern::Prefix { name, separator } => write!(f, "{name}{separator}*"),
        }
    }
}

/// Boxed factory for one object family.
pub type FactoryFn<T> = dyn Fn(&str, &ConfigOptions) -> Result<Box<T>> + Send + Sync;

struct FactoryHolder<T: ?Sized + 'static> {
    factory: Box<FactoryFn<T>>,
}

struct FactoryEntry {
    pattern: ObjectPattern,
    holder: Arc<dyn Any + Send + Sync>,
}

/// A named collection of object factories.
///
/// Libraries are registered into while being built (local or dynamic
/// registration) and read-only thereafter; the interior lock only
/// serializes the building phase.
pub struct ObjectLibrary {
    name: String,
    entries: RwLock<HashMap<&'static str, Vec<FactoryEntry>>>,
    // Keeps the originating shared library alive for factories
    // registered from it.
    dynamic: Option<Arc<DynamicLibrary>>,
}

impl ObjectLibrary {
    /// Creates an empty library.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: RwLock::new(HashMap::new()), dynamic: None }
    }

    fn with_dynamic(name: impl Into<String>, dynamic: Arc<DynamicLibrary>) -> Self {
        Self { name: name.into(), entries: RwLock::new(HashMap::new()), dynamic: Some(dynamic) }
    }

    /// The library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a factory for family `T` under `pattern`.
    pub fn register<T, F>(&self, pattern: ObjectPattern, factory: F)
    where
        T: ObjectKind + ?Sized + 'static,
        F: Fn(&str, &ConfigOptions) -> Result<Box<T>> + Send + Sync + 'static,
    {
        let holder = FactoryHolder::<T> { factory: Box::new(factory) };
        self.entries
            .write()
            .entry(T::KIND)
            .or_default()
            .push(FactoryEntry { pattern, holder: Arc::new(holder) });
    }

    /// Runs the first factory whose pattern matches `id`, if any.
    ///
    /// The entry lock is released before the factory runs, so factories
    /// may themselves register objects.
    fn create<T>(&self, id: &str, opts: &ConfigOptions) -> Option<Result<Box<T>>>
    where
        T: ObjectKind + ?Sized + 'static,
    {
        let mut selected: Option<Arc<FactoryHolder<T>>> = None;
        {
            let entries = self.entries.read();
            if let Some(list) = entries.get(T::KIND) {
                for entry in list {
                    if entry.pattern.matches(id) {
                        if let Ok(holder) =
                            Arc::clone(&entry.holder).downcast::<FactoryHolder<T>>()
                        {
                            selected = Some(holder);
                            break;
                        }
                    }
                }
            }
        }
        let holder = selected?;
        Some((holder.factory)(id, opts))
    }

    /// The registered kinds.
    pub fn registered_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.entries.read().keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Display forms of the patterns registered for `kind`.
    pub fn registered_names(&self, kind: &str) -> Vec<String> {
        self.entries
            .read()
            .get(kind)
            .map(|list| list.iter().map(|e| e.pattern.to_string()).collect())
            .unwrap_or_default()
    }

    /// Total number of factories in this library.
    pub fn factory_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// True if no factory has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ObjectLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLibrary")
            .field("name", &self.name)
            .field("factories", &self.factory_count())
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Signature of the registration entry point exported by a dynamic
/// library: `fn(library, arg)` where `arg` is a NUL-terminated string
/// (possibly empty).
///
/// The exporting library must be built against the same
/// `keystone-options` version as the host; the registry keeps the
/// loaded library alive for as long as its factories are reachable.
pub type DynamicRegistrarFn =
    unsafe extern "C" fn(library: &ObjectLibrary, arg: *const std::os::raw::c_char);

/// Maps identifiers to factories producing customizable objects.
///
/// Lookup searches this registry's libraries newest-first, then its own
/// direct registrations, then the parent chain.
pub struct ObjectRegistry {
    parent: Option<Arc<ObjectRegistry>>,
    local: ObjectLibrary,
    libraries: RwLock<Vec<Arc<ObjectLibrary>>>,
}

impl ObjectRegistry {
    /// Creates an empty root registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            local: ObjectLibrary::new("local"),
            libraries: RwLock::new(Vec::new()),
        })
    }

    /// Creates a child registry inheriting every factory visible to
    /// `self`. Registrations into the child are invisible to the
    /// parent.
    pub fn clone_registry(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            local: ObjectLibrary::new("local"),
            libraries: RwLock::new(Vec::new()),
        })
    }

    /// Registers a factory for family `T` directly with this registry.
    pub fn register<T, F>(&self, pattern: ObjectPattern, factory: F)
    where
        T: ObjectKind + ?Sized + 'static,
        F: Fn(&str, &ConfigOptions) -> Result<Box<T>> + Send + Sync + 'static,
    {
        self.local.register(pattern, factory);
    }

    /// Runs `registrar` against a new library named `name` and adds the
    /// library to this registry.
    pub fn add_local_library<F>(&self, registrar: F, name: &str, arg: &str)
    where
        F: FnOnce(&ObjectLibrary, &str),
    {
        let library = Arc::new(ObjectLibrary::new(name));
        registrar(&library, arg);
        tracing::debug!(library = name, factories = library.factory_count(), "registered local library");
        self.libraries.write().push(library);
    }

    /// Loads the shared library `library_name` through `env`, resolves
    /// the [`DynamicRegistrarFn`] exported as `symbol`, and runs it as a
    /// local registration. The loaded library handle stays alive with
    /// the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the library or symbol cannot be
    /// resolved, and [`Error::InvalidArgument`] if `arg` contains a NUL
    /// byte.
    pub fn add_dynamic_library(
        &self,
        env: &dyn Env,
        library_name: &str,
        symbol: &str,
        arg: &str,
    ) -> Result<()> {
        let dynamic = env.load_library(library_name)?;
        let registrar: DynamicRegistrarFn = dynamic.symbol(symbol)?;
        let arg = CString::new(arg)
            .map_err(|_| Error::invalid_argument("registration argument contains a NUL byte"))?;
        let library =
            Arc::new(ObjectLibrary::with_dynamic(library_name, Arc::clone(&dynamic)));
        // The registrar was resolved from `dynamic`, which the new
        // library keeps alive.
        crate::env::invoke_registrar(registrar, &library, &arg);
        tracing::debug!(
            library = library_name,
            symbol,
            factories = library.factory_count(),
            "registered dynamic library"
        );
        self.libraries.write().push(library);
        Ok(())
    }

    /// Creates a new object of family `T` from the first factory whose
    /// pattern matches `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no factory matches, or the
    /// factory's own failure.
    pub fn new_object<T>(&self, id: &str, opts: &ConfigOptions) -> Result<Box<T>>
    where
        T: ObjectKind + ?Sized + 'static,
    {
        let mut registry = Some(self);
        while let Some(current) = registry {
            // Snapshot the library list so factories can register
            // further libraries without deadlocking.
            let libraries: Vec<Arc<ObjectLibrary>> =
                current.libraries.read().iter().cloned().collect();
            for library in libraries.iter().rev() {
                if let Some(result) = library.create::<T>(id, opts) {
                    return result;
                }
            }
            if let Some(result) = current.local.create::<T>(id, opts) {
                return result;
            }
            registry = current.parent.as_deref();
        }
        Err(Error::not_found(format!("Could not load {}: {id}", T::KIND)))
    }

    /// Kinds registered anywhere in this registry or its parents.
    pub fn registered_kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        self.for_each_library(|library| kinds.extend(library.registered_kinds()));
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }

    /// Pattern display forms registered for `kind` anywhere in this
    /// registry or its parents.
    pub fn registered_names(&self, kind: &str) -> Vec<String> {
        let mut names = Vec::new();
        self.for_each_library(|library| names.extend(library.registered_names(kind)));
        names
    }

    /// Total factories visible from this registry.
    pub fn factory_count(&self) -> usize {
        let mut count = 0;
        self.for_each_library(|library| count += library.factory_count());
        count
    }

    fn for_each_library(&self, mut visit: impl FnMut(&ObjectLibrary)) {
        let mut registry = Some(self);
        while let Some(current) = registry {
            for library in current.libraries.read().iter() {
                visit(library);
            }
            visit(&current.local);
            registry = current.parent.as_deref();
        }
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("factories", &self.factory_count())
            .field("inherited", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurable::{Configurable, LifecycleState, OptionGroup};
    use crate::customizable::Customizable;

    trait Gadget: Customizable {}

    impl ObjectKind for dyn Gadget {
        const KIND: &'static str = "gadget";
    }

    impl std::fmt::Debug for dyn Gadget {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("dyn Gadget").finish()
        }
    }

    struct PlainGadget {
        name: &'static str,
        lifecycle: LifecycleState,
    }

    impl PlainGadget {
        fn boxed(name: &'static str) -> Box<dyn Gadget> {
            Box::new(PlainGadget { name, lifecycle: LifecycleState::new() })
        }
    }

    impl Configurable for PlainGadget {
        fn groups(&self) -> Vec<OptionGroup> {
            Vec::new()
        }
        fn lifecycle(&self) -> &LifecycleState {
            &self.lifecycle
        }
        fn as_configurable(&self) -> &dyn Configurable {
            self
        }
        fn as_configurable_mut(&mut self) -> &mut dyn Configurable {
            self
        }
    }

    impl Customizable for PlainGadget {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    impl Gadget for PlainGadget {}

    #[test]
    fn test_pattern_matching() {
        let exact = ObjectPattern::exact("bloom");
        assert!(exact.matches("bloom"));
        assert!(!exact.matches("bloom:10"));

        let prefix = ObjectPattern::prefixed("fixed", ':');
        assert!(prefix.matches("fixed"));
        assert!(prefix.matches("fixed:16"));
        assert!(!prefix.matches("fixed:"));
        assert!(!prefix.matches("fixedly"));
    }

    #[test]
    fn test_register_and_create() {
        let registry = ObjectRegistry::new();
        registry.register::<dyn Gadget, _>(ObjectPattern::exact("a"), |_, _| {
            Ok(PlainGadget::boxed("a"))
        });
        let opts = ConfigOptions::default();
        let gadget = registry.new_object::<dyn Gadget>("a", &opts).unwrap();
        assert_eq!(gadget.id(), "a");

        let err = registry.new_object::<dyn Gadget>("missing", &opts).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("gadget"));
    }

    #[test]
    fn test_newest_library_wins() {
        let registry = ObjectRegistry::new();
        registry.register::<dyn Gadget, _>(ObjectPattern::exact("x"), |_, _| {
            Ok(PlainGadget::boxed("first"))
        });
        registry.add_local_library(
            |library, _| {
                library.register::<dyn Gadget, _>(ObjectPattern::exact("x"), |_, _| {
                    Ok(PlainGadget::boxed("second"))
                });
            },
            "override",
            "",
        );
        let opts = ConfigOptions::default();
        let gadget = registry.new_object::<dyn Gadget>("x", &opts).unwrap();
        assert_eq!(gadget.id(), "second");
    }

    #[test]
    fn test_clone_registry_inherits_without_leaking_back() {
        let parent = ObjectRegistry::new();
        parent.register::<dyn Gadget, _>(ObjectPattern::exact("base"), |_, _| {
            Ok(PlainGadget::boxed("base"))
        });

        let child = parent.clone_registry();
        child.register::<dyn Gadget, _>(ObjectPattern::exact("extra"), |_, _| {
            Ok(PlainGadget::boxed("extra"))
        });

        let opts = ConfigOptions::default();
        assert!(child.new_object::<dyn Gadget>("base", &opts).is_ok());
        assert!(child.new_object::<dyn Gadget>("extra", &opts).is_ok());
        assert!(parent.new_object::<dyn Gadget>("extra", &opts).unwrap_err().is_not_found());
    }

    #[test]
    fn test_prefixed_factory_receives_full_id() {
        let registry = ObjectRegistry::new();
        registry.register::<dyn Gadget, _>(ObjectPattern::prefixed("sized", ':'), |id, _| {
            let suffix = id.strip_prefix("sized:").unwrap_or("0");
            suffix
                .parse::<usize>()
                .map_err(|_| Error::invalid_argument(format!("bad suffix in '{id}'")))?;
            Ok(PlainGadget::boxed("sized"))
        });
        let opts = ConfigOptions::default();
        assert!(registry.new_object::<dyn Gadget>("sized:8", &opts).is_ok());
        assert!(registry.new_object::<dyn Gadget>("sized:x", &opts).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_introspection() {
        let registry = ObjectRegistry::new();
        registry.register::<dyn Gadget, _>(ObjectPattern::exact("a"), |_, _| {
            Ok(PlainGadget::boxed("a"))
        });
        registry.register::<dyn Gadget, _>(ObjectPattern::prefixed("b", ':'), |_, _| {
            Ok(PlainGadget::boxed("b"))
        });
        assert_eq!(registry.registered_kinds(), vec!["gadget"]);
        assert_eq!(registry.registered_names("gadget"), vec!["a".to_string(), "b:*".to_string()]);
        assert_eq!(registry.factory_count(), 2);
    }

    #[test]
    fn test_missing_dynamic_library_fails_with_io() {
        let registry = ObjectRegistry::new();
        let err = registry
            .add_dynamic_library(&crate::env::HostEnv, "keystone-no-such-plugin", "register", "")
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
