//! Per-field option metadata and the entry operations driven by it.
//!
//! An [`OptionDescriptor`] pairs a typed accessor into an owning record
//! with a type tag, verification policy, and flags. Instead of byte
//! offsets and pointer reinterpretation, every descriptor is built from
//! getter/setter functions captured at construction; the engine only ever
//! sees records as `&dyn Any` and the descriptor's closures recover the
//! concrete types. A failed downcast reports [`Error::NotFound`], the
//! re-architected form of an unresolvable field address.

mod build;
mod table;

pub use table::OptionTable;

use std::any::Any;
use std::sync::Arc;

use crate::configurable::Configurable;
use crate::context::{ConfigOptions, SanityLevel};
use crate::error::{Error, Result};
use crate::lexer::{unescape_option_string, NULLPTR_SENTINEL};

bitflags::bitflags! {
    /// Behavior flags carried by an [`OptionDescriptor`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OptionFlags: u32 {
        /// The option may be changed while the owning object is in use.
        const MUTABLE = 1 << 0;
        /// A null child is acceptable during validation.
        const ALLOW_NULL = 1 << 1;
        /// Never serialize this option.
        const STRING_NONE = 1 << 2;
        /// Serialize a polymorphic child as its identifier only.
        const STRING_SHALLOW = 1 << 3;
        /// Skip this option during the implicit prepare pass.
        const DONT_PREPARE = 1 << 4;
        /// Never compare this option.
        const COMPARE_NEVER = 1 << 5;
        /// Compare this option only at `LooselyCompatible` or below.
        const COMPARE_LOOSE = 1 << 6;
        /// Compare this option at every level (the default).
        const COMPARE_EXACT = 1 << 7;
    }
}

/// Verification policy of an option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptionVerification {
    /// Parsed, serialized, and compared by value.
    #[default]
    Normal,
    /// Compared through the serialized identifier; parsing is rejected.
    ByName,
    /// Like `ByName`, but a null on either side matches.
    ByNameAllowNull,
    /// Like `ByName`, but a null previous value matches.
    ByNameAllowFromNull,
    /// Accepted for compatibility; never parsed, serialized, or
    /// compared.
    Deprecated,
    /// A name alias for another option; parsed but never serialized or
    /// compared independently.
    Alias,
}

/// Semantic type tag of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `bool`.
    Boolean,
    /// `i8`.
    Int8,
    /// `i16`.
    Int16,
    /// `i32`.
    Int,
    /// `i64`.
    Int64,
    /// `u8`.
    UInt8,
    /// `u16`.
    UInt16,
    /// `u32`.
    UInt,
    /// `u64`.
    UInt64,
    /// `usize`.
    Size,
    /// `f64`.
    Double,
    /// `String`.
    String,
    /// [`CompressionType`](crate::enums::CompressionType).
    Compression,
    /// [`CompactionStyle`](crate::enums::CompactionStyle).
    CompactionStyle,
    /// [`CompactionPri`](crate::enums::CompactionPri).
    CompactionPri,
    /// [`ChecksumType`](crate::enums::ChecksumType).
    Checksum,
    /// [`EncodingType`](crate::enums::EncodingType).
    Encoding,
    /// [`CompactionStopStyle`](crate::enums::CompactionStopStyle).
    CompactionStopStyle,
    /// Legacy string-encoded prefix transform slot.
    PrefixExtractor,
    /// User-supplied enum mapping.
    Enum,
    /// Nested struct with its own descriptor table.
    Struct,
    /// Ordered sequence with an element descriptor.
    Vector,
    /// Embedded or owned configurable child.
    Configurable,
    /// Registry-constructed polymorphic child.
    Customizable,
    /// Opaque handle or custom codec.
    Unknown,
}

/// Type-erased parse closure: `(record, name, value, opts)`.
pub(crate) type ParseFn =
    dyn Fn(&mut dyn Any, &str, &str, &ConfigOptions) -> Result<()> + Send + Sync;

/// Type-erased serialize closure: `(record, name, opts)`.
pub(crate) type SerializeFn = dyn Fn(&dyn Any, &str, &ConfigOptions) -> Result<String> + Send + Sync;

/// Type-erased equality closure: `(this, that, name, opts, mismatch)`.
pub(crate) type EqualsFn =
    dyn Fn(&dyn Any, &dyn Any, &str, &ConfigOptions, &mut String) -> bool + Send + Sync;

pub(crate) type ChildRefFn =
    dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Configurable> + Send + Sync;
pub(crate) type ChildMutFn =
    dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Configurable> + Send + Sync;
pub(crate) type ChildIdFn = dyn Fn(&dyn Any) -> Option<String> + Send + Sync;

/// Immutable metadata describing how one named option is parsed,
/// serialized, and compared within its owning record.
///
/// Descriptors are built with the typed constructors (`boolean`, `int`,
/// [`struct_of`](OptionDescriptor::struct_of),
/// [`vector_of`](OptionDescriptor::vector_of),
/// [`customizable_of`](OptionDescriptor::customizable_of), ...) and
/// refined with [`with_flags`](OptionDescriptor::with_flags) and
/// [`with_verification`](OptionDescriptor::with_verification).
pub struct OptionDescriptor {
    kind: OptionKind,
    verification: OptionVerification,
    flags: OptionFlags,
    parse: Option<Arc<ParseFn>>,
    serialize: Option<Arc<SerializeFn>>,
    equals: Option<Arc<EqualsFn>>,
    child_ref: Option<Arc<ChildRefFn>>,
    child_mut: Option<Arc<ChildMutFn>>,
    child_id: Option<Arc<ChildIdFn>>,
}

impl std::fmt::Debug for OptionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionDescriptor")
            .field("kind", &self.kind)
            .field("verification", &self.verification)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl OptionDescriptor {
    pub(crate) fn from_parts(
        kind: OptionKind,
        parse: Option<Arc<ParseFn>>,
        serialize: Option<Arc<SerializeFn>>,
        equals: Option<Arc<EqualsFn>>,
    ) -> Self {
        Self {
            kind,
            verification: OptionVerification::Normal,
            flags: OptionFlags::empty(),
            parse,
            serialize,
            equals,
            child_ref: None,
            child_mut: None,
            child_id: None,
        }
    }

    pub(crate) fn with_children(
        mut self,
        child_ref: Arc<ChildRefFn>,
        child_mut: Arc<ChildMutFn>,
        child_id: Option<Arc<ChildIdFn>>,
    ) -> Self {
        self.child_ref = Some(child_ref);
        self.child_mut = Some(child_mut);
        self.child_id = child_id;
        self
    }

    /// Replaces the flag set.
    pub fn with_flags(mut self, flags: OptionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the verification policy.
    pub fn with_verification(mut self, verification: OptionVerification) -> Self {
        self.verification = verification;
        self
    }

    /// The semantic type tag.
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    /// The verification policy.
    pub fn verification(&self) -> OptionVerification {
        self.verification
    }

    /// The flag set.
    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    /// True for deprecated options.
    pub fn is_deprecated(&self) -> bool {
        self.verification == OptionVerification::Deprecated
    }

    /// True for alias options.
    pub fn is_alias(&self) -> bool {
        self.verification == OptionVerification::Alias
    }

    /// True for the by-name verification family.
    pub fn is_by_name(&self) -> bool {
        matches!(
            self.verification,
            OptionVerification::ByName
                | OptionVerification::ByNameAllowNull
                | OptionVerification::ByNameAllowFromNull
        )
    }

    /// True for mutable options.
    pub fn is_mutable(&self) -> bool {
        self.flags.contains(OptionFlags::MUTABLE)
    }

    /// True for nested struct descriptors.
    pub fn is_struct(&self) -> bool {
        self.kind == OptionKind::Struct
    }

    /// True for descriptors owning a configurable child (plain or
    /// polymorphic).
    pub fn is_configurable_kind(&self) -> bool {
        matches!(self.kind, OptionKind::Configurable | OptionKind::Customizable)
    }

    /// True for registry-constructed polymorphic children.
    pub fn is_customizable(&self) -> bool {
        self.kind == OptionKind::Customizable
    }

    /// True if a null child passes validation.
    pub fn can_be_null(&self) -> bool {
        self.flags.contains(OptionFlags::ALLOW_NULL)
            || self.verification == OptionVerification::ByNameAllowFromNull
    }

    /// True if the option participates in serialization.
    pub fn should_serialize(&self) -> bool {
        !self.is_deprecated() && !self.is_alias() && !self.flags.contains(OptionFlags::STRING_NONE)
    }

    /// The strictest comparison level at which this option is checked.
    ///
    /// Deprecated, alias, and compare-never options are never checked;
    /// compare-loose options are checked up to `LooselyCompatible`;
    /// everything else is checked at every level.
    pub fn sanity_level(&self) -> SanityLevel {
        if self.is_deprecated() || self.is_alias() || self.flags.contains(OptionFlags::COMPARE_NEVER)
        {
            SanityLevel::None
        } else if self.flags.contains(OptionFlags::COMPARE_LOOSE) {
            SanityLevel::LooselyCompatible
        } else {
            SanityLevel::ExactMatch
        }
    }

    /// Borrows the configurable child stored in `record`, if this
    /// descriptor has one and it is set.
    pub fn child<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Configurable> {
        self.child_ref.as_ref().and_then(|f| f(record))
    }

    /// Mutably borrows the configurable child stored in `record`.
    pub fn child_mut<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Configurable> {
        self.child_mut.as_ref().and_then(|f| f(record))
    }

    /// The identifier of the customizable child stored in `record`, or
    /// `None` when the slot is null or this is not a customizable
    /// descriptor.
    pub fn child_id(&self, record: &dyn Any) -> Option<String> {
        self.child_id.as_ref().and_then(|f| f(record))
    }

    /// Parses `value` and stores the result into `record`.
    ///
    /// Deprecated options succeed without effect. The value is unescaped
    /// first when the context requests it; descriptors flagged
    /// `DONT_PREPARE` see a context with the implicit prepare pass
    /// suspended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `record` is not the descriptor's
    /// record type, [`Error::NotSupported`] for by-name options, and
    /// [`Error::InvalidArgument`] for grammar or coercion failures.
    pub fn parse_option(
        &self,
        name: &str,
        value: &str,
        opts: &ConfigOptions,
        record: &mut dyn Any,
    ) -> Result<()> {
        if self.is_deprecated() {
            return Ok(());
        }
        let unescaped;
        let value = if opts.input_strings_escaped {
            unescaped = unescape_option_string(value);
            unescaped.as_str()
        } else {
            value
        };
        if let Some(parse) = &self.parse {
            if self.flags.contains(OptionFlags::DONT_PREPARE) {
                let mut copy = opts.clone();
                copy.invoke_prepare_options = false;
                return parse(record, name, value, &copy);
            }
            return parse(record, name, value, opts);
        }
        if self.is_by_name() {
            return Err(Error::not_supported(format!(
                "Deserializing the option {name} is not supported"
            )));
        }
        Err(Error::invalid_argument(format!("Error parsing: {name}")))
    }

    /// Serializes the option stored in `record` to its textual value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for options flagged
    /// `STRING_NONE` and [`Error::NotFound`] on a record type mismatch.
    pub fn serialize_option(
        &self,
        name: &str,
        record: &dyn Any,
        opts: &ConfigOptions,
    ) -> Result<String> {
        if self.is_deprecated() {
            return Ok(String::new());
        }
        if self.flags.contains(OptionFlags::STRING_NONE) {
            return Err(Error::not_supported(format!("Cannot serialize option: {name}")));
        }
        if self.is_customizable() && self.flags.contains(OptionFlags::STRING_SHALLOW) {
            return Ok(self.child_id(record).unwrap_or_else(|| NULLPTR_SENTINEL.to_string()));
        }
        if let Some(serialize) = &self.serialize {
            return serialize(record, name, opts);
        }
        Err(Error::invalid_argument(format!("Cannot serialize option: {name}")))
    }

    /// Compares the option between two records.
    ///
    /// Options whose effective sanity level is not enabled under `opts`
    /// compare equal. When the descriptor's declared level is below the
    /// context's, the comparison recurses with the level clamped down.
    /// On mismatch, `mismatch` receives the dotted path of the first
    /// failing option.
    pub fn matches_option(
        &self,
        name: &str,
        this: &dyn Any,
        that: &dyn Any,
        opts: &ConfigOptions,
        mismatch: &mut String,
    ) -> bool {
        let level = self.sanity_level();
        if !opts.is_check_enabled(level) {
            return true;
        }
        let clamped;
        let opts = if level < opts.sanity_level {
            let mut copy = opts.clone();
            copy.sanity_level = level;
            clamped = copy;
            &clamped
        } else {
            opts
        };
        if let Some(equals) = &self.equals {
            if equals(this, that, name, opts, mismatch) {
                return true;
            }
        }
        if mismatch.is_empty() {
            *mismatch = name.to_string();
        }
        false
    }

    /// By-name comparison rescue: compares the serialized forms of the
    /// option in both records.
    ///
    /// Returns false for descriptors outside the by-name verification
    /// family. The allow-null variants treat the `nullptr` sentinel as
    /// matching.
    pub fn check_by_name(
        &self,
        name: &str,
        this: &dyn Any,
        that: &dyn Any,
        opts: &ConfigOptions,
    ) -> bool {
        if !self.is_by_name() {
            return false;
        }
        match self.serialize_option(name, that, opts) {
            Ok(that_value) => self.check_by_name_value(name, this, &that_value, opts),
            Err(_) => false,
        }
    }

    /// By-name comparison against an already serialized value.
    pub fn check_by_name_value(
        &self,
        name: &str,
        this: &dyn Any,
        that_value: &str,
        opts: &ConfigOptions,
    ) -> bool {
        if !self.is_by_name() {
            return false;
        }
        let Ok(this_value) = self.serialize_option(name, this, opts) else {
            return false;
        };
        if matches!(
            self.verification,
            OptionVerification::ByNameAllowNull | OptionVerification::ByNameAllowFromNull
        ) && that_value == NULLPTR_SENTINEL
        {
            return true;
        }
        this_value == that_value
    }
}

/// Downcasts a record reference, mapping failure to the engine's
/// unresolved-field error.
pub(crate) fn downcast_ref<'a, R: 'static>(record: &'a dyn Any, name: &str) -> Result<&'a R> {
    record
        .downcast_ref::<R>()
        .ok_or_else(|| Error::not_found(format!("Could not find option: {name}")))
}

/// Mutable counterpart of [`downcast_ref`].
pub(crate) fn downcast_mut<'a, R: 'static>(record: &'a mut dyn Any, name: &str) -> Result<&'a mut R> {
    record
        .downcast_mut::<R>()
        .ok_or_else(|| Error::not_found(format!("Could not find option: {name}")))
}

/// Wraps a conversion failure with the option name, preserving
/// non-coercion error kinds.
pub(crate) fn parse_context(name: &str, err: Error) -> Error {
    match err {
        Error::InvalidArgument { message } => {
            Error::invalid_argument(format!("Error parsing {name}: {message}"))
        }
        other => other,
    }
}
