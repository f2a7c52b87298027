//! Typed constructors for [`OptionDescriptor`].
//!
//! Every constructor captures plain function pointers projecting the
//! field out of its owning record type `R`; the returned descriptor is
//! fully type-erased. Composite constructors ([`struct_of`], [`vector_of`],
//! [`configurable_of`], [`customizable_of`]) reuse the tokenizer and the
//! element descriptors to implement the nested grammar.
//!
//! [`struct_of`]: OptionDescriptor::struct_of
//! [`vector_of`]: OptionDescriptor::vector_of
//! [`configurable_of`]: OptionDescriptor::configurable_of
//! [`customizable_of`]: OptionDescriptor::customizable_of

use std::any::Any;
use std::sync::Arc;

use super::table::OptionTable;
use super::{
    downcast_mut, downcast_ref, parse_context, OptionDescriptor, OptionKind, OptionVerification,
};
use crate::configurable::Configurable;
use crate::context::{ConfigOptions, SanityLevel};
use crate::customizable::{self, Customizable};
use crate::enums::{
    format_enum_checked, parse_enum_checked, ChecksumType, CompactionPri, CompactionStopStyle,
    CompactionStyle, CompressionType, EncodingType,
};
use crate::error::{Error, Result};
use crate::lexer::{escape_option_string, next_token, string_to_map, NULLPTR_SENTINEL};
use crate::prefix::{format_prefix_extractor, parse_prefix_extractor, PrefixExtractor};
use crate::primitives::{
    doubles_equal, parse_bool, parse_f64, parse_signed, parse_unsigned,
};
use crate::registry::ObjectKind;

macro_rules! numeric_constructors {
    ($($(#[$doc:meta])* $fn_name:ident : $ty:ty, $kind:expr, $parse:expr;)+) => {
        $(
        $(#[$doc])*
        pub fn $fn_name<R: 'static>(get: fn(&R) -> $ty, set: fn(&mut R, $ty)) -> Self {
            Self::from_parts(
                $kind,
                Some(Arc::new(
                    move |record: &mut dyn Any, name: &str, value: &str, _opts: &ConfigOptions| {
                        let r = downcast_mut::<R>(record, name)?;
                        let parsed = ($parse)(value).map_err(|e| parse_context(name, e))?;
                        set(r, parsed);
                        Ok(())
                    },
                )),
                Some(Arc::new(move |record: &dyn Any, name: &str, _opts: &ConfigOptions| {
                    Ok(get(downcast_ref::<R>(record, name)?).to_string())
                })),
                Some(Arc::new(
                    move |a: &dyn Any,
                          b: &dyn Any,
                          _name: &str,
                          _opts: &ConfigOptions,
                          _mismatch: &mut String| {
                        match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                            (Some(a), Some(b)) => get(a) == get(b),
                            _ => false,
                        }
                    },
                )),
            )
        }
        )+
    };
}

macro_rules! enum_constructors {
    ($($(#[$doc:meta])* $fn_name:ident : $ty:ty, $kind:expr;)+) => {
        $(
        $(#[$doc])*
        pub fn $fn_name<R: 'static>(get: fn(&R) -> $ty, set: fn(&mut R, $ty)) -> Self {
            Self::enum_with_table($kind, <$ty>::STRING_MAP, get, set)
        }
        )+
    };
}

impl OptionDescriptor {
    numeric_constructors! {
        /// Descriptor for a `bool` field.
        boolean: bool, OptionKind::Boolean, parse_bool;
        /// Descriptor for an `i8` field.
        int8: i8, OptionKind::Int8, parse_signed::<i8>;
        /// Descriptor for an `i16` field.
        int16: i16, OptionKind::Int16, parse_signed::<i16>;
        /// Descriptor for an `i32` field.
        int: i32, OptionKind::Int, parse_signed::<i32>;
        /// Descriptor for an `i64` field.
        int64: i64, OptionKind::Int64, parse_signed::<i64>;
        /// Descriptor for a `u8` field.
        uint8: u8, OptionKind::UInt8, parse_unsigned::<u8>;
        /// Descriptor for a `u16` field.
        uint16: u16, OptionKind::UInt16, parse_unsigned::<u16>;
        /// Descriptor for a `u32` field.
        uint: u32, OptionKind::UInt, parse_unsigned::<u32>;
        /// Descriptor for a `u64` field.
        uint64: u64, OptionKind::UInt64, parse_unsigned::<u64>;
        /// Descriptor for a `usize` field.
        size: usize, OptionKind::Size, parse_unsigned::<usize>;
    }

    enum_constructors! {
        /// Descriptor for a [`CompressionType`] field.
        compression_type: CompressionType, OptionKind::Compression;
        /// Descriptor for a [`CompactionStyle`] field.
        compaction_style: CompactionStyle, OptionKind::CompactionStyle;
        /// Descriptor for a [`CompactionPri`] field.
        compaction_pri: CompactionPri, OptionKind::CompactionPri;
        /// Descriptor for a [`ChecksumType`] field.
        checksum_type: ChecksumType, OptionKind::Checksum;
        /// Descriptor for an [`EncodingType`] field.
        encoding_type: EncodingType, OptionKind::Encoding;
        /// Descriptor for a [`CompactionStopStyle`] field.
        compaction_stop_style: CompactionStopStyle, OptionKind::CompactionStopStyle;
    }

    /// Descriptor for an `f64` field; equality uses the engine's fixed
    /// absolute tolerance.
    pub fn double<R: 'static>(get: fn(&R) -> f64, set: fn(&mut R, f64)) -> Self {
        Self::from_parts(
            OptionKind::Double,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, _opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    let parsed = parse_f64(value).map_err(|e| parse_context(name, e))?;
                    set(r, parsed);
                    Ok(())
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, _opts: &ConfigOptions| {
                Ok(get(downcast_ref::<R>(record, name)?).to_string())
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      _name: &str,
                      _opts: &ConfigOptions,
                      _mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => doubles_equal(get(a), get(b)),
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor for a `String` field.
    ///
    /// The serialized form is escaped so embedded grammar characters
    /// survive round-trip; parsing stores the (possibly pre-unescaped)
    /// token verbatim.
    pub fn string<R: 'static>(get: fn(&R) -> &str, set: fn(&mut R, String)) -> Self {
        Self::from_parts(
            OptionKind::String,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, _opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    set(r, value.to_string());
                    Ok(())
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, _opts: &ConfigOptions| {
                Ok(escape_option_string(get(downcast_ref::<R>(record, name)?)))
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      _name: &str,
                      _opts: &ConfigOptions,
                      _mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => get(a) == get(b),
                        _ => false,
                    }
                },
            )),
        )
    }

    fn enum_with_table<R: 'static, E: Copy + PartialEq + Send + Sync + 'static>(
        kind: OptionKind,
        table: &'static [(&'static str, E)],
        get: fn(&R) -> E,
        set: fn(&mut R, E),
    ) -> Self {
        Self::from_parts(
            kind,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, _opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    set(r, parse_enum_checked(table, name, value)?);
                    Ok(())
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, _opts: &ConfigOptions| {
                format_enum_checked(table, name, get(downcast_ref::<R>(record, name)?))
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      _name: &str,
                      _opts: &ConfigOptions,
                      _mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => get(a) == get(b),
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor for a field of a user-defined enum, driven by an
    /// explicit string table.
    pub fn enum_map<R: 'static, E: Copy + PartialEq + Send + Sync + 'static>(
        table: &'static [(&'static str, E)],
        get: fn(&R) -> E,
        set: fn(&mut R, E),
    ) -> Self {
        Self::enum_with_table(OptionKind::Enum, table, get, set)
    }

    /// Descriptor for a prefix-extractor slot
    /// (`Option<Arc<dyn PrefixExtractor>>`).
    ///
    /// Accepts the legacy textual forms (`fixed:N`, `capped:N`, long
    /// instance names, `nullptr`); serializes and compares by instance
    /// name.
    pub fn prefix_extractor<R: 'static>(
        get: fn(&R) -> Option<&Arc<dyn PrefixExtractor>>,
        set: fn(&mut R, Option<Arc<dyn PrefixExtractor>>),
    ) -> Self {
        Self::from_parts(
            OptionKind::PrefixExtractor,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, _opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    set(r, parse_prefix_extractor(value).map_err(|e| parse_context(name, e))?);
                    Ok(())
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, _opts: &ConfigOptions| {
                Ok(format_prefix_extractor(get(downcast_ref::<R>(record, name)?)))
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      _name: &str,
                      _opts: &ConfigOptions,
                      _mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => {
                            let a = get(a).map(|e| e.name());
                            let b = get(b).map(|e| e.name());
                            a == b
                        }
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor with fully custom parse, serialize, and equality
    /// closures, overriding any built-in codec.
    pub fn custom<R: 'static>(
        parse: impl Fn(&mut R, &str, &str, &ConfigOptions) -> Result<()> + Send + Sync + 'static,
        serialize: impl Fn(&R, &str, &ConfigOptions) -> Result<String> + Send + Sync + 'static,
        equals: impl Fn(&R, &R, &str, &ConfigOptions, &mut String) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::from_parts(
            OptionKind::Unknown,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, opts: &ConfigOptions| {
                    parse(downcast_mut::<R>(record, name)?, name, value, opts)
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                serialize(downcast_ref::<R>(record, name)?, name, opts)
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      name: &str,
                      opts: &ConfigOptions,
                      mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => equals(a, b, name, opts, mismatch),
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor for an opaque handle whose only stable projection is a
    /// registered identifier.
    ///
    /// Parsing is rejected with `NotSupported`; comparison goes through
    /// the serialized form ([`check_by_name`](Self::check_by_name)).
    pub fn by_name<R: 'static>(
        serialize: impl Fn(&R, &ConfigOptions) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::from_parts(
            OptionKind::Unknown,
            None,
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                Ok(serialize(downcast_ref::<R>(record, name)?, opts))
            })),
            None,
        )
        .with_verification(OptionVerification::ByName)
    }

    /// Descriptor for an option that is accepted for compatibility but
    /// has no effect.
    pub fn deprecated() -> Self {
        Self::from_parts(OptionKind::Unknown, None, None, None)
            .with_verification(OptionVerification::Deprecated)
    }

    /// Descriptor for a nested struct field with its own descriptor
    /// table.
    ///
    /// The option is addressable as the whole struct (`name={...}`), as
    /// a dotted field (`name.field=v`), or - when routed through the
    /// table's dotted lookup - as a bare field of the struct.
    pub fn struct_of<R: 'static, S: 'static>(
        struct_name: &'static str,
        table: &'static OptionTable,
        get: fn(&R) -> &S,
        get_mut: fn(&mut R) -> &mut S,
    ) -> Self {
        Self::from_parts(
            OptionKind::Struct,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    parse_struct(struct_name, table, name, value, opts, get_mut(r))
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                let r = downcast_ref::<R>(record, name)?;
                serialize_struct(struct_name, table, name, opts, get(r))
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      name: &str,
                      opts: &ConfigOptions,
                      mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => {
                            matches_struct(struct_name, table, name, opts, get(a), get(b), mismatch)
                        }
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor for an ordered sequence field, parsed element-wise
    /// with `element` and joined with `separator`.
    pub fn vector_of<R: 'static, E: Default + 'static>(
        element: OptionDescriptor,
        separator: char,
        get: fn(&R) -> &Vec<E>,
        get_mut: fn(&mut R) -> &mut Vec<E>,
    ) -> Self {
        let element = Arc::new(element);
        let parse_elem = Arc::clone(&element);
        let ser_elem = Arc::clone(&element);
        let eq_elem = element;
        Self::from_parts(
            OptionKind::Vector,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, opts: &ConfigOptions| {
                    let r = downcast_mut::<R>(record, name)?;
                    parse_vector(&parse_elem, separator, name, value, opts, get_mut(r))
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                let r = downcast_ref::<R>(record, name)?;
                serialize_vector(&ser_elem, separator, name, opts, get(r))
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      name: &str,
                      opts: &ConfigOptions,
                      mismatch: &mut String| {
                    match (a.downcast_ref::<R>(), b.downcast_ref::<R>()) {
                        (Some(a), Some(b)) => {
                            matches_vector(&eq_elem, name, opts, get(a), get(b), mismatch)
                        }
                        _ => false,
                    }
                },
            )),
        )
    }

    /// Descriptor for an owned or embedded configurable child.
    ///
    /// A value containing `=` is applied as a nested option block; any
    /// other non-empty value is applied as a single option setting on
    /// the child.
    pub fn configurable_of<R: 'static>(
        get: fn(&R) -> Option<&dyn Configurable>,
        get_mut: fn(&mut R) -> Option<&mut dyn Configurable>,
    ) -> Self {
        Self::from_parts(
            OptionKind::Configurable,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, opts: &ConfigOptions| {
                    if value.is_empty() {
                        return Ok(());
                    }
                    let r = downcast_mut::<R>(record, name)?;
                    let Some(child) = get_mut(r) else {
                        return Err(Error::not_found(format!(
                            "Could not find configurable: {name}"
                        )));
                    };
                    if value.contains('=') {
                        let mut copy = opts.clone();
                        copy.ignore_unknown_options = false;
                        child.configure_from_string(value, &copy)
                    } else {
                        child.configure_option(name, value, opts)
                    }
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                let r = downcast_ref::<R>(record, name)?;
                match get(r) {
                    Some(child) => child.to_string_opts(&opts.embedded()),
                    None => Ok(String::new()),
                }
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      name: &str,
                      opts: &ConfigOptions,
                      mismatch: &mut String| {
                    let (Some(a), Some(b)) = (a.downcast_ref::<R>(), b.downcast_ref::<R>()) else {
                        return false;
                    };
                    match (get(a), get(b)) {
                        (None, None) => true,
                        (Some(this), Some(that)) => {
                            let mut bad = String::new();
                            if this.matches(that, opts, &mut bad) {
                                true
                            } else {
                                *mismatch = format!("{name}.{bad}");
                                false
                            }
                        }
                        _ => {
                            *mismatch = name.to_string();
                            false
                        }
                    }
                },
            )),
        )
        .with_children(
            Arc::new(move |record: &dyn Any| record.downcast_ref::<R>().and_then(get)),
            Arc::new(move |record: &mut dyn Any| record.downcast_mut::<R>().and_then(get_mut)),
            None,
        )
    }

    /// Descriptor for a registry-constructed polymorphic child held as
    /// `Option<Box<T>>`.
    ///
    /// Parsing `"id=X;opt=v"` resolves `X` through the context's object
    /// registry, dropping any differently-identified previous child
    /// before the new child is populated; remaining keys are applied to
    /// the child with unknown keys rejected. A bare token is an
    /// identifier; `nullptr` clears the slot.
    pub fn customizable_of<R, T>(
        get: fn(&R) -> Option<&T>,
        get_mut: fn(&mut R) -> Option<&mut T>,
        set: fn(&mut R, Option<Box<T>>),
    ) -> Self
    where
        R: 'static,
        T: Customizable + ObjectKind + ?Sized + 'static,
    {
        Self::from_parts(
            OptionKind::Customizable,
            Some(Arc::new(
                move |record: &mut dyn Any, name: &str, value: &str, opts: &ConfigOptions| {
                    if value.trim().is_empty() {
                        return Ok(());
                    }
                    let r = downcast_mut::<R>(record, name)?;
                    let (id, props) = customizable::options_map(value)?;
                    let id = match id {
                        Some(id) => id,
                        None if props.is_empty() => {
                            // Explicit "nullptr" clears the slot.
                            set(r, None);
                            return Ok(());
                        }
                        None => match get(r).map(|t| t.id().to_string()) {
                            // Bare property map reconfigures the
                            // existing child under its own identifier.
                            Some(existing) => existing,
                            None => {
                                return Err(Error::invalid_argument(format!(
                                    "Name property is missing for {name}"
                                )))
                            }
                        },
                    };
                    let mut copy = opts.clone();
                    copy.ignore_unknown_options = false;
                    if get(r).map(|t| t.id() == id).unwrap_or(false) {
                        if let Some(child) = get_mut(r) {
                            return child.configure_from_map(&props, &copy);
                        }
                        return Ok(());
                    }
                    // Drop the previous child before the replacement is
                    // populated.
                    set(r, None);
                    let mut child = match opts.registry.new_object::<T>(&id, opts) {
                        Ok(child) => child,
                        Err(err) if err.is_not_found() && opts.ignore_unknown_objects => {
                            opts_ignore_unknown_object(opts, name, &id);
                            return Ok(());
                        }
                        Err(err) => return Err(err),
                    };
                    child.configure_from_map(&props, &copy)?;
                    set(r, Some(child));
                    Ok(())
                },
            )),
            Some(Arc::new(move |record: &dyn Any, name: &str, opts: &ConfigOptions| {
                let r = downcast_ref::<R>(record, name)?;
                match get(r) {
                    Some(child) => customizable::to_string(child, &opts.embedded()),
                    None => Ok(NULLPTR_SENTINEL.to_string()),
                }
            })),
            Some(Arc::new(
                move |a: &dyn Any,
                      b: &dyn Any,
                      name: &str,
                      opts: &ConfigOptions,
                      mismatch: &mut String| {
                    let (Some(a), Some(b)) = (a.downcast_ref::<R>(), b.downcast_ref::<R>()) else {
                        return false;
                    };
                    match (get(a), get(b)) {
                        (None, None) => true,
                        (Some(this), Some(that)) => {
                            if opts.sanity_level > SanityLevel::None && this.id() != that.id() {
                                *mismatch = format!("{name}.id");
                                return false;
                            }
                            if opts.sanity_level > SanityLevel::LooselyCompatible {
                                let mut bad = String::new();
                                if this.as_configurable().matches(
                                    that.as_configurable(),
                                    opts,
                                    &mut bad,
                                ) {
                                    true
                                } else {
                                    *mismatch = format!("{name}.{bad}");
                                    false
                                }
                            } else {
                                true
                            }
                        }
                        _ => {
                            *mismatch = name.to_string();
                            false
                        }
                    }
                },
            )),
        )
        .with_children(
            Arc::new(move |record: &dyn Any| {
                record.downcast_ref::<R>().and_then(get).map(|t| t.as_configurable())
            }),
            Arc::new(move |record: &mut dyn Any| {
                record.downcast_mut::<R>().and_then(get_mut).map(|t| t.as_configurable_mut())
            }),
            Some(Arc::new(move |record: &dyn Any| {
                record.downcast_ref::<R>().and_then(get).map(|t| t.id().to_string())
            })),
        )
    }
}

fn opts_ignore_unknown_object(opts: &ConfigOptions, name: &str, id: &str) {
    opts.report(&format!("ignoring unknown object '{id}' for option '{name}'"));
}

fn is_struct_path(name: &str, struct_name: &str) -> bool {
    name == struct_name
        || (name.ends_with(struct_name)
            && name.as_bytes().get(name.len() - struct_name.len() - 1) == Some(&b'.'))
}

/// Applies `value` to the struct record according to the three path
/// forms: whole struct, dotted sub-path, or direct field.
fn parse_struct(
    struct_name: &str,
    table: &'static OptionTable,
    name: &str,
    value: &str,
    opts: &ConfigOptions,
    record: &mut dyn Any,
) -> Result<()> {
    if is_struct_path(name, struct_name) {
        // The value is the entire struct as a nested option block.
        let map = string_to_map(value)?;
        for (key, val) in map.iter() {
            match table.get(key) {
                Some(descriptor) => descriptor.parse_option(key, val, opts, record)?,
                None => {
                    return Err(Error::invalid_argument(format!(
                        "Unrecognized option: {struct_name}.{key}"
                    )))
                }
            }
        }
        Ok(())
    } else if let Some(rest) = name.strip_prefix(struct_name).and_then(|r| r.strip_prefix('.')) {
        match table.find(rest) {
            Some((descriptor, elem)) => descriptor.parse_option(elem, value, opts, record),
            None => Err(Error::invalid_argument(format!("Unrecognized option: {name}"))),
        }
    } else {
        match table.find(name) {
            Some((descriptor, elem)) => descriptor.parse_option(elem, value, opts, record),
            None => {
                Err(Error::invalid_argument(format!("Unrecognized option: {struct_name}.{name}")))
            }
        }
    }
}

fn serialize_struct(
    struct_name: &str,
    table: &'static OptionTable,
    name: &str,
    opts: &ConfigOptions,
    record: &dyn Any,
) -> Result<String> {
    if is_struct_path(name, struct_name) {
        let embedded = opts.embedded();
        let mut pairs = Vec::new();
        for (key, descriptor) in table.entries() {
            if descriptor.should_serialize() {
                let value = descriptor.serialize_option(key, record, &embedded)?;
                pairs.push(format!("{key}={value}"));
            }
        }
        Ok(format!("{{{}}}", pairs.join(&embedded.delimiter)))
    } else if let Some(rest) = name.strip_prefix(struct_name).and_then(|r| r.strip_prefix('.')) {
        match table.find(rest) {
            Some((descriptor, elem)) => descriptor.serialize_option(elem, record, opts),
            None => Err(Error::invalid_argument(format!("Unrecognized option: {name}"))),
        }
    } else {
        match table.find(name) {
            Some((descriptor, elem)) => descriptor.serialize_option(elem, record, opts),
            None => {
                Err(Error::invalid_argument(format!("Unrecognized option: {struct_name}.{name}")))
            }
        }
    }
}

fn matches_struct(
    struct_name: &str,
    table: &'static OptionTable,
    name: &str,
    opts: &ConfigOptions,
    this: &dyn Any,
    that: &dyn Any,
    mismatch: &mut String,
) -> bool {
    if is_struct_path(name, struct_name) {
        for (key, descriptor) in table.entries() {
            let mut bad = String::new();
            if !descriptor.matches_option(key, this, that, opts, &mut bad) {
                *mismatch = format!("{struct_name}.{bad}");
                return false;
            }
        }
        true
    } else {
        let path = name.strip_prefix(struct_name).and_then(|r| r.strip_prefix('.')).unwrap_or(name);
        match table.find(path) {
            Some((descriptor, elem)) => {
                let mut bad = String::new();
                if descriptor.matches_option(elem, this, that, opts, &mut bad) {
                    true
                } else {
                    *mismatch = format!("{struct_name}.{bad}");
                    false
                }
            }
            None => {
                *mismatch = format!("{struct_name}.{name}");
                false
            }
        }
    }
}

/// Splits `value` on `separator` and parses each token with the element
/// descriptor into a fresh default element.
///
/// A trailing separator produces an empty final token, which fails
/// unless the element type accepts empty input. Elements that fail with
/// `NotSupported` are skipped when the context ignores unknown objects.
fn parse_vector<E: Default + 'static>(
    element: &OptionDescriptor,
    separator: char,
    name: &str,
    value: &str,
    opts: &ConfigOptions,
    out: &mut Vec<E>,
) -> Result<()> {
    out.clear();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    // A sequence whose serialized elements contain assignments arrives
    // wrapped in one brace layer; peel it when it spans the whole value.
    let peeled;
    let mut value = trimmed;
    if trimmed.starts_with('{') {
        let (interior, end) = next_token(trimmed, separator, 0)?;
        if end.is_none() {
            peeled = interior;
            value = &peeled;
        }
    }
    // Force strict object resolution so a failed element is
    // distinguishable from a missing one.
    let mut strict = opts.clone();
    strict.ignore_unknown_objects = false;
    let mut start = 0usize;
    loop {
        let (token, end) = next_token(value, separator, start)?;
        let mut elem = E::default();
        match element.parse_option(name, &token, &strict, &mut elem) {
            Ok(()) => out.push(elem),
            Err(err) if err.is_not_supported() && opts.ignore_unknown_objects => {}
            Err(err) => return Err(err),
        }
        match end {
            Some(pos) => start = pos + 1,
            None => break,
        }
    }
    Ok(())
}

fn serialize_vector<E: 'static>(
    element: &OptionDescriptor,
    separator: char,
    name: &str,
    opts: &ConfigOptions,
    items: &[E],
) -> Result<String> {
    let embedded = opts.embedded();
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(element.serialize_option(name, item, &embedded)?);
    }
    let joined = parts.join(&separator.to_string());
    // A compound element would be ambiguous against the pair grammar, so
    // the whole sequence gets wrapped.
    if joined.contains('=') {
        Ok(format!("{{{joined}}}"))
    } else {
        Ok(joined)
    }
}

fn matches_vector<E: 'static>(
    element: &OptionDescriptor,
    name: &str,
    opts: &ConfigOptions,
    this: &[E],
    that: &[E],
    mismatch: &mut String,
) -> bool {
    if this.len() != that.len() {
        *mismatch = name.to_string();
        return false;
    }
    for (a, b) in this.iter().zip(that.iter()) {
        if !element.matches_option(name, a, b, opts, mismatch) {
            return false;
        }
    }
    true
}
