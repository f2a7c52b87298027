//! Customizable objects: configurables addressable by registry
//! identifier.
//!
//! A [`Customizable`] is a [`Configurable`] that additionally carries a
//! class name and an instance identifier, and can be constructed by
//! identifier through an [`ObjectRegistry`](crate::ObjectRegistry).
//! Textually a customizable value is written either as a bare
//! identifier (`child=bloom`) or as a nested block carrying the
//! identifier plus options (`child={id=bloom;bits=10}`).

use crate::configurable::Configurable;
use crate::context::ConfigOptions;
use crate::error::{Error, Result};
use crate::lexer::{string_to_map, OptionMap, NULLPTR_SENTINEL};
use crate::registry::ObjectKind;

/// Property key carrying the identifier inside a nested customizable
/// block.
pub const ID_PROP_NAME: &str = "id";

/// A configurable object identified by a registry id.
pub trait Customizable: Configurable {
    /// The class name of this implementation.
    fn name(&self) -> &'static str;

    /// The instance identifier. Defaults to the class name; instances
    /// parameterized at construction time (`fixed:16`-style) override
    /// this with their full spelling.
    fn id(&self) -> &str {
        self.name()
    }

    /// True if this instance answers to `id` as either its class name
    /// or its instance identifier.
    fn is_instance_of(&self, id: &str) -> bool {
        self.name() == id || self.id() == id
    }
}

/// Strips a customizable's `<name>.` prefix from a long option name.
///
/// Intended for [`Configurable::option_name`] implementations:
/// an object named `bloom` resolves `bloom.bits_per_key` to
/// `bits_per_key`.
pub fn strip_id_prefix<'a>(name: &str, long_name: &'a str) -> &'a str {
    match long_name.strip_prefix(name) {
        Some(rest) => rest.strip_prefix('.').filter(|r| !r.is_empty()).unwrap_or(long_name),
        None => long_name,
    }
}

/// Splits a customizable value into its identifier and residual
/// property map.
///
/// - empty or `nullptr` → `(None, {})`
/// - a bare token → `(Some(token), {})`
/// - a nested block → [`string_to_map`], with the `id` key extracted
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on grammar failures in the nested
/// block.
pub fn options_map(value: &str) -> Result<(Option<String>, OptionMap)> {
    let value = value.trim();
    if value.is_empty() || value == NULLPTR_SENTINEL {
        return Ok((None, OptionMap::new()));
    }
    if !value.contains('=') {
        return Ok((Some(value.to_string()), OptionMap::new()));
    }
    let mut props = string_to_map(value)?;
    let id = props.remove(ID_PROP_NAME);
    Ok((id, props))
}

/// Serializes a customizable to its textual value: the bare identifier
/// when the object has no serializable options, otherwise a braced
/// block of `id=...` followed by the options.
///
/// # Errors
///
/// Propagates serialization failures from the object's option groups.
pub fn to_string<T: Customizable + ?Sized>(object: &T, opts: &ConfigOptions) -> Result<String> {
    let body = object.as_string("", opts)?;
    if body.is_empty() {
        Ok(object.id().to_string())
    } else {
        Ok(format!("{{{}={};{}}}", ID_PROP_NAME, object.id(), body))
    }
}

/// Instantiates a polymorphic object from its textual value through the
/// context's registry, then applies the residual options.
///
/// Returns `Ok(None)` for the empty/`nullptr` value, and - when the
/// context ignores unknown objects - for an unknown identifier.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when options are given without an
/// identifier, [`Error::NotFound`] for an unknown identifier, and any
/// configuration failure from the new object.
pub fn create_from_string<T>(value: &str, opts: &ConfigOptions) -> Result<Option<Box<T>>>
where
    T: Customizable + ObjectKind + ?Sized + 'static,
{
    let (id, props) = options_map(value)?;
    let Some(id) = id else {
        if props.is_empty() {
            return Ok(None);
        }
        return Err(Error::invalid_argument("Name property is missing"));
    };
    let mut object = match opts.registry.new_object::<T>(&id, opts) {
        Ok(object) => object,
        Err(err) if err.is_not_found() && opts.ignore_unknown_objects => {
            opts.report(&format!("ignoring unknown object '{id}'"));
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let mut copy = opts.clone();
    copy.ignore_unknown_options = false;
    object.configure_from_map(&props, &copy)?;
    Ok(Some(object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_map_forms() {
        assert_eq!(options_map("").unwrap(), (None, OptionMap::new()));
        assert_eq!(options_map("nullptr").unwrap(), (None, OptionMap::new()));
        assert_eq!(options_map("bloom").unwrap(), (Some("bloom".to_string()), OptionMap::new()));

        let (id, props) = options_map("id=bloom;bits=10").unwrap();
        assert_eq!(id.as_deref(), Some("bloom"));
        assert_eq!(props.get("bits"), Some("10"));
        assert!(!props.contains_key("id"));
    }

    #[test]
    fn test_options_map_braced_block() {
        let (id, props) = options_map("{id=bloom;bits=10}").unwrap();
        assert_eq!(id.as_deref(), Some("bloom"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_options_map_without_id() {
        let (id, props) = options_map("bits=10").unwrap();
        assert_eq!(id, None);
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_strip_id_prefix() {
        assert_eq!(strip_id_prefix("bloom", "bloom.bits"), "bits");
        assert_eq!(strip_id_prefix("bloom", "bloom.a.b"), "a.b");
        assert_eq!(strip_id_prefix("bloom", "bits"), "bits");
        assert_eq!(strip_id_prefix("bloom", "bloom"), "bloom");
        assert_eq!(strip_id_prefix("bloom", "bloomer.bits"), "bloomer.bits");
    }
}
