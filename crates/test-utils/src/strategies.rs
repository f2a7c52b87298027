//! Proptest strategies for the Keystone option-string grammar.
//!
//! Strategies produce well-formed grammar values while exploring edge
//! cases through random variation.
//!
//! # Usage
//!
//! ```no_run
//! use keystone_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(entries in strategies::arb_option_entries()) {
//!         let text = strategies::render_option_string(&entries);
//!         // parse `text` and check an invariant
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use proptest::prelude::*;

/// Generates an option key of 1-16 characters matching
/// `[a-z][a-z0-9_]{0,15}`.
pub fn arb_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Generates a scalar value token free of grammar characters.
pub fn arb_scalar() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9._-]{0,11}"
}

/// Generates an integer token, optionally carrying a size multiplier
/// suffix.
pub fn arb_int_token() -> impl Strategy<Value = String> {
    (0u64..1_000_000, prop::sample::select(vec!["", "k", "K", "M", "G", "T"]))
        .prop_map(|(n, suffix)| format!("{n}{suffix}"))
}

/// Generates a raw string value over printable ASCII, including the
/// grammar characters (`= ; { } #`), backslashes, and padding - the
/// inputs that exercise escaping.
pub fn arb_raw_string() -> impl Strategy<Value = String> {
    "[ -~]{0,20}"
}

/// A value in a generated option tree: either a scalar token or a
/// nested block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// A bare token.
    Scalar(String),
    /// A brace-wrapped nested option string.
    Nested(BTreeMap<String, OptionValue>),
}

/// Generates an [`OptionValue`] nested up to three levels deep.
pub fn arb_option_value() -> impl Strategy<Value = OptionValue> {
    let leaf = arb_scalar().prop_map(OptionValue::Scalar);
    leaf.prop_recursive(3, 16, 4, |inner| {
        proptest::collection::btree_map(arb_key(), inner, 1..4).prop_map(OptionValue::Nested)
    })
}

/// Generates a top-level set of option entries with unique keys.
pub fn arb_option_entries() -> impl Strategy<Value = BTreeMap<String, OptionValue>> {
    proptest::collection::btree_map(arb_key(), arb_option_value(), 1..5)
}

fn render_value(value: &OptionValue, out: &mut String) {
    match value {
        OptionValue::Scalar(token) => out.push_str(token),
        OptionValue::Nested(entries) => {
            out.push('{');
            out.push_str(&render_option_string(entries));
            out.push('}');
        }
    }
}

/// Renders entries to the textual `key=value;...` form.
pub fn render_option_string(entries: &BTreeMap<String, OptionValue>) -> String {
    let mut out = String::new();
    for (idx, (key, value)) in entries.iter().enumerate() {
        if idx > 0 {
            out.push(';');
        }
        out.push_str(key);
        out.push('=');
        render_value(value, &mut out);
    }
    out
}

/// Wraps `input` in `layers` brace layers with `pad` around each layer,
/// producing the decorated forms the parser must be insensitive to.
pub fn decorate(input: &str, layers: usize, pad: &str) -> String {
    let mut out = input.to_string();
    for _ in 0..layers {
        out = format!("{pad}{{{pad}{out}{pad}}}{pad}");
    }
    out
}

/// Generates a decoration: a brace-layer count and a whitespace pad.
pub fn arb_decoration() -> impl Strategy<Value = (usize, String)> {
    (0usize..3, prop::sample::select(vec!["", " ", "  ", "\t", "\n "]))
        .prop_map(|(layers, pad)| (layers, pad.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested() {
        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), OptionValue::Scalar("3".to_string()));
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), OptionValue::Scalar("1".to_string()));
        entries.insert("s".to_string(), OptionValue::Nested(inner));
        assert_eq!(render_option_string(&entries), "a=1;s={x=3}");
    }

    #[test]
    fn test_decorate() {
        assert_eq!(decorate("a=1", 0, " "), "a=1");
        assert_eq!(decorate("a=1", 1, ""), "{a=1}");
        let double = decorate("a=1", 2, " ");
        assert!(double.contains("a=1"));
        assert_eq!(double.matches('{').count(), 2);
        assert_eq!(double.matches('}').count(), 2);
    }
}
