//! Prefix extractor transforms and their legacy string encodings.
//!
//! Prefix extractors predate the object registry: their only textual
//! projection is a short form (`fixed:N`, `capped:N`) or the long
//! instance name (`keystone.FixedPrefix.N`). The option codec accepts
//! both, plus the `nullptr` sentinel for an unset slot.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lexer::NULLPTR_SENTINEL;
use crate::primitives::parse_unsigned;

/// Extracts a bucketing prefix from a key.
///
/// Implementations are immutable and shared; the configured slot type is
/// `Option<Arc<dyn PrefixExtractor>>`.
pub trait PrefixExtractor: Send + Sync {
    /// Stable instance name, e.g. `keystone.FixedPrefix.8`. Used as the
    /// serialized form and as the comparison surrogate.
    fn name(&self) -> String;

    /// Extracts the prefix of `key`. Only called when
    /// [`in_domain`](Self::in_domain) returned true.
    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8];

    /// True if `key` is long enough to carry a prefix.
    fn in_domain(&self, key: &[u8]) -> bool;
}

/// Extracts the first `len` bytes; keys shorter than `len` are out of
/// domain.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrefixExtractor {
    len: usize,
}

impl PrefixExtractor for FixedPrefixExtractor {
    fn name(&self) -> String {
        format!("keystone.FixedPrefix.{}", self.len)
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        &key[..self.len]
    }

    fn in_domain(&self, key: &[u8]) -> bool {
        key.len() >= self.len
    }
}

/// Extracts up to `cap` bytes; shorter keys map to themselves.
#[derive(Debug, Clone, Copy)]
pub struct CappedPrefixExtractor {
    cap: usize,
}

impl PrefixExtractor for CappedPrefixExtractor {
    fn name(&self) -> String {
        format!("keystone.CappedPrefix.{}", self.cap)
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        &key[..key.len().min(self.cap)]
    }

    fn in_domain(&self, _key: &[u8]) -> bool {
        true
    }
}

/// Identity transform.
#[derive(Debug, Clone, Copy)]
pub struct NoopPrefixExtractor;

impl PrefixExtractor for NoopPrefixExtractor {
    fn name(&self) -> String {
        "keystone.Noop".to_string()
    }

    fn transform<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        key
    }

    fn in_domain(&self, _key: &[u8]) -> bool {
        true
    }
}

/// Creates a fixed-length prefix extractor.
pub fn new_fixed_prefix_extractor(len: usize) -> Arc<dyn PrefixExtractor> {
    Arc::new(FixedPrefixExtractor { len })
}

/// Creates a capped-length prefix extractor.
pub fn new_capped_prefix_extractor(cap: usize) -> Arc<dyn PrefixExtractor> {
    Arc::new(CappedPrefixExtractor { cap })
}

/// Creates the identity extractor.
pub fn new_noop_prefix_extractor() -> Arc<dyn PrefixExtractor> {
    Arc::new(NoopPrefixExtractor)
}

/// Tries one (fixed, capped) prefix naming scheme; `Ok(None)` means the
/// value uses neither spelling.
fn parse_with_prefixes(
    fixed_prefix: &str,
    capped_prefix: &str,
    value: &str,
) -> Result<Option<Arc<dyn PrefixExtractor>>> {
    if let Some(rest) = value.strip_prefix(fixed_prefix) {
        if !rest.is_empty() {
            return Ok(Some(new_fixed_prefix_extractor(parse_unsigned(rest.trim())?)));
        }
    }
    if let Some(rest) = value.strip_prefix(capped_prefix) {
        if !rest.is_empty() {
            return Ok(Some(new_capped_prefix_extractor(parse_unsigned(rest.trim())?)));
        }
    }
    Ok(None)
}

/// Parses the textual form of a prefix extractor slot.
///
/// Accepts `fixed:N`, `capped:N`, `keystone.FixedPrefix.N`,
/// `keystone.CappedPrefix.N`, `keystone.Noop`, and the `nullptr`
/// sentinel (yielding `None`).
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for any other form.
pub fn parse_prefix_extractor(value: &str) -> Result<Option<Arc<dyn PrefixExtractor>>> {
    let value = value.trim();
    if value == NULLPTR_SENTINEL {
        return Ok(None);
    }
    if value == "keystone.Noop" {
        return Ok(Some(new_noop_prefix_extractor()));
    }
    if let Some(extractor) = parse_with_prefixes("fixed:", "capped:", value)? {
        return Ok(Some(extractor));
    }
    if let Some(extractor) =
        parse_with_prefixes("keystone.FixedPrefix.", "keystone.CappedPrefix.", value)?
    {
        return Ok(Some(extractor));
    }
    Err(Error::invalid_argument(format!("cannot parse '{value}' as a prefix extractor")))
}

/// Serialized form of a prefix extractor slot: the instance name, or the
/// `nullptr` sentinel when unset.
pub fn format_prefix_extractor(slot: Option<&Arc<dyn PrefixExtractor>>) -> String {
    match slot {
        Some(extractor) => extractor.name(),
        None => NULLPTR_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_forms() {
        let fixed = parse_prefix_extractor("fixed:5").unwrap().unwrap();
        assert_eq!(fixed.name(), "keystone.FixedPrefix.5");
        let capped = parse_prefix_extractor("capped: 11").unwrap().unwrap();
        assert_eq!(capped.name(), "keystone.CappedPrefix.11");
    }

    #[test]
    fn test_parse_long_forms_round_trip() {
        for form in ["keystone.FixedPrefix.8", "keystone.CappedPrefix.3", "keystone.Noop"] {
            let extractor = parse_prefix_extractor(form).unwrap().unwrap();
            assert_eq!(extractor.name(), form);
        }
    }

    #[test]
    fn test_parse_nullptr() {
        assert!(parse_prefix_extractor("nullptr").unwrap().is_none());
        assert_eq!(format_prefix_extractor(None), "nullptr");
    }

    #[test]
    fn test_parse_rejects_unknown_forms() {
        for form in ["fixed", "fixed:", "fixed:x", "keystone.Unknown", "prefix:3", ""] {
            assert!(parse_prefix_extractor(form).is_err(), "form: {form:?}");
        }
    }

    #[test]
    fn test_transform_behavior() {
        let fixed = new_fixed_prefix_extractor(3);
        assert!(fixed.in_domain(b"abcdef"));
        assert!(!fixed.in_domain(b"ab"));
        assert_eq!(fixed.transform(b"abcdef"), b"abc");

        let capped = new_capped_prefix_extractor(4);
        assert_eq!(capped.transform(b"ab"), b"ab");
        assert_eq!(capped.transform(b"abcdef"), b"abcd");

        let noop = new_noop_prefix_extractor();
        assert_eq!(noop.transform(b"xyz"), b"xyz");
    }
}
