//! The fixed set of domain enums addressable from option strings.
//!
//! Each enum carries a `STRING_MAP` associating its textual spelling with
//! the value; [`parse_enum`] and [`format_enum`] drive those tables and
//! are also the implementation behind user-supplied enum mappings.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Looks `token` up in an enum string table.
pub fn parse_enum<E: Copy + PartialEq>(table: &[(&str, E)], token: &str) -> Option<E> {
    table.iter().find(|(name, _)| *name == token).map(|(_, value)| *value)
}

/// Finds the textual spelling of `value` in an enum string table.
pub fn format_enum<'a, E: Copy + PartialEq>(table: &'a [(&'a str, E)], value: E) -> Option<&'a str> {
    table.iter().find(|(_, v)| *v == value).map(|(name, _)| *name)
}

/// Parses an enum token, failing with the option name in the message.
pub(crate) fn parse_enum_checked<E: Copy + PartialEq>(
    table: &[(&str, E)],
    name: &str,
    token: &str,
) -> Result<E> {
    parse_enum(table, token)
        .ok_or_else(|| Error::invalid_argument(format!("No mapping for enum {name}: '{token}'")))
}

/// Formats an enum value, failing with the option name in the message.
pub(crate) fn format_enum_checked<E: Copy + PartialEq>(
    table: &[(&str, E)],
    name: &str,
    value: E,
) -> Result<String> {
    format_enum(table, value)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_argument(format!("No mapping for enum {name}")))
}

/// Block and value compression algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionType {
    /// No compression.
    #[default]
    None,
    /// Snappy block compression.
    Snappy,
    /// Zlib/deflate compression.
    Zlib,
    /// Bzip2 compression.
    Bzip2,
    /// LZ4 fast compression.
    Lz4,
    /// LZ4 high-compression mode.
    Lz4hc,
    /// Zstandard compression.
    Zstd,
    /// Compression explicitly disabled for this slot (distinct from
    /// `None`, which inherits the column default).
    Disabled,
}

impl CompressionType {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, CompressionType)] = &[
        ("none", CompressionType::None),
        ("snappy", CompressionType::Snappy),
        ("zlib", CompressionType::Zlib),
        ("bzip2", CompressionType::Bzip2),
        ("lz4", CompressionType::Lz4),
        ("lz4hc", CompressionType::Lz4hc),
        ("zstd", CompressionType::Zstd),
        ("disabled", CompressionType::Disabled),
    ];
}

/// How the storage engine organizes files during compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionStyle {
    /// Leveled compaction.
    #[default]
    Level,
    /// Size-tiered / universal compaction.
    Universal,
    /// FIFO compaction (drop oldest files).
    Fifo,
    /// Compaction disabled.
    None,
}

impl CompactionStyle {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, CompactionStyle)] = &[
        ("level", CompactionStyle::Level),
        ("universal", CompactionStyle::Universal),
        ("fifo", CompactionStyle::Fifo),
        ("none", CompactionStyle::None),
    ];
}

/// Which files leveled compaction picks first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionPri {
    /// Prefer files with the largest compensated size.
    #[default]
    ByCompensatedSize,
    /// Prefer the file whose newest entry is oldest.
    OldestLargestSeqFirst,
    /// Prefer the file whose oldest entry is oldest.
    OldestSmallestSeqFirst,
    /// Prefer files overlapping the least with the next level.
    MinOverlappingRatio,
}

impl CompactionPri {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, CompactionPri)] = &[
        ("by-compensated-size", CompactionPri::ByCompensatedSize),
        ("oldest-largest-seq-first", CompactionPri::OldestLargestSeqFirst),
        ("oldest-smallest-seq-first", CompactionPri::OldestSmallestSeqFirst),
        ("min-overlapping-ratio", CompactionPri::MinOverlappingRatio),
    ];
}

/// Checksum algorithm applied to stored blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumType {
    /// No block checksums.
    None,
    /// CRC-32C.
    #[default]
    Crc32c,
    /// 32-bit xxHash.
    XxHash,
    /// 64-bit xxHash.
    XxHash64,
}

impl ChecksumType {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, ChecksumType)] = &[
        ("none", ChecksumType::None),
        ("crc32c", ChecksumType::Crc32c),
        ("xxhash", ChecksumType::XxHash),
        ("xxhash64", ChecksumType::XxHash64),
    ];
}

/// Key encoding inside table blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingType {
    /// Full keys stored verbatim.
    #[default]
    Plain,
    /// Shared-prefix key encoding.
    Prefix,
}

impl EncodingType {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, EncodingType)] =
        &[("plain", EncodingType::Plain), ("prefix", EncodingType::Prefix)];
}

/// When universal compaction stops widening a candidate run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionStopStyle {
    /// Stop when the next file is no longer of similar size.
    #[default]
    SimilarSize,
    /// Stop based on the total size of the run.
    TotalSize,
}

impl CompactionStopStyle {
    /// Textual spellings accepted in option strings.
    pub const STRING_MAP: &'static [(&'static str, CompactionStopStyle)] = &[
        ("similar-size", CompactionStopStyle::SimilarSize),
        ("total-size", CompactionStopStyle::TotalSize),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_are_inverse() {
        for &(name, value) in CompressionType::STRING_MAP {
            assert_eq!(parse_enum(CompressionType::STRING_MAP, name), Some(value));
            assert_eq!(format_enum(CompressionType::STRING_MAP, value), Some(name));
        }
    }

    #[test]
    fn test_unknown_token_fails() {
        assert_eq!(parse_enum(ChecksumType::STRING_MAP, "md5"), None);
        let err = parse_enum_checked(ChecksumType::STRING_MAP, "checksum", "md5").unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_every_variant_has_a_spelling() {
        assert_eq!(format_enum(CompactionStyle::STRING_MAP, CompactionStyle::Fifo), Some("fifo"));
        assert_eq!(
            format_enum(CompactionPri::STRING_MAP, CompactionPri::MinOverlappingRatio),
            Some("min-overlapping-ratio")
        );
        assert_eq!(
            format_enum(CompactionStopStyle::STRING_MAP, CompactionStopStyle::TotalSize),
            Some("total-size")
        );
        assert_eq!(format_enum(EncodingType::STRING_MAP, EncodingType::Prefix), Some("prefix"));
    }
}
