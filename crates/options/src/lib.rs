//! keystone-options: the configuration engine of the Keystone storage
//! library.
//!
//! The engine turns human-authored option strings and string-keyed maps
//! into live, typed option structures, and reverses that transformation
//! for diagnostics, persistence, and equality comparison. The rest of
//! the storage library registers option descriptors here and receives
//! fully built, validated option structures back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Configurable API                │
//! │ (configure, serialize, match, prepare, ...) │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │         Descriptor Tables & Codecs           │
//! │ (typed accessors, structs, vectors, enums)  │
//! └───────┬─────────────────────────┬───────────┘
//!         │                         │
//! ┌───────▼───────────┐   ┌─────────▼───────────┐
//! │       Lexer        │   │   Object Registry   │
//! │ (tokens, escaping) │   │ (factories, dylibs) │
//! └────────────────────┘   └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use keystone_options::{string_to_map, ConfigOptions};
//!
//! let map = string_to_map("write_buffer_size=64M;compaction={style=level}")?;
//! assert_eq!(map.get("write_buffer_size"), Some("64M"));
//!
//! // Contexts are explicit values threaded through every operation.
//! let opts = ConfigOptions::builder().ignore_unknown_options(true).build();
//! assert_eq!(opts.delimiter, ";");
//! # Ok::<(), keystone_options::Error>(())
//! ```
//!
//! Objects participate by implementing [`Configurable`] (see the
//! worked example on that trait); polymorphic subsystems additionally
//! implement [`Customizable`] and are constructed by identifier through
//! an [`ObjectRegistry`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
// Descriptor closures are inherently type-erased plumbing.
#![allow(clippy::type_complexity)]

pub mod configurable;
pub mod context;
pub mod customizable;
pub mod descriptor;
pub mod env;
pub mod enums;
pub mod error;
pub mod lexer;
pub mod prefix;
pub mod primitives;
pub mod registry;

// Re-export the working surface
pub use configurable::{Configurable, LifecycleState, OptionGroup};
pub use context::{ConfigOptions, InfoLog, SanityLevel};
pub use customizable::{create_from_string, Customizable, ID_PROP_NAME};
pub use descriptor::{
    OptionDescriptor, OptionFlags, OptionKind, OptionTable, OptionVerification,
};
pub use env::{DynamicLibrary, Env, HostEnv};
pub use enums::{
    ChecksumType, CompactionPri, CompactionStopStyle, CompactionStyle, CompressionType,
    EncodingType,
};
pub use error::{Error, Result};
pub use lexer::{
    escape_option_string, next_token, string_to_map, unescape_option_string, OptionMap,
    NULLPTR_SENTINEL,
};
pub use prefix::{
    new_capped_prefix_extractor, new_fixed_prefix_extractor, new_noop_prefix_extractor,
    PrefixExtractor,
};
pub use registry::{DynamicRegistrarFn, ObjectKind, ObjectLibrary, ObjectPattern, ObjectRegistry};
