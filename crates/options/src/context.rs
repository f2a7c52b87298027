//! The invocation context threaded through every engine operation.
//!
//! [`ConfigOptions`] is an explicit immutable value: child operations
//! clone it and override fields rather than consulting any ambient
//! state. [`ConfigOptions::embedded`] is the clone used whenever the
//! engine recurses into a nested value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::env::{Env, HostEnv};
use crate::registry::ObjectRegistry;

/// Strictness of a [`matches`](crate::Configurable::matches) comparison.
///
/// Levels are totally ordered: `None < LooselyCompatible < ExactMatch`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SanityLevel {
    /// Nothing is compared; every pair of objects matches.
    None,
    /// Values flagged loose-compare may differ; identifiers and exact
    /// fields must agree.
    LooselyCompatible,
    /// Every compared field must agree exactly.
    #[default]
    ExactMatch,
}

/// Diagnostic sink for engine messages.
///
/// Messages also flow to `tracing`; a sink is only needed when the host
/// wants configuration diagnostics routed into its own log object.
pub trait InfoLog: Send + Sync {
    /// Reports one diagnostic message.
    fn log(&self, message: &str);
}

/// Controls how option strings are parsed, serialized, and compared.
///
/// Contexts are cheap to clone; the registry and environment handles are
/// shared. The engine never stores a context: it is passed explicitly
/// through every call.
#[derive(Clone)]
pub struct ConfigOptions {
    /// Separator between top-level option pairs.
    pub delimiter: String,
    /// If true, string values are unescaped before parsing.
    pub input_strings_escaped: bool,
    /// If true, unknown keys are dropped instead of rejected.
    pub ignore_unknown_options: bool,
    /// If true, unknown polymorphic identifiers yield a null child
    /// instead of failing.
    pub ignore_unknown_objects: bool,
    /// Maximum comparison strictness honored by `matches`.
    pub sanity_level: SanityLevel,
    /// If true, `prepare_options` runs implicitly after configuration.
    pub invoke_prepare_options: bool,
    /// Factory registry used to materialize customizable objects.
    pub registry: Arc<ObjectRegistry>,
    /// Platform handle passed to factories and dynamic loading.
    pub env: Arc<dyn Env>,
    /// Optional diagnostic sink.
    pub info_log: Option<Arc<dyn InfoLog>>,
}

fn default_delimiter() -> String {
    ";".to_string()
}

#[bon::bon]
impl ConfigOptions {
    /// Creates a new invocation context.
    #[builder]
    pub fn new(
        #[builder(default = default_delimiter())] delimiter: String,
        #[builder(default = false)] input_strings_escaped: bool,
        #[builder(default = false)] ignore_unknown_options: bool,
        #[builder(default = false)] ignore_unknown_objects: bool,
        #[builder(default = SanityLevel::ExactMatch)] sanity_level: SanityLevel,
        #[builder(default = true)] invoke_prepare_options: bool,
        #[builder(default = ObjectRegistry::new())] registry: Arc<ObjectRegistry>,
        #[builder(default = Arc::new(HostEnv) as Arc<dyn Env>)] env: Arc<dyn Env>,
        info_log: Option<Arc<dyn InfoLog>>,
    ) -> Self {
        Self {
            delimiter,
            input_strings_escaped,
            ignore_unknown_options,
            ignore_unknown_objects,
            sanity_level,
            invoke_prepare_options,
            registry,
            env,
            info_log,
        }
    }
}

impl ConfigOptions {
    /// The context used when recursing into a nested value: delimiter
    /// forced to `;`, implicit prepare suspended.
    pub fn embedded(&self) -> Self {
        let mut embedded = self.clone();
        embedded.delimiter = default_delimiter();
        embedded.invoke_prepare_options = false;
        embedded
    }

    /// True if an option whose declared comparison level is `level`
    /// should be compared under this context.
    ///
    /// Loose-compare options are exempt under a loosely-compatible
    /// context and only enforced under exact matching; default (exact)
    /// options are enforced whenever checking is enabled at all.
    pub fn is_check_enabled(&self, level: SanityLevel) -> bool {
        match level {
            SanityLevel::None => false,
            SanityLevel::LooselyCompatible => self.sanity_level == SanityLevel::ExactMatch,
            SanityLevel::ExactMatch => self.sanity_level > SanityLevel::None,
        }
    }

    /// True if comparison is disabled entirely.
    pub fn is_check_disabled(&self) -> bool {
        self.sanity_level == SanityLevel::None
    }

    /// Routes a diagnostic message to the configured sink and to
    /// `tracing`.
    pub(crate) fn report(&self, message: &str) {
        tracing::debug!(target: "keystone_options", "{message}");
        if let Some(sink) = &self.info_log {
            sink.log(message);
        }
    }
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("delimiter", &self.delimiter)
            .field("input_strings_escaped", &self.input_strings_escaped)
            .field("ignore_unknown_options", &self.ignore_unknown_options)
            .field("ignore_unknown_objects", &self.ignore_unknown_objects)
            .field("sanity_level", &self.sanity_level)
            .field("invoke_prepare_options", &self.invoke_prepare_options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConfigOptions::default();
        assert_eq!(opts.delimiter, ";");
        assert!(!opts.input_strings_escaped);
        assert!(!opts.ignore_unknown_options);
        assert!(!opts.ignore_unknown_objects);
        assert_eq!(opts.sanity_level, SanityLevel::ExactMatch);
        assert!(opts.invoke_prepare_options);
    }

    #[test]
    fn test_embedded_forces_delimiter_and_suspends_prepare() {
        let opts = ConfigOptions::builder()
            .delimiter("\n".to_string())
            .invoke_prepare_options(true)
            .build();
        let embedded = opts.embedded();
        assert_eq!(embedded.delimiter, ";");
        assert!(!embedded.invoke_prepare_options);
        // Other fields carry over.
        assert_eq!(embedded.sanity_level, opts.sanity_level);
    }

    #[test]
    fn test_sanity_level_ordering() {
        assert!(SanityLevel::None < SanityLevel::LooselyCompatible);
        assert!(SanityLevel::LooselyCompatible < SanityLevel::ExactMatch);
    }

    #[test]
    fn test_check_enabled() {
        let exact = ConfigOptions::default();
        assert!(exact.is_check_enabled(SanityLevel::ExactMatch));
        assert!(exact.is_check_enabled(SanityLevel::LooselyCompatible));
        assert!(!exact.is_check_enabled(SanityLevel::None));

        let loose =
            ConfigOptions::builder().sanity_level(SanityLevel::LooselyCompatible).build();
        // Exact-declared options still matter for loose compatibility;
        // loose-declared options are allowed to differ there.
        assert!(loose.is_check_enabled(SanityLevel::ExactMatch));
        assert!(!loose.is_check_enabled(SanityLevel::LooselyCompatible));

        let none = ConfigOptions::builder().sanity_level(SanityLevel::None).build();
        assert!(none.is_check_disabled());
        assert!(!none.is_check_enabled(SanityLevel::ExactMatch));
    }
}
