//! The uniform configuration protocol.
//!
//! A [`Configurable`] owns one or more named option groups, each pairing
//! a record (a plain struct of option fields) with a static descriptor
//! table. Implementors provide group access plus the lifecycle hooks;
//! every driver operation - configure, serialize, match, prepare,
//! validate - is supplied by the trait.
//!
//! ```no_run
//! use std::any::Any;
//! use std::sync::LazyLock;
//!
//! use keystone_options::{
//!     ConfigOptions, Configurable, LifecycleState, OptionDescriptor, OptionGroup, OptionTable,
//! };
//!
//! #[derive(Debug, Default)]
//! struct WriterOptions {
//!     buffer_size: usize,
//!     sync: bool,
//! }
//!
//! fn writer_table() -> &'static OptionTable {
//!     static TABLE: LazyLock<OptionTable> = LazyLock::new(|| {
//!         OptionTable::new()
//!             .with(
//!                 "buffer_size",
//!                 OptionDescriptor::size(
//!                     |o: &WriterOptions| o.buffer_size,
//!                     |o: &mut WriterOptions, v| o.buffer_size = v,
//!                 ),
//!             )
//!             .with(
//!                 "sync",
//!                 OptionDescriptor::boolean(
//!                     |o: &WriterOptions| o.sync,
//!                     |o: &mut WriterOptions, v| o.sync = v,
//!                 ),
//!             )
//!     });
//!     &TABLE
//! }
//!
//! #[derive(Debug, Default)]
//! struct Writer {
//!     options: WriterOptions,
//!     lifecycle: LifecycleState,
//! }
//!
//! impl Configurable for Writer {
//!     fn groups(&self) -> Vec<OptionGroup> {
//!         vec![OptionGroup::new("writer", writer_table())]
//!     }
//!     fn record(&self, group: &str) -> Option<&dyn Any> {
//!         (group == "writer").then_some(&self.options as &dyn Any)
//!     }
//!     fn record_mut(&mut self, group: &str) -> Option<&mut dyn Any> {
//!         (group == "writer").then_some(&mut self.options as &mut dyn Any)
//!     }
//!     fn lifecycle(&self) -> &LifecycleState {
//!         &self.lifecycle
//!     }
//!     fn as_configurable(&self) -> &dyn Configurable {
//!         self
//!     }
//!     fn as_configurable_mut(&mut self) -> &mut dyn Configurable {
//!         self
//!     }
//! }
//!
//! let mut writer = Writer::default();
//! writer.configure_from_string("buffer_size=4M;sync=true", &ConfigOptions::default())?;
//! assert_eq!(writer.options.buffer_size, 4 << 20);
//! # Ok::<(), keystone_options::Error>(())
//! ```

use std::any::Any;
use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::context::ConfigOptions;
use crate::descriptor::{OptionDescriptor, OptionFlags, OptionTable};
use crate::error::{Error, Result};
use crate::lexer::{string_to_map, OptionMap, NULLPTR_SENTINEL};

/// One named option group: a record paired with its descriptor table.
///
/// Tables live in statics (typically `LazyLock`), so groups are cheap
/// `Copy` values rebuilt on every [`Configurable::groups`] call.
#[derive(Debug, Clone, Copy)]
pub struct OptionGroup {
    name: &'static str,
    table: &'static OptionTable,
}

impl OptionGroup {
    /// Creates a group binding `name` to `table`.
    pub const fn new(name: &'static str, table: &'static OptionTable) -> Self {
        Self { name, table }
    }

    /// The group name used with [`Configurable::record`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The descriptor table.
    pub fn table(&self) -> &'static OptionTable {
        self.table
    }
}

#[derive(Debug, Default)]
struct LifecycleInner {
    prepared: bool,
    failure: Option<Error>,
}

/// Records the outcome of the last `prepare_options` run.
///
/// Every [`Configurable`] embeds one; a stored failure is surfaced by
/// subsequent `validate_options` calls until a later prepare succeeds.
#[derive(Debug, Default)]
pub struct LifecycleState {
    inner: Mutex<LifecycleInner>,
}

impl LifecycleState {
    /// Creates a fresh, unprepared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a prepare pass has succeeded.
    pub fn is_prepared(&self) -> bool {
        self.inner.lock().prepared
    }

    /// The stored failure from the last prepare attempt, if any.
    pub fn last_failure(&self) -> Option<Error> {
        self.inner.lock().failure.clone()
    }

    /// Records the outcome of a prepare pass.
    pub fn record(&self, result: &Result<()>) {
        let mut inner = self.inner.lock();
        match result {
            Ok(()) => {
                inner.prepared = true;
                inner.failure = None;
            }
            Err(err) => {
                inner.prepared = false;
                inner.failure = Some(err.clone());
            }
        }
    }
}

/// The uniform configuration protocol.
///
/// Required methods expose the object's option groups, lifecycle cell,
/// and upcasts; the hooks (`prepare_local`, `validate_local`,
/// `parse_string_options`, `inner`, `option_name`) have no-op defaults.
/// All driver operations are provided.
pub trait Configurable: Send + Sync {
    /// Option groups owned by this object, in registration order.
    fn groups(&self) -> Vec<OptionGroup> {
        Vec::new()
    }

    /// Borrows the record for the named group.
    fn record(&self, group: &str) -> Option<&dyn Any> {
        let _ = group;
        None
    }

    /// Mutably borrows the record for the named group.
    fn record_mut(&mut self, group: &str) -> Option<&mut dyn Any> {
        let _ = group;
        None
    }

    /// The cell recording this object's prepare outcome.
    fn lifecycle(&self) -> &LifecycleState;

    /// Upcast; implementors return `self`.
    fn as_configurable(&self) -> &dyn Configurable;

    /// Mutable upcast; implementors return `self`.
    fn as_configurable_mut(&mut self) -> &mut dyn Configurable;

    /// The wrapped inner configurable for has-a stacks, if any.
    fn inner(&self) -> Option<&dyn Configurable> {
        None
    }

    /// Mutable access to the wrapped inner configurable.
    fn inner_mut(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    /// Maps a long option name to the short form used in descriptor
    /// tables. Customizable implementations strip their `<name>.`
    /// prefix here.
    fn option_name<'a>(&self, name: &'a str) -> &'a str {
        name
    }

    /// Object-specific prepare work, run after owned children have been
    /// prepared. May mutate and perform blocking I/O.
    fn prepare_local(&mut self, opts: &ConfigOptions) -> Result<()> {
        let _ = opts;
        Ok(())
    }

    /// Object-specific validation, run after owned children have been
    /// validated. Must not mutate.
    fn validate_local(&self, db_opts: &dyn Any, cf_opts: &dyn Any) -> Result<()> {
        let _ = (db_opts, cf_opts);
        Ok(())
    }

    /// Handles configure strings that are not `key=value` maps.
    ///
    /// # Errors
    ///
    /// The default rejects any non-empty string with
    /// [`Error::InvalidArgument`].
    fn parse_string_options(&mut self, value: &str, opts: &ConfigOptions) -> Result<()> {
        if value.is_empty() {
            if opts.invoke_prepare_options {
                return self.prepare_options(opts);
            }
            Ok(())
        } else {
            Err(Error::invalid_argument(format!("Cannot parse option: {value}")))
        }
    }

    /// Applies every entry of `map` to this object's option groups.
    ///
    /// Application is multi-pass per group, so an option addressing a
    /// polymorphic child resolves no matter where its `id` assignment
    /// appears in the map. After a successful apply, `prepare_options`
    /// runs when the context requests it.
    ///
    /// # Errors
    ///
    /// Unknown keys fail with [`Error::NotFound`] unless
    /// `opts.ignore_unknown_options` is set; the first grammar or
    /// coercion failure terminates the pass with
    /// [`Error::InvalidArgument`].
    fn configure_from_map(&mut self, map: &OptionMap, opts: &ConfigOptions) -> Result<()> {
        do_configure_from_map(self, map, opts, None)
    }

    /// Like [`configure_from_map`](Self::configure_from_map), but
    /// collects keys not found in any group into `unused` instead of
    /// dropping them, for outer routing.
    fn configure_from_map_with_unused(
        &mut self,
        map: &OptionMap,
        opts: &ConfigOptions,
        unused: &mut OptionMap,
    ) -> Result<()> {
        do_configure_from_map(self, map, opts, Some(unused))
    }

    /// Parses `value` with [`string_to_map`] and applies the result.
    ///
    /// A string containing neither `;` nor `=` routes to
    /// [`parse_string_options`](Self::parse_string_options).
    fn configure_from_string(&mut self, value: &str, opts: &ConfigOptions) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if !value.contains(';') && !value.contains('=') {
            return self.parse_string_options(value, opts);
        }
        let map = string_to_map(value)?;
        self.configure_from_map(&map, opts)
    }

    /// Sets a single, possibly dotted, option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if no group knows the name.
    fn configure_option(&mut self, name: &str, value: &str, opts: &ConfigOptions) -> Result<()> {
        do_configure_option(self, name, value, opts)
    }

    /// Serializes every serializable option of every group as
    /// `key=value` pairs joined by the context delimiter, in stable
    /// table order.
    fn get_option_string(&self, opts: &ConfigOptions) -> Result<String> {
        let mut pairs = Vec::new();
        do_serialize(self, "", opts, &mut pairs)?;
        Ok(pairs.join(&opts.delimiter))
    }

    /// Serializes like
    /// [`get_option_string`](Self::get_option_string) with every key
    /// prefixed by `prefix`.
    fn as_string(&self, prefix: &str, opts: &ConfigOptions) -> Result<String> {
        let mut pairs = Vec::new();
        do_serialize(self, prefix, opts, &mut pairs)?;
        Ok(pairs.join(&opts.delimiter))
    }

    /// Nested-value form of the serialization: the body is wrapped in
    /// braces when it contains an assignment.
    fn to_string_opts(&self, opts: &ConfigOptions) -> Result<String> {
        let body = self.as_string("", opts)?;
        if body.is_empty() || !body.contains('=') {
            Ok(body)
        } else {
            Ok(format!("{{{body}}}"))
        }
    }

    /// Serialized value of one (possibly dotted) option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the option does not exist.
    fn get_option(&self, name: &str, opts: &ConfigOptions) -> Result<String> {
        do_get_option(self, name, &opts.embedded())
    }

    /// Names of all non-deprecated, non-alias options across groups.
    fn option_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for group in self.groups() {
            for (name, descriptor) in group.table().entries() {
                if !descriptor.is_deprecated() && !descriptor.is_alias() {
                    names.insert(name.to_string());
                }
            }
        }
        names
    }

    /// Typed view of the named group's record.
    fn get_options<T: 'static>(&self, group: &str) -> Option<&T>
    where
        Self: Sized,
    {
        self.record(group)?.downcast_ref()
    }

    /// Structural equality against `other`, honoring the context's
    /// sanity level. On mismatch, `mismatch` receives the dotted path of
    /// the first failing option.
    fn matches(&self, other: &dyn Configurable, opts: &ConfigOptions, mismatch: &mut String) -> bool {
        do_matches(self, other, opts, mismatch)
    }

    /// Prepares this object and its owned children, depth first.
    ///
    /// Idempotent after success; the outcome is recorded in the
    /// lifecycle cell either way.
    fn prepare_options(&mut self, opts: &ConfigOptions) -> Result<()> {
        if self.lifecycle().is_prepared() {
            return Ok(());
        }
        let result = do_prepare(self, opts);
        self.lifecycle().record(&result);
        if let Err(err) = &result {
            opts.report(&format!("prepare failed: {err}"));
        }
        result
    }

    /// Validates this object and its owned children, depth first,
    /// against the outer database and column-family option records.
    ///
    /// A failure stored by an earlier prepare attempt is surfaced
    /// first. Read-only.
    fn validate_options(&self, db_opts: &dyn Any, cf_opts: &dyn Any) -> Result<()> {
        if let Some(failure) = self.lifecycle().last_failure() {
            return Err(failure);
        }
        do_validate(self, db_opts, cf_opts)
    }
}

fn do_configure_from_map<C: Configurable + ?Sized>(
    c: &mut C,
    map: &OptionMap,
    opts: &ConfigOptions,
    mut unused: Option<&mut OptionMap>,
) -> Result<()> {
    let mut status: Result<()> = Ok(());
    if !map.is_empty() {
        let mut remaining = map.clone();
        for group in c.groups() {
            status = configure_group(c, &group, &mut remaining, opts);
            if remaining.is_empty() {
                break;
            }
            if matches!(&status, Err(err) if !err.is_not_found()) {
                break;
            }
        }
        if let Some(sink) = unused.as_deref_mut() {
            for (key, value) in remaining.iter() {
                sink.insert(key, value);
            }
        }
        if opts.ignore_unknown_options {
            if let Err(err) = &status {
                if err.is_not_found() {
                    opts.report(&format!("ignoring unknown options: {err}"));
                    status = Ok(());
                }
            }
        }
    }
    status?;
    if opts.invoke_prepare_options {
        c.prepare_options(opts)?;
    }
    Ok(())
}

/// Applies as many entries of `remaining` as this group resolves,
/// removing applied keys. Multi-pass: a pass that resolves at least one
/// key triggers another, so options that depend on a child created
/// later in the map eventually apply.
fn configure_group<C: Configurable + ?Sized>(
    c: &mut C,
    group: &OptionGroup,
    remaining: &mut OptionMap,
    opts: &ConfigOptions,
) -> Result<()> {
    let table = group.table();
    let mut invalid: Option<Error> = None;
    let mut not_found: Option<Error> = None;
    let mut unsupported: Vec<String> = Vec::new();
    let mut found = 1usize;
    'passes: while found > 0 && !remaining.is_empty() {
        found = 0;
        not_found = None;
        let keys: Vec<String> = remaining.keys().map(str::to_string).collect();
        for key in keys {
            if unsupported.iter().any(|k| k == &key) {
                continue;
            }
            let Some(value) = remaining.get(&key).map(str::to_string) else {
                continue;
            };
            let opt_name = c.option_name(&key).to_string();
            let lookup = table.find(&opt_name).map(|(d, e)| (d, e.to_string()));
            let status = match lookup {
                None => Err(Error::not_found(format!("Could not find option: {opt_name}"))),
                Some((descriptor, elem)) => match c.record_mut(group.name()) {
                    None => Err(Error::not_found(format!("Could not find option: {opt_name}"))),
                    Some(record) => {
                        configure_one(descriptor, &opt_name, &elem, &value, opts, record)
                    }
                },
            };
            match status {
                Ok(()) => {
                    found += 1;
                    remaining.remove(&key);
                }
                Err(err) if err.is_not_found() => {
                    not_found = Some(err);
                }
                Err(err) if err.is_not_supported() => {
                    unsupported.push(key);
                    if !opts.ignore_unknown_objects && not_found.is_none() {
                        not_found = Some(err);
                    }
                }
                Err(err) => {
                    remaining.remove(&key);
                    invalid = Some(err);
                    break 'passes;
                }
            }
        }
    }
    for key in &unsupported {
        remaining.remove(key);
    }
    if let Some(err) = invalid {
        return Err(err);
    }
    if let Some(err) = not_found {
        return Err(err);
    }
    Ok(())
}

/// Applies one resolved option. `opt_name` is the (short) name as given;
/// `elem` is the element path returned by the table lookup, which
/// differs from `opt_name` for dotted paths.
fn configure_one(
    descriptor: &OptionDescriptor,
    opt_name: &str,
    elem: &str,
    value: &str,
    opts: &ConfigOptions,
    record: &mut dyn Any,
) -> Result<()> {
    if elem == opt_name {
        descriptor.parse_option(opt_name, value, opts, record)
    } else if descriptor.is_customizable() && opt_name.ends_with(".id") {
        // "child.id=X" swaps the child wholesale.
        descriptor.parse_option(elem, value, opts, record)
    } else if descriptor.is_struct() {
        descriptor.parse_option(elem, value, opts, record)
    } else if descriptor.is_configurable_kind() {
        let Some(child) = descriptor.child_mut(record) else {
            return Err(Error::not_found(format!("Could not find configurable: {opt_name}")));
        };
        if value.is_empty() {
            Ok(())
        } else if value.contains('=') {
            let mut copy = opts.clone();
            copy.ignore_unknown_options = false;
            child.configure_from_string(value, &copy)
        } else {
            child.configure_option(elem, value, opts)
        }
    } else {
        Err(Error::not_found(format!("Could not find option: {opt_name}")))
    }
}

fn do_configure_option<C: Configurable + ?Sized>(
    c: &mut C,
    name: &str,
    value: &str,
    opts: &ConfigOptions,
) -> Result<()> {
    let opt_name = c.option_name(name).to_string();
    for group in c.groups() {
        if let Some((descriptor, elem)) = group.table().find(&opt_name) {
            let elem = elem.to_string();
            let Some(record) = c.record_mut(group.name()) else {
                continue;
            };
            return configure_one(descriptor, &opt_name, &elem, value, opts, record);
        }
    }
    Err(Error::invalid_argument(format!("Could not find option: {opt_name}")))
}

fn do_serialize<C: Configurable + ?Sized>(
    c: &C,
    prefix: &str,
    opts: &ConfigOptions,
    pairs: &mut Vec<String>,
) -> Result<()> {
    for group in c.groups() {
        let Some(record) = c.record(group.name()) else {
            continue;
        };
        for (name, descriptor) in group.table().entries() {
            if descriptor.should_serialize() {
                let value = descriptor.serialize_option(name, record, opts)?;
                if !value.is_empty() {
                    pairs.push(format!("{prefix}{name}={value}"));
                }
            }
        }
    }
    Ok(())
}

fn do_get_option<C: Configurable + ?Sized>(
    c: &C,
    name: &str,
    opts: &ConfigOptions,
) -> Result<String> {
    let opt_name = c.option_name(name);
    for group in c.groups() {
        let Some((descriptor, elem)) = group.table().find(opt_name) else {
            continue;
        };
        let Some(record) = c.record(group.name()) else {
            continue;
        };
        if elem == opt_name || descriptor.is_struct() {
            return descriptor.serialize_option(elem, record, opts);
        }
        if descriptor.is_configurable_kind() {
            if descriptor.is_customizable() && elem == "id" {
                return Ok(descriptor
                    .child_id(record)
                    .unwrap_or_else(|| NULLPTR_SENTINEL.to_string()));
            }
            let Some(child) = descriptor.child(record) else {
                return Err(Error::not_found(format!("Cannot find option: {name}")));
            };
            return child.get_option(elem, opts);
        }
    }
    Err(Error::not_found(format!("Cannot find option: {opt_name}")))
}

fn do_matches<C: Configurable + ?Sized>(
    c: &C,
    other: &dyn Configurable,
    opts: &ConfigOptions,
    mismatch: &mut String,
) -> bool {
    mismatch.clear();
    if opts.is_check_disabled() {
        return true;
    }
    for group in c.groups() {
        let (Some(this_record), Some(that_record)) =
            (c.record(group.name()), other.record(group.name()))
        else {
            continue;
        };
        for (name, descriptor) in group.table().entries() {
            if !opts.is_check_enabled(descriptor.sanity_level()) {
                continue;
            }
            if !descriptor.matches_option(name, this_record, that_record, opts, mismatch) {
                if descriptor.check_by_name(name, this_record, that_record, opts) {
                    mismatch.clear();
                    continue;
                }
                return false;
            }
        }
    }
    true
}

fn do_prepare<C: Configurable + ?Sized>(c: &mut C, opts: &ConfigOptions) -> Result<()> {
    for group in c.groups() {
        for (_, descriptor) in group.table().entries() {
            if !descriptor.is_configurable_kind()
                || descriptor.is_deprecated()
                || descriptor.is_alias()
                || descriptor.flags().contains(OptionFlags::DONT_PREPARE)
            {
                continue;
            }
            let Some(record) = c.record_mut(group.name()) else {
                continue;
            };
            if let Some(child) = descriptor.child_mut(record) {
                child.prepare_options(opts)?;
            }
        }
    }
    if let Some(inner) = c.inner_mut() {
        inner.prepare_options(opts)?;
    }
    c.prepare_local(opts)
}

fn do_validate<C: Configurable + ?Sized>(
    c: &C,
    db_opts: &dyn Any,
    cf_opts: &dyn Any,
) -> Result<()> {
    for group in c.groups() {
        for (name, descriptor) in group.table().entries() {
            if !descriptor.is_configurable_kind()
                || descriptor.is_deprecated()
                || descriptor.is_alias()
            {
                continue;
            }
            let Some(record) = c.record(group.name()) else {
                continue;
            };
            match descriptor.child(record) {
                Some(child) => child.validate_options(db_opts, cf_opts)?,
                None => {
                    if !descriptor.can_be_null() {
                        return Err(Error::not_found(format!(
                            "Missing configurable object: {name}"
                        )));
                    }
                }
            }
        }
    }
    if let Some(inner) = c.inner() {
        inner.validate_options(db_opts, cf_opts)?;
    }
    c.validate_local(db_opts, cf_opts)
}
