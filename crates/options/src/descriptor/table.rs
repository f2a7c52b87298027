//! Ordered name → descriptor tables with dotted-path lookup.

use super::OptionDescriptor;

/// An ordered mapping from option name to [`OptionDescriptor`].
///
/// Iteration follows registration order, which is also the serialization
/// order, so `get_option_string` output is stable across builds of the
/// same table.
#[derive(Debug, Default)]
pub struct OptionTable {
    entries: Vec<(&'static str, OptionDescriptor)>,
}

impl OptionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor under `name`, returning the table for chaining.
    pub fn with(mut self, name: &'static str, descriptor: OptionDescriptor) -> Self {
        debug_assert!(
            self.get(name).is_none(),
            "duplicate option descriptor registered for '{name}'"
        );
        self.entries.push((name, descriptor));
        self
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&OptionDescriptor> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }

    /// Iterates `(name, descriptor)` pairs in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &OptionDescriptor)> {
        self.entries.iter().map(|(n, d)| (*n, d))
    }

    /// Dotted-path lookup.
    ///
    /// Searches for the exact key first. Failing that, splits `name` on
    /// its first `.`; if the head names a struct or configurable
    /// descriptor, returns it together with the remaining path as the
    /// element name. The returned element name equals `name` for exact
    /// hits.
    pub fn find<'t, 'n>(&'t self, name: &'n str) -> Option<(&'t OptionDescriptor, &'n str)> {
        if let Some(descriptor) = self.get(name) {
            return Some((descriptor, name));
        }
        let (head, rest) = name.split_once('.')?;
        if head.is_empty() || rest.is_empty() {
            return None;
        }
        let descriptor = self.get(head)?;
        if descriptor.is_struct() || descriptor.is_configurable_kind() {
            Some((descriptor, rest))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OptionKind;

    #[derive(Debug, Default)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Default)]
    struct Rec {
        n: i32,
        p: Point,
    }

    fn point_table() -> &'static OptionTable {
        use std::sync::LazyLock;
        static TABLE: LazyLock<OptionTable> = LazyLock::new(|| {
            OptionTable::new()
                .with("x", OptionDescriptor::int(|p: &Point| p.x, |p: &mut Point, v| p.x = v))
                .with("y", OptionDescriptor::int(|p: &Point| p.y, |p: &mut Point, v| p.y = v))
        });
        &TABLE
    }

    fn rec_table() -> OptionTable {
        OptionTable::new()
            .with("n", OptionDescriptor::int(|r: &Rec| r.n, |r: &mut Rec, v| r.n = v))
            .with(
                "p",
                OptionDescriptor::struct_of("p", point_table(), |r: &Rec| &r.p, |r: &mut Rec| {
                    &mut r.p
                }),
            )
    }

    #[test]
    fn test_exact_lookup() {
        let table = rec_table();
        let (descriptor, elem) = table.find("n").unwrap();
        assert_eq!(elem, "n");
        assert!(!descriptor.is_struct());
    }

    #[test]
    fn test_dotted_lookup_into_struct() {
        let table = rec_table();
        let (descriptor, elem) = table.find("p.x").unwrap();
        assert!(descriptor.is_struct());
        assert_eq!(elem, "x");
    }

    #[test]
    fn test_dotted_lookup_rejects_scalar_parent() {
        let table = rec_table();
        assert!(table.find("n.x").is_none());
        assert!(table.find("missing.x").is_none());
        assert!(table.find(".x").is_none());
        assert!(table.find("p.").is_none());
    }

    #[test]
    fn test_entries_preserve_registration_order() {
        let table = rec_table();
        let names: Vec<_> = table.entries().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["n", "p"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_kind_accessors() {
        let table = rec_table();
        assert_eq!(table.get("p").unwrap().kind(), OptionKind::Struct);
    }
}
