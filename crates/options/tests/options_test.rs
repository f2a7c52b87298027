//! End-to-end tests for the configurable option surface: flat records,
//! nested structs, vectors, enums, prefix extractors, and matching.

use std::any::Any;
use std::sync::{Arc, LazyLock};

use keystone_options::{
    ChecksumType, CompressionType, ConfigOptions, Configurable, LifecycleState, OptionDescriptor,
    OptionFlags, OptionGroup, OptionTable, PrefixExtractor, SanityLevel,
};

#[derive(Debug, Default, PartialEq)]
struct PairOptions {
    a: i32,
    b: i32,
}

fn pair_table() -> &'static OptionTable {
    static TABLE: LazyLock<OptionTable> = LazyLock::new(|| {
        OptionTable::new()
            .with("a", OptionDescriptor::int(|o: &PairOptions| o.a, |o: &mut PairOptions, v| o.a = v))
            .with("b", OptionDescriptor::int(|o: &PairOptions| o.b, |o: &mut PairOptions, v| o.b = v))
    });
    &TABLE
}

#[derive(Debug, Default)]
struct PairConfig {
    options: PairOptions,
    lifecycle: LifecycleState,
}

impl Configurable for PairConfig {
    fn groups(&self) -> Vec<OptionGroup> {
        vec![OptionGroup::new("pair", pair_table())]
    }
    fn record(&self, group: &str) -> Option<&dyn Any> {
        (group == "pair").then_some(&self.options as &dyn Any)
    }
    fn record_mut(&mut self, group: &str) -> Option<&mut dyn Any> {
        (group == "pair").then_some(&mut self.options as &mut dyn Any)
    }
    fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }
    fn as_configurable(&self) -> &dyn Configurable {
        self
    }
    fn as_configurable_mut(&mut self) -> &mut dyn Configurable {
        self
    }
}

#[derive(Debug, Default, PartialEq)]
struct CacheTuning {
    x: i32,
    y: i32,
}

fn cache_table() -> &'static OptionTable {
    static TABLE: LazyLock<OptionTable> = LazyLock::new(|| {
        OptionTable::new()
            .with("x", OptionDescriptor::int(|o: &CacheTuning| o.x, |o: &mut CacheTuning, v| o.x = v))
            .with("y", OptionDescriptor::int(|o: &CacheTuning| o.y, |o: &mut CacheTuning, v| o.y = v))
    });
    &TABLE
}

#[derive(Default)]
struct StoreOptions {
    compression: CompressionType,
    checksum: ChecksumType,
    block_size: usize,
    ratio: f64,
    label: String,
    cache: CacheTuning,
    levels: Vec<i32>,
    tags: Vec<String>,
    points: Vec<CacheTuning>,
    prefix: Option<Arc<dyn PrefixExtractor>>,
}

fn store_table() -> &'static OptionTable {
    static TABLE: LazyLock<OptionTable> = LazyLock::new(|| {
        OptionTable::new()
            .with(
                "compression",
                OptionDescriptor::compression_type(
                    |o: &StoreOptions| o.compression,
                    |o: &mut StoreOptions, v| o.compression = v,
                ),
            )
            .with(
                "checksum",
                OptionDescriptor::checksum_type(
                    |o: &StoreOptions| o.checksum,
                    |o: &mut StoreOptions, v| o.checksum = v,
                ),
            )
            .with(
                "block_size",
                OptionDescriptor::size(
                    |o: &StoreOptions| o.block_size,
                    |o: &mut StoreOptions, v| o.block_size = v,
                ),
            )
            .with(
                "ratio",
                OptionDescriptor::double(
                    |o: &StoreOptions| o.ratio,
                    |o: &mut StoreOptions, v| o.ratio = v,
                )
                .with_flags(OptionFlags::COMPARE_LOOSE),
            )
            .with(
                "label",
                OptionDescriptor::string(
                    |o: &StoreOptions| &o.label,
                    |o: &mut StoreOptions, v| o.label = v,
                ),
            )
            .with(
                "cache",
                OptionDescriptor::struct_of(
                    "cache",
                    cache_table(),
                    |o: &StoreOptions| &o.cache,
                    |o: &mut StoreOptions| &mut o.cache,
                ),
            )
            .with(
                "levels",
                OptionDescriptor::vector_of(
                    OptionDescriptor::int(|e: &i32| *e, |e: &mut i32, v| *e = v),
                    ':',
                    |o: &StoreOptions| &o.levels,
                    |o: &mut StoreOptions| &mut o.levels,
                ),
            )
            .with(
                "tags",
                OptionDescriptor::vector_of(
                    OptionDescriptor::string(|e: &String| e, |e: &mut String, v| *e = v),
                    ':',
                    |o: &StoreOptions| &o.tags,
                    |o: &mut StoreOptions| &mut o.tags,
                ),
            )
            .with(
                "points",
                OptionDescriptor::vector_of(
                    OptionDescriptor::struct_of(
                        "points",
                        cache_table(),
                        |e: &CacheTuning| e,
                        |e: &mut CacheTuning| e,
                    ),
                    ':',
                    |o: &StoreOptions| &o.points,
                    |o: &mut StoreOptions| &mut o.points,
                ),
            )
            .with(
                "prefix",
                OptionDescriptor::prefix_extractor(
                    |o: &StoreOptions| o.prefix.as_ref(),
                    |o: &mut StoreOptions, v| o.prefix = v,
                ),
            )
    });
    &TABLE
}

#[derive(Default)]
struct StoreConfig {
    options: StoreOptions,
    lifecycle: LifecycleState,
}

impl Configurable for StoreConfig {
    fn groups(&self) -> Vec<OptionGroup> {
        vec![OptionGroup::new("store", store_table())]
    }
    fn record(&self, group: &str) -> Option<&dyn Any> {
        (group == "store").then_some(&self.options as &dyn Any)
    }
    fn record_mut(&mut self, group: &str) -> Option<&mut dyn Any> {
        (group == "store").then_some(&mut self.options as &mut dyn Any)
    }
    fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }
    fn as_configurable(&self) -> &dyn Configurable {
        self
    }
    fn as_configurable_mut(&mut self) -> &mut dyn Configurable {
        self
    }
}

#[test]
fn test_flat_pairs_round_trip() {
    let opts = ConfigOptions::default();
    let mut pair = PairConfig::default();
    pair.configure_from_string("a=1;b=2", &opts).unwrap();
    assert_eq!(pair.options, PairOptions { a: 1, b: 2 });
    assert_eq!(pair.get_option_string(&opts).unwrap(), "a=1;b=2");
}

#[test]
fn test_struct_block_assignment() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_from_string("cache={x=3;y=4}", &opts).unwrap();
    assert_eq!(store.options.cache, CacheTuning { x: 3, y: 4 });
    assert_eq!(store.get_option("cache", &opts).unwrap(), "{x=3;y=4}");
}

#[test]
fn test_struct_dotted_field_assignment() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_from_string("cache={x=3;y=4}", &opts).unwrap();
    store.configure_from_string("cache.x=7", &opts).unwrap();
    assert_eq!(store.options.cache, CacheTuning { x: 7, y: 4 });
    assert_eq!(store.get_option("cache.x", &opts).unwrap(), "7");
}

#[test]
fn test_struct_unknown_field_is_rejected() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    let err = store.configure_from_string("cache={x=3;z=4}", &opts).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("cache.z"));
}

#[test]
fn test_vector_parse_and_serialize() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_from_string("levels=1:2:3", &opts).unwrap();
    assert_eq!(store.options.levels, vec![1, 2, 3]);
    assert_eq!(store.get_option("levels", &opts).unwrap(), "1:2:3");
}

#[test]
fn test_vector_of_compound_elements_is_wrapped() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    // The element list is itself brace-wrapped because its elements
    // contain assignments.
    store.configure_from_string("points={{x=1;y=2}:{x=3;y=4}}", &opts).unwrap();
    assert_eq!(store.options.points.len(), 2);
    assert_eq!(store.options.points[1], CacheTuning { x: 3, y: 4 });

    let serialized = store.get_option("points", &opts).unwrap();
    assert_eq!(serialized, "{{x=1;y=2}:{x=3;y=4}}");

    // The wrapped form parses back to the same sequence.
    let mut peer = StoreConfig::default();
    peer.configure_option("points", &serialized, &opts).unwrap();
    assert_eq!(peer.options.points, store.options.points);
}

#[test]
fn test_vector_trailing_separator() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    // An empty final token fails for elements that reject empty input.
    let err = store.configure_from_string("levels=1:2:", &opts).unwrap_err();
    assert!(err.is_invalid_argument());
    // String elements accept the empty token.
    store.configure_from_string("tags=x:y:", &opts).unwrap();
    assert_eq!(store.options.tags, vec!["x".to_string(), "y".to_string(), String::new()]);
}

#[test]
fn test_enum_options() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_from_string("compression=zstd;checksum=xxhash64", &opts).unwrap();
    assert_eq!(store.options.compression, CompressionType::Zstd);
    assert_eq!(store.options.checksum, ChecksumType::XxHash64);
    assert_eq!(store.get_option("compression", &opts).unwrap(), "zstd");

    let err = store.configure_from_string("compression=brotli", &opts).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_prefix_extractor_round_trip() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_from_string("prefix=fixed:8", &opts).unwrap();
    assert_eq!(store.options.prefix.as_ref().unwrap().name(), "keystone.FixedPrefix.8");
    assert_eq!(store.get_option("prefix", &opts).unwrap(), "keystone.FixedPrefix.8");

    store.configure_from_string("prefix=nullptr", &opts).unwrap();
    assert!(store.options.prefix.is_none());
    assert_eq!(store.get_option("prefix", &opts).unwrap(), "nullptr");
}

#[test]
fn test_unknown_keys_follow_context() {
    let mut store = StoreConfig::default();
    let strict = ConfigOptions::default();
    let err = store.configure_from_string("bogus=1", &strict).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("bogus"));

    let lenient = ConfigOptions::builder().ignore_unknown_options(true).build();
    store.configure_from_string("bogus=1;block_size=4096", &lenient).unwrap();
    assert_eq!(store.options.block_size, 4096);
}

#[test]
fn test_full_round_trip_matches() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store
        .configure_from_string(
            "compression=lz4;checksum=crc32c;block_size=64M;ratio=0.75;label=hot tier;\
             cache={x=10;y=20};levels=4:8:16;tags=alpha:beta;\
             points={{x=1;y=1}:{x=2;y=2}};prefix=capped:16",
            &opts,
        )
        .unwrap();

    let serialized = store.get_option_string(&opts).unwrap();
    let mut peer = StoreConfig::default();
    peer.configure_from_string(&serialized, &opts).unwrap();

    let mut mismatch = String::new();
    assert!(peer.matches(&store, &opts, &mut mismatch), "mismatch at {mismatch}: {serialized}");
}

#[test]
fn test_escaped_label_survives_round_trip() {
    let opts = ConfigOptions::default();
    let mut store = StoreConfig::default();
    store.configure_option("label", "weird=value;{#}  ", &opts).unwrap();
    // The label parses verbatim through the single-option path.
    assert_eq!(store.options.label, "weird=value;{#}  ");

    let serialized = store.get_option_string(&opts).unwrap();
    let escaped_in = ConfigOptions::builder().input_strings_escaped(true).build();
    let mut peer = StoreConfig::default();
    peer.configure_from_string(&serialized, &escaped_in).unwrap();
    assert_eq!(peer.options.label, store.options.label);
}

#[test]
fn test_loose_compare_flag_and_sanity_levels() {
    let opts = ConfigOptions::default();
    let mut left = StoreConfig::default();
    let mut right = StoreConfig::default();
    left.configure_from_string("ratio=0.25", &opts).unwrap();
    right.configure_from_string("ratio=0.5", &opts).unwrap();

    let mut mismatch = String::new();
    let loose = ConfigOptions::builder().sanity_level(SanityLevel::LooselyCompatible).build();
    assert!(left.matches(&right, &loose, &mut mismatch));

    let exact = ConfigOptions::default();
    assert!(!left.matches(&right, &exact, &mut mismatch));
    assert_eq!(mismatch, "ratio");

    let none = ConfigOptions::builder().sanity_level(SanityLevel::None).build();
    assert!(left.matches(&right, &none, &mut mismatch));
}

#[test]
fn test_struct_mismatch_reports_dotted_path() {
    let opts = ConfigOptions::default();
    let mut left = StoreConfig::default();
    let mut right = StoreConfig::default();
    left.configure_from_string("cache={x=1;y=2}", &opts).unwrap();
    right.configure_from_string("cache={x=1;y=3}", &opts).unwrap();
    let mut mismatch = String::new();
    assert!(!left.matches(&right, &opts, &mut mismatch));
    assert_eq!(mismatch, "cache.y");
}

#[test]
fn test_configure_is_idempotent_end_to_end() {
    let opts = ConfigOptions::default();
    let text = "compression=snappy;cache={x=5;y=6};levels=1:2";
    let mut once = StoreConfig::default();
    once.configure_from_string(text, &opts).unwrap();
    let mut twice = StoreConfig::default();
    twice.configure_from_string(text, &opts).unwrap();
    twice.configure_from_string(text, &opts).unwrap();
    let mut mismatch = String::new();
    assert!(once.matches(&twice, &opts, &mut mismatch), "mismatch: {mismatch}");
}

#[test]
fn test_custom_delimiter_serialization() {
    let opts = ConfigOptions::builder().delimiter("\n".to_string()).build();
    let mut pair = PairConfig::default();
    pair.configure_option("a", "1", &opts).unwrap();
    pair.configure_option("b", "2", &opts).unwrap();
    assert_eq!(pair.get_option_string(&opts).unwrap(), "a=1\nb=2");
}
