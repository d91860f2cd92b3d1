//! Canonical identity of descriptors and their persisted key encoding.

use aspect_engine::class::AspectClass;
use aspect_engine::descriptor::AspectDescriptor;
use aspect_engine::params::AspectParameters;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn hash_of(descriptor: &AspectDescriptor) -> u64 {
    let mut hasher = DefaultHasher::new();
    descriptor.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn reordered_construction_yields_identical_descriptors() {
    let class = AspectClass::dynamic("//tools:cov.defs", "coverage");
    let params_a = AspectParameters::builder()
        .put("mode", ["fast"])
        .put("arch", ["x86_64", "aarch64"])
        .build();
    let params_b = AspectParameters::builder()
        .put("arch", ["x86_64", "aarch64"])
        .put("mode", ["fast"])
        .build();

    let a = AspectDescriptor::with_inherited(
        class.clone(),
        params_a,
        ["P1".into(), "P2".into(), "P3".into()],
        [AspectClass::native("x"), AspectClass::native("y")],
    );
    let b = AspectDescriptor::with_inherited(
        class,
        params_b,
        ["P3".into(), "P1".into(), "P2".into(), "P1".into()],
        [AspectClass::native("y"), AspectClass::native("x")],
    );

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_eq!(a.serialize_key(), b.serialize_key());
    assert_eq!(a.key_digest(), b.key_digest());
}

#[test]
fn every_component_participates_in_the_key() {
    let base = AspectDescriptor::new(AspectClass::native("a"), AspectParameters::empty());
    let other_class = AspectDescriptor::new(AspectClass::native("b"), AspectParameters::empty());
    let with_params = AspectDescriptor::new(
        AspectClass::native("a"),
        AspectParameters::builder().put("mode", ["fast"]).build(),
    );
    let with_required = AspectDescriptor::with_inherited(
        AspectClass::native("a"),
        AspectParameters::empty(),
        ["X".into()],
        [],
    );
    let with_inherited_aspects = AspectDescriptor::with_inherited(
        AspectClass::native("a"),
        AspectParameters::empty(),
        [],
        [AspectClass::native("b")],
    );

    let keys = [
        base.serialize_key(),
        other_class.serialize_key(),
        with_params.serialize_key(),
        with_required.serialize_key(),
        with_inherited_aspects.serialize_key(),
    ];
    for (i, key_a) in keys.iter().enumerate() {
        for key_b in keys.iter().skip(i + 1) {
            assert_ne!(key_a, key_b);
        }
    }
}

#[test]
fn key_bytes_are_stable_across_processes() {
    // The encoding is the persistence contract: a descriptor built from the
    // same logical content must keep producing these exact bytes until the
    // format version is bumped.
    let descriptor = AspectDescriptor::new(
        AspectClass::native("a"),
        AspectParameters::builder().put("m", ["v"]).build(),
    );
    let key = descriptor.serialize_key();
    let expected = [
        1u8, // format version
        0, // native class tag
        1, 0, 0, 0, b'a', // class name
        1, 0, 0, 0, // one parameter
        1, 0, 0, 0, b'm', // name
        1, 0, 0, 0, // one value
        1, 0, 0, 0, b'v', // value
        0, 0, 0, 0, // no required providers
        0, 0, 0, 0, // no attribute aspects
    ];
    assert_eq!(key, expected);
}

#[test]
fn parameters_built_from_json_match_builder() {
    let from_json = AspectParameters::from_json(&json!({
        "mode": "fast",
        "arch": ["x86_64", "aarch64"],
    }))
    .unwrap();
    let built = AspectParameters::builder()
        .put("arch", ["x86_64", "aarch64"])
        .put("mode", ["fast"])
        .build();
    assert_eq!(from_json, built);

    let class = AspectClass::native("a");
    assert_eq!(
        AspectDescriptor::new(class.clone(), from_json).serialize_key(),
        AspectDescriptor::new(class, built.clone()).serialize_key()
    );
}
