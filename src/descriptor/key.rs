//! Binary cache-key encoding for aspect descriptors.
//!
//! The encoding is deterministic and canonical: every collection is written
//! in its sorted canonical order, lengths are explicit, and the first byte is
//! a format version so persisted keys can evolve safely. Insertion order of
//! the descriptor's sets can never leak into the bytes because the
//! descriptor stores canonical collections to begin with.
//!
//! Layout (all integers little-endian `u32` unless noted):
//!
//! ```text
//! [version: u8]
//! [class]
//! [param count] ([name] [value count] [value]...)...
//! [required-provider count] [provider id]...
//! [attribute-aspect count] [class]...
//!
//! class    := [tag: u8 = 0] [name]                 (native)
//!           | [tag: u8 = 1] [location] [symbol]    (dynamic)
//! string   := [byte length: u32] [utf-8 bytes]
//! ```

use sha2::{Digest, Sha256};

use super::AspectDescriptor;
use crate::class::AspectClass;

/// Bump when the layout changes; old persisted keys then never match.
const KEY_FORMAT_VERSION: u8 = 1;

const CLASS_TAG_NATIVE: u8 = 0;
const CLASS_TAG_DYNAMIC: u8 = 1;

pub(super) fn serialize(descriptor: &AspectDescriptor) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(KEY_FORMAT_VERSION);
    put_class(&mut out, descriptor.class());

    put_u32(&mut out, descriptor.parameters().len() as u32);
    for (name, values) in descriptor.parameters().iter() {
        put_str(&mut out, name);
        put_u32(&mut out, values.len() as u32);
        for value in values {
            put_str(&mut out, value);
        }
    }

    put_u32(&mut out, descriptor.required_providers().len() as u32);
    for provider in descriptor.required_providers() {
        put_str(&mut out, provider.as_str());
    }

    put_u32(&mut out, descriptor.attribute_aspects().len() as u32);
    for class in descriptor.attribute_aspects() {
        put_class(&mut out, class);
    }

    out
}

pub(super) fn digest(descriptor: &AspectDescriptor) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialize(descriptor));
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn put_class(out: &mut Vec<u8>, class: &AspectClass) {
    match class {
        AspectClass::Native { name } => {
            out.push(CLASS_TAG_NATIVE);
            put_str(out, name);
        }
        AspectClass::Dynamic { location, symbol } => {
            out.push(CLASS_TAG_DYNAMIC);
            put_str(out, location.as_str());
            put_str(out, symbol);
        }
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn put_u32(out: &mut Vec<u8>, n: u32) {
    out.extend_from_slice(&n.to_le_bytes());
}
