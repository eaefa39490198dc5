//! Shared fixtures for the in-crate tests.

#![allow(clippy::expect_used, reason = "Test code uses expect for clarity")]

use std::path::Path;

use crate::config::DebugInfoConfig;
use crate::graph::MetadataGraph;
use crate::namespace::mangle_path;
use crate::session::DebugInfo;
use crate::source::{ScopeTree, SourceLoc};
use crate::types::{align_up, EnumCase, Field, Layout, Nominal, TypeDescriptor, TypeId, TypePool};

pub const MAIN_FILE: &str = "/src/main.ori";

/// A full-level session over an in-memory graph.
pub fn session<'a>(types: &'a TypePool, scopes: &'a ScopeTree) -> DebugInfo<'a, MetadataGraph> {
    session_with(types, scopes, DebugInfoConfig::development())
}

pub fn session_with<'a>(
    types: &'a TypePool,
    scopes: &'a ScopeTree,
    config: DebugInfoConfig,
) -> DebugInfo<'a, MetadataGraph> {
    DebugInfo::new(
        MetadataGraph::new(),
        config,
        Path::new("main.ori"),
        Path::new("/src"),
        types,
        scopes,
    )
    .expect("debug info should be enabled")
}

/// A location in the main file.
pub fn loc(line: u32, column: u32) -> SourceLoc {
    SourceLoc::new(MAIN_FILE, line, column)
}

fn nominal(name: &str, size_bits: u64, align_bits: u32) -> Nominal {
    Nominal {
        name: name.to_owned(),
        mangled: mangle_path(&["main", name]),
        context: Some(mangle_path(&["main"])),
        loc: Some(loc(1, 1)),
        size_bits,
        align_bits,
    }
}

/// Define a struct in module `main`, laid out in field order.
pub fn define_struct(pool: &mut TypePool, id: TypeId, name: &str, fields: &[(&str, TypeId)]) {
    let mut layout = Layout::default();
    for &(_, ty) in fields {
        let (size, align) = pool.size_align(ty);
        layout.place(size, align);
    }
    let (size_bits, align_bits) = layout.finish();
    let desc = TypeDescriptor::Struct {
        nominal: nominal(name, size_bits, align_bits),
        fields: fields
            .iter()
            .map(|&(name, ty)| Field {
                name: name.to_owned(),
                ty,
            })
            .collect(),
    };
    pool.define(id, desc);
}

pub fn struct_type(pool: &mut TypePool, name: &str, fields: &[(&str, TypeId)]) -> TypeId {
    let id = pool.reserve(&mangle_path(&["main", name]));
    define_struct(pool, id, name, fields);
    id
}

/// An enum in module `main`: payloads overlap at offset 0, the 8-bit
/// discriminator follows the largest.
pub fn enum_type(pool: &mut TypePool, name: &str, cases: &[(&str, Option<TypeId>)]) -> TypeId {
    let (max_size, max_align) = cases
        .iter()
        .filter_map(|&(_, payload)| payload)
        .map(|ty| pool.size_align(ty))
        .fold((0_u64, 8_u32), |(s, a), (size, align)| (s.max(size), a.max(align)));
    let size_bits = align_up(align_up(max_size, 8) + 8, max_align);
    let desc = TypeDescriptor::Enum {
        nominal: nominal(name, size_bits, max_align),
        cases: cases
            .iter()
            .map(|&(name, payload)| EnumCase {
                name: name.to_owned(),
                payload,
            })
            .collect(),
    };
    pool.add(desc)
}
