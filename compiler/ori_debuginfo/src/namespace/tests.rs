#![allow(clippy::expect_used, reason = "Test code uses expect for clarity")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::graph::{MetadataGraph, Node};
use crate::source::ScopeTree;
use crate::test_helpers::session;
use crate::types::TypePool;

#[test]
fn mangle_prefixes_lengths() {
    assert_eq!(mangle_path(&["std", "io", "File"]), "3std2io4File");
    assert_eq!(mangle_path::<&str>(&[]), "");
}

#[test]
fn demangle_splits_components() {
    assert_eq!(
        demangle_path("3std2io4File"),
        Ok(vec!["std", "io", "File"])
    );
    assert_eq!(
        demangle_path("10abcdefghij1x"),
        Ok(vec!["abcdefghij", "x"])
    );
}

#[test]
fn demangle_rejects_malformed_paths() {
    assert_eq!(demangle_path(""), Err(ManglingError::Empty));
    assert_eq!(
        demangle_path("std"),
        Err(ManglingError::MissingLength {
            mangled: "std".to_owned(),
            offset: 0
        })
    );
    assert_eq!(
        demangle_path("3std9io"),
        Err(ManglingError::Truncated {
            mangled: "3std9io".to_owned(),
            offset: 5
        })
    );
    assert_eq!(
        demangle_path("3std0"),
        Err(ManglingError::MissingLength {
            mangled: "3std0".to_owned(),
            offset: 4
        })
    );
}

fn namespace_parent(di: &DebugInfo<'_, MetadataGraph>, node: NodeId) -> (String, NodeId) {
    match di.builder().node(node) {
        Some(Node::Namespace { name, parent, .. }) => (name.clone(), *parent),
        other => panic!("expected namespace, got {other:?}"),
    }
}

#[test]
fn nested_namespaces_chain_to_the_compile_unit() {
    let types = TypePool::new();
    let scopes = ScopeTree::new();
    let mut di = session(&types, &scopes);

    let file = di.resolve_namespace("3std2io4File").expect("resolve");
    let (name, io) = namespace_parent(&di, file);
    assert_eq!(name, "File");
    let (name, std) = namespace_parent(&di, io);
    assert_eq!(name, "io");
    let (name, root) = namespace_parent(&di, std);
    assert_eq!(name, "std");
    assert_eq!(root, di.compile_unit());
}

#[test]
fn common_prefixes_are_created_once() {
    let types = TypePool::new();
    let scopes = ScopeTree::new();
    let mut di = session(&types, &scopes);

    let file = di.resolve_namespace("3std2io4File").expect("file");
    let reader = di.resolve_namespace("3std2io6Reader").expect("reader");
    let io = di.resolve_namespace("3std2io").expect("io");

    assert_eq!(namespace_parent(&di, file).1, io);
    assert_eq!(namespace_parent(&di, reader).1, io);
    assert_eq!(
        di.builder()
            .count_live(|n| matches!(n, Node::Namespace { .. })),
        4
    );
    assert_eq!(di.caches().namespaces.len(), 4);
}

#[test]
fn malformed_path_is_an_error() {
    let types = TypePool::new();
    let scopes = ScopeTree::new();
    let mut di = session(&types, &scopes);

    let err = di.resolve_namespace("oops").expect_err("malformed");
    assert!(matches!(err, DebugInfoError::Mangling(_)));
    assert!(di.caches().namespaces.is_empty());
}

proptest! {
    #[test]
    fn mangling_round_trips(
        components in proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,12}", 1..6),
    ) {
        let mangled = mangle_path(&components);
        let parts = demangle_path(&mangled).expect("well-formed");
        prop_assert_eq!(parts, components.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
