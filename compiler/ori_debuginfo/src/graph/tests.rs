#![allow(clippy::expect_used, reason = "Test code uses expect for clarity")]

use pretty_assertions::assert_eq;

use super::*;

fn int(graph: &mut MetadataGraph) -> NodeId {
    graph
        .create_basic_type("int", 64, TypeEncoding::Signed)
        .expect("basic type")
}

fn forward_decl(graph: &mut MetadataGraph, name: &str) -> NodeId {
    let file = graph.create_file("main.ori", "/src").expect("file");
    graph
        .create_forward_decl(CompositeDecl {
            kind: CompositeKind::Struct,
            name,
            unique_id: name,
            scope: file,
            file,
            line: 1,
            size_bits: 64,
            align_bits: 64,
        })
        .expect("forward decl")
}

#[test]
fn leaf_nodes_are_uniqued() {
    let mut graph = MetadataGraph::new();
    let a = int(&mut graph);
    let b = int(&mut graph);
    assert_eq!(a, b);

    let c = graph
        .create_basic_type("int", 32, TypeEncoding::Signed)
        .expect("basic type");
    assert_ne!(a, c);
}

#[test]
fn composites_are_distinct_per_call() {
    let mut graph = MetadataGraph::new();
    let a = forward_decl(&mut graph, "Point");
    let b = forward_decl(&mut graph, "Point");
    assert_ne!(a, b);
}

#[test]
fn finalize_composite_resolves_once() {
    let mut graph = MetadataGraph::new();
    let node = forward_decl(&mut graph, "Point");
    assert!(graph.composite(node).is_some_and(|c| c.flags.contains(DIFlags::FWD_DECL)));

    graph.finalize_composite(node, &[]).expect("first finalize");
    let composite = graph.composite(node).expect("composite");
    assert_eq!(composite.elements, Some(vec![]));
    assert!(!composite.flags.contains(DIFlags::FWD_DECL));

    assert_eq!(
        graph.finalize_composite(node, &[]),
        Err(MetadataError::AlreadyFinalized {
            name: "Point".to_owned()
        })
    );
}

#[test]
fn finalize_rejects_non_composites() {
    let mut graph = MetadataGraph::new();
    let ty = int(&mut graph);
    assert_eq!(
        graph.finalize_composite(ty, &[]),
        Err(MetadataError::NotForwardDecl { node: ty })
    );
}

#[test]
fn replace_all_uses_retires_and_rewrites() {
    let mut graph = MetadataGraph::new();
    let old = int(&mut graph);
    let new = graph
        .create_basic_type("i64", 64, TypeEncoding::Signed)
        .expect("basic type");
    let ptr = graph
        .create_pointer_type("*int", old, 64, 64)
        .expect("pointer");

    graph.replace_all_uses(old, new).expect("replace");

    assert!(!graph.is_live(old));
    assert!(graph.is_live(new));
    assert_eq!(graph.resolve(old), new);
    match graph.node(ptr) {
        Some(Node::PointerType { pointee, .. }) => assert_eq!(*pointee, new),
        other => panic!("expected pointer, got {other:?}"),
    }

    // The uniquing table forgot the retired node.
    let again = int(&mut graph);
    assert_ne!(again, old);
    assert!(graph.is_live(again));
}

#[test]
fn replace_unknown_node_fails() {
    let mut graph = MetadataGraph::new();
    let ty = int(&mut graph);
    let bogus = NodeId::new(99);
    assert_eq!(
        graph.replace_all_uses(bogus, ty),
        Err(MetadataError::UnknownNode { node: bogus })
    );
}

#[test]
fn seal_rejects_open_forward_decls() {
    let mut graph = MetadataGraph::new();
    let node = forward_decl(&mut graph, "List");
    assert_eq!(
        graph.seal(),
        Err(MetadataError::UnresolvedForwardDecl {
            name: "List".to_owned()
        })
    );
    assert!(!graph.is_sealed());

    graph.finalize_composite(node, &[]).expect("finalize");
    graph.seal().expect("seal");
    assert!(graph.is_sealed());
}

#[test]
fn sealed_graph_rejects_creation() {
    let mut graph = MetadataGraph::new();
    graph.seal().expect("seal");
    assert_eq!(
        graph.create_enumerator("A", 0),
        Err(MetadataError::Sealed { what: "enumerator" })
    );
}

#[test]
fn location_history_records_every_change() {
    let mut graph = MetadataGraph::new();
    let file = graph.create_file("main.ori", "/src").expect("file");
    let loc = DebugLoc {
        line: 3,
        column: 1,
        scope: file,
    };
    graph.set_current_location(Some(loc));
    graph.set_current_location(None);

    assert_eq!(graph.location_history(), &[Some(loc), None]);
    assert_eq!(graph.current_location(), None);
}

#[test]
fn count_live_skips_retired_nodes() {
    let mut graph = MetadataGraph::new();
    let a = forward_decl(&mut graph, "A");
    let b = forward_decl(&mut graph, "B");
    graph.replace_all_uses(a, b).expect("replace");
    assert_eq!(
        graph.count_live(|node| matches!(node, Node::Composite(_))),
        1
    );
}
