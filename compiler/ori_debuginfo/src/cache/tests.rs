#![allow(clippy::expect_used, reason = "Test code uses expect for clarity")]

use pretty_assertions::assert_eq;

use super::*;
use crate::graph::MetadataGraph;
use crate::metadata::TypeEncoding;

fn basic(graph: &mut MetadataGraph, name: &str) -> NodeId {
    graph
        .create_basic_type(name, 64, TypeEncoding::Signed)
        .expect("basic type")
}

#[test]
fn lookup_or_create_runs_factory_once() {
    let mut graph = MetadataGraph::new();
    let mut cache: WeakCache<String> = WeakCache::new();
    let mut calls = 0;

    for _ in 0..3 {
        let node = cache
            .lookup_or_create("int".to_owned(), &mut graph, |b| {
                calls += 1;
                b.create_basic_type("int", 64, TypeEncoding::Signed)
            })
            .expect("create");
        assert!(graph.is_live(node));
    }

    assert_eq!(calls, 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 2,
            misses: 1,
            stale: 0
        }
    );
}

#[test]
fn dead_entry_is_a_miss_and_gets_recomputed() {
    let mut graph = MetadataGraph::new();
    let mut cache: WeakCache<String> = WeakCache::new();

    let first = basic(&mut graph, "int");
    cache.insert("int".to_owned(), first);
    let replacement = basic(&mut graph, "i64");
    graph.replace_all_uses(first, replacement).expect("replace");

    assert_eq!(cache.get("int", &graph), None);
    assert!(cache.is_empty(), "stale entry is evicted");

    let second = cache
        .lookup_or_create("int".to_owned(), &mut graph, |b| {
            b.create_basic_type("int", 64, TypeEncoding::Signed)
        })
        .expect("recreate");
    assert_ne!(second, first);
    assert!(graph.is_live(second));
    assert_eq!(cache.get("int", &graph), Some(second));
    assert_eq!(cache.stats().stale, 1);
}

#[test]
fn failing_factory_leaves_no_entry() {
    let mut graph = MetadataGraph::new();
    graph.seal().expect("seal");
    let mut cache: WeakCache<String> = WeakCache::new();

    let result = cache.lookup_or_create("int".to_owned(), &mut graph, |b| {
        b.create_basic_type("int", 64, TypeEncoding::Signed)
    });

    assert!(result.is_err());
    assert!(cache.is_empty());
}

#[test]
fn remove_forgets_the_key() {
    let mut graph = MetadataGraph::new();
    let mut cache: WeakCache<ScopeId> = WeakCache::new();
    let mut scopes = crate::source::ScopeTree::new();
    let scope = scopes.add_function("f", None, None, None);

    let node = basic(&mut graph, "int");
    cache.insert(scope, node);
    assert_eq!(cache.get(&scope, &graph), Some(node));

    cache.remove(&scope);
    assert_eq!(cache.get(&scope, &graph), None);
}

#[test]
fn path_keys_borrow_as_paths() {
    let mut graph = MetadataGraph::new();
    let mut caches = IdentityCaches::default();
    let file = graph.create_file("main.ori", "/src").expect("file");

    caches.files.insert(PathBuf::from("/src/main.ori"), file);
    assert_eq!(
        caches.files.get(std::path::Path::new("/src/main.ori"), &graph),
        Some(file)
    );
    assert_eq!(caches.files.get(std::path::Path::new("/src/other.ori"), &graph), None);
}
