use pretty_assertions::assert_eq;

use super::*;

#[test]
fn line_map_converts_offsets() {
    let map = LineMap::new("let x = 1\nlet y = 2\n\nx + y");
    assert_eq!(map.line_count(), 4);
    assert_eq!(map.offset_to_line_col(0), (1, 1));
    assert_eq!(map.offset_to_line_col(4), (1, 5));
    assert_eq!(map.offset_to_line_col(10), (2, 1));
    assert_eq!(map.offset_to_line_col(20), (3, 1));
    assert_eq!(map.offset_to_line_col(23), (4, 3));
}

#[test]
fn source_map_resolves_known_files_only() {
    let mut map = SourceMap::new();
    let file = map.add_file("/src/main.ori", "a\nbc");

    assert_eq!(map.path(file), Some(Path::new("/src/main.ori")));
    assert_eq!(
        map.location(file, 3),
        Some(SourceLoc::new("/src/main.ori", 2, 2))
    );
    assert_eq!(map.location(FileId(7), 0), None);
}

#[test]
fn scope_tree_finds_enclosing_function() {
    let mut tree = ScopeTree::new();
    let f = tree.add_function("f", Some("_ori_f"), None, None);
    let outer = tree.add_block(f, None);
    let inner = tree.add_block(outer, None);
    let closure = tree.add_function("f.lambda", None, None, Some(inner));
    let body = tree.add_block(closure, None);

    assert_eq!(tree.len(), 5);
    assert_eq!(tree.parent(inner), Some(outer));
    assert_eq!(tree.enclosing_function(inner), Some(f));
    assert_eq!(tree.enclosing_function(f), Some(f));
    assert_eq!(tree.enclosing_function(body), Some(closure));
}

#[test]
fn orphan_block_has_no_function() {
    let mut tree = ScopeTree::new();
    let root = tree.add(ScopeData {
        parent: None,
        kind: ScopeKind::Block,
        loc: None,
    });
    assert_eq!(tree.enclosing_function(root), None);
}
