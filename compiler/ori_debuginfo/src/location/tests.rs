#![allow(clippy::expect_used, reason = "Test code uses expect for clarity")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::graph::{MetadataGraph, Node};
use crate::ir::FunctionId;
use crate::metadata::CallingConvention;
use crate::source::ScopeTree;
use crate::test_helpers::{loc, session};
use crate::types::{TypeId, TypePool};

fn function_with_block(scopes: &mut ScopeTree) -> (ScopeId, ScopeId) {
    let f = scopes.add_function("f", Some("_ori_f"), Some(loc(1, 1)), None);
    let block = scopes.add_block(f, Some(loc(2, 5)));
    (f, block)
}

fn current(di: &DebugInfo<'_, MetadataGraph>) -> Option<DebugLoc> {
    di.builder().current_location()
}

#[test]
fn set_current_stamps_scope_and_line() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(3, 7))).expect("set");
    let f_node = di.resolve_scope(f).expect("scope");

    assert_eq!(
        current(&di),
        Some(DebugLoc {
            line: 3,
            column: 7,
            scope: f_node
        })
    );
    assert_eq!(di.current_scope(), Some(f));
}

#[test]
fn repeated_location_is_not_reissued() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(3, 7))).expect("set");
    let issued = di.builder().location_history().len();
    di.set_current(f, Some(&loc(3, 7))).expect("set again");
    assert_eq!(di.builder().location_history().len(), issued);

    di.set_current(f, Some(&loc(4, 1))).expect("next line");
    assert_eq!(di.builder().location_history().len(), issued + 1);
}

#[test]
fn missing_location_is_artificial_in_scope() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, None).expect("set");
    let f_node = di.resolve_scope(f).expect("scope");
    let issued = current(&di).expect("a location");
    assert!(issued.is_artificial());
    assert_eq!(issued.scope, f_node);
}

#[test]
fn synthetic_prologue_then_source_line() {
    let mut types = TypePool::new();
    let signature = types.function(vec![TypeId::INT], TypeId::UNIT);
    let mut scopes = ScopeTree::new();
    let f = scopes.add_function("f", Some("_ori_f"), Some(loc(9, 1)), None);
    let mut di = session(&types, &scopes);

    let f_node = di
        .emit_function(f, FunctionId::new(0), CallingConvention::Freestanding, signature, None)
        .expect("function");

    di.set_current(f, None).expect("prologue");
    let prologue = current(&di);
    di.clear_current();
    di.set_current(f, Some(&loc(10, 5))).expect("statement");
    let statement = current(&di);

    assert_eq!(prologue, Some(DebugLoc::artificial(f_node)));
    assert_eq!(
        statement,
        Some(DebugLoc {
            line: 10,
            column: 5,
            scope: f_node
        })
    );
    assert_eq!(
        di.builder().location_history(),
        &[Some(DebugLoc::artificial(f_node)), None, statement]
    );
}

#[test]
fn ancestors_are_created_outside_in() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, block) = function_with_block(&mut scopes);
    let inner = scopes.add_block(block, Some(loc(4, 9)));
    let mut di = session(&types, &scopes);

    let inner_node = di.resolve_scope(inner).expect("inner");
    let block_node = di.resolve_scope(block).expect("block");
    let f_node = di.resolve_scope(f).expect("function");

    let graph = di.builder();
    match graph.node(inner_node) {
        Some(Node::LexicalBlock { parent, line, .. }) => {
            assert_eq!(*parent, block_node);
            assert_eq!(*line, 4);
        }
        other => panic!("expected lexical block, got {other:?}"),
    }
    match graph.node(block_node) {
        Some(Node::LexicalBlock { parent, .. }) => assert_eq!(*parent, f_node),
        other => panic!("expected lexical block, got {other:?}"),
    }
    assert!(matches!(graph.node(f_node), Some(Node::Function { .. })));
    assert_eq!(di.caches().scopes.len(), 3);
}

#[test]
fn scope_is_stable_until_replaced() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (_, block) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    let first = di.resolve_scope(block).expect("first");
    assert_eq!(di.resolve_scope(block).expect("again"), first);

    let cu = di.compile_unit();
    let file = di.main_file();
    let graph = di.builder_mut();
    let merged = graph
        .create_lexical_block(cu, file, 99, 1)
        .expect("block");
    graph.replace_all_uses(first, merged).expect("replace");

    let fresh = di.resolve_scope(block).expect("recomputed");
    assert_ne!(fresh, first);
    assert!(di.builder().is_live(fresh));
    assert_eq!(di.resolve_scope(block).expect("cached"), fresh);
}

#[test]
fn push_and_pop_restore_the_frame() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, block) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(block, Some(&loc(5, 2))).expect("set");
    let before = di.current_location().clone();
    let issued = current(&di);

    di.push_and_clear();
    assert!(di.current_location().is_empty());
    assert_eq!(current(&di), None);
    di.set_current(f, Some(&loc(1, 1))).expect("inner");

    di.pop_location();
    assert_eq!(di.current_location(), &before);
    assert_eq!(current(&di), issued);
    assert_eq!(di.location_depth(), 0);
}

#[test]
fn pop_reissues_even_when_unchanged() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(5, 2))).expect("set");
    di.push_and_clear();
    di.pop_location();

    let history = di.builder().location_history();
    let n = history.len();
    assert_eq!(history[n - 2], None);
    assert_eq!(history[n - 1], history[n - 3]);
}

#[test]
fn failed_reissue_leaves_both_sides_cleared() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(5, 2))).expect("set");
    let f_node = di.resolve_scope(f).expect("scope");
    di.push_and_clear();
    di.set_current(f, Some(&loc(6, 1))).expect("inner");

    // The saved scope can no longer be rebuilt.
    let cu = di.compile_unit();
    let graph = di.builder_mut();
    graph.replace_all_uses(f_node, cu).expect("replace");
    graph.seal().expect("seal");

    di.pop_location();
    assert!(di.current_location().is_empty());
    assert_eq!(current(&di), None);
    assert_eq!(di.location_depth(), 0);
}

#[test]
#[should_panic(expected = "empty location stack")]
fn pop_on_empty_stack_panics() {
    let types = TypePool::new();
    let scopes = ScopeTree::new();
    let mut di = session(&types, &scopes);
    di.pop_location();
}

#[test]
fn artificial_guard_restores_on_drop() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(7, 3))).expect("set");
    let f_node = di.resolve_scope(f).expect("scope");
    let before = current(&di);

    {
        let guard = di.artificial_location();
        assert_eq!(guard.location_depth(), 1);
        assert_eq!(
            guard.builder().current_location(),
            Some(DebugLoc::artificial(f_node))
        );
    }

    assert_eq!(di.location_depth(), 0);
    assert_eq!(current(&di), before);
}

#[test]
fn artificial_bracket_restores_on_error_exit() {
    let types = TypePool::new();
    let mut scopes = ScopeTree::new();
    let (f, _) = function_with_block(&mut scopes);
    let orphan = scopes.add_block(f, None);
    let mut di = session(&types, &scopes);

    di.set_current(f, Some(&loc(7, 3))).expect("set");
    let before = di.current_location().clone();

    let result: Result<(), DebugInfoError> = di.with_artificial_location(|di| {
        di.set_current(orphan, None)?;
        Err(DebugInfoError::Disabled)
    });

    assert_eq!(result, Err(DebugInfoError::Disabled));
    assert_eq!(di.location_depth(), 0);
    assert_eq!(di.current_location(), &before);
}

#[test]
fn guard_without_scope_clears() {
    let types = TypePool::new();
    let scopes = ScopeTree::new();
    let mut di = session(&types, &scopes);

    let guard = di.artificial_location();
    assert_eq!(guard.builder().current_location(), None);
    drop(guard);
    assert!(di.current_location().is_empty());
}

proptest! {
    #[test]
    fn balanced_push_pop_restores_state(lines in proptest::collection::vec(1u32..200, 1..16)) {
        let types = TypePool::new();
        let mut scopes = ScopeTree::new();
        let (f, block) = function_with_block(&mut scopes);
        let mut di = session(&types, &scopes);

        di.set_current(f, Some(&loc(1, 1))).expect("set");
        let before = di.current_location().clone();
        let issued = current(&di);

        for (i, &line) in lines.iter().enumerate() {
            di.push_and_clear();
            let scope = if i % 2 == 0 { block } else { f };
            di.set_current(scope, Some(&loc(line, 1))).expect("set");
        }
        for _ in &lines {
            di.pop_location();
        }

        prop_assert_eq!(di.location_depth(), 0);
        prop_assert_eq!(di.current_location(), &before);
        prop_assert_eq!(current(&di), issued);
    }
}
