//! A generic walker over the node forest.
//!
//! Inspections that need to look at whole subtrees (rather than a single
//! ancestry) drive this walker. It is parameterized over the node
//! representation, a user state, the expansion of a node into children,
//! and an optional early-exit predicate.

use sift_syntax::NodeIdMap;
use sift_syntax::XorNode;

/// The order in which the walker visits nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A node is visited before its descendants.
    BreadthFirst,
    /// A node is visited after its descendants.
    DepthFirst,
}

/// Walks a subtree, visiting each reachable node exactly once.
///
/// When the early-exit predicate returns true for a node, neither the
/// node nor its descendants are visited. An error returned by the
/// visitor terminates the walk and propagates to the caller.
pub fn traverse<'a, N, S, E>(
    map: &'a NodeIdMap,
    root: N,
    strategy: Strategy,
    state: &mut S,
    visit: &mut impl FnMut(&mut S, &N) -> Result<(), E>,
    expand: &impl Fn(&'a NodeIdMap, &N) -> Vec<N>,
    early_exit: Option<&impl Fn(&S, &N) -> bool>,
) -> Result<(), E> {
    if let Some(early_exit) = early_exit {
        if early_exit(state, &root) {
            return Ok(());
        }
    }

    if strategy == Strategy::BreadthFirst {
        visit(state, &root)?;
    }

    for child in expand(map, &root) {
        traverse(map, child, strategy, state, visit, expand, early_exit)?;
    }

    if strategy == Strategy::DepthFirst {
        visit(state, &root)?;
    }

    Ok(())
}

/// Expands a node into all of its children, fully and partially parsed
/// alike.
pub fn xor_children<'a>(map: &'a NodeIdMap, node: &XorNode<'a>) -> Vec<XorNode<'a>> {
    map.child_ids(node.id())
        .iter()
        .filter_map(|id| map.xor_node(*id))
        .collect()
}

/// A predicate that never exits early.
///
/// This exists so callers without an early-exit condition have a value
/// to pass where one is expected.
pub fn never_exit<S>(_: &S, _: &XorNode<'_>) -> bool {
    false
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use sift_syntax::ConstantKind;
    use sift_syntax::NodeKind;
    use sift_syntax::TreeBuilder;

    use super::*;

    /// Builds `each foo` and returns the map.
    fn fixture() -> NodeIdMap {
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::EachExpression, None);
        builder.constant(0, ConstantKind::Each, "each");
        builder.space();
        builder.identifier_expression(Some(1), "foo");
        builder.finish();
        builder.build()
    }

    /// Walks the fixture and returns the visited kinds in order.
    fn kinds(strategy: Strategy, exit_on: Option<NodeKind>) -> Vec<NodeKind> {
        let map = fixture();
        let root = map
            .ancestry(*map.leaf_ids().first().expect("should have leaves"))
            .into_iter()
            .last()
            .expect("should have a root");

        let mut visited = Vec::new();
        traverse::<_, _, ()>(
            &map,
            root,
            strategy,
            &mut visited,
            &mut |state, node: &XorNode<'_>| {
                state.push(node.kind());
                Ok(())
            },
            &xor_children,
            Some(&|_: &Vec<NodeKind>, node: &XorNode<'_>| {
                Some(node.kind()) == exit_on
            }),
        )
        .expect("walk should succeed");

        visited
    }

    #[test]
    fn breadth_first_visits_parents_before_children() {
        assert_eq!(kinds(Strategy::BreadthFirst, None), vec![
            NodeKind::EachExpression,
            NodeKind::Constant,
            NodeKind::IdentifierExpression,
            NodeKind::Identifier,
        ]);
    }

    #[test]
    fn depth_first_visits_children_before_parents() {
        assert_eq!(kinds(Strategy::DepthFirst, None), vec![
            NodeKind::Constant,
            NodeKind::Identifier,
            NodeKind::IdentifierExpression,
            NodeKind::EachExpression,
        ]);
    }

    #[test]
    fn early_exit_skips_the_node_and_its_descendants() {
        assert_eq!(
            kinds(Strategy::BreadthFirst, Some(NodeKind::IdentifierExpression)),
            vec![NodeKind::EachExpression, NodeKind::Constant]
        );
    }

    #[test]
    fn visitor_errors_terminate_the_walk() {
        let map = fixture();
        let root = map
            .ancestry(*map.leaf_ids().first().expect("should have leaves"))
            .into_iter()
            .last()
            .expect("should have a root");

        let mut count = 0usize;
        let result = traverse(
            &map,
            root,
            Strategy::BreadthFirst,
            &mut count,
            &mut |state, _: &XorNode<'_>| {
                *state += 1;
                if *state == 2 { Err("stop") } else { Ok(()) }
            },
            &xor_children,
            None::<&fn(&usize, &XorNode<'_>) -> bool>,
        );

        assert_eq!(result, Err("stop"));
        assert_eq!(count, 2);
    }
}
