//! The token-partition tree: a hierarchical view of a token stream, with
//! invariants that every internal node's range equals the concatenation of
//! its children's ranges, and that adjacent siblings are contiguous.

use crate::tree::Tree;
use crate::unwrapped_line::UnwrappedLine;

/// A hierarchical partition of a format-token stream.
///
/// Maintains, after every public mutator, two invariants: hierarchy (a
/// node's range equals the concatenation of its children's ranges) and
/// sibling continuity (adjacent siblings abut).
#[derive(Debug, Clone)]
pub struct PartitionTree<Origin = ()> {
    inner: Tree<UnwrappedLine<Origin>>,
}

/// A mutator attempted to touch an index outside the bounds of its node's
/// children, or would have produced a tree violating the range-hierarchy or
/// sibling-continuity invariant. This is a programming error: fatal, not
/// a value the caller is expected to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("partition tree node's range does not equal the concatenation of its children's ranges")]
    HierarchyBroken,
    #[error("adjacent sibling partitions are not contiguous")]
    SiblingDiscontinuity,
}

impl<Origin> PartitionTree<Origin> {
    pub fn leaf(line: UnwrappedLine<Origin>) -> Self {
        Self { inner: Tree::leaf(line) }
    }

    pub fn with_children(line: UnwrappedLine<Origin>, children: Vec<PartitionTree<Origin>>) -> Self {
        let children = children.into_iter().map(|c| c.inner).collect();
        Self { inner: Tree::with_children(line, children) }
    }

    pub fn value(&self) -> &UnwrappedLine<Origin> {
        self.inner.value()
    }

    pub fn value_mut(&mut self) -> &mut UnwrappedLine<Origin> {
        self.inner.value_mut()
    }

    pub fn children(&self) -> impl Iterator<Item = &UnwrappedLine<Origin>> {
        self.inner.children().iter().map(|c| c.value())
    }

    pub fn child_trees(&self) -> &[Tree<UnwrappedLine<Origin>>] {
        self.inner.children()
    }

    /// Wraps an already-built `Tree` without re-deriving it from an
    /// `UnwrappedLine`/children pair. Used by the reshaper and alignment
    /// engine, which build on the underlying `Tree` directly and only need
    /// the invariant-checked wrapper at their public boundary.
    pub(crate) fn from_tree(inner: Tree<UnwrappedLine<Origin>>) -> Self {
        Self { inner }
    }

    pub(crate) fn as_tree(&self) -> &Tree<UnwrappedLine<Origin>> {
        &self.inner
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.is_leaf()
    }

    /// Verifies both tree invariants at this node only (not recursively).
    pub fn verify_node(&self) -> Result<(), InvariantViolation> {
        let children = self.inner.children();
        if children.is_empty() {
            return Ok(());
        }
        let own = self.inner.value().range();
        let first = children.first().unwrap().value().range();
        let last = children.last().unwrap().value().range();
        if own.start != first.start || own.end != last.end {
            return Err(InvariantViolation::HierarchyBroken);
        }
        for pair in children.windows(2) {
            if pair[0].value().range().end != pair[1].value().range().start {
                return Err(InvariantViolation::SiblingDiscontinuity);
            }
        }
        Ok(())
    }

    /// Verifies both invariants at every node in the tree.
    pub fn verify_full(&self) -> Result<(), InvariantViolation> {
        verify_full_recursive(&self.inner)
    }

    /// Combines the children at `pos` and `pos + 1`, extending `pos`'s range
    /// to cover both and moving `pos + 1`'s children onto `pos`.
    pub fn merge_consecutive_siblings(&mut self, pos: usize)
    where
        Origin: Clone,
    {
        self.inner.merge_consecutive_siblings(pos, |left, right| {
            let mut merged = left.clone();
            let new_end = right.range().end;
            let start = merged.range().start;
            merged.set_range(start..new_end);
            merged
        });
        debug_assert!(self.verify_node().is_ok(), "merge_consecutive_siblings broke an invariant");
    }

    pub fn hoist_only_child(&mut self) -> bool {
        let changed = self.inner.hoist_only_child();
        debug_assert!(!changed || self.verify_node().is_ok(), "hoist_only_child broke an invariant");
        changed
    }

    pub fn flatten_once(&mut self) {
        self.inner.flatten_once();
        debug_assert!(self.verify_node().is_ok(), "flatten_once broke an invariant");
    }

    pub fn flatten_only_children_with_children(&mut self) -> Vec<usize> {
        let offsets = self.inner.flatten_only_children_with_children();
        debug_assert!(self.verify_node().is_ok(), "flatten_only_children_with_children broke an invariant");
        offsets
    }

    pub fn flatten_one_child(&mut self, i: usize) {
        self.inner.flatten_one_child(i);
        debug_assert!(self.verify_node().is_ok(), "flatten_one_child broke an invariant");
    }

    pub fn adopt_subtrees_from(&mut self, other: &mut PartitionTree<Origin>) {
        self.inner.adopt_subtrees_from(&mut other.inner);
        let own_start = self.inner.value().range().start;
        let own_end = self.inner.children().last().map(|c| c.value().range().end);
        if let Some(end) = own_end {
            self.inner.value_mut().set_range(own_start..end);
        }
        debug_assert!(self.verify_node().is_ok(), "adopt_subtrees_from broke an invariant");
    }

    /// Finds the rightmost leaf in this subtree, merges its range into the
    /// previous-in-order leaf (extending every ancestor between that leaf
    /// and the common ancestor to match), and erases the rightmost leaf.
    ///
    /// Returns `true` if a move occurred; `false` ("no change") if this
    /// subtree is a single leaf, or the previous leaf lies outside it.
    ///
    /// The source implementation returns a pointer to the parent of the
    /// erased leaf; this crate instead signals whether the move happened,
    /// since callers can re-walk by index afterward.
    pub fn move_last_leaf_into_previous_sibling(&mut self) -> bool {
        let rightmost = self.inner.rightmost_leaf_path();
        if rightmost.is_empty() {
            return false;
        }
        let predecessor = match self.inner.predecessor_leaf_path(&rightmost) {
            Some(p) => p,
            None => return false,
        };

        let common_len =
            rightmost.iter().zip(predecessor.iter()).take_while(|(a, b)| a == b).count();

        let rightmost_end = {
            let parent = self.inner.at_path_mut(&rightmost[..rightmost.len() - 1]);
            let removed = parent.remove_child(*rightmost.last().unwrap());
            removed.value().range().end
        };

        for depth in (common_len + 1..=predecessor.len()).rev() {
            let node = self.inner.at_path_mut(&predecessor[..depth]);
            let start = node.value().range().start;
            node.value_mut().set_range(start..rightmost_end);
        }
        true
    }

    pub fn apply_pre_order(&self, mut f: impl FnMut(&UnwrappedLine<Origin>)) {
        self.inner.apply_pre_order(&mut f);
    }

    pub fn apply_pre_order_mut(&mut self, mut f: impl FnMut(&mut UnwrappedLine<Origin>)) {
        self.inner.apply_pre_order_mut(&mut f);
    }

    pub fn apply_post_order(&self, mut f: impl FnMut(&UnwrappedLine<Origin>)) {
        self.inner.apply_post_order(&mut f);
    }

    pub fn apply_post_order_mut(&mut self, mut f: impl FnMut(&mut UnwrappedLine<Origin>)) {
        self.inner.apply_post_order_mut(&mut f);
    }
}

fn verify_full_recursive<Origin>(node: &Tree<UnwrappedLine<Origin>>) -> Result<(), InvariantViolation> {
    let children = node.children();
    if !children.is_empty() {
        let own = node.value().range();
        let first = children.first().unwrap().value().range();
        let last = children.last().unwrap().value().range();
        if own.start != first.start || own.end != last.end {
            return Err(InvariantViolation::HierarchyBroken);
        }
        for pair in children.windows(2) {
            if pair[0].value().range().end != pair[1].value().range().start {
                return Err(InvariantViolation::SiblingDiscontinuity);
            }
        }
    }
    for child in children {
        verify_full_recursive(child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unwrapped_line::PartitionPolicy;

    fn line(range: std::ops::Range<usize>) -> UnwrappedLine {
        UnwrappedLine::new(range, 0, PartitionPolicy::FitOnLineElseExpand)
    }

    #[test]
    fn verify_full_accepts_well_formed_tree() {
        let tree: PartitionTree = PartitionTree::with_children(
            line(0..4),
            vec![PartitionTree::leaf(line(0..2)), PartitionTree::leaf(line(2..4))],
        );
        assert!(tree.verify_full().is_ok());
    }

    #[test]
    fn verify_full_rejects_discontinuous_siblings() {
        let tree: PartitionTree = PartitionTree::with_children(
            line(0..5),
            vec![PartitionTree::leaf(line(0..2)), PartitionTree::leaf(line(3..5))],
        );
        assert_eq!(tree.verify_node(), Err(InvariantViolation::SiblingDiscontinuity));
    }

    #[test]
    fn merge_consecutive_siblings_extends_range() {
        let mut tree: PartitionTree = PartitionTree::with_children(
            line(0..6),
            vec![PartitionTree::leaf(line(0..2)), PartitionTree::leaf(line(2..4)), PartitionTree::leaf(line(4..6))],
        );
        tree.merge_consecutive_siblings(0);
        assert!(tree.verify_full().is_ok());
        let ranges: Vec<_> = tree.children().map(|c| c.range()).collect();
        assert_eq!(ranges, vec![0..4, 4..6]);
    }

    #[test]
    fn move_last_leaf_into_previous_sibling_absorbs_range() {
        let mut tree: PartitionTree = PartitionTree::with_children(
            line(0..6),
            vec![
                PartitionTree::with_children(line(0..4), vec![PartitionTree::leaf(line(0..2)), PartitionTree::leaf(line(2..4))]),
                PartitionTree::leaf(line(4..6)),
            ],
        );
        let changed = tree.move_last_leaf_into_previous_sibling();
        assert!(changed);
        assert!(tree.verify_full().is_ok());
        // The trailing leaf (4..6) was merged into the 2..4 leaf, which is
        // now 2..6; its parent (formerly 0..4) must also grow to 0..6.
        assert_eq!(tree.children().count(), 1);
    }

    #[test]
    fn move_last_leaf_into_previous_sibling_noop_for_single_leaf() {
        let mut tree: PartitionTree = PartitionTree::leaf(line(0..2));
        assert!(!tree.move_last_leaf_into_previous_sibling());
    }
}
