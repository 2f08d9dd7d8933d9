//! The formatter driver: walks a partition tree post-order, decides
//! bottom-up which nodes expand into multiple lines, runs the reshaper and
//! alignment engine where their policies call for it, and hands each
//! resulting leaf to the wrap searcher.

use std::ops::Range;

use crate::align::{align_group, split_into_alignment_groups, AlignmentPolicy, ColumnSchemaSource};
use crate::error::{FormatError, PartitionDiagnostic};
use crate::partition_tree::PartitionTree;
use crate::reshape::reshape_fitting_subpartitions;
use crate::style::Style;
use crate::token::FormatToken;
use crate::unwrapped_line::PartitionPolicy;
use crate::wrap::{fits_on_line, search_line_wraps, FormattedExcerpt};

/// Everything the alignment engine needs that isn't already implied by the
/// partition tree itself: the caller's column-schema visitor, the chosen
/// policy, the disabled-format byte ranges, and the row predicates used to
/// group and exclude rows. `Tag` is the caller's subtype-tag type for
/// row grouping; use `()` if rows don't need subtype separation.
pub struct AlignmentConfig<'a, Origin, Tag: PartialEq> {
    pub source: &'a dyn ColumnSchemaSource<Origin>,
    pub policy: AlignmentPolicy,
    pub disabled: &'a [Range<usize>],
    pub ignore: &'a dyn Fn(&PartitionTree<Origin>) -> bool,
    pub subtype: &'a dyn Fn(&PartitionTree<Origin>) -> Tag,
}

type Leaf = (Range<usize>, usize);

fn combine_children_leaves<Origin>(
    children: &[PartitionTree<Origin>],
    results: &[(bool, Vec<Leaf>)],
) -> Vec<Leaf> {
    let mut leaves = Vec::new();
    for (child, (expanded, child_leaves)) in children.iter().zip(results) {
        if *expanded {
            leaves.extend(child_leaves.iter().cloned());
        } else {
            leaves.push((child.value().range(), child.value().indentation_spaces));
        }
    }
    leaves
}

fn own_leaf<Origin>(node: &PartitionTree<Origin>) -> Leaf {
    (node.value().range(), node.value().indentation_spaces)
}

/// Resolves one node's expand/don't-expand decision, returning whether it
/// expanded and the flat list of leaves (token range, indentation) it
/// contributes in left-to-right order.
fn resolve<Origin: Clone, Tag: PartialEq>(
    node: &PartitionTree<Origin>,
    tokens: &mut [FormatToken],
    style: &Style,
    alignment: &AlignmentConfig<Origin, Tag>,
) -> (bool, Vec<Leaf>) {
    if node.is_leaf() {
        return (false, vec![own_leaf(node)]);
    }

    let children: Vec<PartitionTree<Origin>> =
        node.child_trees().iter().map(|c| PartitionTree::from_tree(c.clone())).collect();

    match node.value().policy {
        PartitionPolicy::AppendFittingSubPartitions => {
            let reshaped = reshape_fitting_subpartitions(node, tokens, style);
            let groups: Vec<PartitionTree<Origin>> =
                reshaped.child_trees().iter().map(|c| PartitionTree::from_tree(c.clone())).collect();
            // The reshaper always produces at least one group; a single
            // group spans the whole node, so there is nothing to expand.
            if groups.len() <= 1 {
                return (false, vec![own_leaf(node)]);
            }
            let results: Vec<(bool, Vec<Leaf>)> =
                groups.iter().map(|g| resolve(g, tokens, style, alignment)).collect();
            return (true, combine_children_leaves(&groups, &results));
        }
        PartitionPolicy::TabularAlignment => {
            let row_refs: Vec<&PartitionTree<Origin>> = children.iter().collect();
            let groups = split_into_alignment_groups(&row_refs, tokens, alignment.subtype);
            for group in groups {
                if group.len() < 2 {
                    continue;
                }
                align_group(&group, alignment.source, tokens, style, alignment.policy, alignment.disabled, alignment.ignore);
            }
            let results: Vec<(bool, Vec<Leaf>)> =
                children.iter().map(|c| resolve(c, tokens, style, alignment)).collect();
            return (true, combine_children_leaves(&children, &results));
        }
        _ => {}
    }

    let results: Vec<(bool, Vec<Leaf>)> = children.iter().map(|c| resolve(c, tokens, style, alignment)).collect();
    let any_child_expanded = results.iter().any(|(expanded, _)| *expanded);

    if any_child_expanded {
        return (true, combine_children_leaves(&children, &results));
    }

    match node.value().policy {
        PartitionPolicy::AlwaysExpand => (true, combine_children_leaves(&children, &results)),
        PartitionPolicy::FitOnLineElseExpand => {
            let range = node.value().range();
            let (fits, _) = fits_on_line(&tokens[range.clone()], node.value().indentation_spaces, style);
            if fits {
                (false, vec![own_leaf(node)])
            } else {
                (true, combine_children_leaves(&children, &results))
            }
        }
        PartitionPolicy::Uninitialized => {
            debug_assert!(false, "uninitialized partition policy reached the driver");
            (false, vec![own_leaf(node)])
        }
        // AlreadyFormatted and the layout-function-algebra hints
        // (Inline/Juxtaposition/Stack/Wrap/JuxtapositionOrIndentedStack)
        // carry no independent expand rule of their own beyond "a child
        // already forced it" (handled above): stay collapsed.
        _ => (false, vec![own_leaf(node)]),
    }
}

/// Drops empty-range leaves trailing the flattened list.
fn drop_trailing_blank_leaves(mut leaves: Vec<Leaf>) -> Vec<Leaf> {
    while leaves.last().map(|(range, _)| range.is_empty()).unwrap_or(false) {
        leaves.pop();
    }
    leaves
}

/// Runs the full driver over `tree`: expand/don't-expand, reshaping,
/// alignment, then the wrap searcher over every resulting leaf.
///
/// Returns every leaf's token range paired with its chosen formatting, in
/// order (the shape [`crate::emit::emit`] expects), alongside an optional
/// `ResourceExhausted` diagnostic. Exhaustion is never fatal, every leaf
/// that hit `max_search_states` was still completed greedily, so the
/// excerpts are always complete and usable; the diagnostic is for a caller
/// that wants to report where the search gave up on optimality.
pub fn format_partition_tree<Origin: Clone, Tag: PartialEq>(
    tree: &PartitionTree<Origin>,
    tokens: &mut [FormatToken],
    style: &Style,
    alignment: &AlignmentConfig<Origin, Tag>,
) -> (Vec<(Range<usize>, FormattedExcerpt)>, Option<FormatError>) {
    let (_, leaves) = resolve(tree, tokens, style, alignment);
    let leaves = drop_trailing_blank_leaves(leaves);

    let mut excerpts = Vec::with_capacity(leaves.len());
    let mut exhausted = Vec::new();
    for (range, indentation) in leaves {
        let result = search_line_wraps(&tokens[range.clone()], indentation, style);
        if result.incomplete {
            log::warn!("wrap search exhausted its state budget for tokens {:?}", range);
            exhausted.push(PartitionDiagnostic { token_range: range.clone(), indentation_spaces: indentation });
        }
        if let Some(path) = result.paths.into_iter().next() {
            excerpts.push((range, path));
        }
    }

    let error = if exhausted.is_empty() { None } else { Some(FormatError::ResourceExhausted { partitions: exhausted }) };
    (excerpts, error)
}
