//! The fitting reshaper: regroups a `[header, argument_list]` partition
//! so arguments pack onto as few lines as possible, the way a call's
//! arguments spill onto a bounded number of continuation lines instead
//! of one argument per line.

use crate::partition_tree::PartitionTree;
use crate::style::Style;
use crate::token::FormatToken;
use crate::tree::Tree;
use crate::unwrapped_line::{PartitionPolicy, UnwrappedLine};
use crate::wrap::fits_on_line;

/// One accumulated group: its combined `UnwrappedLine` span plus the
/// original partition subtrees absorbed into it, in order.
struct Group<Origin> {
    line: UnwrappedLine<Origin>,
    members: Vec<Tree<UnwrappedLine<Origin>>>,
}

impl<Origin: Clone> Group<Origin> {
    fn new(line: UnwrappedLine<Origin>, first: Tree<UnwrappedLine<Origin>>) -> Self {
        Self { line, members: vec![first] }
    }

    fn extend_to(&mut self, end: usize, member: Tree<UnwrappedLine<Origin>>) {
        let start = self.line.range().start;
        self.line.set_range(start..end);
        self.members.push(member);
    }

    fn into_tree(self) -> Tree<UnwrappedLine<Origin>> {
        let mut line = self.line;
        line.policy = PartitionPolicy::FitOnLineElseExpand;
        Tree::with_children(line, self.members)
    }
}

/// Builds one candidate shape. `force_wrap_first` corresponds to variant
/// (ii), forcing a wrap immediately after the header; otherwise this
/// builds variant (i), trying to append the first argument to the header.
/// Returns the groups plus whether the first argument ended up on its own
/// group (forced or because it didn't fit).
fn append_fitting_subpartitions<Origin: Clone>(
    header: &Tree<UnwrappedLine<Origin>>,
    args: &[Tree<UnwrappedLine<Origin>>],
    tokens: &[FormatToken],
    style: &Style,
    force_wrap_first: bool,
) -> (Vec<Group<Origin>>, bool) {
    let header_line = header.value().clone();
    let header_indent = header_line.indentation_spaces;

    let mut groups: Vec<Group<Origin>> = Vec::new();
    let mut group = Group::new(header_line.clone(), header.clone());

    let arg0_end = args[0].value().range().end;
    let header_start = header_line.range().start;
    let (fits, _) = fits_on_line(&tokens[header_start..arg0_end], header_indent, style);

    let indent;
    let wrapped_first;
    if force_wrap_first || !fits {
        indent = style.wrap_spaces + header_indent;
        groups.push(group);
        let mut arg0_line = args[0].value().clone();
        arg0_line.indentation_spaces = indent;
        group = Group::new(arg0_line, args[0].clone());
        wrapped_first = true;
    } else {
        let (_, final_column) = fits_on_line(&tokens[header_line.range()], header_indent, style);
        indent = final_column;
        group.extend_to(arg0_end, args[0].clone());
        wrapped_first = false;
    }

    for arg in &args[1..] {
        let candidate_end = arg.value().range().end;
        let start = group.line.range().start;
        let group_indent = group.line.indentation_spaces;
        let (fits, _) = fits_on_line(&tokens[start..candidate_end], group_indent, style);
        if fits {
            group.extend_to(candidate_end, arg.clone());
        } else {
            groups.push(group);
            let mut arg_line = arg.value().clone();
            arg_line.indentation_spaces = indent;
            group = Group::new(arg_line, arg.clone());
        }
    }
    groups.push(group);
    (groups, wrapped_first)
}

/// Reshapes a `[header, argument_list]` partition. No-op (returns a clone
/// of `node`) if it has fewer than two children or the argument list is
/// empty, since there is nothing to regroup.
pub fn reshape_fitting_subpartitions<Origin: Clone>(
    node: &PartitionTree<Origin>,
    tokens: &[FormatToken],
    style: &Style,
) -> PartitionTree<Origin> {
    let children = node.child_trees();
    if children.len() < 2 {
        return node.clone();
    }
    let header = &children[0];
    let args = children[1].children();
    if args.is_empty() {
        return node.clone();
    }

    let (unwrapped, wrapped_first) = append_fitting_subpartitions(header, args, tokens, style, false);

    let chosen = if wrapped_first {
        // The first argument was already forced to wrap; the "force wrap"
        // variant would produce the same shape, so don't bother building it.
        unwrapped
    } else {
        let (wrapped, _) = append_fitting_subpartitions(header, args, tokens, style, true);
        if unwrapped.len() <= wrapped.len() {
            unwrapped
        } else {
            wrapped
        }
    };

    let root_line = node.value().clone();
    let group_trees: Vec<Tree<UnwrappedLine<Origin>>> = chosen.into_iter().map(Group::into_tree).collect();
    PartitionTree::from_tree(Tree::with_children(root_line, group_trees))
}
