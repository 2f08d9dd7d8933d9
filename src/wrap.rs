//! The per-Unwrapped-Line wrap searcher: a Dijkstra search over State Nodes
//! that decides, for each token, whether to append it to the current line
//! or wrap it onto a new one, minimising a cost made of overflow and
//! line-break penalties.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::style::Style;
use crate::token::{BreakDecision, FormatToken, GroupBalancing, InterTokenDecision, SpacingDecision};

/// A persistent (structurally shared) stack of wrap columns, one per
/// currently-open balanced group. Every state that descends from a common
/// ancestor shares the unchanged tail of its stack; pushing/popping only
/// ever allocates the new frame, never copies the rest.
#[derive(Debug)]
struct ColumnFrame {
    column: usize,
    prev: Option<Rc<ColumnFrame>>,
}

impl ColumnFrame {
    fn bottom(column: usize) -> Rc<Self> {
        Rc::new(Self { column, prev: None })
    }

    fn push(self: &Rc<Self>, column: usize) -> Rc<Self> {
        Rc::new(Self { column, prev: Some(Rc::clone(self)) })
    }

    /// Pops to the enclosing frame, or stays put if already at the bottom
    /// (the stack always keeps its bottom frame).
    fn popped(self: &Rc<Self>) -> Rc<Self> {
        match &self.prev {
            Some(parent) => Rc::clone(parent),
            None => Rc::clone(self),
        }
    }

    fn top(&self) -> usize {
        self.column
    }
}

/// One node of the search's state-chain DAG: the tokens placed so far,
/// reachable only by walking `prev` back to the seed. Shared by immutable
/// reference; never mutated after construction.
#[derive(Debug)]
struct StateNode {
    /// Index of the last token this state has placed.
    token_index: usize,
    current_column: usize,
    cumulative_cost: u64,
    decision: InterTokenDecision,
    wrap_stack: Rc<ColumnFrame>,
    prev: Option<Rc<StateNode>>,
}

/// Wraps a state for the priority queue: ascending `(cumulative_cost,
/// current_column)`, i.e. reversed so `BinaryHeap` (a max-heap) pops the
/// cheapest, then leftmost-finishing, state first.
struct QueueEntry(Rc<StateNode>);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.cumulative_cost == other.0.cumulative_cost && self.0.current_column == other.0.current_column
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .cumulative_cost
            .cmp(&self.0.cumulative_cost)
            .then_with(|| other.0.current_column.cmp(&self.0.current_column))
    }
}

/// The bound decisions for every token of one Unwrapped Line, in order.
#[derive(Debug, Clone)]
pub struct FormattedExcerpt {
    pub decisions: Vec<InterTokenDecision>,
    pub final_column: usize,
    pub cost: u64,
}

/// Result of searching one Unwrapped Line.
#[derive(Debug, Clone)]
pub struct WrapSearchResult {
    /// All winning paths tied for the lowest cost.
    pub paths: Vec<FormattedExcerpt>,
    /// Set when the search hit `max_search_states` and was finished
    /// greedily instead of to optimality.
    pub incomplete: bool,
}

/// (fits on one line, final column reached). `indentation` is the column
/// the Unwrapped Line itself starts at (its own `indentation_spaces`, not
/// `style.indentation_spaces`, which is just the per-level increment the
/// external partition builder used to compute it).
pub fn fits_on_line(tokens: &[FormatToken], indentation: usize, style: &Style) -> (bool, usize) {
    if tokens.is_empty() {
        return (true, indentation);
    }
    let mut column = indentation + tokens[0].trailing_column_width();
    if column > style.column_limit {
        return (false, column);
    }
    for token in &tokens[1..] {
        if matches!(token.before.break_decision, BreakDecision::MustWrap) {
            return (false, column);
        }
        let assessed = column + token.before.spaces_required + token.leading_column_width();
        if assessed > style.column_limit {
            return (false, assessed);
        }
        column = if token.is_multiline() {
            token.trailing_column_width()
        } else {
            column + token.before.spaces_required + token.length()
        };
    }
    (true, column)
}

fn seed_state(tokens: &[FormatToken], indentation: usize, style: &Style) -> Rc<StateNode> {
    let first = &tokens[0];
    let bottom = ColumnFrame::bottom(indentation + style.wrap_spaces);
    let decision = if matches!(first.before.break_decision, BreakDecision::Preserve) {
        InterTokenDecision::preserve(first.before.preserved_space_start)
    } else if first.before.break_decision == BreakDecision::AppendAligned {
        InterTokenDecision::align(indentation)
    } else {
        InterTokenDecision::append(indentation)
    };
    let current_column = indentation + first.trailing_column_width();
    let wrap_stack = apply_group_balancing(&bottom, first.balancing, current_column);
    Rc::new(StateNode { token_index: 0, current_column, cumulative_cost: 0, decision, wrap_stack, prev: None })
}

/// Group-balancing semantics: pop first on Close, push (using the
/// token's own resulting column) on Open. Applies uniformly to
/// whichever successor kind is being built, since the stack a later token
/// sees must not depend on how its predecessor happened to be spaced.
fn apply_group_balancing(stack: &Rc<ColumnFrame>, balancing: GroupBalancing, column_after: usize) -> Rc<ColumnFrame> {
    match balancing {
        GroupBalancing::None => Rc::clone(stack),
        GroupBalancing::Close => stack.popped(),
        GroupBalancing::Open => stack.push(column_after),
    }
}

/// The wrap-stack top a Close token's own successors should wrap against:
/// the enclosing group, not its own (the pop happens before this token's
/// column is computed).
fn effective_stack_for_own_decision(stack: &Rc<ColumnFrame>, balancing: GroupBalancing) -> Rc<ColumnFrame> {
    match balancing {
        GroupBalancing::Close => stack.popped(),
        _ => Rc::clone(stack),
    }
}

fn successors(state: &Rc<StateNode>, tokens: &[FormatToken], style: &Style) -> Vec<Rc<StateNode>> {
    let i = state.token_index + 1;
    let token = &tokens[i];
    let mut out = Vec::with_capacity(2);

    if matches!(token.before.break_decision, BreakDecision::Preserve) {
        let current_column = if token.before.preserved_newline_count > 0 {
            token.before.preserved_trailing_column
        } else {
            state.current_column + token.before.preserved_trailing_column
        };
        let wrap_stack = apply_group_balancing(&state.wrap_stack, token.balancing, current_column);
        out.push(Rc::new(StateNode {
            token_index: i,
            current_column,
            cumulative_cost: state.cumulative_cost,
            decision: InterTokenDecision::preserve(token.before.preserved_space_start),
            wrap_stack,
            prev: Some(Rc::clone(state)),
        }));
        return out;
    }

    let own_stack = effective_stack_for_own_decision(&state.wrap_stack, token.balancing);

    if matches!(
        token.before.break_decision,
        BreakDecision::Undecided | BreakDecision::MustAppend | BreakDecision::AppendAligned
    ) {
        let prev_column = state.current_column;
        let spaces = token.before.spaces_required;
        let assessed_column = prev_column + spaces + token.leading_column_width();
        let mut cost = state.cumulative_cost;
        if assessed_column > style.column_limit {
            cost += style.over_column_limit_penalty as u64 + (assessed_column - style.column_limit) as u64;
        }
        let current_column =
            if token.is_multiline() { token.trailing_column_width() } else { prev_column + spaces + token.length() };
        let wrap_stack = apply_group_balancing(&own_stack, token.balancing, current_column);
        let decision = if token.before.break_decision == BreakDecision::AppendAligned {
            InterTokenDecision::align(spaces)
        } else {
            InterTokenDecision::append(spaces)
        };
        out.push(Rc::new(StateNode {
            token_index: i,
            current_column,
            cumulative_cost: cost,
            decision,
            wrap_stack,
            prev: Some(Rc::clone(state)),
        }));
    }

    if matches!(token.before.break_decision, BreakDecision::Undecided | BreakDecision::MustWrap) {
        let wrap_column = own_stack.top();
        let cost = state.cumulative_cost + token.before.break_penalty as u64 + style.line_break_penalty as u64;
        let current_column =
            if token.is_multiline() { token.trailing_column_width() } else { wrap_column + token.length() };
        let wrap_stack = apply_group_balancing(&own_stack, token.balancing, current_column);
        out.push(Rc::new(StateNode {
            token_index: i,
            current_column,
            cumulative_cost: cost,
            decision: InterTokenDecision::wrap(wrap_column),
            wrap_stack,
            prev: Some(Rc::clone(state)),
        }));
    }

    out
}

fn reconstruct(state: &Rc<StateNode>) -> FormattedExcerpt {
    let mut decisions = Vec::with_capacity(state.token_index + 1);
    let mut cursor = Some(Rc::clone(state));
    while let Some(node) = cursor {
        decisions.push(node.decision);
        cursor = node.prev.clone();
    }
    decisions.reverse();
    FormattedExcerpt { decisions, final_column: state.current_column, cost: state.cumulative_cost }
}

/// Finishes a state greedily (append if it fits, else wrap) without further
/// search, for use when the state budget is exhausted.
fn finish_greedily(mut state: Rc<StateNode>, tokens: &[FormatToken], style: &Style) -> Rc<StateNode> {
    while state.token_index + 1 < tokens.len() {
        let mut candidates = successors(&state, tokens, style);
        candidates.sort_by(|a, b| match (a.decision.action, b.decision.action) {
            (SpacingDecision::Wrap, SpacingDecision::Wrap) => Ordering::Equal,
            (SpacingDecision::Wrap, _) => Ordering::Greater,
            (_, SpacingDecision::Wrap) => Ordering::Less,
            _ => Ordering::Equal,
        });
        let chosen = candidates
            .into_iter()
            .find(|c| c.current_column <= style.column_limit || !matches!(c.decision.action, SpacingDecision::Wrap))
            .expect("a token always has at least one successor");
        state = chosen;
    }
    state
}

/// Searches one Unwrapped Line's tokens for the minimum-cost spacing.
///
/// `tokens` must be non-empty; an empty Unwrapped Line has nothing to
/// search and is the caller's responsibility to special-case.
pub fn search_line_wraps(tokens: &[FormatToken], indentation: usize, style: &Style) -> WrapSearchResult {
    assert!(!tokens.is_empty(), "search_line_wraps requires a non-empty token slice");

    if tokens.len() == 1 {
        let seed = seed_state(tokens, indentation, style);
        return WrapSearchResult { paths: vec![reconstruct(&seed)], incomplete: false };
    }

    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry(seed_state(tokens, indentation, style)));

    let mut pops: usize = 0;
    let last_index = tokens.len() - 1;
    let mut winners: Vec<Rc<StateNode>> = Vec::new();
    let mut best_cost: Option<u64> = None;

    while let Some(QueueEntry(state)) = heap.pop() {
        pops += 1;
        log::trace!(
            "wrap search pop #{pops}: token {} cost {} column {}",
            state.token_index,
            state.cumulative_cost,
            state.current_column
        );

        if let Some(best) = best_cost {
            if state.cumulative_cost > best {
                break;
            }
        }

        if state.token_index == last_index {
            match best_cost {
                None => {
                    best_cost = Some(state.cumulative_cost);
                    winners.push(state);
                }
                Some(best) if state.cumulative_cost == best => winners.push(state),
                _ => {}
            }
            continue;
        }

        if pops > style.max_search_states {
            log::warn!("wrap search aborted after {pops} states; finishing greedily");
            let finished = finish_greedily(state, tokens, style);
            return WrapSearchResult { paths: vec![reconstruct(&finished)], incomplete: true };
        }

        for next in successors(&state, tokens, style) {
            log::debug!(
                "wrap search expand: token {} -> {} cost {} column {}",
                state.token_index,
                next.token_index,
                next.cumulative_cost,
                next.current_column
            );
            heap.push(QueueEntry(next));
        }
    }

    if winners.is_empty() {
        // The queue drained without reaching the end: every remaining
        // candidate must have been worse than `best_cost`, or the line was
        // a single token handled above. Fall back to a greedy finish from
        // the seed so callers always get a result.
        log::warn!("wrap search queue drained with no winning path; finishing greedily");
        let finished = finish_greedily(seed_state(tokens, indentation, style), tokens, style);
        return WrapSearchResult { paths: vec![reconstruct(&finished)], incomplete: true };
    }

    WrapSearchResult { paths: winners.iter().map(reconstruct).collect(), incomplete: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::LeadingSpaceContract;

    fn tok(text: &str) -> FormatToken {
        FormatToken::new(text, 0)
    }

    fn tok_with(text: &str, spaces_required: usize, break_decision: BreakDecision) -> FormatToken {
        FormatToken::new(text, 0)
            .with_before(LeadingSpaceContract::new(spaces_required).with_decision(break_decision))
    }

    #[test]
    fn single_token_line_appends_at_indentation() {
        let style = Style::default_style();
        let tokens = vec![tok("hello")];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].final_column, style.indentation_spaces + 5);
        assert!(!result.incomplete);
    }

    #[test]
    fn short_line_fits_without_wrapping() {
        let style = Style::default_style();
        let tokens = vec![
            tok("let"),
            tok_with("x", 1, BreakDecision::Undecided),
            tok_with("=", 1, BreakDecision::Undecided),
            tok_with("1;", 1, BreakDecision::Undecided),
        ];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        assert_eq!(result.paths.len(), 1);
        for decision in &result.paths[0].decisions[1..] {
            assert_eq!(decision.action, SpacingDecision::Append);
        }
    }

    #[test]
    fn long_line_wraps_when_it_would_overflow() {
        let mut style = Style::default_style();
        style.column_limit = 10;
        let tokens = vec![
            tok_with("aaaaaaaa", 0, BreakDecision::Undecided),
            tok_with("bbbbbbbb", 1, BreakDecision::Undecided),
        ];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        assert_eq!(result.paths[0].decisions[1].action, SpacingDecision::Wrap);
    }

    #[test]
    fn must_wrap_is_honored_even_when_it_fits() {
        let style = Style::default_style();
        let tokens = vec![tok("a"), tok_with("b", 1, BreakDecision::MustWrap)];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        assert_eq!(result.paths[0].decisions[1].action, SpacingDecision::Wrap);
    }

    #[test]
    fn append_aligned_is_rendered_as_the_align_action() {
        let style = Style::default_style();
        let tokens = vec![tok("a"), tok_with("bb", 2, BreakDecision::AppendAligned)];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        assert_eq!(result.paths[0].decisions[1].action, SpacingDecision::Align);
        assert_eq!(result.paths[0].decisions[1].spaces, 2);
    }

    #[test]
    fn fits_on_line_reports_overflow() {
        let mut style = Style::default_style();
        style.column_limit = 5;
        let tokens = vec![tok_with("abcdefgh", 0, BreakDecision::Undecided)];
        let (fits, _) = fits_on_line(&tokens, style.indentation_spaces, &style);
        assert!(!fits);
    }

    #[test]
    fn fits_on_line_reports_success_for_short_line() {
        let style = Style::default_style();
        let tokens = vec![tok("ok")];
        let (fits, column) = fits_on_line(&tokens, style.indentation_spaces, &style);
        assert!(fits);
        assert_eq!(column, style.indentation_spaces + 2);
    }

    #[test]
    fn close_token_pops_before_computing_its_own_wrap_column() {
        let mut style = Style::default_style();
        style.column_limit = 1000;
        let tokens = vec![
            tok_with("(", 0, BreakDecision::Undecided).with_balancing(GroupBalancing::Open),
            tok_with("x", 0, BreakDecision::MustWrap),
            tok_with(")", 0, BreakDecision::MustWrap).with_balancing(GroupBalancing::Close),
        ];
        let result = search_line_wraps(&tokens, style.indentation_spaces, &style);
        // The close paren should wrap to the indentation baseline, not to
        // the column pushed by the open paren.
        let close_decision = &result.paths[0].decisions[2];
        assert_eq!(close_decision.action, SpacingDecision::Wrap);
        assert_eq!(close_decision.spaces, style.indentation_spaces + style.wrap_spaces);
    }
}
