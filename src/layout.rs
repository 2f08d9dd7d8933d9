//! Layout-Function algebra: piecewise-linear cost functions over candidate
//! layouts, combined with [`Stack`](LayoutFunctionFactory::stack),
//! [`Juxtaposition`](LayoutFunctionFactory::juxtaposition),
//! [`Choice`](LayoutFunctionFactory::choice), and
//! [`Wrap`](LayoutFunctionFactory::wrap).

use crate::style::Style;
use crate::token::FormatToken;
use crate::tree::Tree;

/// A penalty added by [`LayoutFunctionFactory::wrap`] to favor packing
/// elements onto earlier lines when costs would otherwise tie.
const EARLIER_LINES_FAVORING_PENALTY: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// A single line of tokens; always a leaf of the layout tree.
    Line,
    /// Children are joined horizontally, end to end.
    Juxtaposition,
    /// Children are stacked vertically, each starting a new line.
    Stack,
}

/// One node of a layout tree: a candidate rendering of some token range.
#[derive(Debug, Clone)]
pub struct LayoutItem {
    pub kind: LayoutKind,
    pub indentation_spaces: usize,
    pub spaces_before: usize,
    pub must_wrap: bool,
}

pub type LayoutTree = Tree<LayoutItem>;

/// Whether every physical line this tree renders to is the same line (no
/// node in it forces a vertical stack). Used to decide whether a
/// [`Juxtaposition`](LayoutFunctionFactory::juxtaposition)'s right operand
/// extends the left operand's final line, or starts fresh below it.
fn is_single_line(tree: &LayoutTree) -> bool {
    match tree.value().kind {
        LayoutKind::Line => true,
        LayoutKind::Stack => false,
        LayoutKind::Juxtaposition => tree.children().iter().all(is_single_line),
    }
}

/// One piece of a [`LayoutFunction`]: a linear cost function
/// `intercept + gradient * (margin - column)`, valid for
/// `margin >= column` up to (exclusive) the next segment's column.
#[derive(Debug, Clone)]
pub struct LayoutFunctionSegment {
    pub column: usize,
    pub layout: LayoutTree,
    /// Width, in columns, of this layout's own final physical line.
    pub span: usize,
    pub intercept: f64,
    pub gradient: f64,
    pub must_wrap: bool,
}

impl LayoutFunctionSegment {
    pub fn cost_at(&self, margin: usize) -> f64 {
        debug_assert!(margin >= self.column, "cost_at called left of this segment's domain");
        self.intercept + self.gradient * (margin - self.column) as f64
    }
}

/// A piecewise-linear function from starting column to (cost, optimal
/// layout), represented as segments sorted by ascending, unique `column`,
/// the first always starting at 0.
#[derive(Debug, Clone, Default)]
pub struct LayoutFunction {
    segments: Vec<LayoutFunctionSegment>,
}

impl LayoutFunction {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[LayoutFunctionSegment] {
        &self.segments
    }

    pub fn must_wrap(&self) -> bool {
        self.segments.first().map(|s| s.must_wrap).unwrap_or(false)
    }

    /// Index of the segment whose domain contains `column` (the rightmost
    /// segment with `segment.column <= column`).
    fn index_at_or_to_the_left_of(&self, column: usize) -> usize {
        self.segments
            .iter()
            .rposition(|s| s.column <= column)
            .expect("LayoutFunction must have a segment starting at column 0")
    }

    pub fn segment_at(&self, column: usize) -> &LayoutFunctionSegment {
        &self.segments[self.index_at_or_to_the_left_of(column)]
    }

    pub fn cost_at(&self, column: usize) -> f64 {
        self.segment_at(column).cost_at(column)
    }

    fn push(&mut self, segment: LayoutFunctionSegment) {
        debug_assert!(
            self.segments.last().map(|s| s.column < segment.column).unwrap_or(segment.column == 0),
            "segments must be pushed in strictly increasing column order, starting at 0"
        );
        self.segments.push(segment);
    }
}

pub struct LayoutFunctionFactory<'a> {
    style: &'a Style,
}

impl<'a> LayoutFunctionFactory<'a> {
    pub fn new(style: &'a Style) -> Self {
        Self { style }
    }

    /// A single-line layout of `tokens`. `indentation` is the indentation
    /// this layout would use if placed at the start of a line.
    pub fn line(&self, tokens: &[FormatToken], indentation: usize) -> LayoutFunction {
        let span = line_span(tokens);
        let must_wrap = tokens.first().map(line_must_wrap).unwrap_or(false);
        let spaces_before = tokens.first().map(|t| t.before.spaces_required).unwrap_or(0);
        let layout = Tree::leaf(LayoutItem {
            kind: LayoutKind::Line,
            indentation_spaces: indentation,
            spaces_before,
            must_wrap,
        });

        let limit = self.style.column_limit;
        let penalty = self.style.over_column_limit_penalty as f64;
        let mut lf = LayoutFunction::default();
        if span <= limit {
            // Fits as long as the margin it starts at leaves room; past
            // the breakpoint, cost grows by `over_column_limit_penalty`
            // per column of overflow.
            lf.push(LayoutFunctionSegment { column: 0, layout: layout.clone(), span, intercept: 0.0, gradient: 0.0, must_wrap });
            let breakpoint = limit - span + 1;
            lf.push(LayoutFunctionSegment { column: breakpoint, layout, span, intercept: penalty, gradient: penalty, must_wrap });
        } else {
            // Already overflows at margin 0; cost grows from there.
            lf.push(LayoutFunctionSegment {
                column: 0,
                layout,
                span,
                intercept: (span - limit) as f64 * penalty,
                gradient: penalty,
                must_wrap,
            });
        }
        lf
    }

    /// Combines layouts vertically: layout `i+1` starts at the same column
    /// as layout `i`.
    pub fn stack(&self, lfs: &[LayoutFunction]) -> LayoutFunction {
        assert!(!lfs.is_empty(), "stack requires at least one operand");
        let mut acc = lfs[0].clone();
        for (i, next) in lfs[1..].iter().enumerate() {
            acc = self.stack_pair(&acc, next, lfs.len() - 1 - i);
        }
        acc
    }

    fn stack_pair(&self, a: &LayoutFunction, b: &LayoutFunction, remaining: usize) -> LayoutFunction {
        let knots = merge_knots(a, b);
        let mut out = LayoutFunction::default();
        for column in knots {
            let seg_a = a.segment_at(column);
            let seg_b = b.segment_at(column);
            let layout = Tree::with_children(
                LayoutItem {
                    kind: LayoutKind::Stack,
                    indentation_spaces: seg_a.layout.value().indentation_spaces,
                    spaces_before: seg_a.layout.value().spaces_before,
                    must_wrap: seg_a.must_wrap,
                },
                vec![seg_a.layout.clone(), seg_b.layout.clone()],
            );
            let cost = seg_a.cost_at(column) + seg_b.cost_at(column)
                + self.style.line_break_penalty as f64
                + EARLIER_LINES_FAVORING_PENALTY * remaining as f64;
            out.push(LayoutFunctionSegment {
                column,
                layout,
                span: seg_b.span,
                intercept: cost,
                gradient: seg_a.gradient + seg_b.gradient,
                must_wrap: seg_a.must_wrap,
            });
        }
        out
    }

    /// Combines layouts horizontally: layout `i+1` starts where layout
    /// `i`'s last line ends.
    pub fn juxtaposition(&self, lfs: &[LayoutFunction]) -> LayoutFunction {
        assert!(!lfs.is_empty(), "juxtaposition requires at least one operand");
        let mut acc = lfs[0].clone();
        for next in &lfs[1..] {
            acc = self.juxtapose_pair(&acc, next);
        }
        acc
    }

    fn juxtapose_pair(&self, a: &LayoutFunction, b: &LayoutFunction) -> LayoutFunction {
        let mut breakpoints: Vec<usize> = Vec::new();
        for (i, seg_a) in a.segments().iter().enumerate() {
            let lo = seg_a.column;
            let hi = a.segments().get(i + 1).map(|s| s.column);
            breakpoints.push(lo);
            for seg_b in b.segments() {
                if seg_b.column > seg_a.span {
                    let candidate = seg_b.column - seg_a.span;
                    if candidate > lo && hi.map(|hi| candidate < hi).unwrap_or(true) {
                        breakpoints.push(candidate);
                    }
                }
            }
        }
        breakpoints.sort_unstable();
        breakpoints.dedup();

        let mut out = LayoutFunction::default();
        for margin in breakpoints {
            let seg_a = a.segment_at(margin);
            let offset = margin + seg_a.span;
            let seg_b = b.segment_at(offset);
            let layout = Tree::with_children(
                LayoutItem {
                    kind: LayoutKind::Juxtaposition,
                    indentation_spaces: seg_a.layout.value().indentation_spaces,
                    spaces_before: seg_a.layout.value().spaces_before,
                    must_wrap: seg_a.must_wrap,
                },
                vec![seg_a.layout.clone(), seg_b.layout.clone()],
            );
            let span = if is_single_line(&seg_b.layout) { seg_a.span + seg_b.span } else { seg_b.span };
            out.push(LayoutFunctionSegment {
                column: margin,
                layout,
                span,
                intercept: seg_a.cost_at(margin) + seg_b.cost_at(offset),
                gradient: seg_a.gradient + seg_b.gradient,
                must_wrap: seg_a.must_wrap,
            });
        }
        out
    }

    /// Piecewise minimum of `lfs`. Ties favor the lower gradient, then the
    /// earlier operand.
    pub fn choice(&self, lfs: &[LayoutFunction]) -> LayoutFunction {
        assert!(!lfs.is_empty(), "choice requires at least one operand");
        let mut acc = lfs[0].clone();
        for next in &lfs[1..] {
            acc = choice_pair(&acc, next);
        }
        acc
    }

    /// Shifts every segment's layout by `indent` columns of indentation.
    pub fn indent(&self, lf: &LayoutFunction, indent: usize) -> LayoutFunction {
        let mut out = LayoutFunction::default();
        for seg in lf.segments() {
            let mut layout = seg.layout.clone();
            apply_indent(&mut layout, indent);
            out.push(LayoutFunctionSegment {
                column: seg.column,
                layout,
                span: seg.span,
                intercept: seg.intercept,
                gradient: seg.gradient,
                must_wrap: seg.must_wrap,
            });
        }
        out
    }

    /// Paragraph-style packing: joins `lfs` horizontally, trying every
    /// split point and taking the best combination of stacking and
    /// juxtaposing, favoring earlier breaks when costs tie.
    pub fn wrap(&self, lfs: &[LayoutFunction]) -> LayoutFunction {
        assert!(!lfs.is_empty(), "wrap requires at least one operand");
        if lfs.len() == 1 {
            return lfs[0].clone();
        }

        let size = lfs.len();
        let mut results: Vec<LayoutFunction> = vec![LayoutFunction::default(); size];

        for i in (0..size).rev() {
            let mut results_i: Vec<LayoutFunction> = Vec::with_capacity(size - i);
            let mut incremental = lfs[i].clone();
            for j in i..size - 1 {
                let mut stacked = self.stack(&[incremental.clone(), results[j + 1].clone()]);
                let penalty = self.style.line_break_penalty as f64
                    + EARLIER_LINES_FAVORING_PENALTY * (size - j) as f64;
                for seg in stacked.segments.iter_mut() {
                    seg.intercept += penalty;
                }
                results_i.push(stacked);

                let next = &lfs[j + 1];
                incremental = if next.must_wrap() {
                    self.stack(&[incremental, next.clone()])
                } else {
                    let jx = self.juxtaposition(&[incremental.clone(), next.clone()]);
                    let st = self.stack(&[incremental, next.clone()]);
                    self.choice(&[jx, st])
                };
            }
            results_i.push(incremental);
            results[i] = self.choice(&results_i);
        }
        results.into_iter().next().expect("size > 0")
    }
}

fn apply_indent(tree: &mut LayoutTree, indent: usize) {
    tree.value_mut().indentation_spaces += indent;
}

fn choice_pair(a: &LayoutFunction, b: &LayoutFunction) -> LayoutFunction {
    let knots = merge_knots(a, b);
    let mut out = LayoutFunction::default();
    for column in knots {
        let seg_a = a.segment_at(column);
        let seg_b = b.segment_at(column);
        let cost_a = seg_a.cost_at(column);
        let cost_b = seg_b.cost_at(column);
        let pick_a = match cost_a.partial_cmp(&cost_b).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => seg_a.gradient <= seg_b.gradient,
        };
        let chosen = if pick_a { seg_a } else { seg_b };
        out.push(LayoutFunctionSegment {
            column,
            layout: chosen.layout.clone(),
            span: chosen.span,
            intercept: chosen.cost_at(column),
            gradient: chosen.gradient,
            must_wrap: chosen.must_wrap,
        });
    }
    merge_redundant_segments(out)
}

/// Drops a segment that reuses the same layout tree as its predecessor and
/// whose cost is exactly continuous with it, an artifact of a knot that
/// both operands happened to share without the winner actually changing.
fn merge_redundant_segments(lf: LayoutFunction) -> LayoutFunction {
    let mut out = LayoutFunction::default();
    for seg in lf.segments {
        if let Some(prev) = out.segments.last() {
            if prev.gradient == seg.gradient && (prev.cost_at(seg.column) - seg.intercept).abs() < 1e-9 {
                continue;
            }
        }
        out.segments.push(seg);
    }
    out
}

fn merge_knots(a: &LayoutFunction, b: &LayoutFunction) -> Vec<usize> {
    let mut knots: Vec<usize> = a.segments().iter().map(|s| s.column).collect();
    knots.extend(b.segments().iter().map(|s| s.column));
    knots.sort_unstable();
    knots.dedup();
    knots
}

fn line_span(tokens: &[FormatToken]) -> usize {
    if tokens.is_empty() {
        return 0;
    }
    let mut len = 0usize;
    for token in tokens {
        len += token.before.spaces_required + token.length();
    }
    len -= tokens[0].before.spaces_required;
    len
}

fn line_must_wrap(first: &FormatToken) -> bool {
    matches!(first.before.break_decision, crate::token::BreakDecision::MustWrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{BreakDecision, LeadingSpaceContract};

    fn tok(text: &str, spaces: usize) -> FormatToken {
        FormatToken::new(text, 0).with_before(LeadingSpaceContract::new(spaces))
    }

    #[test]
    fn line_under_limit_has_zero_gradient() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let tokens = vec![tok("abc", 0)];
        let lf = factory.line(&tokens, 0);
        assert_eq!(lf.segments().len(), 2);
        assert_eq!(lf.cost_at(0), 0.0);
    }

    #[test]
    fn line_cost_grows_past_the_breakpoint() {
        let mut style = Style::default_style();
        style.column_limit = 10;
        style.over_column_limit_penalty = 5;
        let factory = LayoutFunctionFactory::new(&style);
        let tokens = vec![tok("abcdefgh", 0)];
        let lf = factory.line(&tokens, 0);
        assert_eq!(lf.cost_at(0), 0.0);
        // span=8, limit=10: fits until margin 2, overflows by 1 at margin 3.
        assert_eq!(lf.cost_at(2), 0.0);
        assert_eq!(lf.cost_at(3), 5.0);
    }

    #[test]
    fn line_over_limit_has_fixed_overflow_cost() {
        let mut style = Style::default_style();
        style.column_limit = 3;
        style.over_column_limit_penalty = 10;
        let factory = LayoutFunctionFactory::new(&style);
        let tokens = vec![tok("abcdefgh", 0)];
        let lf = factory.line(&tokens, 0);
        assert_eq!(lf.cost_at(0), 50.0);
    }

    #[test]
    fn stack_adds_break_penalty() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let a = factory.line(&[tok("aaa", 0)], 0);
        let b = factory.line(&[tok("bbb", 0)], 0);
        let stacked = factory.stack(&[a, b]);
        assert!(stacked.cost_at(0) >= style.line_break_penalty as f64);
    }

    #[test]
    fn juxtaposition_of_two_flat_lines_sums_span() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let a = factory.line(&[tok("aaa", 0)], 0);
        let b = factory.line(&[tok("bb", 0)], 0);
        let jx = factory.juxtaposition(&[a, b]);
        assert_eq!(jx.segments()[0].span, 5);
    }

    #[test]
    fn choice_picks_the_cheaper_operand() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let cheap = factory.line(&[tok("a", 0)], 0);
        let mut expensive = factory.line(&[tok("b", 0)], 0);
        expensive.segments[0].intercept = 1000.0;
        let choice = factory.choice(&[cheap, expensive]);
        assert_eq!(choice.cost_at(0), 0.0);
    }

    #[test]
    fn indent_shifts_indentation_without_changing_cost() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let a = factory.line(&[tok("aaa", 0)], 0);
        let cost_before = a.cost_at(0);
        let indented = factory.indent(&a, 4);
        assert_eq!(indented.cost_at(0), cost_before);
        assert_eq!(indented.segments()[0].layout.value().indentation_spaces, 4);
    }

    #[test]
    fn wrap_of_single_layout_is_identity() {
        let style = Style::default_style();
        let factory = LayoutFunctionFactory::new(&style);
        let a = factory.line(&[tok("aaa", 0)], 0);
        let wrapped = factory.wrap(&[a.clone()]);
        assert_eq!(wrapped.cost_at(0), a.cost_at(0));
    }
}
