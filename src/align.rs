//! The tabular alignment engine: computes column widths across a group
//! of sibling row partitions and rewrites their inter-token spacing so
//! repeated constructs line up into columns.
//!
//! Alignment never runs the wrap searcher itself, it only commits each
//! aligned token's leading-space contract (`spaces_required` plus a forced
//! `MustAppend`/`Preserve` decision). A later `search_line_wraps` pass over
//! an aligned row degenerates to the single forced path, so the searcher
//! and the aligner never need to duplicate each other's emission logic.

use std::ops::Range;

use crate::partition_tree::PartitionTree;
use crate::style::Style;
use crate::token::{BreakDecision, FormatToken};

/// Which side of a column a shorter cell is padded toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    Left,
    Right,
}

/// One row's contribution to one column: which column, which side it
/// flushes to, and the token range of the cell's content (at least one
/// token; the first token is the one whose spacing gets adjusted).
#[derive(Debug, Clone)]
pub struct ColumnCell {
    pub column: usize,
    pub flush: Flush,
    pub range: Range<usize>,
}

/// Visits a row's origin and reports the columns it contributes cells to.
/// Implemented by the caller's concrete syntax tree; the core never names
/// that type directly, `Origin` is the generic parameter threaded in from
/// [`crate::unwrapped_line::UnwrappedLine`].
pub trait ColumnSchemaSource<Origin> {
    fn cells(&self, origin: &Origin) -> Vec<ColumnCell>;
}

/// Per-row-group alignment behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentPolicy {
    Align,
    FlushLeft,
    Preserve,
    InferUserIntent,
}

fn cell_text_width(tokens: &[FormatToken], range: Range<usize>) -> usize {
    if range.is_empty() {
        return 0;
    }
    let mut width = tokens[range.start].length();
    for token in &tokens[range.start + 1..range.end] {
        width += token.before.spaces_required + token.length();
    }
    width
}

fn column_widths(rows_cells: &[Vec<ColumnCell>], tokens: &[FormatToken]) -> Vec<usize> {
    let num_columns = rows_cells.iter().flat_map(|row| row.iter().map(|c| c.column + 1)).max().unwrap_or(0);
    let mut widths = vec![0usize; num_columns];
    for row_cells in rows_cells {
        for cell in row_cells {
            let leading = tokens[cell.range.start].before.spaces_required;
            let width = leading + cell_text_width(tokens, cell.range.clone());
            widths[cell.column] = widths[cell.column].max(width);
        }
    }
    widths
}

/// Forces every token in `range` (after the first) to replay its original
/// whitespace verbatim.
fn force_preserve(tokens: &mut [FormatToken], range: Range<usize>) {
    for token in &mut tokens[range.start.max(1)..range.end] {
        token.before.break_decision = BreakDecision::Preserve;
    }
}

/// Forces every token in `range` (after the first) to append with its
/// current `spaces_required`, fixing the row's shape without changing its
/// spacing.
fn force_must_append(tokens: &mut [FormatToken], range: Range<usize>) {
    for token in &mut tokens[range.start.max(1)..range.end] {
        token.before.break_decision = BreakDecision::MustAppend;
    }
}

fn row_intersects_disabled<Origin>(
    row: &PartitionTree<Origin>,
    tokens: &[FormatToken],
    disabled: &[Range<usize>],
) -> bool {
    let range = row.value().range();
    tokens[range].iter().any(|token| {
        token.byte_range().map(|(start, end)| disabled.iter().any(|d| d.start < end && start < d.end)).unwrap_or(false)
    })
}

/// Absolute column of `token_index` under the *original* (preserved)
/// spacing, walking forward from the row's own indentation. Table rows
/// never wrap internally, so every non-leading token's preserved span
/// carries `newline_count == 0` and its `preserved_trailing_column` is
/// simply the original literal gap before it.
fn original_column(tokens: &[FormatToken], row_start: usize, row_indent: usize, token_index: usize) -> usize {
    let mut column = row_indent;
    for i in row_start..token_index {
        column += tokens[i].length();
        if i + 1 <= token_index {
            column += tokens[i + 1].before.preserved_trailing_column;
        }
    }
    column
}

fn apply_aligned<Origin>(rows: &[&PartitionTree<Origin>], cells: &[Vec<ColumnCell>], widths: &[usize], tokens: &mut [FormatToken]) {
    for (row, row_cells) in rows.iter().zip(cells) {
        let indentation = row.value().indentation_spaces;
        let mut current_column = indentation;
        for cell in row_cells {
            let col_start = indentation + widths[..cell.column].iter().sum::<usize>();
            let width = widths[cell.column];
            let text_width = cell_text_width(tokens, cell.range.clone());
            let gap = match cell.flush {
                Flush::Left => col_start.saturating_sub(current_column),
                Flush::Right => (col_start + width).saturating_sub(text_width).saturating_sub(current_column),
            };
            let leader = &mut tokens[cell.range.start];
            leader.before.spaces_required = gap;
            leader.before.break_decision = BreakDecision::AppendAligned;
            // Track the real end of the rendered cell, not the reserved
            // column boundary: a flush-left cell shorter than its column's
            // width must leave the shortfall to be absorbed by the *next*
            // cell's gap, or the padding never actually gets emitted.
            current_column = match cell.flush {
                Flush::Left => col_start + text_width,
                Flush::Right => col_start + width,
            };
        }
    }
}

fn deviation_against<Origin>(
    rows: &[&PartitionTree<Origin>],
    cells: &[Vec<ColumnCell>],
    widths: &[usize],
    tokens: &[FormatToken],
    flush_left: bool,
) -> usize {
    let mut max_dev = 0usize;
    for (row, row_cells) in rows.iter().zip(cells) {
        let indentation = row.value().indentation_spaces;
        let row_start = row.value().range().start;
        for cell in row_cells {
            let col_start = indentation + widths[..cell.column].iter().sum::<usize>();
            let candidate = if flush_left {
                col_start
            } else {
                match cell.flush {
                    Flush::Left => col_start,
                    Flush::Right => {
                        let text_width = cell_text_width(tokens, cell.range.clone());
                        col_start + widths[cell.column] - text_width
                    }
                }
            };
            let original = original_column(tokens, row_start, indentation, cell.range.start);
            let dev = original.abs_diff(candidate);
            max_dev = max_dev.max(dev);
        }
    }
    max_dev
}

fn infer_policy<Origin>(
    rows: &[&PartitionTree<Origin>],
    cells: &[Vec<ColumnCell>],
    widths_aligned: &[usize],
    widths_flush: &[usize],
    tokens: &[FormatToken],
    style: &Style,
) -> AlignmentPolicy {
    let dev_left = deviation_against(rows, cells, widths_flush, tokens, true);
    let dev_aligned = deviation_against(rows, cells, widths_aligned, tokens, false);
    let margin = style.alignment.infer_margin;
    let dominance = style.alignment.dominance_margin;
    if dev_aligned <= margin && dev_aligned <= dev_left {
        AlignmentPolicy::Align
    } else if dev_left <= margin {
        AlignmentPolicy::FlushLeft
    } else if dev_left.abs_diff(dev_aligned) >= dominance {
        if dev_aligned < dev_left {
            AlignmentPolicy::Align
        } else {
            AlignmentPolicy::FlushLeft
        }
    } else {
        AlignmentPolicy::Preserve
    }
}

/// Splits a contiguous run of sibling rows into alignment subgroups: first
/// by blank-line separation (a leading preserved newline count of 2 or
/// more on a row's first token signals a blank line before it), then by
/// the caller-supplied subtype tag. The caller should skip subgroups with
/// fewer than two rows (`align_group` is a no-op on those anyway).
pub fn split_into_alignment_groups<'a, Origin, Tag: PartialEq>(
    rows: &[&'a PartitionTree<Origin>],
    tokens: &[FormatToken],
    subtype: &impl Fn(&PartitionTree<Origin>) -> Tag,
) -> Vec<Vec<&'a PartitionTree<Origin>>> {
    let mut groups: Vec<Vec<&PartitionTree<Origin>>> = Vec::new();
    for &row in rows {
        let start = row.value().range().start;
        let blank_before = tokens.get(start).map(|t| t.before.preserved_newline_count >= 2).unwrap_or(false);
        let continues = !blank_before
            && groups.last().and_then(|g| g.last()).map(|&last| subtype(last) == subtype(row)).unwrap_or(false);
        if continues {
            groups.last_mut().expect("continues implies a prior group").push(row);
        } else {
            groups.push(vec![row]);
        }
    }
    groups
}

/// Computes and applies tabular alignment for one alignment subgroup
/// (typically produced by [`split_into_alignment_groups`]). A no-op if
/// fewer than two rows remain eligible after `ignore`/disabled-range
/// filtering.
///
/// `ignore` marks rows to leave untouched structurally but reset to
/// `Preserve` (for example, comment-only rows). Rows whose cells
/// intersect a byte range in `disabled` are excluded from the width
/// computation and forced to `Preserve` instead.
pub fn align_group<Origin>(
    rows: &[&PartitionTree<Origin>],
    source: &dyn ColumnSchemaSource<Origin>,
    tokens: &mut [FormatToken],
    style: &Style,
    policy: AlignmentPolicy,
    disabled: &[Range<usize>],
    ignore: &dyn Fn(&PartitionTree<Origin>) -> bool,
) {
    if rows.len() < 2 {
        return;
    }

    let mut eligible_rows: Vec<&PartitionTree<Origin>> = Vec::new();
    let mut eligible_cells: Vec<Vec<ColumnCell>> = Vec::new();
    for &row in rows {
        if ignore(row) || row_intersects_disabled(row, tokens, disabled) {
            force_preserve(tokens, row.value().range());
            continue;
        }
        let cells = row.value().origin.as_ref().map(|origin| source.cells(origin)).unwrap_or_default();
        eligible_rows.push(row);
        eligible_cells.push(cells);
    }
    if eligible_rows.len() < 2 {
        return;
    }

    let widths_aligned = column_widths(&eligible_cells, tokens);
    let flush_widths: Vec<usize> = eligible_cells
        .iter()
        .flat_map(|row| row.iter().map(|c| c.column + 1))
        .max()
        .map(|n| vec![0usize; n])
        .unwrap_or_default();

    let resolved = match policy {
        AlignmentPolicy::InferUserIntent => {
            infer_policy(&eligible_rows, &eligible_cells, &widths_aligned, &flush_widths, tokens, style)
        }
        other => other,
    };

    match resolved {
        AlignmentPolicy::Preserve => {
            for row in &eligible_rows {
                force_preserve(tokens, row.value().range());
            }
        }
        AlignmentPolicy::FlushLeft => {
            for row in &eligible_rows {
                force_must_append(tokens, row.value().range());
            }
        }
        AlignmentPolicy::Align => {
            let total = eligible_rows
                .iter()
                .map(|r| r.value().indentation_spaces + widths_aligned.iter().sum::<usize>())
                .max()
                .unwrap_or(0);
            if total > style.column_limit {
                for row in &eligible_rows {
                    force_must_append(tokens, row.value().range());
                }
            } else {
                apply_aligned(&eligible_rows, &eligible_cells, &widths_aligned, tokens);
            }
        }
        AlignmentPolicy::InferUserIntent => unreachable!("resolved above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::LeadingSpaceContract;
    use crate::unwrapped_line::{PartitionPolicy, UnwrappedLine};

    /// A trivial origin: pre-baked column cells, so tests don't need a
    /// real syntax tree to visit.
    #[derive(Debug, Clone)]
    struct Row(Vec<ColumnCell>);

    struct Trivial;
    impl ColumnSchemaSource<Row> for Trivial {
        fn cells(&self, origin: &Row) -> Vec<ColumnCell> {
            origin.0.clone()
        }
    }

    fn tok(text: &str, spaces: usize) -> FormatToken {
        FormatToken::new(text, 0).with_before(LeadingSpaceContract::new(spaces))
    }

    fn row(range: Range<usize>, cells: Vec<ColumnCell>) -> PartitionTree<Row> {
        PartitionTree::leaf(UnwrappedLine::new(range, 0, PartitionPolicy::TabularAlignment).with_origin(Row(cells)))
    }

    #[test]
    fn aligned_rows_start_each_column_at_the_same_offset() {
        let style = Style::default_style();
        // row 0: "a"   "bb"   (2 cells, columns 0 and 1)
        // row 1: "ccc" "d"
        let mut tokens = vec![
            tok("a", 0),
            tok("bb", 1),
            tok("ccc", 0),
            tok("d", 1),
        ];
        let r0 = row(0..2, vec![ColumnCell { column: 0, flush: Flush::Left, range: 0..1 }, ColumnCell { column: 1, flush: Flush::Left, range: 1..2 }]);
        let r1 = row(2..4, vec![ColumnCell { column: 0, flush: Flush::Left, range: 2..3 }, ColumnCell { column: 1, flush: Flush::Left, range: 3..4 }]);
        let rows = vec![&r0, &r1];
        let source = Trivial;
        align_group(&rows, &source, &mut tokens, &style, AlignmentPolicy::Align, &[], &|_| false);

        // Column 0 width = max(1, 3) = 3; column 1 (bb/d) should start at
        // absolute column 3 in both rows.
        assert_eq!(tokens[2].before.spaces_required, 0); // "ccc" is the widest in col 0, no left pad needed
        assert_eq!(tokens[1].before.spaces_required, 2); // "a" (len1) + 2 = col 3
        assert_eq!(tokens[3].before.spaces_required, 0); // "ccc" (len3) + 0 = col 3
        assert_eq!(tokens[1].before.break_decision, BreakDecision::AppendAligned);
    }

    #[test]
    fn flush_left_policy_leaves_natural_spacing() {
        let style = Style::default_style();
        let mut tokens = vec![tok("a", 0), tok("bb", 1), tok("ccc", 0), tok("d", 1)];
        let before: Vec<usize> = tokens.iter().map(|t| t.before.spaces_required).collect();
        let r0 = row(0..2, vec![ColumnCell { column: 0, flush: Flush::Left, range: 0..1 }, ColumnCell { column: 1, flush: Flush::Left, range: 1..2 }]);
        let r1 = row(2..4, vec![ColumnCell { column: 0, flush: Flush::Left, range: 2..3 }, ColumnCell { column: 1, flush: Flush::Left, range: 3..4 }]);
        let rows = vec![&r0, &r1];
        let source = Trivial;
        align_group(&rows, &source, &mut tokens, &style, AlignmentPolicy::FlushLeft, &[], &|_| false);
        let after: Vec<usize> = tokens.iter().map(|t| t.before.spaces_required).collect();
        assert_eq!(before, after);
        assert_eq!(tokens[1].before.break_decision, BreakDecision::MustAppend);
    }

    #[test]
    fn single_row_group_is_a_no_op() {
        let style = Style::default_style();
        let mut tokens = vec![tok("a", 0), tok("bb", 1)];
        let r0 = row(0..2, vec![ColumnCell { column: 0, flush: Flush::Left, range: 0..1 }]);
        let rows = vec![&r0];
        let source = Trivial;
        align_group(&rows, &source, &mut tokens, &style, AlignmentPolicy::Align, &[], &|_| false);
        assert_eq!(tokens[1].before.spaces_required, 1);
    }

    #[test]
    fn over_limit_alignment_falls_back_to_flush_left() {
        let mut style = Style::default_style();
        style.column_limit = 2;
        let mut tokens = vec![tok("aaaaa", 0), tok("bb", 1), tok("ccc", 0), tok("d", 1)];
        let r0 = row(0..2, vec![ColumnCell { column: 0, flush: Flush::Left, range: 0..1 }, ColumnCell { column: 1, flush: Flush::Left, range: 1..2 }]);
        let r1 = row(2..4, vec![ColumnCell { column: 0, flush: Flush::Left, range: 2..3 }, ColumnCell { column: 1, flush: Flush::Left, range: 3..4 }]);
        let rows = vec![&r0, &r1];
        let source = Trivial;
        let before_gap = tokens[1].before.spaces_required;
        align_group(&rows, &source, &mut tokens, &style, AlignmentPolicy::Align, &[], &|_| false);
        assert_eq!(tokens[1].before.spaces_required, before_gap, "falls back to flush-left, spacing untouched");
        assert_eq!(tokens[1].before.break_decision, BreakDecision::MustAppend);
    }
}
