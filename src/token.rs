//! Format tokens: the atoms the rest of the crate operates on.

use ecow::EcoString;

/// How the spacing before a token may be explored by the wrap searcher.
///
/// Mirrors the tri-state-plus-overrides encoding used by the search: most
/// tokens are `Undecided` and both `Append`/`Wrap` are tried; the other
/// variants pin the decision ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakDecision {
    /// Unconstrained; both Append and Wrap are explored.
    #[default]
    Undecided,
    /// Cannot break here; only Append is explored.
    MustAppend,
    /// Must break here; only Wrap is explored.
    MustWrap,
    /// Like Append, but the alignment engine may left-pad this token.
    AppendAligned,
    /// Do not optimize; replay the original spacing verbatim.
    Preserve,
}

/// Whether a token opens, closes, or is unrelated to a balanced group
/// (parentheses, brackets, braces) for the purposes of wrap-column tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBalancing {
    #[default]
    None,
    Open,
    Close,
}

/// The final, bound decision about spacing before a token, produced by the
/// wrap searcher (or forced by a disabled range / the alignment engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingDecision {
    /// Keep the original inter-token spacing verbatim.
    Preserve,
    /// Append to the current line with the given number of spaces.
    Append,
    /// Wrap onto a new line with the given indentation.
    Wrap,
    /// Like Append, but force left-padding spaces even at the front of a
    /// line (used to realize alignment-engine column offsets).
    Align,
}

/// Parameters that govern the formatting decision for the whitespace
/// immediately preceding one token. Filled in by the (external) spacing
/// annotator before the core runs; mutated in place by the search/alignment
/// phases as they commit decisions.
#[derive(Debug, Clone, Copy)]
pub struct LeadingSpaceContract {
    /// Minimum number of spaces required before this token. Nonzero here
    /// means removing the space would change the lexical meaning of the
    /// token stream.
    pub spaces_required: usize,
    /// Penalty charged for introducing a line break before this token.
    pub break_penalty: usize,
    /// Constrains which spacing decisions the wrap search may explore.
    pub break_decision: BreakDecision,
    /// Byte offset into the original buffer marking the start of this
    /// token's original leading whitespace run, if the buffer is available.
    /// Paired with the token's own byte range, this lets the original
    /// whitespace be reconstructed verbatim (`Preserve`).
    pub preserved_space_start: Option<usize>,
    /// Number of newlines in the preserved leading whitespace run. Zero
    /// when `preserved_space_start` is `None`.
    pub preserved_newline_count: usize,
    /// Column the token would start at given the preserved whitespace: the
    /// number of spaces between the last preserved newline (or the run's
    /// start, if there is none) and the token itself.
    pub preserved_trailing_column: usize,
}

impl Default for LeadingSpaceContract {
    fn default() -> Self {
        Self {
            spaces_required: 0,
            break_penalty: 0,
            break_decision: BreakDecision::Undecided,
            preserved_space_start: None,
            preserved_newline_count: 0,
            preserved_trailing_column: 0,
        }
    }
}

impl LeadingSpaceContract {
    pub fn new(spaces_required: usize) -> Self {
        Self { spaces_required, ..Self::default() }
    }

    pub fn with_break_penalty(mut self, penalty: usize) -> Self {
        self.break_penalty = penalty;
        self
    }

    pub fn with_decision(mut self, decision: BreakDecision) -> Self {
        self.break_decision = decision;
        self
    }

    /// Records the preserved leading-whitespace run: where it starts, how
    /// many newlines it contains, and the column the token begins at as a
    /// result (used by the wrap searcher's `Preserve` successor).
    pub fn with_preserved_span(mut self, start: usize, newline_count: usize, trailing_column: usize) -> Self {
        self.preserved_space_start = Some(start);
        self.preserved_newline_count = newline_count;
        self.preserved_trailing_column = trailing_column;
        self
    }
}

/// One emitted lexeme plus its leading-space contract.
///
/// `FormatToken` owns its text as an `EcoString` so short tokens (the common
/// case: punctuation, short identifiers) are stored inline without a heap
/// allocation.
#[derive(Debug, Clone)]
pub struct FormatToken {
    text: EcoString,
    /// Original byte range of this token in the source buffer, if known.
    byte_range: Option<(usize, usize)>,
    /// Language-specific tag, opaque to this crate.
    tag: i32,
    pub before: LeadingSpaceContract,
    pub balancing: GroupBalancing,
}

impl FormatToken {
    pub fn new(text: impl Into<EcoString>, tag: i32) -> Self {
        Self { text: text.into(), byte_range: None, tag, before: LeadingSpaceContract::default(), balancing: GroupBalancing::None }
    }

    pub fn with_byte_range(mut self, start: usize, end: usize) -> Self {
        self.byte_range = Some((start, end));
        self
    }

    pub fn with_before(mut self, before: LeadingSpaceContract) -> Self {
        self.before = before;
        self
    }

    pub fn with_balancing(mut self, balancing: GroupBalancing) -> Self {
        self.balancing = balancing;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn byte_range(&self) -> Option<(usize, usize)> {
        self.byte_range
    }

    /// Byte length of this token's own text (not including leading space).
    pub fn length(&self) -> usize {
        self.text.len()
    }

    /// True if this token's text spans one or more newlines (e.g. a
    /// multiline raw string or block comment kept verbatim).
    pub fn is_multiline(&self) -> bool {
        self.text.contains('\n')
    }

    /// Column width of the text after its last newline, or the full length
    /// if there is no newline. Used when computing `current_column` after
    /// appending a multiline token.
    pub fn trailing_column_width(&self) -> usize {
        match self.text.rfind('\n') {
            Some(pos) => self.text.len() - pos - 1,
            None => self.text.len(),
        }
    }

    /// Column width of the text up to (not including) its first newline.
    /// Used to assess overflow penalty against the *beginning* of a
    /// multiline token rather than its end.
    pub fn leading_column_width(&self) -> usize {
        match self.text.find('\n') {
            Some(pos) => pos,
            None => self.text.len(),
        }
    }
}

/// The bound spacing decision for one token, after the wrap search (or the
/// alignment engine, or a disabled range) has committed it.
#[derive(Debug, Clone, Copy)]
pub struct InterTokenDecision {
    /// Number of literal spaces to insert, meaningful for `Append`/`Align`.
    pub spaces: usize,
    pub action: SpacingDecision,
    /// When `action == Preserve`, the byte offset to replay whitespace from.
    pub preserved_space_start: Option<usize>,
}

impl InterTokenDecision {
    pub fn preserve(preserved_space_start: Option<usize>) -> Self {
        Self { spaces: 0, action: SpacingDecision::Preserve, preserved_space_start }
    }

    pub fn append(spaces: usize) -> Self {
        Self { spaces, action: SpacingDecision::Append, preserved_space_start: None }
    }

    pub fn wrap(spaces: usize) -> Self {
        Self { spaces, action: SpacingDecision::Wrap, preserved_space_start: None }
    }

    pub fn align(spaces: usize) -> Self {
        Self { spaces, action: SpacingDecision::Align, preserved_space_start: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_column_width_handles_multiline_text() {
        let token = FormatToken::new("a\nbcd", 0);
        assert!(token.is_multiline());
        assert_eq!(token.trailing_column_width(), 3);
        assert_eq!(token.leading_column_width(), 1);
    }

    #[test]
    fn trailing_column_width_single_line() {
        let token = FormatToken::new("abcd", 0);
        assert!(!token.is_multiline());
        assert_eq!(token.trailing_column_width(), 4);
        assert_eq!(token.leading_column_width(), 4);
    }
}
