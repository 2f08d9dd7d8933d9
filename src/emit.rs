//! Final text emission: walks the driver's formatted excerpts in order
//! and writes out each token's spacing plus its text, replaying disabled
//! ranges and trailing whitespace verbatim from the original source
//! buffer.

use std::ops::Range;

use crate::token::{FormatToken, SpacingDecision};
use crate::wrap::FormattedExcerpt;

/// Renders `(token_range, excerpt)` pairs, the shape
/// [`crate::driver::format_partition_tree`] produces once paired with its
/// leaf ranges, back into text.
///
/// `source` is the original buffer the tokens' byte ranges and any
/// preserved-whitespace spans point into. Parsing that buffer is out of
/// scope for this crate, but replaying disabled ranges and the file's
/// trailing whitespace verbatim is still this function's job, so it
/// takes the buffer as a plain argument.
pub fn emit(tokens: &[FormatToken], excerpts: &[(Range<usize>, FormattedExcerpt)], source: &str) -> String {
    let mut out = String::new();
    let mut first_ever = true;

    for (range, excerpt) in excerpts {
        for (offset, decision) in excerpt.decisions.iter().enumerate() {
            let token = &tokens[range.start + offset];
            let is_first_of_excerpt = offset == 0;

            match decision.action {
                SpacingDecision::Preserve => {
                    if let (Some(start), Some((token_start, _))) = (decision.preserved_space_start, token.byte_range()) {
                        out.push_str(&source[start..token_start]);
                    }
                }
                // A new excerpt always starts a fresh physical line: the
                // first token's own `Append` decision is the start-of-line
                // case (newline + indentation), everywhere else `Append`
                // means same-line spacing. `Align` never triggers a
                // newline of its own; it only changes how many spaces are
                // emitted.
                SpacingDecision::Append | SpacingDecision::Align => {
                    if is_first_of_excerpt && !first_ever {
                        out.push('\n');
                    }
                    push_spaces(&mut out, decision.spaces);
                }
                SpacingDecision::Wrap => {
                    out.push('\n');
                    push_spaces(&mut out, decision.spaces);
                }
            }
            out.push_str(token.text());
            first_ever = false;
        }
    }

    if let Some(tail_start) = last_token_end(tokens, excerpts) {
        out.push_str(&source[tail_start..]);
    }

    out
}

fn push_spaces(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push(' ');
    }
}

fn last_token_end(tokens: &[FormatToken], excerpts: &[(Range<usize>, FormattedExcerpt)]) -> Option<usize> {
    let (range, _) = excerpts.last()?;
    let last_index = range.end.checked_sub(1)?;
    tokens.get(last_index)?.byte_range().map(|(_, end)| end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{InterTokenDecision, LeadingSpaceContract};

    fn tok(text: &str, start: usize) -> FormatToken {
        let end = start + text.len();
        FormatToken::new(text, 0).with_before(LeadingSpaceContract::new(1)).with_byte_range(start, end)
    }

    #[test]
    fn excerpt_boundary_starts_a_new_line() {
        let tokens = vec![tok("a", 0), tok("b", 2)];
        let excerpts = vec![
            (0..1, FormattedExcerpt { decisions: vec![InterTokenDecision::append(0)], final_column: 1, cost: 0 }),
            (1..2, FormattedExcerpt { decisions: vec![InterTokenDecision::append(2)], final_column: 2, cost: 0 }),
        ];
        let text = emit(&tokens, &excerpts, "a b");
        assert_eq!(text, "a\n  b");
    }

    #[test]
    fn mid_excerpt_wrap_breaks_the_line() {
        let tokens = vec![tok("a", 0), tok("b", 2)];
        let excerpts = vec![(
            0..2,
            FormattedExcerpt {
                decisions: vec![InterTokenDecision::append(0), InterTokenDecision::wrap(4)],
                final_column: 5,
                cost: 0,
            },
        )];
        let text = emit(&tokens, &excerpts, "a b");
        assert_eq!(text, "a\n    b");
    }

    #[test]
    fn preserve_replays_original_whitespace_verbatim() {
        let source = "a   /* x */  b";
        let mut b = tok("b", 13);
        b.before.preserved_space_start = Some(1);
        let tokens = vec![tok("a", 0), b];
        let excerpts = vec![(
            0..2,
            FormattedExcerpt {
                decisions: vec![InterTokenDecision::append(0), InterTokenDecision::preserve(Some(1))],
                final_column: 14,
                cost: 0,
            },
        )];
        let text = emit(&tokens, &excerpts, source);
        assert_eq!(text, source);
    }

    #[test]
    fn trailing_whitespace_is_preserved_verbatim() {
        let tokens = vec![tok("a", 0)];
        let excerpts =
            vec![(0..1, FormattedExcerpt { decisions: vec![InterTokenDecision::append(0)], final_column: 1, cost: 0 })];
        let text = emit(&tokens, &excerpts, "a\n\n");
        assert_eq!(text, "a\n\n");
    }

    #[test]
    fn empty_excerpts_produce_empty_output() {
        let tokens: Vec<FormatToken> = Vec::new();
        let excerpts: Vec<(Range<usize>, FormattedExcerpt)> = Vec::new();
        assert_eq!(emit(&tokens, &excerpts, ""), "");
    }
}
