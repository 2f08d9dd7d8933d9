//! A reusable token-partition line-wrap and alignment engine for
//! source-code formatters.
//!
//! This crate supplies the *core* search-and-layout machinery of a
//! formatter: deciding where lines break, how sibling rows align into
//! columns, and how token spacing resolves, without any opinion about a
//! particular language's grammar. A caller owns lexing/parsing, builds a
//! [`PartitionTree`] of [`FormatToken`]s over its own concrete syntax, and
//! (for tabular alignment) implements [`ColumnSchemaSource`] over its own
//! node type.

pub mod align;
pub mod driver;
pub mod emit;
pub mod error;
pub mod layout;
pub mod partition_tree;
pub mod reshape;
pub mod style;
pub mod token;
pub mod tree;
pub mod unwrapped_line;
pub mod wrap;

pub use align::{AlignmentPolicy, ColumnCell, ColumnSchemaSource, Flush};
pub use driver::{format_partition_tree, AlignmentConfig};
pub use emit::emit;
pub use error::{FormatError, PartitionDiagnostic};
pub use partition_tree::{InvariantViolation, PartitionTree};
pub use style::Style;
pub use token::{BreakDecision, FormatToken, GroupBalancing, InterTokenDecision, LeadingSpaceContract, SpacingDecision};
pub use unwrapped_line::{PartitionPolicy, UnwrappedLine};
pub use wrap::{fits_on_line, search_line_wraps, FormattedExcerpt, WrapSearchResult};

/// Runs the full pipeline end to end: expand/collapse, reshape, align,
/// wrap-search, then emit. A thin convenience wrapper over
/// [`format_partition_tree`] and [`emit`] for callers who don't need the
/// intermediate excerpts.
pub fn format_source<Origin: Clone, Tag: PartialEq>(
    tree: &PartitionTree<Origin>,
    tokens: &mut [FormatToken],
    style: &Style,
    alignment: &AlignmentConfig<Origin, Tag>,
    source: &str,
) -> (String, Option<FormatError>) {
    let (excerpts, error) = format_partition_tree(tree, tokens, style, alignment);
    (emit(tokens, &excerpts, source), error)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCells;
    impl<Origin> ColumnSchemaSource<Origin> for NoCells {
        fn cells(&self, _origin: &Origin) -> Vec<ColumnCell> {
            Vec::new()
        }
    }

    #[test]
    fn format_source_round_trips_a_line_that_already_fits() {
        let style = Style::default_style();
        let mut tokens = vec![
            FormatToken::new("a", 0).with_byte_range(0, 1),
            FormatToken::new("b", 0).with_before(LeadingSpaceContract::new(1)).with_byte_range(2, 3),
        ];
        let tree: PartitionTree =
            PartitionTree::leaf(UnwrappedLine::new(0..2, 0, PartitionPolicy::FitOnLineElseExpand));
        let alignment = AlignmentConfig {
            source: &NoCells,
            policy: AlignmentPolicy::Align,
            disabled: &[],
            ignore: &|_| false,
            subtype: &|_| (),
        };
        let (text, error) = format_source(&tree, &mut tokens, &style, &alignment, "a b");
        assert!(error.is_none());
        assert_eq!(text, "a b");
    }

    #[test]
    fn format_source_wraps_a_line_that_overflows() {
        let mut style = Style::default_style();
        style.column_limit = 3;
        let mut tokens = vec![
            FormatToken::new("aaaa", 0).with_byte_range(0, 4),
            FormatToken::new("bbbb", 0).with_before(LeadingSpaceContract::new(1)).with_byte_range(5, 9),
        ];
        let tree: PartitionTree =
            PartitionTree::leaf(UnwrappedLine::new(0..2, 0, PartitionPolicy::FitOnLineElseExpand));
        let alignment = AlignmentConfig {
            source: &NoCells,
            policy: AlignmentPolicy::Align,
            disabled: &[],
            ignore: &|_| false,
            subtype: &|_| (),
        };
        let (text, _) = format_source(&tree, &mut tokens, &style, &alignment, "aaaa bbbb");
        assert!(text.contains('\n'), "the single-leaf fallback still hands the line to the wrap searcher");
    }
}
