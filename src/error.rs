//! Error types returned across the crate's external interfaces.
//!
//! Internal invariant violations (hierarchy/sibling-continuity failures) are
//! programming errors, not values callers recover from; those are reported
//! via [`crate::partition_tree::InvariantViolation`] and `debug_assert!`,
//! not through this enum. `FormatError` covers only resource exhaustion,
//! the one recoverable failure mode the driver can reach.

use std::ops::Range;

/// Describes one leaf partition whose wrap search aborted after exceeding
/// `max_search_states`, so a caller can report where formatting gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDiagnostic {
    pub token_range: Range<usize>,
    pub indentation_spaces: usize,
}

/// Errors the driver can return after a complete run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// One or more leaves hit `max_search_states`. Each such leaf was
    /// greedily completed so the run still produced output; this variant
    /// only flags which partitions gave up on finding an optimal wrap.
    #[error("wrap search exhausted its state budget on {} partition(s)", .partitions.len())]
    ResourceExhausted { partitions: Vec<PartitionDiagnostic> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_exhausted_message_counts_partitions() {
        let err = FormatError::ResourceExhausted {
            partitions: vec![
                PartitionDiagnostic { token_range: 0..4, indentation_spaces: 2 },
                PartitionDiagnostic { token_range: 10..20, indentation_spaces: 4 },
            ],
        };
        assert_eq!(err.to_string(), "wrap search exhausted its state budget on 2 partition(s)");
    }
}
