pub mod config;
pub mod domain;
pub mod error;
pub mod records;
pub mod text;

#[cfg(test)]
mod tests {
    use super::domain::{AgreementGate, RevisionStats};
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("COMPLETION_FAILED", "completion failed")
            .with_details("status=503")
            .with_retryable(true);
        assert_eq!(err.code, "COMPLETION_FAILED");
        assert!(err.retryable);
        assert_eq!(err.to_string(), "[COMPLETION_FAILED] completion failed (status=503)");
    }

    #[test]
    fn transient_statuses() {
        assert!(AppError::status_is_transient(429));
        assert!(AppError::status_is_transient(503));
        assert!(!AppError::status_is_transient(401));
        assert!(!AppError::status_is_transient(404));
    }

    #[test]
    fn parse_failure_gate_is_closed_and_recognisable() {
        let failed = AgreementGate::parse_failure();
        assert!(!failed.is_open);
        assert!(failed.is_parse_failure());

        let decided = AgreementGate {
            is_open: false,
            reason: AgreementGate::PARSE_FAILURE_REASON.to_string(),
            decision: Some("This agrees with what you said.".to_string()),
        };
        assert!(!decided.is_parse_failure());
    }

    #[test]
    fn stats_merge_into_run_totals() {
        let mut total = RevisionStats::default();
        let claim = RevisionStats {
            gate_parse_failures: 2,
            edits_rejected_by_ratio: 1,
            edits_applied: 3,
            ..RevisionStats::default()
        };
        total.merge(&claim);
        total.merge(&claim);
        assert_eq!(total.gate_parse_failures, 4);
        assert_eq!(total.edits_applied, 6);
        assert_eq!(total.fallbacks(), 6);
    }
}
