//! Error taxonomy for the dashboard

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a dashboard pass or a prediction request
#[derive(Error, Debug)]
pub enum DashboardError {
    /// No location selected
    #[error("Please select at least one location")]
    Configuration,

    /// A requested churn comparison has an empty category
    #[error(transparent)]
    DegenerateSegment(#[from] DegenerateSegment),

    /// A prediction form value outside its field's domain
    #[error("Invalid value '{value}' for {field}: expected one of {expected}")]
    Encoding {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// A required data or model artifact is missing or corrupt
    #[error("Failed to load {artifact} from {}: {reason}", path.display())]
    ArtifactLoad {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A correlation label absent from the correlation matrix
    #[error("Correlation matrix has no entry for '{0}'")]
    MissingCorrelationLabel(String),

    /// Polars failure while deriving a view of an already loaded table
    #[error("Table query failed: {0}")]
    Query(#[from] polars::prelude::PolarsError),
}

/// A churn comparison where at least one side is empty
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Segment '{segment}' cannot be compared: {loyal} loyal vs {churned} churned customers")]
pub struct DegenerateSegment {
    /// Human-readable name of the segment, e.g. "Call Center = Yes"
    pub segment: String,
    pub loyal: usize,
    pub churned: usize,
}

impl DashboardError {
    /// Build an artifact load error from any displayable cause
    pub fn artifact(
        artifact: &'static str,
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ArtifactLoad {
            artifact,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DashboardError::Encoding {
            field: "Device Class",
            value: "Unknown".to_string(),
            expected: "Low, Medium, High".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'Unknown' for Device Class: expected one of Low, Medium, High"
        );

        let err = DashboardError::artifact("decision table", "data/decdf.csv", "file not found");
        assert!(err.to_string().contains("data/decdf.csv"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_degenerate_segment_converts() {
        let segment = DegenerateSegment {
            segment: "Call Center = Yes".to_string(),
            loyal: 4,
            churned: 0,
        };
        let err: DashboardError = segment.clone().into();
        assert!(matches!(err, DashboardError::DegenerateSegment(ref s) if *s == segment));
    }
}
