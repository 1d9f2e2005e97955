//! One synchronous dashboard pass over the declarative feature list

use tracing::info;

use crate::correlation::{feature_correlation, CorrelationBlock};
use crate::data::{CorrelationMatrix, DecisionTable};
use crate::features::{LOCATION, SEGMENT_FEATURES};
use crate::filter::{filter_by_location, Location, LocationSelection};
use crate::summary::{grouped_counts, overall_pair, summarize_segment, ChurnPair, GroupedCounts, SegmentSummary};

/// Summary and correlation view of one feature
#[derive(Debug, Clone)]
pub struct FeatureSection {
    pub summary: SegmentSummary,
    pub correlation: CorrelationBlock,
}

/// Everything shown for one location selection
#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub selection: LocationSelection,
    pub locations: Vec<Location>,
    pub customers: usize,
    /// Loyal vs churned over the whole subset
    pub overall: ChurnPair,
    /// Churn counts per location code
    pub location_counts: GroupedCounts,
    pub sections: Vec<FeatureSection>,
}

impl DashboardReport {
    pub fn caption(&self) -> String {
        self.selection.caption()
    }
}

/// Artifacts a dashboard pass reads from
#[derive(Debug, Clone, Copy)]
pub struct DataStore<'a> {
    pub decisions: &'a DecisionTable,
    pub correlations: &'a CorrelationMatrix,
}

/// Filter, summarize and look up correlations for every section
///
/// The pass stops at the first failure: an empty selection, a comparison
/// with an empty churn category, or a missing correlation label.
pub fn run_dashboard(store: DataStore<'_>, selection: LocationSelection) -> crate::Result<DashboardReport> {
    let subset = filter_by_location(store.decisions, selection)?;

    let overall = overall_pair(&subset)?.comparable("All customers")?;
    let location_counts = grouped_counts(&subset, LOCATION)?;

    let mut sections = Vec::with_capacity(SEGMENT_FEATURES.len());
    for feature in SEGMENT_FEATURES.iter() {
        let summary = summarize_segment(&subset, feature)?;
        summary.require_comparable()?;
        let correlation = feature_correlation(store.correlations, feature)?;
        sections.push(FeatureSection {
            summary,
            correlation,
        });
    }

    info!(
        selection = %selection.caption(),
        customers = subset.height(),
        sections = sections.len(),
        "dashboard pass complete"
    );
    Ok(DashboardReport {
        selection,
        locations: selection.locations(),
        customers: subset.height(),
        overall,
        location_counts,
        sections,
    })
}

/// Correlation matrix covering every section of the dashboard, for tests
#[cfg(test)]
pub(crate) fn full_correlation_matrix() -> CorrelationMatrix {
    let mut labels: Vec<String> = Vec::new();
    for feature in SEGMENT_FEATURES.iter() {
        for label in feature.correlation_labels() {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }
    let n = labels.len();
    let values = ndarray::Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            1.0
        } else {
            0.1 * ((i + j) % 5) as f64 - 0.2
        }
    });
    CorrelationMatrix::from_parts(labels, values).unwrap()
}
