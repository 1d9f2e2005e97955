//! Per-feature views of the correlation matrix

use ndarray::Array2;

use crate::data::{CorrelationMatrix, CORRELATION_EPSILON};
use crate::error::DashboardError;
use crate::features::Feature;

/// A labelled block of the correlation matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationBlock {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub values: Array2<f64>,
}

impl CorrelationBlock {
    /// True when the block is square and `values[i][j] == values[j][i]`
    /// within the tolerance accepted when the matrix was loaded
    pub fn is_symmetric(&self) -> bool {
        self.row_labels == self.column_labels
            && self
                .values
                .indexed_iter()
                .all(|((i, j), v)| (v - self.values[[j, i]]).abs() <= CORRELATION_EPSILON)
    }
}

/// Restrict the matrix to the given row and column labels, in that order
pub fn correlation_block(
    matrix: &CorrelationMatrix,
    rows: &[String],
    columns: &[String],
) -> crate::Result<CorrelationBlock> {
    let lookup = |labels: &[String]| -> crate::Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                matrix
                    .position(label)
                    .ok_or_else(|| DashboardError::MissingCorrelationLabel(label.clone()))
            })
            .collect()
    };
    let row_positions = lookup(rows)?;
    let column_positions = lookup(columns)?;

    let values = Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| {
        matrix.values()[[row_positions[i], column_positions[j]]]
    });

    Ok(CorrelationBlock {
        row_labels: rows.to_vec(),
        column_labels: columns.to_vec(),
        values,
    })
}

/// The feature's levels against the churn outcome, e.g. for Call Center:
/// `Call Center_No`, `Call Center_Yes`, `Churn Label_No`, `Churn Label_Yes`
pub fn feature_correlation(
    matrix: &CorrelationMatrix,
    feature: &Feature,
) -> crate::Result<CorrelationBlock> {
    let labels = feature.correlation_labels();
    correlation_block(matrix, &labels, &labels)
}
