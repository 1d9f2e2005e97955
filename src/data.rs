//! Loading of the decision table and correlation matrix using Polars

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::debug;

use crate::error::DashboardError;
use crate::features::{CATEGORICAL_DOMAINS, CHURN_LABEL, MODEL_FEATURES, NUMERIC_COLUMNS};

const DECISION_TABLE: &str = "decision table";
const CORRELATION_MATRIX: &str = "correlation matrix";

/// Largest tolerated overshoot of a coefficient beyond [-1, 1]
pub(crate) const CORRELATION_EPSILON: f64 = 1e-9;

/// Row-level customer decision table
///
/// Categorical columns are stored as `Int64`, numeric columns as `Float64`.
/// Every categorical code is guaranteed to lie in its column's domain.
#[derive(Debug, Clone)]
pub struct DecisionTable {
    frame: DataFrame,
}

impl DecisionTable {
    /// Load the decision table from a CSV file with a header row
    ///
    /// # Arguments
    /// * `path` - CSV file holding the 13 decision table columns
    ///
    /// # Returns
    /// * `DecisionTable` with categorical codes checked against their domains,
    ///   or `ArtifactLoad` naming the file and the first offending value
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| DashboardError::artifact(DECISION_TABLE, path, e))?;

        let table = Self::validate(frame, path)?;
        debug!(rows = table.height(), path = %path.display(), "decision table loaded");
        Ok(table)
    }

    /// Wrap an in-memory frame, applying the same checks as [`DecisionTable::load`]
    pub fn from_frame(frame: DataFrame) -> crate::Result<Self> {
        Self::validate(frame, Path::new("<memory>"))
    }

    fn validate(frame: DataFrame, source: &Path) -> crate::Result<Self> {
        let categorical = CATEGORICAL_DOMAINS.iter().map(|(name, _)| *name);
        for name in categorical.clone().chain(NUMERIC_COLUMNS) {
            if frame.get_column_index(name).is_none() {
                return Err(DashboardError::artifact(
                    DECISION_TABLE,
                    source,
                    format!("missing column '{}'", name),
                ));
            }
        }

        // Integer casts truncate, so fractional codes are rejected first
        for name in categorical.clone() {
            let column = frame
                .column(name)
                .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;
            if !column.dtype().is_float() {
                continue;
            }
            let values = column
                .cast(&DataType::Float64)
                .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;
            let values = values
                .f64()
                .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;
            let fractional = values
                .into_iter()
                .enumerate()
                .find_map(|(row, v)| v.filter(|v| v.fract() != 0.0).map(|v| (row, v)));
            if let Some((row, value)) = fractional {
                return Err(DashboardError::artifact(
                    DECISION_TABLE,
                    source,
                    format!("row {}: '{}' code {} is not an integer", row, name, value),
                ));
            }
        }

        let casts: Vec<Expr> = categorical
            .map(|name| col(name).cast(DataType::Int64))
            .chain(NUMERIC_COLUMNS.iter().map(|name| col(*name).cast(DataType::Float64)))
            .collect();
        let frame = frame
            .lazy()
            .with_columns(casts)
            .collect()
            .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;

        for (name, domain) in CATEGORICAL_DOMAINS {
            let codes = frame
                .column(name)
                .and_then(|c| c.i64())
                .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;
            for (row, code) in codes.into_iter().enumerate() {
                match code {
                    Some(code) if domain.contains(&code) => {}
                    Some(code) => {
                        return Err(DashboardError::artifact(
                            DECISION_TABLE,
                            source,
                            format!("row {}: '{}' code {} outside {:?}", row, name, code, domain),
                        ))
                    }
                    None => {
                        return Err(DashboardError::artifact(
                            DECISION_TABLE,
                            source,
                            format!("row {}: '{}' is empty or not an integer code", row, name),
                        ))
                    }
                }
            }
        }

        for name in NUMERIC_COLUMNS {
            let column = frame
                .column(name)
                .map_err(|e| DashboardError::artifact(DECISION_TABLE, source, e))?;
            if column.null_count() > 0 {
                return Err(DashboardError::artifact(
                    DECISION_TABLE,
                    source,
                    format!("'{}' has empty or non-numeric values", name),
                ));
            }
        }

        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Classifier input matrix (n_customers, 11) in training column order
    pub fn feature_matrix(&self) -> crate::Result<Array2<f64>> {
        feature_matrix(&self.frame)
    }

    /// `Churn Label` codes as class indices
    pub fn churn_labels(&self) -> crate::Result<Array1<usize>> {
        let labels = self
            .frame
            .column(CHURN_LABEL)?
            .i64()?
            .into_no_null_iter()
            .map(|code| code as usize)
            .collect();
        Ok(labels)
    }
}

/// Extract the classifier input columns of `frame` into an ndarray matrix
pub fn feature_matrix(frame: &DataFrame) -> crate::Result<Array2<f64>> {
    let mut matrix = Array2::zeros((frame.height(), MODEL_FEATURES.len()));
    for (j, name) in MODEL_FEATURES.iter().enumerate() {
        let column = frame.column(name)?.cast(&DataType::Float64)?;
        for (i, value) in column.f64()?.into_no_null_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    Ok(matrix)
}

/// Square matrix of correlation coefficients between one-hot category labels
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Load the matrix from a CSV file whose first column holds the row labels
    /// and whose header holds the column labels in the same order
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| DashboardError::artifact(CORRELATION_MATRIX, path, e))?;

        let matrix = Self::read_frame(&frame)
            .and_then(|(labels, values)| Self::from_parts(labels, values))
            .map_err(|reason| DashboardError::artifact(CORRELATION_MATRIX, path, reason))?;
        debug!(labels = matrix.len(), path = %path.display(), "correlation matrix loaded");
        Ok(matrix)
    }

    fn read_frame(frame: &DataFrame) -> Result<(Vec<String>, Array2<f64>), String> {
        let columns = frame.get_columns();
        let Some((label_column, value_columns)) = columns.split_first() else {
            return Err("no columns".to_string());
        };

        let labels: Vec<String> = label_column
            .str()
            .map_err(|e| format!("row labels: {}", e))?
            .into_iter()
            .map(|label| label.unwrap_or_default().to_string())
            .collect();

        for (column, expected) in value_columns.iter().zip(&labels) {
            if column.name().as_str() != expected {
                return Err(format!(
                    "column '{}' does not match row label '{}'",
                    column.name().as_str(),
                    expected
                ));
            }
        }

        let mut values = Array2::zeros((labels.len(), value_columns.len()));
        for (j, column) in value_columns.iter().enumerate() {
            let column = column
                .cast(&DataType::Float64)
                .map_err(|e| format!("column '{}': {}", column.name().as_str(), e))?;
            let coefficients = column
                .f64()
                .map_err(|e| format!("column '{}': {}", column.name().as_str(), e))?;
            for (i, value) in coefficients.into_iter().enumerate() {
                values[[i, j]] = value.unwrap_or(f64::NAN);
            }
        }
        Ok((labels, values))
    }

    /// Build a matrix from labels and a square array of coefficients
    pub fn from_parts(labels: Vec<String>, values: Array2<f64>) -> Result<Self, String> {
        if values.nrows() != labels.len() || values.ncols() != labels.len() {
            return Err(format!(
                "expected a {0}x{0} matrix, found {1}x{2}",
                labels.len(),
                values.nrows(),
                values.ncols()
            ));
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(format!("row {} has no label", i));
            }
            if index.insert(label.clone(), i).is_some() {
                return Err(format!("duplicate label '{}'", label));
            }
        }

        if let Some(((i, j), value)) = values
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || v.abs() > 1.0 + CORRELATION_EPSILON)
        {
            return Err(format!(
                "coefficient {} at ('{}', '{}') is not in [-1, 1]",
                value, labels[i], labels[j]
            ));
        }

        let n = labels.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if (values[[i, j]] - values[[j, i]]).abs() > CORRELATION_EPSILON {
                    return Err(format!(
                        "coefficients of ('{}', '{}') are not symmetric",
                        labels[i], labels[j]
                    ));
                }
            }
        }

        Ok(Self {
            labels,
            index,
            values,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of `label` in the matrix
    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Coefficient between two labels
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        Some(self.values[[self.position(row)?, self.position(column)?]])
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}
