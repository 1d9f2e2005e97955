//! churnlens: churn analytics for a telecom customer base
//!
//! This library segments customer churn by location and product usage,
//! extracts correlation views, evaluates a pre-trained random forest and
//! scores manually entered customers with it.

pub mod cli;
pub mod correlation;
pub mod dashboard;
pub mod data;
pub mod encoder;
pub mod error;
pub mod features;
pub mod filter;
pub mod metrics;
pub mod model;
pub mod summary;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use dashboard::{run_dashboard, DashboardReport, DataStore};
pub use data::{CorrelationMatrix, DecisionTable};
pub use encoder::{encode_raw, predict_churn, ChurnPrediction, PredictionForm, PredictionInput, RawPredictionForm};
pub use error::{DashboardError, DegenerateSegment};
pub use filter::{filter_by_location, LocationSelection, WorkingSubset};
pub use metrics::{evaluate_model, ModelEvaluation};
pub use model::RandomForest;
pub use viz::generate_dashboard_charts;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;
