//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::encoder::RawPredictionForm;
use crate::error::DashboardError;
use crate::filter::LocationSelection;

/// Number of values in a prediction form
const FORM_FIELDS: usize = 11;

/// Churn analytics dashboard with what-if churn prediction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customer decision table CSV
    #[arg(short, long, env = "CHURNLENS_DECISIONS", default_value = "dataset/decdf.csv")]
    pub decisions: PathBuf,

    /// Path to the correlation matrix CSV
    #[arg(short, long, env = "CHURNLENS_CORRELATIONS", default_value = "dataset/heat.csv")]
    pub correlations: PathBuf,

    /// Path to the exported random forest JSON
    #[arg(short, long, env = "CHURNLENS_MODEL", default_value = "random_forest_model.json")]
    pub model: PathBuf,

    /// Include Jakarta customers
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub jakarta: bool,

    /// Include Bandung customers
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub bandung: bool,

    /// Directory for the rendered charts
    #[arg(short, long, default_value = "dashboard")]
    pub output_dir: PathBuf,

    /// Prediction mode: the 11 form values as a comma-separated string, in order
    /// Tenure Months, Device Class, Games Product, Music Product, Education Product,
    /// Use MyApp, Video Product, Monthly Purchase, Call Center, CLTV, Payment Method.
    /// Example: --predict "12,Medium,Yes,No,No,Yes,No,500,No,2000,Pulsa"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Share of each churn class held out for model evaluation, in (0, 1)
    #[arg(long, default_value = "0.2", value_parser = parse_test_ratio)]
    pub test_ratio: f64,

    /// Seed of the held-out split
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn selection(&self) -> LocationSelection {
        LocationSelection::new(self.jakarta, self.bandung)
    }

    /// Parse the prediction form from the predict string
    pub fn parse_prediction_form(&self) -> crate::Result<Option<RawPredictionForm>> {
        self.predict.as_deref().map(parse_form).transpose()
    }
}

fn parse_test_ratio(value: &str) -> Result<f64, String> {
    let ratio: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if ratio > 0.0 && ratio < 1.0 {
        Ok(ratio)
    } else {
        Err(format!("{} is not strictly between 0 and 1", ratio))
    }
}

fn amount(field: &'static str, value: &str) -> crate::Result<i64> {
    value.parse().map_err(|_| DashboardError::Encoding {
        field,
        value: value.to_string(),
        expected: "a whole number".to_string(),
    })
}

/// Split a comma-separated form into its raw fields
pub fn parse_form(text: &str) -> crate::Result<RawPredictionForm> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [tenure, device, games, music, education, myapp, video, monthly, call_center, cltv, payment] =
        parts.as_slice()
    else {
        return Err(DashboardError::Encoding {
            field: "prediction form",
            value: text.to_string(),
            expected: format!("{} comma-separated values", FORM_FIELDS),
        });
    };

    Ok(RawPredictionForm {
        tenure_months: amount("Tenure Months", tenure)?,
        device_class: device.to_string(),
        games_product: games.to_string(),
        music_product: music.to_string(),
        education_product: education.to_string(),
        use_myapp: myapp.to_string(),
        video_product: video.to_string(),
        monthly_purchase: amount("Monthly Purchase", monthly)?,
        call_center: call_center.to_string(),
        cltv: amount("CLTV", cltv)?,
        payment_method: payment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(predict: Option<&str>) -> Args {
        Args::parse_from(
            ["churnlens"]
                .into_iter()
                .chain(predict.map(|p| ["--predict", p]).into_iter().flatten()),
        )
    }

    #[test]
    fn test_defaults() {
        let args = args(None);
        assert_eq!(args.selection(), LocationSelection::default());
        assert_eq!(args.test_ratio, 0.2);
        assert_eq!(args.seed, 42);
        assert!(args.parse_prediction_form().unwrap().is_none());
    }

    #[test]
    fn test_location_flags() {
        let args = Args::parse_from(["churnlens", "--jakarta", "false"]);
        assert_eq!(args.selection(), LocationSelection::new(false, true));
    }

    #[test]
    fn test_test_ratio_range() {
        let args = Args::try_parse_from(["churnlens", "--test-ratio", "0.3"]).unwrap();
        assert_eq!(args.test_ratio, 0.3);

        for bad in ["5", "0", "1", "-0.2", "NaN", "half"] {
            assert!(
                Args::try_parse_from(["churnlens", "--test-ratio", bad]).is_err(),
                "{} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_parse_prediction_form() {
        let args = args(Some("12, Medium, Yes, No, No, Yes, No, 500, No, 2000, Digital Wallet"));
        let form = args.parse_prediction_form().unwrap().unwrap();

        assert_eq!(form.tenure_months, 12);
        assert_eq!(form.device_class, "Medium");
        assert_eq!(form.monthly_purchase, 500);
        assert_eq!(form.cltv, 2000);
        assert_eq!(form.payment_method, "Digital Wallet");
    }

    #[test]
    fn test_parse_invalid_forms() {
        assert!(args(Some("invalid")).parse_prediction_form().is_err());

        let err = parse_form("twelve,Medium,Yes,No,No,Yes,No,500,No,2000,Pulsa").unwrap_err();
        assert!(matches!(err, DashboardError::Encoding { field: "Tenure Months", .. }));
    }
}
