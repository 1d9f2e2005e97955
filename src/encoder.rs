//! Manual prediction form and its encoding into classifier input

use std::fmt;

use linfa::traits::PredictInplace;
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::DashboardError;
use crate::features::{
    CALL_CENTER, DEVICE_CLASS, EDUCATION_PRODUCT, GAMES_PRODUCT, MODEL_FEATURES, MUSIC_PRODUCT,
    PAYMENT_METHOD, USE_MYAPP, VIDEO_PRODUCT,
};
use crate::model::predict_classes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Low,
    Medium,
    High,
}

impl DeviceClass {
    pub const OPTIONS: &'static [(&'static str, DeviceClass)] = &[
        ("Low", DeviceClass::Low),
        ("Medium", DeviceClass::Medium),
        ("High", DeviceClass::High),
    ];

    pub fn code(self) -> i64 {
        match self {
            DeviceClass::Low => 0,
            DeviceClass::Medium => 1,
            DeviceClass::High => 2,
        }
    }
}

/// Usage of an internet product (Games, Music, Education, Video, MyApp)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductUsage {
    No,
    Yes,
    NoInternetService,
}

impl ProductUsage {
    pub const OPTIONS: &'static [(&'static str, ProductUsage)] = &[
        ("No", ProductUsage::No),
        ("Yes", ProductUsage::Yes),
        ("No internet service", ProductUsage::NoInternetService),
    ];

    /// Code 2 is unused in the training data
    pub fn code(self) -> i64 {
        match self {
            ProductUsage::No => 0,
            ProductUsage::Yes => 1,
            ProductUsage::NoInternetService => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCenter {
    No,
    Yes,
}

impl CallCenter {
    pub const OPTIONS: &'static [(&'static str, CallCenter)] =
        &[("No", CallCenter::No), ("Yes", CallCenter::Yes)];

    pub fn code(self) -> i64 {
        match self {
            CallCenter::No => 0,
            CallCenter::Yes => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    DigitalWallet,
    Pulsa,
    Debit,
    Credit,
}

impl PaymentMethod {
    pub const OPTIONS: &'static [(&'static str, PaymentMethod)] = &[
        ("Digital Wallet", PaymentMethod::DigitalWallet),
        ("Pulsa", PaymentMethod::Pulsa),
        ("Debit", PaymentMethod::Debit),
        ("Credit", PaymentMethod::Credit),
    ];

    pub fn code(self) -> i64 {
        match self {
            PaymentMethod::DigitalWallet => 0,
            PaymentMethod::Pulsa => 1,
            PaymentMethod::Debit => 2,
            PaymentMethod::Credit => 3,
        }
    }
}

/// Resolve a form selection against a field's options; never falls back
fn select<T: Copy>(
    field: &'static str,
    options: &[(&'static str, T)],
    value: &str,
) -> crate::Result<T> {
    options
        .iter()
        .find(|(label, _)| *label == value)
        .map(|(_, option)| *option)
        .ok_or_else(|| DashboardError::Encoding {
            field,
            value: value.to_string(),
            expected: options
                .iter()
                .map(|(label, _)| *label)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

fn non_negative(field: &'static str, value: i64) -> crate::Result<u32> {
    u32::try_from(value).map_err(|_| DashboardError::Encoding {
        field,
        value: value.to_string(),
        expected: "a whole number of at least 0".to_string(),
    })
}

/// Form values as submitted: selections as text, amounts as integers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPredictionForm {
    pub tenure_months: i64,
    pub device_class: String,
    pub games_product: String,
    pub music_product: String,
    pub education_product: String,
    pub use_myapp: String,
    pub video_product: String,
    pub monthly_purchase: i64,
    pub call_center: String,
    pub cltv: i64,
    pub payment_method: String,
}

/// A validated prediction form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionForm {
    pub tenure_months: u32,
    pub device_class: DeviceClass,
    pub games_product: ProductUsage,
    pub music_product: ProductUsage,
    pub education_product: ProductUsage,
    pub use_myapp: ProductUsage,
    pub video_product: ProductUsage,
    pub monthly_purchase: u32,
    pub call_center: CallCenter,
    pub cltv: u32,
    pub payment_method: PaymentMethod,
}

impl TryFrom<&RawPredictionForm> for PredictionForm {
    type Error = DashboardError;

    fn try_from(raw: &RawPredictionForm) -> crate::Result<Self> {
        Ok(Self {
            tenure_months: non_negative("Tenure Months", raw.tenure_months)?,
            device_class: select(DEVICE_CLASS, DeviceClass::OPTIONS, &raw.device_class)?,
            games_product: select(GAMES_PRODUCT, ProductUsage::OPTIONS, &raw.games_product)?,
            music_product: select(MUSIC_PRODUCT, ProductUsage::OPTIONS, &raw.music_product)?,
            education_product: select(
                EDUCATION_PRODUCT,
                ProductUsage::OPTIONS,
                &raw.education_product,
            )?,
            use_myapp: select(USE_MYAPP, ProductUsage::OPTIONS, &raw.use_myapp)?,
            video_product: select(VIDEO_PRODUCT, ProductUsage::OPTIONS, &raw.video_product)?,
            monthly_purchase: non_negative("Monthly Purchase", raw.monthly_purchase)?,
            call_center: select(CALL_CENTER, CallCenter::OPTIONS, &raw.call_center)?,
            cltv: non_negative("CLTV", raw.cltv)?,
            payment_method: select(PAYMENT_METHOD, PaymentMethod::OPTIONS, &raw.payment_method)?,
        })
    }
}

/// Classifier input in training feature order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInput(pub [f64; MODEL_FEATURES.len()]);

impl PredictionInput {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Single-row record matrix
    pub fn to_records(&self) -> Array2<f64> {
        Array1::from(self.0.to_vec()).insert_axis(ndarray::Axis(0))
    }
}

impl fmt::Display for PredictionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", values.join(", "))
    }
}

/// Encode a validated form
pub fn encode(form: &PredictionForm) -> PredictionInput {
    PredictionInput([
        form.tenure_months as f64,
        form.device_class.code() as f64,
        form.games_product.code() as f64,
        form.music_product.code() as f64,
        form.education_product.code() as f64,
        form.use_myapp.code() as f64,
        form.video_product.code() as f64,
        form.monthly_purchase as f64,
        form.call_center.code() as f64,
        form.cltv as f64,
        form.payment_method.code() as f64,
    ])
}

/// Validate and encode a submitted form
pub fn encode_raw(raw: &RawPredictionForm) -> crate::Result<PredictionInput> {
    PredictionForm::try_from(raw).map(|form| encode(&form))
}

/// Outcome of a manual prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnPrediction {
    NoChurn,
    Churn,
}

impl ChurnPrediction {
    pub fn from_class(class: usize) -> Self {
        if class == 0 {
            ChurnPrediction::NoChurn
        } else {
            ChurnPrediction::Churn
        }
    }
}

impl fmt::Display for ChurnPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChurnPrediction::NoChurn => write!(f, "No Churn"),
            ChurnPrediction::Churn => write!(f, "Churn"),
        }
    }
}

/// Score one encoded customer
pub fn predict_churn<M>(model: &M, input: &PredictionInput) -> ChurnPrediction
where
    M: PredictInplace<Array2<f64>, Array1<usize>>,
{
    let classes = predict_classes(model, &input.to_records());
    let prediction = ChurnPrediction::from_class(classes[0]);
    debug!(input = %input, prediction = %prediction, "manual prediction");
    prediction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::short_tenure_forest;

    fn scenario_form() -> RawPredictionForm {
        RawPredictionForm {
            tenure_months: 12,
            device_class: "Medium".to_string(),
            games_product: "Yes".to_string(),
            music_product: "No".to_string(),
            education_product: "No".to_string(),
            use_myapp: "Yes".to_string(),
            video_product: "No".to_string(),
            monthly_purchase: 500,
            call_center: "No".to_string(),
            cltv: 2000,
            payment_method: "Pulsa".to_string(),
        }
    }

    #[test]
    fn test_encode_scenario() {
        let input = encode_raw(&scenario_form()).unwrap();
        assert_eq!(
            input.values(),
            &[12.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 500.0, 0.0, 2000.0, 1.0]
        );
        assert_eq!(input.to_records().shape(), &[1, 11]);
    }

    #[test]
    fn test_no_internet_service_is_code_three() {
        let mut raw = scenario_form();
        raw.games_product = "No internet service".to_string();
        raw.video_product = "No internet service".to_string();
        let input = encode_raw(&raw).unwrap();
        assert_eq!(input.values()[2], 3.0);
        assert_eq!(input.values()[6], 3.0);
    }

    #[test]
    fn test_payment_methods() {
        let mut raw = scenario_form();
        for (label, code) in [("Digital Wallet", 0.0), ("Pulsa", 1.0), ("Debit", 2.0), ("Credit", 3.0)] {
            raw.payment_method = label.to_string();
            assert_eq!(encode_raw(&raw).unwrap().values()[10], code);
        }
    }

    #[test]
    fn test_unknown_value_is_rejected() {
        let mut raw = scenario_form();
        raw.device_class = "Unknown".to_string();
        let err = encode_raw(&raw).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Encoding { field: "Device Class", ref value, .. } if value == "Unknown"
        ));

        // Labels are matched exactly
        let mut raw = scenario_form();
        raw.call_center = "yes".to_string();
        assert!(matches!(encode_raw(&raw), Err(DashboardError::Encoding { field: "Call Center", .. })));

        // "No internet service" is not a Call Center option
        let mut raw = scenario_form();
        raw.call_center = "No internet service".to_string();
        assert!(encode_raw(&raw).is_err());
    }

    #[test]
    fn test_unknown_payment_and_product_are_rejected() {
        let mut raw = scenario_form();
        raw.payment_method = "Cash".to_string();
        let err = encode_raw(&raw).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Encoding { field: "Payment Method", ref expected, .. }
                if expected == "Digital Wallet, Pulsa, Debit, Credit"
        ));

        let mut raw = scenario_form();
        raw.video_product = "Maybe".to_string();
        assert!(matches!(
            encode_raw(&raw),
            Err(DashboardError::Encoding { field: "Video Product", .. })
        ));

        let mut raw = scenario_form();
        raw.games_product = "no internet service".to_string();
        assert!(matches!(
            encode_raw(&raw),
            Err(DashboardError::Encoding { field: "Games Product", .. })
        ));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let mut raw = scenario_form();
        raw.monthly_purchase = -1;
        assert!(matches!(
            encode_raw(&raw),
            Err(DashboardError::Encoding { field: "Monthly Purchase", .. })
        ));
    }

    #[test]
    fn test_prediction_is_pure() {
        let model = short_tenure_forest();
        let raw = scenario_form();

        let first = encode_raw(&raw).unwrap();
        let second = encode_raw(&raw).unwrap();
        assert_eq!(first, second);
        assert_eq!(predict_churn(&model, &first), predict_churn(&model, &second));
        assert_eq!(predict_churn(&model, &first), ChurnPrediction::NoChurn);

        let mut short = raw.clone();
        short.tenure_months = 2;
        let input = encode_raw(&short).unwrap();
        assert_eq!(predict_churn(&model, &input), ChurnPrediction::Churn);
        assert_eq!(ChurnPrediction::Churn.to_string(), "Churn");
    }
}
