//! Column names, categorical domains and the declarative feature catalogue

pub const LOCATION: &str = "Location";
pub const CHURN_LABEL: &str = "Churn Label";
pub const TENURE_MONTHS: &str = "Tenure Months";
pub const DEVICE_CLASS: &str = "Device Class";
pub const GAMES_PRODUCT: &str = "Games Product";
pub const MUSIC_PRODUCT: &str = "Music Product";
pub const EDUCATION_PRODUCT: &str = "Education Product";
pub const USE_MYAPP: &str = "Use MyApp";
pub const VIDEO_PRODUCT: &str = "Video Product";
pub const MONTHLY_PURCHASE: &str = "Monthly Purchase (Thou. IDR)";
pub const CALL_CENTER: &str = "Call Center";
pub const CLTV: &str = "CLTV (Predicted Thou. IDR)";
pub const PAYMENT_METHOD: &str = "Payment Method";

/// Classifier input columns, in training order
pub const MODEL_FEATURES: [&str; 11] = [
    TENURE_MONTHS,
    DEVICE_CLASS,
    GAMES_PRODUCT,
    MUSIC_PRODUCT,
    EDUCATION_PRODUCT,
    USE_MYAPP,
    VIDEO_PRODUCT,
    MONTHLY_PURCHASE,
    CALL_CENTER,
    CLTV,
    PAYMENT_METHOD,
];

/// Columns holding real-valued measurements
pub const NUMERIC_COLUMNS: [&str; 3] = [TENURE_MONTHS, MONTHLY_PURCHASE, CLTV];

/// Integer-coded columns and the codes each may hold.
/// Product usage skips code 2: the upstream encoding maps
/// "No internet service" to 3.
pub static CATEGORICAL_DOMAINS: [(&str, &[i64]); 10] = [
    (LOCATION, &[0, 1]),
    (CHURN_LABEL, &[0, 1]),
    (DEVICE_CLASS, &[0, 1, 2]),
    (GAMES_PRODUCT, &[0, 1, 3]),
    (MUSIC_PRODUCT, &[0, 1, 3]),
    (EDUCATION_PRODUCT, &[0, 1, 3]),
    (USE_MYAPP, &[0, 1, 3]),
    (VIDEO_PRODUCT, &[0, 1, 3]),
    (CALL_CENTER, &[0, 1]),
    (PAYMENT_METHOD, &[0, 1, 2, 3]),
];

/// Churn outcome of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Churn {
    /// Churn Label = 0
    Loyal,
    /// Churn Label = 1
    Churned,
}

impl Churn {
    pub const ALL: [Churn; 2] = [Churn::Loyal, Churn::Churned];

    pub fn code(self) -> i64 {
        match self {
            Churn::Loyal => 0,
            Churn::Churned => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Churn::Loyal),
            1 => Some(Churn::Churned),
            _ => None,
        }
    }

    /// Label used in count-plot legends
    pub fn legend(self) -> &'static str {
        match self {
            Churn::Loyal => "No Churn",
            Churn::Churned => "Churn",
        }
    }

    /// Label used in pie-chart legends
    pub fn pie_label(self) -> &'static str {
        match self {
            Churn::Loyal => "Loyal Client",
            Churn::Churned => "Client Left",
        }
    }

    /// Level name used in correlation labels (`Churn Label_No`)
    pub fn level_name(self) -> &'static str {
        match self {
            Churn::Loyal => "No",
            Churn::Churned => "Yes",
        }
    }
}

/// One labelled code of a categorical feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub code: i64,
    pub label: &'static str,
}

const fn level(code: i64, label: &'static str) -> Level {
    Level { code, label }
}

const NO_YES: &[Level] = &[level(0, "No"), level(1, "Yes")];

/// Counted in the product columns but never compared
const NO_INTERNET: &[Level] = &[level(3, "No internet service")];

const PAYMENT_LEVELS: &[Level] = &[
    level(0, "Digital Wallet"),
    level(1, "Pulsa"),
    level(2, "Debit"),
    level(3, "Credit"),
];

/// A dashboard section: a categorical column and the levels compared in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    /// Column name in the decision table
    pub column: &'static str,
    /// Compared levels, in display order
    pub levels: &'static [Level],
    /// Levels shown in counts but left out of the comparison
    pub counted_only: &'static [Level],
}

impl Feature {
    pub fn level(&self, code: i64) -> Option<&Level> {
        self.levels.iter().find(|l| l.code == code)
    }

    /// Display label of any code of the column; unknown codes show as numbers
    pub fn category_label(&self, code: i64) -> String {
        self.levels
            .iter()
            .chain(self.counted_only)
            .find(|l| l.code == code)
            .map(|l| l.label.to_string())
            .unwrap_or_else(|| code.to_string())
    }

    /// Row/column labels of this feature's correlation block
    pub fn correlation_labels(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|l| format!("{}_{}", self.column, l.label))
            .chain(
                Churn::ALL
                    .iter()
                    .map(|c| format!("{}_{}", CHURN_LABEL, c.level_name())),
            )
            .collect()
    }

    /// File-name friendly form of the column name
    pub fn slug(&self) -> String {
        slugify(self.column)
    }
}

/// Lowercase, with runs of non-alphanumerics collapsed to `_`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Sections of the dashboard, in display order
pub static SEGMENT_FEATURES: [Feature; 7] = [
    Feature {
        column: CALL_CENTER,
        levels: NO_YES,
        counted_only: &[],
    },
    Feature {
        column: GAMES_PRODUCT,
        levels: NO_YES,
        counted_only: NO_INTERNET,
    },
    Feature {
        column: MUSIC_PRODUCT,
        levels: NO_YES,
        counted_only: NO_INTERNET,
    },
    Feature {
        column: EDUCATION_PRODUCT,
        levels: NO_YES,
        counted_only: NO_INTERNET,
    },
    Feature {
        column: USE_MYAPP,
        levels: NO_YES,
        counted_only: NO_INTERNET,
    },
    Feature {
        column: VIDEO_PRODUCT,
        levels: NO_YES,
        counted_only: NO_INTERNET,
    },
    Feature {
        column: PAYMENT_METHOD,
        levels: PAYMENT_LEVELS,
        counted_only: &[],
    },
];

/// Look up a dashboard section by column name
pub fn segment_feature(column: &str) -> Option<&'static Feature> {
    SEGMENT_FEATURES.iter().find(|f| f.column == column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_labels() {
        let call_center = segment_feature(CALL_CENTER).unwrap();
        assert_eq!(
            call_center.correlation_labels(),
            vec![
                "Call Center_No",
                "Call Center_Yes",
                "Churn Label_No",
                "Churn Label_Yes"
            ]
        );

        let payment = segment_feature(PAYMENT_METHOD).unwrap();
        let labels = payment.correlation_labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], "Payment Method_Digital Wallet");
        assert_eq!(labels[3], "Payment Method_Credit");
    }

    #[test]
    fn test_category_labels() {
        let games = segment_feature(GAMES_PRODUCT).unwrap();
        assert_eq!(games.category_label(1), "Yes");
        assert_eq!(games.category_label(3), "No internet service");
        assert!(games.level(3).is_none());

        let call_center = segment_feature(CALL_CENTER).unwrap();
        assert_eq!(call_center.category_label(3), "3");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Use MyApp"), "use_myapp");
        assert_eq!(slugify("CLTV (Predicted Thou. IDR)"), "cltv_predicted_thou_idr");
        assert_eq!(slugify("Digital Wallet"), "digital_wallet");
    }

    #[test]
    fn test_product_domain_skips_code_two() {
        for (column, domain) in CATEGORICAL_DOMAINS {
            if column.ends_with("Product") || column == USE_MYAPP {
                assert_eq!(domain, &[0, 1, 3], "{column}");
            }
        }
    }

    #[test]
    fn test_churn_codes() {
        for churn in Churn::ALL {
            assert_eq!(Churn::from_code(churn.code()), Some(churn));
        }
        assert_eq!(Churn::from_code(2), None);
    }
}
