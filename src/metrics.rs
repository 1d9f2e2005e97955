//! Held-out evaluation of the churn classifier

use linfa::dataset::Records;
use linfa::traits::PredictInplace;
use linfa::Dataset;
use ndarray::{Array1, Array2, Axis, Ix1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::data::DecisionTable;
use crate::features::Churn;
use crate::model::predict_classes;

/// Train/test partition of the decision table
#[derive(Debug)]
pub struct HoldoutSplit {
    pub train: Dataset<f64, usize, Ix1>,
    pub test: Dataset<f64, usize, Ix1>,
}

/// Stratified split holding out `test_ratio` of every class
///
/// The test partition has `ceil(test_ratio * n)` rows, apportioned across
/// classes by largest remainder. Rows are shuffled with a seeded ChaCha RNG
/// so the split is reproducible.
pub fn stratified_split(
    records: &Array2<f64>,
    targets: &Array1<usize>,
    test_ratio: f64,
    seed: u64,
) -> HoldoutSplit {
    let n = targets.len();
    let test_size = ((test_ratio.clamp(0.0, 1.0) * n as f64).ceil() as usize).min(n);

    let mut classes: Vec<usize> = targets.iter().copied().collect();
    classes.sort_unstable();
    classes.dedup();

    let members: Vec<Vec<usize>> = classes
        .iter()
        .map(|class| (0..n).filter(|&i| targets[i] == *class).collect())
        .collect();

    // Largest-remainder apportionment of the test rows
    let quotas: Vec<f64> = members
        .iter()
        .map(|m| test_size as f64 * m.len() as f64 / n.max(1) as f64)
        .collect();
    let mut allotted: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let mut by_remainder: Vec<usize> = (0..classes.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    let mut missing = test_size.saturating_sub(allotted.iter().sum());
    for &class in by_remainder.iter().cycle().take(classes.len() * 2) {
        if missing == 0 {
            break;
        }
        if allotted[class] < members[class].len() {
            allotted[class] += 1;
            missing -= 1;
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(n - test_size);
    let mut test_rows = Vec::with_capacity(test_size);
    for (mut rows, take) in members.into_iter().zip(allotted) {
        rows.shuffle(&mut rng);
        test_rows.extend_from_slice(&rows[..take]);
        train_rows.extend_from_slice(&rows[take..]);
    }
    train_rows.sort_unstable();
    test_rows.sort_unstable();

    let subset = |rows: &[usize]| {
        Dataset::new(records.select(Axis(0), rows), targets.select(Axis(0), rows))
    };
    HoldoutSplit {
        train: subset(&train_rows),
        test: subset(&test_rows),
    }
}

/// Binary confusion counts with Churn as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(truth: &Array1<usize>, predicted: &Array1<usize>) -> Self {
        let positive = Churn::Churned.code() as usize;
        let mut counts = Self::default();
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            match (t == positive, p == positive) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Counts with the roles of the two classes swapped
    pub fn flipped(&self) -> Self {
        Self {
            true_positive: self.true_negative,
            false_positive: self.false_negative,
            true_negative: self.true_positive,
            false_negative: self.false_positive,
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }

    /// Area under the ROC curve of hard predictions: `(TPR + TNR) / 2`.
    /// Undefined when the truth holds only one class.
    pub fn roc_auc(&self) -> Option<f64> {
        let positives = self.true_positive + self.false_negative;
        let negatives = self.true_negative + self.false_positive;
        if positives == 0 || negatives == 0 {
            return None;
        }
        let tpr = self.true_positive as f64 / positives as f64;
        let tnr = self.true_negative as f64 / negatives as f64;
        Some((tpr + tnr) / 2.0)
    }
}

/// Zero when the denominator is empty
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Aggregate scores of one partition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: Option<f64>,
}

impl From<ConfusionCounts> for BinaryMetrics {
    fn from(counts: ConfusionCounts) -> Self {
        Self {
            accuracy: counts.accuracy(),
            f1: counts.f1(),
            precision: counts.precision(),
            recall: counts.recall(),
            roc_auc: counts.roc_auc(),
        }
    }
}

/// One row of a classification report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores plus macro and support-weighted averages
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ReportRow>,
    pub accuracy: f64,
    pub macro_avg: ReportRow,
    pub weighted_avg: ReportRow,
}

impl ClassificationReport {
    pub fn from_counts(counts: &ConfusionCounts) -> Self {
        let per_class = |label: &str, c: ConfusionCounts| ReportRow {
            label: label.to_string(),
            precision: c.precision(),
            recall: c.recall(),
            f1: c.f1(),
            support: c.true_positive + c.false_negative,
        };
        let classes = vec![
            per_class("0", counts.flipped()),
            per_class("1", *counts),
        ];

        let support: usize = classes.iter().map(|r| r.support).sum();
        let average = |label: &str, weight: &dyn Fn(&ReportRow) -> f64| {
            let total: f64 = classes.iter().map(|r| weight(r)).sum();
            let mean = |score: fn(&ReportRow) -> f64| {
                if total == 0.0 {
                    0.0
                } else {
                    classes.iter().map(|r| score(r) * weight(r)).sum::<f64>() / total
                }
            };
            ReportRow {
                label: label.to_string(),
                precision: mean(|r| r.precision),
                recall: mean(|r| r.recall),
                f1: mean(|r| r.f1),
                support,
            }
        };
        let macro_avg = average("macro avg", &|_| 1.0);
        let weighted_avg = average("weighted avg", &|r| r.support as f64);

        Self {
            accuracy: counts.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Class and average rows, in display order
    pub fn rows(&self) -> Vec<&ReportRow> {
        self.classes
            .iter()
            .chain([&self.macro_avg, &self.weighted_avg])
            .collect()
    }
}

/// Scores of the classifier on both partitions of the held-out split
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    pub train: BinaryMetrics,
    pub test: BinaryMetrics,
    pub report: ClassificationReport,
    pub train_size: usize,
    pub test_size: usize,
}

fn score<M>(model: &M, dataset: &Dataset<f64, usize, Ix1>) -> ConfusionCounts
where
    M: PredictInplace<Array2<f64>, Array1<usize>>,
{
    let predicted = predict_classes(model, dataset.records());
    ConfusionCounts::from_predictions(dataset.targets(), &predicted)
}

/// Evaluate `model` on a stratified split of the decision table
///
/// # Arguments
/// * `model` - Any classifier predicting class indices from the 11 features
/// * `table` - Decision table providing records and churn labels
/// * `test_ratio` - Share of rows held out, in (0, 1)
/// * `seed` - Seed of the split shuffle
///
/// # Returns
/// * `ModelEvaluation` with train and test scores and the test classification report
pub fn evaluate_model<M>(
    model: &M,
    table: &DecisionTable,
    test_ratio: f64,
    seed: u64,
) -> crate::Result<ModelEvaluation>
where
    M: PredictInplace<Array2<f64>, Array1<usize>>,
{
    let records = table.feature_matrix()?;
    let targets = table.churn_labels()?;
    let split = stratified_split(&records, &targets, test_ratio, seed);
    debug!(
        train = split.train.nsamples(),
        test = split.test.nsamples(),
        "held-out split"
    );

    let train_counts = score(model, &split.train);
    let test_counts = score(model, &split.test);
    if test_counts.roc_auc().is_none() {
        warn!("test partition holds a single class; ROC AUC is undefined");
    }

    Ok(ModelEvaluation {
        train: train_counts.into(),
        test: test_counts.into(),
        report: ClassificationReport::from_counts(&test_counts),
        train_size: split.train.nsamples(),
        test_size: split.test.nsamples(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use crate::model::fixtures::short_tenure_forest;
    use ndarray::array;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_confusion_metrics() {
        let truth = array![1, 1, 1, 0, 0, 0, 0, 1];
        let predicted = array![1, 1, 0, 0, 0, 1, 0, 1];
        let counts = ConfusionCounts::from_predictions(&truth, &predicted);

        assert_eq!(
            counts,
            ConfusionCounts {
                true_positive: 3,
                false_positive: 1,
                true_negative: 3,
                false_negative: 1,
            }
        );
        assert_close(counts.accuracy(), 0.75);
        assert_close(counts.precision(), 0.75);
        assert_close(counts.recall(), 0.75);
        assert_close(counts.f1(), 0.75);
        assert_close(counts.roc_auc().unwrap(), 0.75);
    }

    #[test]
    fn test_empty_denominators() {
        let truth = array![0, 0];
        let predicted = array![0, 0];
        let counts = ConfusionCounts::from_predictions(&truth, &predicted);
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.recall(), 0.0);
        assert_eq!(counts.roc_auc(), None);
        assert_close(counts.accuracy(), 1.0);
    }

    #[test]
    fn test_classification_report() {
        let truth = array![0, 0, 0, 1];
        let predicted = array![0, 0, 1, 1];
        let counts = ConfusionCounts::from_predictions(&truth, &predicted);
        let report = ClassificationReport::from_counts(&counts);

        assert_eq!(report.classes[0].support, 3);
        assert_eq!(report.classes[1].support, 1);
        assert_close(report.classes[0].precision, 1.0);
        assert_close(report.classes[0].recall, 2.0 / 3.0);
        assert_close(report.classes[1].precision, 0.5);
        assert_close(report.classes[1].recall, 1.0);
        assert_close(report.macro_avg.precision, 0.75);
        assert_close(report.weighted_avg.recall, (3.0 * 2.0 / 3.0 + 1.0) / 4.0);
        assert_close(report.accuracy, 0.75);
        assert_eq!(report.rows().len(), 4);
    }

    #[test]
    fn test_stratified_split_is_reproducible() {
        let records = Array2::from_shape_fn((10, 11), |(i, j)| (i * 11 + j) as f64);
        let targets = array![0, 0, 0, 0, 0, 0, 1, 1, 1, 1];

        let first = stratified_split(&records, &targets, 0.2, 42);
        let second = stratified_split(&records, &targets, 0.2, 42);

        assert_eq!(first.test.nsamples(), 2);
        assert_eq!(first.train.nsamples(), 8);
        assert_eq!(first.test.records(), second.test.records());

        // One row of each class is held out
        let mut held_out: Vec<usize> = first.test.targets().to_vec();
        held_out.sort_unstable();
        assert_eq!(held_out, vec![0, 1]);
    }

    #[test]
    fn test_split_rounds_test_size_up() {
        let records = Array2::zeros((7, 11));
        let targets = array![0, 0, 0, 0, 1, 1, 1];
        let split = stratified_split(&records, &targets, 0.2, 7);
        assert_eq!(split.test.nsamples(), 2);
        assert_eq!(split.train.nsamples() + split.test.nsamples(), 7);
    }

    #[test]
    fn test_evaluate_model() {
        let table = fixtures::balanced_table();
        let evaluation = evaluate_model(&short_tenure_forest(), &table, 0.25, 42).unwrap();

        assert_eq!(evaluation.test_size, 2);
        assert_eq!(evaluation.train_size, 6);
        assert!((0.0..=1.0).contains(&evaluation.train.accuracy));
        assert!((0.0..=1.0).contains(&evaluation.test.accuracy));
        assert_eq!(evaluation.report.classes[0].support + evaluation.report.classes[1].support, 2);
    }
}
