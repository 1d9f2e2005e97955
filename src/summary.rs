//! Churn outcome counts per feature segment

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::error::{DashboardError, DegenerateSegment};
use crate::features::{Churn, Feature, Level, CHURN_LABEL};
use crate::filter::WorkingSubset;

const COUNT: &str = "count";

/// Loyal and churned customer counts of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChurnPair {
    pub loyal: usize,
    pub churned: usize,
}

impl ChurnPair {
    pub fn total(&self) -> usize {
        self.loyal + self.churned
    }

    pub fn get(&self, churn: Churn) -> usize {
        match churn {
            Churn::Loyal => self.loyal,
            Churn::Churned => self.churned,
        }
    }

    /// Share of churned customers in percent
    pub fn churn_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.churned as f64 / self.total() as f64 * 100.0
    }

    /// Accept the pair only when both outcomes are represented
    pub fn comparable(self, segment: impl Into<String>) -> SegmentOutcome {
        if self.loyal == 0 || self.churned == 0 {
            Err(DegenerateSegment {
                segment: segment.into(),
                loyal: self.loyal,
                churned: self.churned,
            })
        } else {
            Ok(self)
        }
    }
}

/// A comparable churn pair, or the reason it cannot be compared
pub type SegmentOutcome = std::result::Result<ChurnPair, DegenerateSegment>;

/// Churn counts per distinct value of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedCounts {
    pub column: String,
    /// Pairs keyed by the column's code, in ascending code order
    pub pairs: BTreeMap<i64, ChurnPair>,
}

impl GroupedCounts {
    pub fn pair(&self, code: i64) -> ChurnPair {
        self.pairs.get(&code).copied().unwrap_or_default()
    }

    pub fn count(&self, code: i64, churn: Churn) -> usize {
        self.pair(code).get(churn)
    }

    pub fn total(&self) -> usize {
        self.pairs.values().map(ChurnPair::total).sum()
    }

    pub fn max_count(&self) -> usize {
        self.pairs
            .values()
            .flat_map(|p| [p.loyal, p.churned])
            .max()
            .unwrap_or(0)
    }
}

/// Split of one compared level of a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSplit {
    pub level: Level,
    pub outcome: SegmentOutcome,
}

/// Everything a dashboard section shows about one feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub feature: Feature,
    pub grouped: GroupedCounts,
    pub splits: Vec<LevelSplit>,
}

impl SegmentSummary {
    /// Customers whose feature value is one of the compared levels
    pub fn compared_total(&self) -> usize {
        self.feature
            .levels
            .iter()
            .map(|l| self.grouped.pair(l.code).total())
            .sum()
    }

    /// Comparable pairs per level, failing on the first degenerate one
    pub fn require_comparable(&self) -> crate::Result<Vec<(Level, ChurnPair)>> {
        self.splits
            .iter()
            .map(|split| {
                split
                    .outcome
                    .clone()
                    .map(|pair| (split.level, pair))
                    .map_err(DashboardError::from)
            })
            .collect()
    }
}

/// Count rows per combination of `keys`
fn count_by(frame: &DataFrame, keys: &[&str]) -> crate::Result<Vec<(Vec<i64>, usize)>> {
    let grouped = frame
        .clone()
        .lazy()
        .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([len().cast(DataType::Int64).alias(COUNT)])
        .collect()?;

    let key_columns = keys
        .iter()
        .map(|k| grouped.column(k)?.i64())
        .collect::<PolarsResult<Vec<_>>>()?;
    let counts = grouped.column(COUNT)?.i64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for (i, count) in counts.into_no_null_iter().enumerate() {
        let key = key_columns
            .iter()
            .map(|c| c.get(i).unwrap_or_default())
            .collect();
        rows.push((key, count as usize));
    }
    Ok(rows)
}

/// Churn counts per distinct value of `column` in the subset
pub fn grouped_counts(subset: &WorkingSubset, column: &str) -> crate::Result<GroupedCounts> {
    let mut pairs: BTreeMap<i64, ChurnPair> = BTreeMap::new();
    for (key, count) in count_by(&subset.frame, &[column, CHURN_LABEL])? {
        let pair = pairs.entry(key[0]).or_default();
        match Churn::from_code(key[1]) {
            Some(Churn::Loyal) => pair.loyal += count,
            Some(Churn::Churned) => pair.churned += count,
            None => {}
        }
    }
    Ok(GroupedCounts {
        column: column.to_string(),
        pairs,
    })
}

/// Loyal vs churned over the whole subset
pub fn overall_pair(subset: &WorkingSubset) -> crate::Result<ChurnPair> {
    let mut pair = ChurnPair::default();
    for (key, count) in count_by(&subset.frame, &[CHURN_LABEL])? {
        match Churn::from_code(key[0]) {
            Some(Churn::Loyal) => pair.loyal += count,
            Some(Churn::Churned) => pair.churned += count,
            None => {}
        }
    }
    Ok(pair)
}

/// Grouped counts and per-level splits of `feature` for the subset
pub fn summarize_segment(subset: &WorkingSubset, feature: &Feature) -> crate::Result<SegmentSummary> {
    let grouped = grouped_counts(subset, feature.column)?;
    let splits = feature
        .levels
        .iter()
        .map(|level| LevelSplit {
            level: *level,
            outcome: grouped
                .pair(level.code)
                .comparable(format!("{} = {}", feature.column, level.label)),
        })
        .collect();

    Ok(SegmentSummary {
        feature: *feature,
        grouped,
        splits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use crate::features::{segment_feature, CALL_CENTER, PAYMENT_METHOD, SEGMENT_FEATURES};
    use crate::filter::{filter_by_location, LocationSelection};

    fn subset(jakarta: bool, bandung: bool) -> WorkingSubset {
        let table = fixtures::balanced_table();
        filter_by_location(&table, LocationSelection::new(jakarta, bandung)).unwrap()
    }

    #[test]
    fn test_grouped_counts() {
        let subset = subset(true, true);
        let grouped = grouped_counts(&subset, CALL_CENTER).unwrap();

        assert_eq!(grouped.count(0, Churn::Loyal), 2);
        assert_eq!(grouped.count(0, Churn::Churned), 2);
        assert_eq!(grouped.count(1, Churn::Loyal), 2);
        assert_eq!(grouped.count(1, Churn::Churned), 2);
        assert_eq!(grouped.count(3, Churn::Loyal), 0);
        assert_eq!(grouped.total(), subset.height());
        assert_eq!(grouped.pairs.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_split_counts_sum_to_subset() {
        for (jakarta, bandung) in [(true, true), (true, false), (false, true)] {
            let subset = subset(jakarta, bandung);
            for feature in SEGMENT_FEATURES.iter() {
                let summary = summarize_segment(&subset, feature).unwrap();
                let split_total: usize = summary
                    .splits
                    .iter()
                    .map(|s| match &s.outcome {
                        Ok(pair) => pair.total(),
                        Err(d) => d.loyal + d.churned,
                    })
                    .sum();
                assert_eq!(split_total, summary.compared_total());
                assert_eq!(summary.compared_total(), subset.height(), "{}", feature.column);
            }
        }
    }

    #[test]
    fn test_degenerate_split_is_reported() {
        // Jakarta customers paying by Digital Wallet are all loyal
        let subset = subset(true, false);
        let payment = segment_feature(PAYMENT_METHOD).unwrap();
        let summary = summarize_segment(&subset, payment).unwrap();

        let digital_wallet = &summary.splits[0];
        assert_eq!(digital_wallet.level.label, "Digital Wallet");
        assert_eq!(
            digital_wallet.outcome,
            Err(DegenerateSegment {
                segment: "Payment Method = Digital Wallet".to_string(),
                loyal: 1,
                churned: 0,
            })
        );
        assert!(matches!(
            summary.require_comparable(),
            Err(DashboardError::DegenerateSegment(_))
        ));
    }

    #[test]
    fn test_jakarta_only_scenario() {
        let table = fixtures::table(&[(0, 0, 0, 0, 0), (0, 0, 1, 1, 1), (0, 1, 1, 0, 2), (1, 1, 0, 1, 3)]);
        let subset = filter_by_location(&table, LocationSelection::new(true, false)).unwrap();
        assert_eq!(subset.height(), 3);

        let overall = overall_pair(&subset).unwrap();
        assert_eq!(overall, ChurnPair { loyal: 2, churned: 1 });

        for feature in SEGMENT_FEATURES.iter() {
            let summary = summarize_segment(&subset, feature).unwrap();
            assert_eq!(summary.grouped.total(), 3);
            let loyal: usize = summary.grouped.pairs.values().map(|p| p.loyal).sum();
            assert_eq!(loyal, 2);
        }
    }

    #[test]
    fn test_churn_rate() {
        let pair = ChurnPair { loyal: 3, churned: 1 };
        assert!((pair.churn_rate() - 25.0).abs() < 1e-9);
        assert_eq!(ChurnPair::default().churn_rate(), 0.0);
    }
}
