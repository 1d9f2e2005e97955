//! Location selection and the working subset it derives

use polars::prelude::*;
use tracing::debug;

use crate::data::DecisionTable;
use crate::error::DashboardError;
use crate::features::LOCATION;

/// Customer location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Jakarta,
    Bandung,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::Jakarta, Location::Bandung];

    pub fn code(self) -> i64 {
        match self {
            Location::Jakarta => 0,
            Location::Bandung => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Location::Jakarta => "Jakarta",
            Location::Bandung => "Bandung",
        }
    }
}

/// Which locations the analyst wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSelection {
    pub jakarta: bool,
    pub bandung: bool,
}

impl Default for LocationSelection {
    fn default() -> Self {
        Self {
            jakarta: true,
            bandung: true,
        }
    }
}

impl LocationSelection {
    pub fn new(jakarta: bool, bandung: bool) -> Self {
        Self { jakarta, bandung }
    }

    /// Selected locations in display order
    pub fn locations(&self) -> Vec<Location> {
        Location::ALL
            .into_iter()
            .filter(|l| match l {
                Location::Jakarta => self.jakarta,
                Location::Bandung => self.bandung,
            })
            .collect()
    }

    /// Fails with a configuration error when nothing is selected
    pub fn validate(&self) -> crate::Result<()> {
        if self.jakarta || self.bandung {
            Ok(())
        } else {
            Err(DashboardError::Configuration)
        }
    }

    /// Heading shown above the dashboard, e.g. "Jakarta and Bandung"
    pub fn caption(&self) -> String {
        self.locations()
            .iter()
            .map(|l| l.name())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

/// Decision table rows matching the current location selection
#[derive(Debug, Clone)]
pub struct WorkingSubset {
    pub selection: LocationSelection,
    pub frame: DataFrame,
}

impl WorkingSubset {
    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Derive the working subset for `selection`
///
/// Both locations selected returns the whole table; a single location keeps
/// only its rows. An empty selection is rejected before any row is touched.
pub fn filter_by_location(
    table: &DecisionTable,
    selection: LocationSelection,
) -> crate::Result<WorkingSubset> {
    selection.validate()?;

    let frame = match selection.locations().as_slice() {
        [location] => table
            .frame()
            .clone()
            .lazy()
            .filter(col(LOCATION).eq(lit(location.code())))
            .collect()?,
        _ => table.frame().clone(),
    };

    debug!(
        selection = %selection.caption(),
        rows = frame.height(),
        total = table.height(),
        "location filter applied"
    );
    Ok(WorkingSubset { selection, frame })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;

    fn locations_of(subset: &WorkingSubset) -> Vec<i64> {
        subset
            .frame
            .column(LOCATION)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_both_locations_return_full_table() {
        let table = fixtures::balanced_table();
        let subset = filter_by_location(&table, LocationSelection::default()).unwrap();
        assert_eq!(subset.height(), table.height());
        assert_eq!(subset.selection.caption(), "Jakarta and Bandung");
    }

    #[test]
    fn test_single_location_has_no_leakage() {
        let table = fixtures::balanced_table();
        for location in Location::ALL {
            let selection = LocationSelection::new(
                location == Location::Jakarta,
                location == Location::Bandung,
            );
            let subset = filter_by_location(&table, selection).unwrap();
            assert_eq!(subset.height(), 4);
            assert!(locations_of(&subset).iter().all(|&c| c == location.code()));
            assert_eq!(subset.selection.caption(), location.name());
        }
    }

    #[test]
    fn test_empty_selection_is_configuration_error() {
        let table = fixtures::balanced_table();
        let result = filter_by_location(&table, LocationSelection::new(false, false));
        assert!(matches!(result, Err(DashboardError::Configuration)));
    }

    #[test]
    fn test_location_codes() {
        assert_eq!(Location::from_code(0), Some(Location::Jakarta));
        assert_eq!(Location::from_code(1), Some(Location::Bandung));
        assert_eq!(Location::from_code(2), None);
    }
}
