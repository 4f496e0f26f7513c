use serde::Serialize;

use crate::data::Dataset;
use crate::error::InvalidSelectionError;

/// Legal values for each selection field, taken from the dataset at load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionOptions {
    pub regions: Vec<String>,
    pub years: Vec<i32>,
}

impl SelectionOptions {
    pub fn from_dataset(ds: &Dataset) -> Self {
        Self {
            regions: ds.regions().into_iter().map(str::to_string).collect(),
            years: ds.years().to_vec(),
        }
    }

    /// Preferred region if present, else the first; latest year.
    pub fn default_selection(
        &self,
        preferred_region: &str,
    ) -> Result<Selection, InvalidSelectionError> {
        let region = if self.has_region(preferred_region) {
            preferred_region.to_string()
        } else {
            self.regions.first().cloned().ok_or(InvalidSelectionError::NoData)?
        };
        let year = *self.years.last().ok_or(InvalidSelectionError::NoData)?;
        Ok(Selection { region, year })
    }

    pub fn has_region(&self, region: &str) -> bool {
        self.regions.binary_search_by(|r| r.as_str().cmp(region)).is_ok()
    }

    pub fn has_year(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Selection {
    pub region: String,
    pub year: i32,
}

/// Current selection plus the values it may take.
#[derive(Debug, Clone)]
pub struct SelectionState {
    options: SelectionOptions,
    current: Selection,
}

impl SelectionState {
    pub fn new(
        options: SelectionOptions,
        preferred_region: &str,
    ) -> Result<Self, InvalidSelectionError> {
        let current = options.default_selection(preferred_region)?;
        Ok(Self { options, current })
    }

    pub fn current(&self) -> &Selection {
        &self.current
    }

    pub fn options(&self) -> &SelectionOptions {
        &self.options
    }

    /// Returns whether the value changed. Illegal values leave state untouched.
    pub fn set_region(&mut self, region: &str) -> Result<bool, InvalidSelectionError> {
        if !self.options.has_region(region) {
            return Err(InvalidSelectionError::UnknownRegion(region.to_string()));
        }
        if self.current.region == region {
            return Ok(false);
        }
        self.current.region = region.to_string();
        Ok(true)
    }

    pub fn set_year(&mut self, year: i32) -> Result<bool, InvalidSelectionError> {
        if !self.options.has_year(year) {
            return Err(InvalidSelectionError::UnknownYear(year));
        }
        if self.current.year == year {
            return Ok(false);
        }
        self.current.year = year;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SelectionOptions {
        SelectionOptions {
            regions: vec!["Aceh".to_string(), "Bali".to_string(), "Indonesia".to_string()],
            years: vec![2020, 2021, 2022],
        }
    }

    #[test]
    fn test_default_prefers_configured_region_and_latest_year() {
        let sel = options().default_selection("Indonesia").unwrap();
        assert_eq!(
            sel,
            Selection {
                region: "Indonesia".to_string(),
                year: 2022,
            }
        );
    }

    #[test]
    fn test_default_falls_back_to_first_region() {
        let sel = options().default_selection("Atlantis").unwrap();
        assert_eq!(sel.region, "Aceh");
    }

    #[test]
    fn test_default_on_empty_options() {
        let empty = SelectionOptions { regions: vec![], years: vec![] };
        assert_eq!(empty.default_selection("Indonesia"), Err(InvalidSelectionError::NoData));
    }

    #[test]
    fn test_invalid_values_rejected_without_change() {
        let mut state = SelectionState::new(options(), "Bali").unwrap();
        assert_eq!(
            state.set_region("Atlantis"),
            Err(InvalidSelectionError::UnknownRegion("Atlantis".to_string()))
        );
        assert_eq!(state.set_year(1999), Err(InvalidSelectionError::UnknownYear(1999)));
        assert_eq!(state.current().region, "Bali");
        assert_eq!(state.current().year, 2022);
    }

    #[test]
    fn test_set_reports_change() {
        let mut state = SelectionState::new(options(), "Bali").unwrap();
        assert_eq!(state.set_region("Bali"), Ok(false));
        assert_eq!(state.set_region("Aceh"), Ok(true));
        assert_eq!(state.set_year(2020), Ok(true));
        assert_eq!(
            state.current(),
            &Selection {
                region: "Aceh".to_string(),
                year: 2020,
            }
        );
    }
}
