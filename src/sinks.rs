use serde::Serialize;

use crate::pipeline::{DerivedViews, Proportions, Ranking, TimeSeries};
use crate::selection::Selection;

/// One chart's data plus the generation it was written in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sink<T> {
    value: Option<T>,
    generation: u64,
}

impl<T> Default for Sink<T> {
    fn default() -> Self {
        Self {
            value: None,
            generation: 0,
        }
    }
}

impl<T> Sink<T> {
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn overwrite(&mut self, value: T, generation: u64) {
        self.value = Some(value);
        self.generation = generation;
    }
}

/// The three containers the rendering layer reads.
///
/// Writes only happen through [`ViewSinks::replace`], which takes a complete
/// set of views, so a reader never sees a mix of two selections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewSinks {
    selection: Option<Selection>,
    time_series: Sink<TimeSeries>,
    proportions: Sink<Proportions>,
    ranking: Sink<Ranking>,
    generation: u64,
}

impl ViewSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, views: DerivedViews) {
        let generation = self.generation + 1;
        self.selection = Some(views.selection);
        self.time_series.overwrite(views.time_series, generation);
        self.proportions.overwrite(views.proportions, generation);
        self.ranking.overwrite(views.ranking, generation);
        self.generation = generation;
    }

    /// Selection the current contents were computed for.
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn time_series(&self) -> Option<&TimeSeries> {
        self.time_series.get()
    }

    pub fn proportions(&self) -> Option<&Proportions> {
        self.proportions.get()
    }

    pub fn ranking(&self) -> Option<&Ranking> {
        self.ranking.get()
    }

    /// Number of completed writes; 0 before the first pass.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_populated(&self) -> bool {
        self.generation > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Category, Slice, TimePoint};
    use chrono::NaiveDate;

    fn views(region: &str, value: u64) -> DerivedViews {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        DerivedViews {
            selection: Selection {
                region: region.to_string(),
                year: 2021,
            },
            time_series: TimeSeries {
                title: region.to_string(),
                points: vec![TimePoint { date, value }],
            },
            proportions: Proportions {
                title: region.to_string(),
                as_of: date,
                slices: vec![Slice {
                    category: Category::Active,
                    label: "Active",
                    color: "#ffc107",
                    value: i128::from(value),
                    start_angle: 0.0,
                    end_angle: std::f64::consts::TAU,
                }],
                degenerate: false,
            },
            ranking: Ranking {
                title: region.to_string(),
                year: 2021,
                entries: vec![],
            },
        }
    }

    #[test]
    fn test_empty_until_first_replace() {
        let sinks = ViewSinks::new();
        assert!(!sinks.is_populated());
        assert!(sinks.time_series().is_none());
        assert!(sinks.selection().is_none());
    }

    #[test]
    fn test_replace_overwrites_every_view_in_one_generation() {
        let mut sinks = ViewSinks::new();
        sinks.replace(views("A", 1));
        sinks.replace(views("B", 2));
        assert_eq!(sinks.generation(), 2);
        assert_eq!(sinks.selection().unwrap().region, "B");
        assert_eq!(sinks.time_series().unwrap().title, "B");
        assert_eq!(sinks.proportions().unwrap().title, "B");
        assert_eq!(sinks.ranking().unwrap().title, "B");
        assert_eq!(sinks.time_series.generation(), 2);
        assert_eq!(sinks.ranking.generation(), 2);
    }
}
