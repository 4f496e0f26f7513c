//! Aggregation pipeline: pure transforms of (Dataset, Selection) into the
//! three chart views.
//!
//! ```text
//!                    ┌──────────────────┐
//!               ┌───►│ compute_time_    │──► TimeSeries   (line chart)
//!               │    │ series           │
//! Dataset ──┐   │    └──────────────────┘
//!           ├───┤    ┌──────────────────┐
//! Selection─┘   ├───►│ compute_         │──► Proportions  (pie chart)
//!               │    │ proportions      │
//!               │    └──────────────────┘
//!               │    ┌──────────────────┐
//!               └───►│ compute_ranking  │──► Ranking      (bar chart)
//!                    └──────────────────┘
//! ```
//!
//! Nothing here mutates its input, so running a pass twice with the same
//! arguments yields identical views.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::data::{Dataset, Record};
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::selection::Selection;

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeries {
    pub title: String,
    pub points: Vec<TimePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Recovered,
    Deceased,
    Active,
}

impl Category {
    /// Pie order; angles accumulate in this order.
    pub const ALL: [Category; 3] = [Category::Recovered, Category::Deceased, Category::Active];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Recovered => "Recovered",
            Category::Deceased => "Deceased",
            Category::Active => "Active",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Recovered => "#28a745",
            Category::Deceased => "#dc3545",
            Category::Active => "#ffc107",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub category: Category,
    pub label: &'static str,
    pub color: &'static str,
    /// Active may be negative when the source totals disagree.
    pub value: i128,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Slice {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proportions {
    pub title: String,
    pub as_of: NaiveDate,
    pub slices: Vec<Slice>,
    /// Values sum to zero: every angle is zero and the pie draws nothing.
    pub degenerate: bool,
}

impl Proportions {
    pub fn slice(&self, category: Category) -> Option<&Slice> {
        self.slices.iter().find(|s| s.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub region: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub title: String,
    pub year: i32,
    /// Descending by value, ties by region name. Also the bar chart's
    /// category axis order.
    pub entries: Vec<RankEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedViews {
    pub selection: Selection,
    pub time_series: TimeSeries,
    pub proportions: Proportions,
    pub ranking: Ranking,
}

/// Result of a full pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Recompute {
    Updated(DerivedViews),
    /// No rows for the selected region and year; sinks must stay as they are.
    Empty,
}

// =============================================================================
// Operations
// =============================================================================

/// Rows of the selected region and year, ascending by date.
///
/// Region rows are date-ordered, hence year-ordered, so the year is one
/// contiguous run.
pub fn selected_rows<'a>(ds: &'a Dataset, sel: &Selection) -> &'a [Record] {
    let rows = ds.region_rows(&sel.region);
    let start = rows.partition_point(|r| r.year() < sel.year);
    let end = rows.partition_point(|r| r.year() <= sel.year);
    &rows[start..end]
}

/// `None` signals an empty selection.
pub fn compute_time_series(ds: &Dataset, sel: &Selection) -> Option<TimeSeries> {
    time_series_from(selected_rows(ds, sel), sel)
}

fn time_series_from(rows: &[Record], sel: &Selection) -> Option<TimeSeries> {
    if rows.is_empty() {
        return None;
    }
    Some(TimeSeries {
        title: format!("Daily new cases in {}, {}", sel.region, sel.year),
        points: rows
            .iter()
            .map(|r| TimePoint {
                date: r.date,
                value: r.new_cases_or_zero(),
            })
            .collect(),
    })
}

/// Category split of the latest row in the selection. `None` when empty.
pub fn compute_proportions(ds: &Dataset, sel: &Selection) -> Option<Proportions> {
    proportions_from(selected_rows(ds, sel), sel)
}

fn proportions_from(rows: &[Record], sel: &Selection) -> Option<Proportions> {
    let last = rows.last()?;

    // Counts go up to u64::MAX; i128 holds any difference or sum of three.
    let recovered = i128::from(last.total_recovered);
    let deceased = i128::from(last.total_deaths);
    let active = i128::from(last.total_cases) - recovered - deceased;
    let values = [recovered, deceased, active];

    let (angles, degenerate) = pie_angles(&values);
    let slices = Category::ALL
        .iter()
        .zip(values.iter().zip(angles.iter()))
        .map(|(cat, (&value, &(start_angle, end_angle)))| Slice {
            category: *cat,
            label: cat.label(),
            color: cat.color(),
            value,
            start_angle,
            end_angle,
        })
        .collect();

    Some(Proportions {
        title: format!("Latest case proportions in {}", sel.region),
        as_of: last.date,
        slices,
        degenerate,
    })
}

/// Cumulative (start, end) angles over a full turn. A zero sum yields all
/// zeros and `true`.
pub fn pie_angles(values: &[i128]) -> (Vec<(f64, f64)>, bool) {
    let sum: i128 = values.iter().sum();
    if sum == 0 {
        return (vec![(0.0, 0.0); values.len()], true);
    }
    let mut out = Vec::with_capacity(values.len());
    let mut start = 0.0;
    for (i, v) in values.iter().enumerate() {
        let end = if i + 1 == values.len() {
            TAU
        } else {
            start + (*v as f64 / sum as f64) * TAU
        };
        out.push((start, end));
        start = end;
    }
    (out, false)
}

/// Peak running total per region in the selected year, highest first.
pub fn compute_ranking(ds: &Dataset, sel: &Selection, aggregate_region: &str) -> Ranking {
    let mut peaks: HashMap<&str, u64> = HashMap::new();
    for (region, rows) in ds.iter_regions() {
        if region == aggregate_region {
            continue;
        }
        let peak = rows
            .iter()
            .filter(|r| r.year() == sel.year)
            .map(|r| r.total_cases)
            .max();
        if let Some(p) = peak {
            peaks.insert(region, p);
        }
    }

    let mut entries: Vec<RankEntry> = peaks
        .into_iter()
        .map(|(region, value)| RankEntry {
            region: region.to_string(),
            value,
        })
        .collect();
    entries.sort_by(|a, b| {
        (Reverse(a.value), &a.region).cmp(&(Reverse(b.value), &b.region))
    });

    Ranking {
        title: format!("Total cases per region, {}", sel.year),
        year: sel.year,
        entries,
    }
}

/// Full pass over all three views.
pub fn recompute(ds: &Dataset, sel: &Selection, aggregate_region: &str) -> Recompute {
    let _scope = ProfileScope::with_context(
        "recompute",
        &[("region", v_str(&sel.region)), ("year", json!(sel.year))],
    );

    let rows = selected_rows(ds, sel);
    let (Some(time_series), Some(proportions)) =
        (time_series_from(rows, sel), proportions_from(rows, sel))
    else {
        log(
            Level::Debug,
            Domain::Pipeline,
            "recompute.empty",
            obj(&[("region", v_str(&sel.region)), ("year", json!(sel.year))]),
        );
        return Recompute::Empty;
    };
    let ranking = compute_ranking(ds, sel, aggregate_region);

    if proportions.degenerate {
        log(
            Level::Warn,
            Domain::Pipeline,
            "proportions.degenerate",
            obj(&[
                ("region", v_str(&sel.region)),
                ("as_of", v_str(&proportions.as_of.to_string())),
            ]),
        );
    }

    Recompute::Updated(DerivedViews {
        selection: sel.clone(),
        time_series,
        proportions,
        ranking,
    })
}
