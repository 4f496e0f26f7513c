//! Dataset store: the normalized daily table, loaded once and never mutated.

pub mod manifest;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use crate::error::SchemaError;
use crate::logging::{log, obj, v_str, Domain, Level};
use serde_json::json;

pub const DATE_COLUMN: &str = "date";
pub const REGION_COLUMN: &str = "location";
pub const NEW_CASES_COLUMN: &str = "new cases";
pub const NEW_DEATHS_COLUMN: &str = "new deaths";
pub const NEW_RECOVERED_COLUMN: &str = "new recovered";
pub const TOTAL_DEATHS_COLUMN: &str = "total deaths";
pub const TOTAL_RECOVERED_COLUMN: &str = "total recovered";

/// Columns the dashboard reads, in normalized (trimmed, lowercase) form.
pub const EXPECTED_COLUMNS: [&str; 7] = [
    DATE_COLUMN,
    REGION_COLUMN,
    NEW_CASES_COLUMN,
    NEW_DEATHS_COLUMN,
    NEW_RECOVERED_COLUMN,
    TOTAL_DEATHS_COLUMN,
    TOTAL_RECOVERED_COLUMN,
];

/// Carried on each record but never charted; an unreadable cell reads as null
/// instead of failing the load.
pub const LENIENT_COUNT_COLUMNS: [&str; 2] = [NEW_DEATHS_COLUMN, NEW_RECOVERED_COLUMN];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// One input row before the running total is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub region: String,
    pub new_cases: Option<u64>,
    pub new_deaths: Option<u64>,
    pub new_recovered: Option<u64>,
    pub total_deaths: Option<u64>,
    pub total_recovered: Option<u64>,
}

impl DailyRow {
    /// Row with only a case count; handy for fixtures.
    pub fn cases(date: NaiveDate, region: &str, new_cases: Option<u64>) -> Self {
        Self {
            date,
            region: region.to_string(),
            new_cases,
            new_deaths: None,
            new_recovered: None,
            total_deaths: None,
            total_recovered: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub date: NaiveDate,
    pub region: String,
    pub new_cases: Option<u64>,
    pub new_deaths: Option<u64>,
    pub new_recovered: Option<u64>,
    /// Running sum of `new_cases` for the region, ascending by date.
    pub total_cases: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
}

impl Record {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn new_cases_or_zero(&self) -> u64 {
        self.new_cases.unwrap_or(0)
    }
}

/// Immutable table of records, grouped by region and ascending by date
/// within each region.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    by_region: BTreeMap<String, Range<usize>>,
    years: Vec<i32>,
}

impl Dataset {
    pub fn load_path(path: &Path) -> Result<Self, SchemaError> {
        let file = File::open(path)?;
        let ds = Self::from_reader(file)?;
        log(
            Level::Info,
            Domain::Data,
            "dataset.loaded",
            obj(&[
                ("path", v_str(&path.display().to_string())),
                ("rows", json!(ds.len())),
                ("regions", json!(ds.regions().len())),
                ("years", json!(ds.years())),
            ]),
        );
        Ok(ds)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SchemaError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header = normalize_header(rdr.headers()?.iter());
        let cols = ColumnMap::resolve(&header)?;

        let mut rows = Vec::new();
        let mut nulled: Vec<(u64, &'static str)> = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            let (row, dropped) = cols
                .parse(&record)
                .map_err(|reason| SchemaError::BadRow { line, reason })?;
            nulled.extend(dropped.into_iter().map(|name| (line, name)));
            rows.push((line, row));
        }
        if let Some((first_line, first_column)) = nulled.first() {
            log(
                Level::Warn,
                Domain::Data,
                "dataset.cells_nulled",
                obj(&[
                    ("cells", json!(nulled.len())),
                    ("first_line", json!(first_line)),
                    ("first_column", v_str(first_column)),
                ]),
            );
        }
        Self::build(rows)
    }

    /// Build from already-typed rows, numbered from 1 for error reports.
    pub fn from_daily(rows: Vec<DailyRow>) -> Result<Self, SchemaError> {
        Self::build(
            rows.into_iter()
                .enumerate()
                .map(|(i, r)| (i as u64 + 1, r))
                .collect(),
        )
    }

    fn build(mut rows: Vec<(u64, DailyRow)>) -> Result<Self, SchemaError> {
        // Stable, so equal keys keep input order and the duplicate report
        // points at the later line.
        rows.sort_by(|(_, a), (_, b)| a.region.cmp(&b.region).then(a.date.cmp(&b.date)));

        let mut records: Vec<Record> = Vec::with_capacity(rows.len());
        let mut by_region: BTreeMap<String, Range<usize>> = BTreeMap::new();
        let mut years = BTreeSet::new();
        let mut running = 0u64;

        for (line, row) in rows {
            let same_region = records.last().is_some_and(|prev| prev.region == row.region);
            if same_region {
                let prev = &records[records.len() - 1];
                if prev.date == row.date {
                    return Err(SchemaError::DuplicateRow {
                        line,
                        region: row.region,
                        date: row.date,
                    });
                }
            } else {
                running = 0;
            }
            running = running.saturating_add(row.new_cases.unwrap_or(0));

            let idx = records.len();
            by_region
                .entry(row.region.clone())
                .and_modify(|r| r.end = idx + 1)
                .or_insert(idx..idx + 1);
            years.insert(row.date.year());
            records.push(Record {
                date: row.date,
                region: row.region,
                new_cases: row.new_cases,
                new_deaths: row.new_deaths,
                new_recovered: row.new_recovered,
                total_cases: running,
                total_deaths: row.total_deaths.unwrap_or(0),
                total_recovered: row.total_recovered.unwrap_or(0),
            });
        }

        Ok(Self {
            records,
            by_region,
            years: years.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct regions, sorted.
    pub fn regions(&self) -> Vec<&str> {
        self.by_region.keys().map(String::as_str).collect()
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn has_region(&self, region: &str) -> bool {
        self.by_region.contains_key(region)
    }

    pub fn has_year(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    /// All records of one region, ascending by date. Empty if unknown.
    pub fn region_rows(&self, region: &str) -> &[Record] {
        match self.by_region.get(region) {
            Some(range) => &self.records[range.clone()],
            None => &[],
        }
    }

    /// Iterate regions with their date-ordered rows.
    pub fn iter_regions(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.by_region
            .iter()
            .map(|(name, range)| (name.as_str(), &self.records[range.clone()]))
    }
}

/// Trim and lowercase header cells.
pub fn normalize_header<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    cells.map(|c| c.trim().to_lowercase()).collect()
}

struct ColumnMap {
    date: usize,
    region: usize,
    new_cases: Option<usize>,
    new_deaths: Option<usize>,
    new_recovered: Option<usize>,
    total_deaths: Option<usize>,
    total_recovered: Option<usize>,
}

impl ColumnMap {
    fn resolve(header: &[String]) -> Result<Self, SchemaError> {
        let find = |name: &str| header.iter().position(|h| h == name);
        Ok(Self {
            date: find(DATE_COLUMN).ok_or(SchemaError::MissingColumn(DATE_COLUMN))?,
            region: find(REGION_COLUMN).ok_or(SchemaError::MissingColumn(REGION_COLUMN))?,
            new_cases: find(NEW_CASES_COLUMN),
            new_deaths: find(NEW_DEATHS_COLUMN),
            new_recovered: find(NEW_RECOVERED_COLUMN),
            total_deaths: find(TOTAL_DEATHS_COLUMN),
            total_recovered: find(TOTAL_RECOVERED_COLUMN),
        })
    }

    /// The row, plus the lenient columns whose cell was unreadable and nulled.
    fn parse(
        &self,
        rec: &csv::StringRecord,
    ) -> Result<(DailyRow, Vec<&'static str>), String> {
        let field = |idx: usize| rec.get(idx).unwrap_or("");
        let count = |idx: Option<usize>, name: &str| match idx {
            Some(i) => parse_count(field(i)).map_err(|e| format!("{}: {}", name, e)),
            None => Ok(None),
        };
        let mut dropped = Vec::new();
        let mut lenient = |idx: Option<usize>, name: &'static str| {
            count(idx, name).unwrap_or_else(|_| {
                dropped.push(name);
                None
            })
        };
        let new_deaths = lenient(self.new_deaths, NEW_DEATHS_COLUMN);
        let new_recovered = lenient(self.new_recovered, NEW_RECOVERED_COLUMN);

        let region = field(self.region);
        if region.is_empty() {
            return Err("empty location".to_string());
        }
        let row = DailyRow {
            date: parse_date(field(self.date))?,
            region: region.to_string(),
            new_cases: count(self.new_cases, NEW_CASES_COLUMN)?,
            new_deaths,
            new_recovered,
            total_deaths: count(self.total_deaths, TOTAL_DEATHS_COLUMN)?,
            total_recovered: count(self.total_recovered, TOTAL_RECOVERED_COLUMN)?,
        };
        Ok((row, dropped))
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    // Tolerate a trailing time component, e.g. "2021-01-01 00:00:00".
    let day = s.split_whitespace().next().unwrap_or("");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .ok_or_else(|| format!("bad date: {:?}", s))
}

/// Parse a non-negative count. Blank and NaN-like cells are null.
pub fn parse_count(s: &str) -> Result<Option<u64>, String> {
    let s = s.trim();
    if s.is_empty() || matches!(s.to_lowercase().as_str(), "nan" | "null" | "na") {
        return Ok(None);
    }
    if let Ok(n) = s.parse::<u64>() {
        return Ok(Some(n));
    }
    match s.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
        Ok(f) if f < 0.0 => Err(format!("negative count {}", s)),
        _ => Err(format!("bad count {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021-03-04").unwrap(), d(2021, 3, 4));
        assert_eq!(parse_date("3/4/2021").unwrap(), d(2021, 3, 4));
        assert_eq!(parse_date("2021-03-04 00:00:00").unwrap(), d(2021, 3, 4));
        assert!(parse_date("04.03.2021").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_parse_count_nulls_and_floats() {
        assert_eq!(parse_count("").unwrap(), None);
        assert_eq!(parse_count("NaN").unwrap(), None);
        assert_eq!(parse_count("12").unwrap(), Some(12));
        assert_eq!(parse_count("12.0").unwrap(), Some(12));
        assert!(parse_count("-3").is_err());
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("abc").is_err());
    }

    #[test]
    fn test_normalize_header() {
        let h = normalize_header([" Date ", "Location", "New Cases"].into_iter());
        assert_eq!(h, vec!["date", "location", "new cases"]);
    }

    #[test]
    fn test_cumulative_sum_per_region_sorted() {
        let ds = Dataset::from_daily(vec![
            DailyRow::cases(d(2021, 1, 3), "A", Some(1)),
            DailyRow::cases(d(2021, 1, 1), "B", Some(10)),
            DailyRow::cases(d(2021, 1, 1), "A", Some(5)),
            DailyRow::cases(d(2021, 1, 2), "A", None),
        ])
        .unwrap();
        let a: Vec<u64> = ds.region_rows("A").iter().map(|r| r.total_cases).collect();
        assert_eq!(a, vec![5, 5, 6]);
        assert_eq!(ds.region_rows("B")[0].total_cases, 10);
        assert!(ds.region_rows("C").is_empty());
    }

    #[test]
    fn test_duplicate_row_rejected() {
        let err = Dataset::from_daily(vec![
            DailyRow::cases(d(2021, 1, 1), "A", Some(1)),
            DailyRow::cases(d(2021, 1, 1), "A", Some(2)),
        ])
        .unwrap_err();
        match err {
            SchemaError::DuplicateRow { line, region, .. } => {
                assert_eq!(line, 2);
                assert_eq!(region, "A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_regions_and_years_enumerated() {
        let ds = Dataset::from_daily(vec![
            DailyRow::cases(d(2022, 1, 1), "Bali", Some(1)),
            DailyRow::cases(d(2020, 6, 1), "Aceh", Some(1)),
            DailyRow::cases(d(2021, 6, 1), "Aceh", Some(1)),
        ])
        .unwrap();
        assert_eq!(ds.regions(), vec!["Aceh", "Bali"]);
        assert_eq!(ds.years(), &[2020, 2021, 2022]);
        assert!(ds.has_year(2021));
        assert!(!ds.has_year(2019));
    }

    #[test]
    fn test_from_reader_missing_date_column() {
        let csv = "Location,New Cases\nA,1\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn("date")));
    }

    #[test]
    fn test_unreadable_lenient_counts_read_as_null() {
        let csv = "Date,Location,New Cases,New Deaths,New Recovered,Total Deaths,Total Recovered\n\
                   2021-01-01,A,4,-1,x,1,2\n\
                   2021-01-02,A,3,0,1,1,3\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let rows = ds.region_rows("A");
        assert_eq!(rows[0].new_deaths, None);
        assert_eq!(rows[0].new_recovered, None);
        assert_eq!(rows[0].total_recovered, 2);
        assert_eq!(rows[1].new_recovered, Some(1));
        assert_eq!(rows[1].total_cases, 7);

        let strict = "Date,Location,New Cases,Total Deaths\n2021-01-01,A,4,-1\n";
        let err = Dataset::from_reader(strict.as_bytes()).unwrap_err();
        assert!(matches!(err, SchemaError::BadRow { line: 2, .. }));
    }

    #[test]
    fn test_from_reader_normalizes_header() {
        let csv = " DATE , Location ,New Cases,Total Deaths,Total Recovered\n\
                   2021-01-01,A,5,1,2\n\
                   2021-01-02,A,,1,3\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let rows = ds.region_rows("A");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].new_cases, None);
        assert_eq!(rows[1].total_cases, 5);
        assert_eq!(rows[1].total_recovered, 3);
    }

    #[test]
    fn test_from_reader_bad_row_reports_line() {
        let csv = "date,location,new cases\n2021-01-01,A,1\nnot-a-date,A,2\n";
        match Dataset::from_reader(csv.as_bytes()).unwrap_err() {
            SchemaError::BadRow { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("bad date"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
