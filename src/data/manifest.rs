//! Fingerprint and quality report for an input file.
//!
//! Unlike [`super::Dataset::load_path`], analysis never fails on a bad row:
//! it counts and describes problems so the file can be fixed upstream.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{
    normalize_header, parse_count, parse_date, DATE_COLUMN, EXPECTED_COLUMNS,
    LENIENT_COUNT_COLUMNS, REGION_COLUMN,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub bad_rows: u64,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub regions: Vec<String>,
    pub columns: Vec<String>,
    /// Regions whose rows are not date-ascending in file order. Running
    /// totals are still correct since the loader sorts before summing.
    pub unordered_regions: Vec<String>,
    pub warnings: Vec<String>,
    pub ttl_secs: u64,
    pub stale: bool,
    pub generated_at_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub missing: Vec<String>,
    pub ok: bool,
    pub message: String,
}

pub fn analyze_csv(path: &Path, ttl_secs: u64, now_ts: u64) -> Result<DatasetManifest, String> {
    let hash = file_sha256(path)?;
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let columns = normalize_header(rdr.headers().map_err(|e| e.to_string())?.iter());
    let date_idx = columns.iter().position(|c| c == DATE_COLUMN);
    let region_idx = columns.iter().position(|c| c == REGION_COLUMN);
    let count_idx: Vec<(usize, &str)> = EXPECTED_COLUMNS[2..]
        .iter()
        .filter_map(|name| columns.iter().position(|c| c == name).map(|i| (i, *name)))
        .collect();

    let mut warnings = Vec::new();
    for missing in missing_columns(&columns) {
        warnings.push(format!("missing_column: {}", missing));
    }

    let mut row_count = 0u64;
    let mut bad_rows = 0u64;
    let mut date_min: Option<NaiveDate> = None;
    let mut date_max: Option<NaiveDate> = None;
    let mut last_seen: HashMap<String, NaiveDate> = HashMap::new();
    let mut unordered: Vec<String> = Vec::new();

    for result in rdr.records() {
        let rec = match result {
            Ok(r) => r,
            Err(err) => {
                bad_rows += 1;
                warnings.push(format!("bad_row: {}", err));
                continue;
            }
        };
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        let (Some(di), Some(ri)) = (date_idx, region_idx) else {
            bad_rows += 1;
            continue;
        };
        let date = match parse_date(rec.get(di).unwrap_or("")) {
            Ok(d) => d,
            Err(err) => {
                bad_rows += 1;
                warnings.push(format!("bad_row: line {}: {}", line, err));
                continue;
            }
        };
        let unreadable: Vec<&str> = count_idx
            .iter()
            .filter(|(i, _)| parse_count(rec.get(*i).unwrap_or("")).is_err())
            .map(|(_, name)| *name)
            .collect();
        if let Some(name) = unreadable
            .iter()
            .find(|name| !LENIENT_COUNT_COLUMNS.contains(name))
        {
            bad_rows += 1;
            warnings.push(format!("bad_row: line {}: bad {}", line, name));
            continue;
        }
        for name in unreadable {
            warnings.push(format!("nulled_count: line {}: bad {}", line, name));
        }
        let region = rec.get(ri).unwrap_or("").to_string();
        if region.is_empty() {
            bad_rows += 1;
            warnings.push(format!("bad_row: line {}: empty location", line));
            continue;
        }

        row_count += 1;
        date_min = Some(date_min.map(|v| v.min(date)).unwrap_or(date));
        date_max = Some(date_max.map(|v| v.max(date)).unwrap_or(date));
        if let Some(prev) = last_seen.insert(region.clone(), date) {
            if date <= prev && !unordered.contains(&region) {
                warnings.push(format!(
                    "non_monotonic_date: {} prev={} current={}",
                    region, prev, date
                ));
                unordered.push(region);
            }
        }
    }

    let mut regions: Vec<String> = last_seen.into_keys().collect();
    regions.sort();
    unordered.sort();

    let stale = date_max
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| now_ts.saturating_sub(dt.and_utc().timestamp().max(0) as u64) > ttl_secs)
        .unwrap_or(true);

    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count,
        bad_rows,
        date_min,
        date_max,
        regions,
        columns,
        unordered_regions: unordered,
        warnings,
        ttl_secs,
        stale,
        generated_at_epoch: now_ts,
    })
}

pub fn validate_schema(path: &Path) -> Result<SchemaReport, String> {
    let columns = read_header(path)?;
    let missing = missing_columns(&columns);
    let ok = !missing.contains(&DATE_COLUMN.to_string())
        && !missing.contains(&REGION_COLUMN.to_string());
    let message = if missing.is_empty() {
        "schema ok".to_string()
    } else if ok {
        format!("optional columns missing, read as null: {:?}", missing)
    } else {
        format!("schema mismatch: missing {:?}", missing)
    };
    Ok(SchemaReport {
        columns,
        expected: EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        missing,
        ok,
        message,
    })
}

pub fn read_header(path: &Path) -> Result<Vec<String>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let header = rdr.headers().map_err(|e| e.to_string())?;
    Ok(normalize_header(header.iter()))
}

fn missing_columns(columns: &[String]) -> Vec<String> {
    EXPECTED_COLUMNS
        .iter()
        .filter(|name| !columns.iter().any(|c| c == *name))
        .map(|s| s.to_string())
        .collect()
}

pub fn file_sha256(path: &Path) -> Result<String, String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

pub fn now_epoch() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_path() {
        let p = default_manifest_path(Path::new("/data/covid.csv"));
        assert_eq!(p, PathBuf::from("/data/covid.csv.manifest.json"));
    }

    #[test]
    fn test_missing_columns_lists_absent_only() {
        let cols: Vec<String> = ["date", "location", "new cases"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing = missing_columns(&cols);
        assert_eq!(missing.len(), 4);
        assert!(!missing.contains(&"date".to_string()));
        assert!(missing.contains(&"total recovered".to_string()));
    }
}
