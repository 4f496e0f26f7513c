use thiserror::Error;

/// Fatal problems found while loading the dataset.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("required column `{0}` not found after header normalization")]
    MissingColumn(&'static str),

    #[error("line {line}: {reason}")]
    BadRow { line: u64, reason: String },

    #[error("line {line}: duplicate row for region `{region}` on {date}")]
    DuplicateRow {
        line: u64,
        region: String,
        date: chrono::NaiveDate,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A selection value outside the set derived from the dataset.
///
/// The UI only offers legal values, so hitting this is a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSelectionError {
    #[error("unknown region `{0}`")]
    UnknownRegion(String),

    #[error("unknown year {0}")]
    UnknownYear(i32),

    #[error("dataset has no rows to select from")]
    NoData,
}
