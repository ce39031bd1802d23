use thiserror::Error;

/// Required columns could not be matched against the batch header.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaResolutionError {
    #[error(
        "column(s) {} not found in CSV. Available headers: {}",
        quoted(.fields),
        .headers.join(", ")
    )]
    MissingColumns {
        fields: Vec<String>,
        headers: Vec<String>,
    },
}

#[cfg(test)]
impl SchemaResolutionError {
    pub fn is_missing(&self, field: &str) -> bool {
        match self {
            SchemaResolutionError::MissingColumns { fields, .. } => {
                fields.iter().any(|f| f == field)
            }
        }
    }
}

fn quoted(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("'{f}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a data row was dropped without counting as an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("row has {0} columns, need at least 3")]
    TooFewColumns(usize),
    #[error("row has no cell for mapped column '{0}'")]
    MissingCell(&'static str),
    #[error("unparseable timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("unparseable {field} value '{value}'")]
    InvalidCoordinate { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("insert rejected: {0}")]
    Rejected(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// One row's persistence failed; the batch keeps going.
#[derive(Debug, Error)]
#[error("error inserting row {row}: {source}")]
pub struct InsertError {
    pub row: usize,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("no data for player '{player_id}'")]
    NoData { player_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
