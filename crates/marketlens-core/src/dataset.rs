//! Tabular app-market dataset
//!
//! Loads the merged store listing CSV into typed records. Numeric cells are
//! coerced leniently: install counts like `10,000+` and prices like `$4.99`
//! parse, anything else becomes a missing value rather than an error.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};

/// Columns the analyses know how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    App,
    Category,
    Rating,
    Reviews,
    Installs,
    Type,
    Price,
    Genres,
    SentimentPolarity,
}

impl Column {
    /// Header name as it appears in the CSV
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "App",
            Self::Category => "Category",
            Self::Rating => "Rating",
            Self::Reviews => "Reviews",
            Self::Installs => "Installs",
            Self::Type => "Type",
            Self::Price => "Price",
            Self::Genres => "Genres",
            Self::SentimentPolarity => "Sentiment_Polarity",
        }
    }

    pub fn all() -> &'static [Column] {
        &[
            Self::App,
            Self::Category,
            Self::Rating,
            Self::Reviews,
            Self::Installs,
            Self::Type,
            Self::Price,
            Self::Genres,
            Self::SentimentPolarity,
        ]
    }

    fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(header))
    }
}

/// One app listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppRecord {
    pub app: Option<String>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<f64>,
    pub installs: Option<f64>,
    /// "Free" or "Paid"
    pub app_type: Option<String>,
    pub price: Option<f64>,
    /// Semicolon separated genre list
    pub genres: Option<String>,
    pub sentiment_polarity: Option<f64>,
}

impl AppRecord {
    /// Numeric value of a column, if the column is numeric and the cell is present
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Rating => self.rating,
            Column::Reviews => self.reviews,
            Column::Installs => self.installs,
            Column::Price => self.price,
            Column::SentimentPolarity => self.sentiment_polarity,
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.app_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("paid"))
    }
}

/// The full dataset plus the set of columns that were present in the source
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: BTreeSet<Column>,
    records: Vec<AppRecord>,
}

impl Dataset {
    /// Build a dataset from in-memory records, treating every column as present
    pub fn from_records(records: Vec<AppRecord>) -> Self {
        Self {
            columns: Column::all().iter().copied().collect(),
            records,
        }
    }

    /// Build a dataset from records with an explicit column set
    pub fn with_columns(columns: impl IntoIterator<Item = Column>, records: Vec<AppRecord>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            records,
        }
    }

    /// Open and parse a CSV file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Dataset(format!("Cannot open dataset {}: {}", path.display(), e))
        })?;
        Self::from_csv_reader(file)
    }

    /// Parse CSV data from any reader
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(Error::Dataset("Dataset has no header row".into()));
        }

        // Column index for each recognised header; first occurrence wins
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                if !positions.iter().any(|(c, _)| *c == column) {
                    positions.push((column, idx));
                }
            }
        }

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let mut record = AppRecord::default();
            for &(column, idx) in &positions {
                let cell = row.get(idx).unwrap_or("");
                match column {
                    Column::App => record.app = parse_text(cell),
                    Column::Category => record.category = parse_text(cell),
                    Column::Rating => record.rating = parse_number(cell),
                    Column::Reviews => record.reviews = parse_number(cell),
                    Column::Installs => record.installs = parse_number(cell),
                    Column::Type => record.app_type = parse_text(cell),
                    Column::Price => record.price = parse_number(cell),
                    Column::Genres => record.genres = parse_text(cell),
                    Column::SentimentPolarity => record.sentiment_polarity = parse_number(cell),
                }
            }
            records.push(record);
        }

        let columns: BTreeSet<Column> = positions.into_iter().map(|(c, _)| c).collect();
        debug!(
            rows = records.len(),
            columns = columns.len(),
            "Loaded dataset"
        );

        Ok(Self { columns, records })
    }

    pub fn records(&self) -> &[AppRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// True if every listed column is present
    pub fn has_columns(&self, columns: &[Column]) -> bool {
        columns.iter().all(|c| self.has_column(*c))
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }
}

fn parse_text(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Lenient numeric coercion: strips thousands separators, `+` suffixes and `$`
pub(crate) fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '+' | '$'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_lenient() {
        assert_eq!(parse_number("10,000+"), Some(10000.0));
        assert_eq!(parse_number("$4.99"), Some(4.99));
        assert_eq!(parse_number(" 4.1 "), Some(4.1));
        assert_eq!(parse_number("Varies with device"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_from_csv_reader() {
        let csv = "App,Category,Rating,Reviews,Installs,Type,Price,Genres,Sentiment_Polarity,Extra\n\
                   Photo Editor,ART_AND_DESIGN,4.1,159,\"10,000+\",Free,0,Art & Design,0.15,x\n\
                   Paid Tool,TOOLS,,12,500+,Paid,$2.99,Tools;Education,,y\n";
        let ds = Dataset::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(ds.len(), 2);
        assert!(ds.has_columns(Column::all()));

        let first = &ds.records()[0];
        assert_eq!(first.app.as_deref(), Some("Photo Editor"));
        assert_eq!(first.installs, Some(10000.0));
        assert_eq!(first.sentiment_polarity, Some(0.15));
        assert!(!first.is_paid());

        let second = &ds.records()[1];
        assert_eq!(second.rating, None);
        assert_eq!(second.price, Some(2.99));
        assert!(second.is_paid());
        assert_eq!(second.sentiment_polarity, None);
    }

    #[test]
    fn test_missing_columns_recorded() {
        let csv = "app,category,installs\nA,GAME,100\n";
        let ds = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(ds.has_column(Column::App));
        assert!(ds.has_column(Column::Installs));
        assert!(!ds.has_column(Column::Rating));
        assert!(!ds.has_columns(&[Column::Category, Column::Genres]));
    }

    #[test]
    fn test_missing_file_is_dataset_error() {
        let err = Dataset::from_path(Path::new("/nonexistent/apps.csv")).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = Dataset::from_csv_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
