//! data.rs - Price input and the log-return transform
//!
//! Prices come from a CSV file (any export with a date column and a price
//! column, e.g. a Yahoo Finance daily download).  Data acquisition itself is
//! out of scope: fetch the file with whatever tool you like.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Parse `YYYY-MM-DD`, ignoring any time suffix (`2020-01-02 00:00:00`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn find_column(df: &DataFrame, wanted: &str) -> Result<String, EngineError> {
    df.get_column_names()
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
        .map(|c| c.to_string())
        .ok_or_else(|| EngineError::Input(format!("column '{wanted}' not found")))
}

/// Load dated prices from a CSV file.
///
/// Column names are matched case-insensitively.  Rows whose price is
/// missing (holiday placeholders in some exports) are skipped.
pub fn load_prices(path: &Path, date_column: &str, price_column: &str) -> Result<Vec<PricePoint>, EngineError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let date_col = find_column(&df, date_column)?;
    let price_col = find_column(&df, price_column)?;

    let dates = df.column(&date_col)?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let closes = df.column(&price_col)?.cast(&DataType::Float64)?;
    let closes = closes.f64()?;

    let mut prices = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for (i, (date, close)) in dates.into_iter().zip(closes.into_iter()).enumerate() {
        let date = date
            .and_then(parse_date)
            .ok_or_else(|| EngineError::Input(format!("row {}: unparseable date {:?}", i + 1, date)))?;
        match close {
            Some(close) => prices.push(PricePoint { date, close }),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {} rows without a price", path.display(), skipped);
    }
    debug!("{}: loaded {} prices", path.display(), prices.len());
    Ok(prices)
}

/// Chronological log-return series, dated at the later price.
///
/// Invariants: dates strictly increasing (so no duplicates), values finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    /// r_t = ln(P_t / P_{t−1}); the first price is consumed.
    pub fn from_prices(prices: &[PricePoint]) -> Result<Self, EngineError> {
        if prices.len() < 2 {
            return Err(EngineError::InsufficientData { len: prices.len().saturating_sub(1), needed: 1 });
        }
        for p in prices {
            if !(p.close > 0.0) || !p.close.is_finite() {
                return Err(EngineError::BadPrice { date: p.date, price: p.close });
            }
        }
        let mut dates = Vec::with_capacity(prices.len() - 1);
        let mut values = Vec::with_capacity(prices.len() - 1);
        for pair in prices.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(EngineError::UnsortedDates { prev: pair[0].date, next: pair[1].date });
            }
            dates.push(pair[1].date);
            values.push((pair[1].close / pair[0].close).ln());
        }
        Ok(Self { dates, values })
    }

    /// Build from already-computed returns.
    pub fn from_parts(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, EngineError> {
        if dates.len() != values.len() {
            return Err(EngineError::Input(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(EngineError::UnsortedDates { prev: pair[0], next: pair[1] });
            }
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::Input(format!("non-finite return on {}", dates[i])));
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn date(&self, i: usize) -> Option<NaiveDate> {
        self.dates.get(i).copied()
    }

    /// Window ending at (exclusive) `offset + len`.  Caller guarantees
    /// `offset + len <= self.len()`.
    pub fn window(&self, offset: usize, len: usize) -> &[f64] {
        &self.values[offset..offset + len]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn log_returns_dated_at_later_price() {
        let prices = vec![
            PricePoint { date: d("2020-01-02"), close: 100.0 },
            PricePoint { date: d("2020-01-03"), close: 110.0 },
            PricePoint { date: d("2020-01-06"), close: 99.0 },
        ];
        let r = ReturnSeries::from_prices(&prices).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.dates(), &[d("2020-01-03"), d("2020-01-06")]);
        assert!((r.values()[0] - (1.1f64).ln()).abs() < 1e-12);
        assert!((r.values()[1] - (0.9f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn duplicate_dates_rejected() {
        let prices = vec![
            PricePoint { date: d("2020-01-02"), close: 100.0 },
            PricePoint { date: d("2020-01-02"), close: 101.0 },
        ];
        assert!(matches!(
            ReturnSeries::from_prices(&prices),
            Err(EngineError::UnsortedDates { .. })
        ));
    }

    #[test]
    fn bad_price_rejected() {
        let prices = vec![
            PricePoint { date: d("2020-01-02"), close: 100.0 },
            PricePoint { date: d("2020-01-03"), close: 0.0 },
        ];
        assert!(matches!(ReturnSeries::from_prices(&prices), Err(EngineError::BadPrice { .. })));
    }

    #[test]
    fn parse_date_accepts_datetime_suffix() {
        assert_eq!(parse_date("2021-03-04 00:00:00"), Some(d("2021-03-04")));
        assert_eq!(parse_date("04/03/2021"), None);
    }

    #[test]
    fn loads_csv_with_case_insensitive_columns_and_skips_nulls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Open,Close").unwrap();
        writeln!(file, "2020-01-02,1,100.0").unwrap();
        writeln!(file, "2020-01-03,1,").unwrap();
        writeln!(file, "2020-01-06,1,102.5").unwrap();
        file.flush().unwrap();

        let prices = load_prices(file.path(), "date", "close").unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1], PricePoint { date: d("2020-01-06"), close: 102.5 });
    }

    #[test]
    fn missing_column_is_input_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Open").unwrap();
        writeln!(file, "2020-01-02,1").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            load_prices(file.path(), "date", "close"),
            Err(EngineError::Input(_))
        ));
    }
}
