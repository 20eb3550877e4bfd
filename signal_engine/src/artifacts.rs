//! artifacts.rs - CSV artifacts of a signal run
//!
//! | file                    | columns                                      |
//! |-------------------------|----------------------------------------------|
//! | `forecasts.csv`         | `date,signal`                                |
//! | `forecasts_lagged.csv`  | `date,lagged_signal`                         |
//! | `diagnostics.csv`       | `offset,window_start,window_end,kind,detail` |
//!
//! Dates are written as `YYYY-MM-DD`, signals as `-1` / `1`.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::data::parse_date;
use crate::error::EngineError;
use crate::signal::{lag_signals, ForecastRecord, Signal, SignalRun, WindowDiagnostic};

pub const FORECASTS_FILE: &str = "forecasts.csv";
pub const LAGGED_FILE: &str = "forecasts_lagged.csv";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.csv";

pub const SIGNAL_COLUMN: &str = "signal";
pub const LAGGED_COLUMN: &str = "lagged_signal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub forecasts: PathBuf,
    pub lagged: PathBuf,
    pub diagnostics: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            forecasts: dir.join(FORECASTS_FILE),
            lagged: dir.join(LAGGED_FILE),
            diagnostics: dir.join(DIAGNOSTICS_FILE),
        }
    }
}

fn write_frame(path: &Path, df: &mut DataFrame) -> Result<(), EngineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Write `date,<value_column>` rows.
pub fn write_signals(path: &Path, records: &[ForecastRecord], value_column: &str) -> Result<(), EngineError> {
    let mut df = df!(
        "date" => records.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
        value_column => records.iter().map(|r| i32::from(r.signal.value())).collect::<Vec<_>>(),
    )?;
    write_frame(path, &mut df)
}

/// Read a `date,<value_column>` file back; every value must be −1 or 1 and
/// dates must be strictly increasing.
pub fn read_signals(path: &Path, value_column: &str) -> Result<Vec<ForecastRecord>, EngineError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let dates = df.column("date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let values = df.column(value_column)?.cast(&DataType::Int64)?;
    let values = values.i64()?;

    let records = dates
        .into_iter()
        .zip(values.into_iter())
        .enumerate()
        .map(|(i, (date, value))| {
            let date = date
                .and_then(parse_date)
                .ok_or_else(|| EngineError::Input(format!("{}: row {} has no valid date", path.display(), i + 1)))?;
            let signal = value
                .ok_or_else(|| format!("missing {value_column}"))
                .and_then(Signal::try_from)
                .map_err(|e| EngineError::Input(format!("{}: row {}: {e}", path.display(), i + 1)))?;
            Ok(ForecastRecord { date, signal })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    if let Some(i) = records.windows(2).position(|w| w[1].date <= w[0].date) {
        return Err(EngineError::Input(format!(
            "{}: row {} date {} does not follow {}",
            path.display(),
            i + 2,
            records[i + 1].date,
            records[i].date
        )));
    }
    Ok(records)
}

pub fn write_diagnostics(path: &Path, diagnostics: &[WindowDiagnostic]) -> Result<(), EngineError> {
    let fmt_date = |d: chrono::NaiveDate| d.format("%Y-%m-%d").to_string();
    let mut df = df!(
        "offset" => diagnostics.iter().map(|d| d.offset as u64).collect::<Vec<_>>(),
        "window_start" => diagnostics.iter().map(|d| fmt_date(d.window_start)).collect::<Vec<_>>(),
        "window_end" => diagnostics.iter().map(|d| fmt_date(d.window_end)).collect::<Vec<_>>(),
        "kind" => diagnostics.iter().map(|d| d.kind.to_string()).collect::<Vec<_>>(),
        "detail" => diagnostics.iter().map(|d| d.detail.clone()).collect::<Vec<_>>(),
    )?;
    write_frame(path, &mut df)
}

/// Write all three artifacts of `run` into `dir`.
pub fn write_run(dir: &Path, run: &SignalRun, lag_default: Signal) -> Result<ArtifactPaths, EngineError> {
    fs::create_dir_all(dir)?;
    let paths = ArtifactPaths::in_dir(dir);

    write_signals(&paths.forecasts, &run.records, SIGNAL_COLUMN)?;
    let lagged = lag_signals(&run.records, lag_default);
    write_signals(&paths.lagged, &lagged, LAGGED_COLUMN)?;
    write_diagnostics(&paths.diagnostics, &run.diagnostics)?;

    info!(
        "Wrote {} forecasts to {} ({} diagnostics)",
        run.records.len(),
        dir.display(),
        run.diagnostics.len()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::DiagnosticKind;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, day).unwrap()
    }

    #[test]
    fn signals_survive_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        let records = vec![
            ForecastRecord { date: d(1), signal: Signal::Long },
            ForecastRecord { date: d(2), signal: Signal::Short },
        ];
        write_signals(&path, &records, SIGNAL_COLUMN).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("date,signal"));
        assert_eq!(text.lines().nth(2), Some("2021-06-02,-1"));
        assert_eq!(read_signals(&path, SIGNAL_COLUMN).unwrap(), records);
    }

    #[test]
    fn read_rejects_zero_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "date,signal\n2021-06-01,0\n").unwrap();
        assert!(matches!(read_signals(&path, SIGNAL_COLUMN), Err(EngineError::Input(_))));
    }

    #[test]
    fn read_rejects_duplicate_and_unsorted_dates() {
        let dir = tempfile::tempdir().unwrap();
        let dup = dir.path().join("dup.csv");
        fs::write(&dup, "date,signal\n2021-06-01,1\n2021-06-02,-1\n2021-06-02,-1\n").unwrap();
        assert!(matches!(read_signals(&dup, SIGNAL_COLUMN), Err(EngineError::Input(_))));

        let unsorted = dir.path().join("unsorted.csv");
        fs::write(&unsorted, "date,signal\n2021-06-03,1\n2021-06-01,1\n").unwrap();
        assert!(matches!(read_signals(&unsorted, SIGNAL_COLUMN), Err(EngineError::Input(_))));
    }

    #[test]
    fn write_run_produces_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let run = SignalRun {
            records: vec![
                ForecastRecord { date: d(1), signal: Signal::Short },
                ForecastRecord { date: d(2), signal: Signal::Long },
            ],
            diagnostics: vec![WindowDiagnostic {
                offset: 1,
                window_start: d(1),
                window_end: d(1),
                kind: DiagnosticKind::VolatilityFitFailed,
                detail: "ARMA(1,0): window has (near) zero variance".into(),
            }],
            pending: None,
            stats: Default::default(),
        };
        let paths = write_run(dir.path(), &run, Signal::Long).unwrap();

        let lagged = read_signals(&paths.lagged, LAGGED_COLUMN).unwrap();
        assert_eq!(lagged[0].signal, Signal::Long);
        assert_eq!(lagged[1].signal, Signal::Short);

        let diag = fs::read_to_string(&paths.diagnostics).unwrap();
        assert!(diag.starts_with("offset,window_start,window_end,kind,detail"));
        assert!(diag.contains("volatility_fit_failed"));
    }
}
