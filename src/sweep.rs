use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use thiserror::Error;

use crate::results::{self, AggregateError, RunRecord};
use crate::solver::{self, RunError};
use crate::{Case, DynamicStall, Foils, ParameterSet, SweepParam, SweepValues};

/// How to treat a sweep table that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    /// delete the table and restart
    pub overwrite: bool,
    /// continue an earlier sweep
    pub append: bool,
}

/// Path of the sweep table for `param`, qualified by the fixed context.
///
/// Sweeps run with a dynamic stall model or a non-default foil dataset land
/// in their own files so distinct configurations never collide.
pub fn table_path(case: &Case, param: SweepParam, base: &ParameterSet) -> PathBuf {
    let mut stem = format!("{}_sweep", param.name());
    if param != SweepParam::DynamicStall {
        match base.dynamic_stall {
            DynamicStall::Off => {}
            DynamicStall::Bv => stem.push_str("_bv"),
            DynamicStall::Lb => stem.push_str("_lb"),
        }
    }
    if base.foils != Foils::Sheldahl {
        stem.push('_');
        stem.push_str(&base.foils.to_string());
    }
    case.processed_dir().join(format!("{stem}.csv"))
}

/// Run the solver once per sweep value and aggregate into one table.
///
/// The table is flushed after every point, so a sweep that dies keeps all
/// completed points. A failed point aborts the sweep; skipping it silently
/// would leave a hole in the table with no record of why.
pub fn sweep(
    case: &Case,
    param: SweepParam,
    values: &SweepValues,
    base: &ParameterSet,
    disposition: Disposition,
) -> Result<Vec<RunRecord>, SweepError> {
    let table = table_path(case, param, base);
    prepare_table(&table, disposition)?;
    fs::create_dir_all(case.processed_dir())?;

    info!("running {} sweep into {}", param.name(), table.display());
    let mut records = Vec::new();
    for value in values.values() {
        info!("setting {} to {}", param.name(), value);
        let mut params = base.clone();
        param.apply(&mut params, value)?;
        // each point gets a fresh log regardless of the sweep disposition
        solver::run(case, &params, true)?;
        let record = results::aggregate(case, &params)?;
        append_record(&table, &record)?;
        records.push(record);
    }
    Ok(records)
}

/// Enforce the start-of-sweep policy before any solver work.
///
/// An existing table with an ambiguous disposition (neither overwrite nor
/// append, or both) is fatal, guarding expensive sweeps against accidental
/// loss or silent duplication.
fn prepare_table(table: &Path, disposition: Disposition) -> Result<(), SweepError> {
    if !table.exists() {
        return Ok(());
    }
    match (disposition.overwrite, disposition.append) {
        (true, false) => {
            info!("removing existing sweep table {}", table.display());
            fs::remove_file(table)?;
            Ok(())
        }
        (false, true) => verify_schema(table),
        _ => Err(SweepError::ResultsPresent(table.to_path_buf())),
    }
}

/// Append one record, writing the header row only for a fresh table.
pub fn append_record(table: &Path, record: &RunRecord) -> Result<(), SweepError> {
    let fresh = !table.exists();
    let file = OpenOptions::new().create(true).append(true).open(table)?;
    let mut writer = WriterBuilder::new().has_headers(fresh).from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}

/// Read a whole sweep table back.
pub fn read_table(table: &Path) -> Result<Vec<RunRecord>, SweepError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(table)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// A table appended to must carry exactly the [`RunRecord`] columns.
fn verify_schema(table: &Path) -> Result<(), SweepError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(table)?;
    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if found != RunRecord::COLUMNS {
        return Err(SweepError::SchemaMismatch {
            path: table.to_path_buf(),
            found: found.join(","),
            expected: RunRecord::COLUMNS.join(","),
        });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(
        "sweep results already present in {}; pass overwrite to restart or append to continue",
        .0.display()
    )]
    ResultsPresent(PathBuf),
    #[error("sweep table {} has columns [{found}], expected [{expected}]", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },
    #[error(transparent)]
    Param(#[from] crate::params::ParamError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
