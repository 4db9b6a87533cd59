use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::debug;
use ndarray::{s, Array2, ArrayView1};
use ndarray_csv::Array2Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Case, ParameterSet, M_PER_FT};

/// One aggregated solver run, one row of a sweep table.
///
/// The field order is the column order of the persisted tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Tip speed ratio
    pub tsr: f64,
    /// Free stream velocity in m/s, converted from the solver's ft/s
    pub u_infty: f64,
    /// Dynamic stall model index
    pub dynamic_stall: u8,
    /// Time steps per revolution
    pub nti: u32,
    /// Blade elements per blade
    pub nbelem: u32,
    pub walls: bool,
    pub foils: String,
    /// Number of trailing revolutions averaged over
    pub nrevs_avg: usize,
    /// Mean power coefficient over the averaging window
    pub cp: f64,
    /// Mean streamwise force coefficient over the averaging window
    pub cd: f64,
}

impl RunRecord {
    /// column schema of the sweep tables, must match [`RunRecord`]'s fields
    pub const COLUMNS: [&'static str; 10] = [
        "tsr",
        "u_infty",
        "dynamic_stall",
        "nti",
        "nbelem",
        "walls",
        "foils",
        "nrevs_avg",
        "cp",
        "cd",
    ];
}

/// Reduce one completed solver run to a [`RunRecord`].
///
/// Reads the per-revolution series and the scalar parameter table from the
/// results directory. The averaging window is the second half of the
/// revolution series, the early revolutions are transient and excluded.
pub fn aggregate(case: &Case, params: &ParameterSet) -> Result<RunRecord, AggregateError> {
    let revs = SolverTable::read(&case.rev_data_path())?;
    let scalars = SolverTable::read(&case.param_path())?;

    let m = revs.nrows();
    if m == 0 {
        return Err(AggregateError::Empty(case.rev_data_path()));
    }
    let from = m / 2;
    let cp = mean_from(&revs, "power_coeff", from)?;
    let cd = mean_from(&revs, "fx_coeff", from)?;
    let u_infty_fps = scalars.scalar("freestream_vel_ft/s")?;
    debug!("averaged revolutions {from}..{m}: cp = {cp}, cd = {cd}");

    Ok(RunRecord {
        tsr: params.tsr,
        u_infty: u_infty_fps * M_PER_FT,
        dynamic_stall: params.dynamic_stall.index(),
        nti: params.nti,
        nbelem: params.nbelem,
        walls: params.walls,
        foils: params.foils.to_string(),
        nrevs_avg: m - from,
        cp,
        cd,
    })
}

fn mean_from(table: &SolverTable, column: &str, from: usize) -> Result<f64, AggregateError> {
    table
        .column(column)?
        .slice(s![from..])
        .mean()
        .ok_or_else(|| AggregateError::Empty(table.path.clone()))
}

/// Normalize a solver CSV header for lookup.
///
/// `"Power Coeff. (-)"` becomes `power_coeff`, `"Freestream Vel. (ft/s)"`
/// becomes `freestream_vel_ft/s`.
pub fn clean_column_name(raw: &str) -> String {
    raw.replace("(-)", "")
        .to_lowercase()
        .replace('.', "")
        .trim()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// A numeric solver output table with normalized column names.
#[derive(Debug)]
pub struct SolverTable {
    path: PathBuf,
    columns: Vec<String>,
    data: Array2<f64>,
}

impl SolverTable {
    /// Read a headered, all numeric CSV written by the solver.
    ///
    /// An absent file is a missing-output condition (the solver died before
    /// writing), distinct from a present but unparseable one.
    pub fn read(path: &Path) -> Result<Self, AggregateError> {
        if !path.is_file() {
            return Err(AggregateError::MissingOutput(path.to_path_buf()));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| AggregateError::Csv { path: path.to_path_buf(), source })?;
        let columns = reader
            .headers()
            .map_err(|source| AggregateError::Csv { path: path.to_path_buf(), source })?
            .iter()
            .map(clean_column_name)
            .collect();
        let data = reader
            .deserialize_array2_dynamic()
            .map_err(|source| AggregateError::Malformed { path: path.to_path_buf(), source })?;
        Ok(SolverTable {
            path: path.to_path_buf(),
            columns,
            data,
        })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<f64>, AggregateError> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AggregateError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })?;
        if index >= self.data.ncols() {
            // headers without data rows deserialize to an empty array
            return Err(AggregateError::Empty(self.path.clone()));
        }
        Ok(self.data.column(index))
    }

    /// first value of a column, for one-row parameter tables
    pub fn scalar(&self, name: &str) -> Result<f64, AggregateError> {
        self.column(name)?
            .first()
            .copied()
            .ok_or_else(|| AggregateError::Empty(self.path.clone()))
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("expected solver output {} is missing", .0.display())]
    MissingOutput(PathBuf),
    #[error("solver output {} could not be read: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("solver output {} is not a numeric table: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: ndarray_csv::ReadError,
    },
    #[error("solver output {} has no `{column}` column", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("solver output {} contains no data rows", .0.display())]
    Empty(PathBuf),
}
