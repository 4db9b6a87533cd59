use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use crate::ROTOR_RADIUS;

/// turbine height in metres
const TURBINE_HEIGHT: f64 = 0.807;
/// wake measurement plane, one radius downstream, in metres
const WAKE_PLANE_X: f64 = 1.0;

/// Probe locations matching the experimental wake measurements.
///
/// One probe per combination of spanwise fraction `z/H = 0, 0.125, .., 0.75`
/// and cross-stream `y/R` location from the experimental test plan. All
/// coordinates are normalized by the rotor radius.
pub fn probe_coords(y_r: &[f64]) -> Vec<[f64; 3]> {
    let x_r = WAKE_PLANE_X / ROTOR_RADIUS;
    let mut coords = Vec::with_capacity(7 * y_r.len());
    for i in 0..7 {
        let z_h = i as f64 * 0.125;
        let z_r = z_h * TURBINE_HEIGHT / ROTOR_RADIUS;
        for &y in y_r {
            coords.push([x_r, y, z_r]);
        }
    }
    coords
}

/// Cross-stream probe locations from an experimental test plan CSV.
pub fn read_y_r(test_plan: &Path) -> Result<Vec<f64>, ProbeError> {
    let file = File::open(test_plan)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let index = reader
        .headers()?
        .iter()
        .position(|h| h == "y/R")
        .ok_or_else(|| ProbeError::MissingColumn(test_plan.to_path_buf()))?;
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let raw = record
            .get(index)
            .ok_or_else(|| ProbeError::MissingColumn(test_plan.to_path_buf()))?;
        values.push(
            raw.parse()
                .map_err(|_| ProbeError::BadValue(raw.to_string()))?,
        );
    }
    Ok(values)
}

/// Write the probe specification, a count followed by one `x y z` per line.
pub fn write_probe_file<W: Write>(coords: &[[f64; 3]], writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", coords.len())?;
    for [x, y, z] in coords {
        writeln!(writer, "{x} {y} {z}")?;
    }
    Ok(())
}

/// Generate the probe file for the locations in `test_plan`.
pub fn generate(test_plan: &Path, output: &Path) -> Result<(), ProbeError> {
    let y_r = read_y_r(test_plan)?;
    let coords = probe_coords(&y_r);
    let mut writer = BufWriter::new(File::create(output)?);
    write_probe_file(&coords, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("test plan {} has no `y/R` column", .0.display())]
    MissingColumn(PathBuf),
    #[error("test plan value `{0}` is not a number")]
    BadValue(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
