use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;
use itertools::Itertools;
use log::info;
use ndarray::{Array1, Array2, Axis};
use ndarray_csv::Array2Reader;
use ndarray_interp::interp1d::{Interp1D, Linear};
use ndarray_interp::vector_extensions::{Monotonic, VectorExtensions};
use thiserror::Error;

/// change in drag coefficient per degree marking static stall
const STALL_THRESHOLD: f64 = 0.03;
/// critical value of the trailing edge separation point
const F_CRIT: f64 = 0.7;
const ALPHA1_FRACTION: f64 = 0.87;

/// Stock solver parameters per Reynolds number, used where nothing better is
/// computed from the data.
#[derive(Debug, Clone, Copy)]
pub struct SectionDefaults {
    pub label: &'static str,
    pub bv_stall_angle: f64,
    pub lb_lift_slope: f64,
    pub lb_crit_cl: f64,
}

pub const SECTION_DEFAULTS: [SectionDefaults; 3] = [
    SectionDefaults { label: "8.3e4", bv_stall_angle: 4.0, lb_lift_slope: 5.277, lb_crit_cl: 0.829 },
    SectionDefaults { label: "1.6e5", bv_stall_angle: 5.0, lb_lift_slope: 5.371, lb_crit_cl: 1.031 },
    SectionDefaults { label: "3.8e5", bv_stall_angle: 5.0, lb_lift_slope: 6.303, lb_crit_cl: 1.32 },
];

#[derive(Debug)]
struct Section {
    /// rows of `[alpha_deg, cl]`, positive angles only are required
    jacobs: Array2<f64>,
    /// rows of `[alpha_deg, cl, cd, cm]` over the full angle range
    sheldahl: Array2<f64>,
    defaults: SectionDefaults,
}

/// Builds a hybrid foil coefficient dataset in the solver's file format.
///
/// Lift comes from the Jacobs measurements, mirrored about zero angle of
/// attack; drag and moment are interpolated from the Sheldahl data onto the
/// Jacobs angles, and Sheldahl rows outside the Jacobs range are spliced in
/// unchanged.
#[derive(Debug)]
pub struct HybridFoilBuilder {
    title: String,
    thickness: f64,
    sections: Vec<Section>,
    zero_moment: bool,
    calc_lb_crit_cl: bool,
    calc_bv_stall_angles: bool,
}

impl HybridFoilBuilder {
    pub fn new() -> Self {
        HybridFoilBuilder {
            title: "NACA0021".to_string(),
            thickness: 0.21,
            sections: Vec::new(),
            zero_moment: true,
            calc_lb_crit_cl: true,
            calc_bv_stall_angles: false,
        }
    }

    /// add measurement data for one Reynolds number, the label must be new
    pub fn add_section(
        &mut self,
        jacobs: Array2<f64>,
        sheldahl: Array2<f64>,
        defaults: SectionDefaults,
    ) -> Result<&mut Self, FoilDataError> {
        if self.sections.iter().any(|s| s.defaults.label == defaults.label) {
            return Err(FoilDataError::Duplicate(defaults.label.to_string()));
        }
        if jacobs.shape()[1] != 2 {
            return Err(FoilDataError::Shape(
                "Jacobs data must have [alpha, cl] columns".into(),
            ));
        }
        if sheldahl.shape()[1] != 4 {
            return Err(FoilDataError::Shape(
                "Sheldahl data must have [alpha, cl, cd, cm] columns".into(),
            ));
        }
        for data in [&jacobs, &sheldahl] {
            if !matches!(
                data.index_axis(Axis(1), 0).monotonic_prop(),
                Monotonic::Rising { strict: true }
            ) {
                return Err(FoilDataError::Monotonic(
                    "alpha values must be strict monotonic rising".into(),
                ));
            }
        }
        self.sections.push(Section {
            jacobs,
            sheldahl,
            defaults,
        });
        Ok(self)
    }

    /// zero out the moment column, the stock solver dataset carries none
    pub fn zero_moment(mut self, yes: bool) -> Self {
        self.zero_moment = yes;
        self
    }

    /// compute the Leishman-Beddoes critical lift coefficients from the data
    /// instead of using the stock values
    pub fn calc_lb_crit_cl(mut self, yes: bool) -> Self {
        self.calc_lb_crit_cl = yes;
        self
    }

    /// detect the Boeing-Vertol stall angles from the data instead of using
    /// the stock values
    pub fn calc_bv_stall_angles(mut self, yes: bool) -> Self {
        self.calc_bv_stall_angles = yes;
        self
    }

    /// render the complete dataset file
    pub fn build(self) -> Result<String, FoilDataError> {
        if self.sections.is_empty() {
            return Err(FoilDataError::Shape("no Reynolds sections added".into()));
        }
        let mut out = String::new();
        writeln!(out, "Title: {}", self.title).ok();
        writeln!(out, "Thickness to Chord Ratio: {}", self.thickness).ok();
        writeln!(out, "Zero Lift AOA (deg): 0.0").ok();
        writeln!(out, "Reverse Camber Direction: 0").ok();

        for section in &self.sections {
            let stall_angle = static_stall_angle(&section.sheldahl, STALL_THRESHOLD)?;
            let bv_angle = if self.calc_bv_stall_angles {
                stall_angle
            } else {
                section.defaults.bv_stall_angle
            };
            let lb_crit_cl = if self.calc_lb_crit_cl {
                critical_lift_coeff(stall_angle, section.defaults.lb_lift_slope)
            } else {
                section.defaults.lb_crit_cl
            };

            writeln!(out).ok();
            writeln!(out, "Reynolds Number: {}", section.defaults.label).ok();
            writeln!(out, "BV Dyn. Stall Model - Positive Stall AOA (deg): {bv_angle}").ok();
            writeln!(out, "BV Dyn. Stall Model - Negative Stall AOA (deg): {bv_angle}").ok();
            writeln!(
                out,
                "LB Dyn. Stall Model - Lift Coeff. Slope at Zero Lift AOA (per radian): {}",
                section.defaults.lb_lift_slope
            )
            .ok();
            writeln!(out, "LB Dyn. Stall Model - Positive Critical Lift Coeff.: {lb_crit_cl}").ok();
            writeln!(out, "LB Dyn. Stall Model - Negative Critical Lift Coeff.: {lb_crit_cl}").ok();
            writeln!(out, "AOA (deg) CL CD Cm25").ok();

            let table = blend_section(&section.jacobs, &section.sheldahl)?;
            for row in table.rows() {
                let cm = if self.zero_moment { 0.0 } else { row[3] };
                writeln!(out, "{}\t{}\t{}\t{}", row[0], row[1], row[2], cm).ok();
            }
        }
        Ok(out)
    }
}

impl Default for HybridFoilBuilder {
    fn default() -> Self {
        HybridFoilBuilder::new()
    }
}

/// Mirror the non-negative Jacobs angles about zero.
///
/// Only the strictly positive rows are reflected, alpha = 0 stays a single
/// row.
fn mirror_jacobs(jacobs: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let nonneg: Vec<(f64, f64)> = jacobs
        .rows()
        .into_iter()
        .filter(|row| row[0] >= 0.0)
        .map(|row| (row[0], row[1]))
        .collect();
    let mut alpha = Vec::with_capacity(2 * nonneg.len());
    let mut cl = Vec::with_capacity(2 * nonneg.len());
    for &(a, c) in nonneg.iter().rev().filter(|(a, _)| *a > 0.0) {
        alpha.push(-a);
        cl.push(-c);
    }
    for &(a, c) in &nonneg {
        alpha.push(a);
        cl.push(c);
    }
    (Array1::from(alpha), Array1::from(cl))
}

/// One blended `[alpha, cl, cd, cm]` table for a single Reynolds number.
fn blend_section(
    jacobs: &Array2<f64>,
    sheldahl: &Array2<f64>,
) -> Result<Array2<f64>, FoilDataError> {
    let (alpha, cl) = mirror_jacobs(jacobs);
    if alpha.is_empty() {
        return Err(FoilDataError::Shape(
            "Jacobs data has no non-negative angles".into(),
        ));
    }
    let sh_alpha = sheldahl.index_axis(Axis(1), 0);

    let interp_onto = |column: usize| -> Result<Array1<f64>, FoilDataError> {
        Ok(Interp1D::builder(sheldahl.index_axis(Axis(1), column).to_owned())
            .x(sh_alpha.to_owned())
            .strategy(Linear::new().extrapolate(true))
            .build()?
            .interp_array(&alpha)?)
    };
    let cd = interp_onto(2)?;
    let cm = interp_onto(3)?;

    let alpha_min = alpha[0];
    let alpha_max = alpha[alpha.len() - 1];

    let mut rows: Vec<[f64; 4]> = Vec::new();
    for row in sheldahl.rows().into_iter().filter(|r| r[0] < alpha_min) {
        rows.push([row[0], row[1], row[2], row[3]]);
    }
    for i in 0..alpha.len() {
        rows.push([alpha[i], cl[i], cd[i], cm[i]]);
    }
    for row in sheldahl.rows().into_iter().filter(|r| r[0] > alpha_max) {
        rows.push([row[0], row[1], row[2], row[3]]);
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), 4), flat)
        .map_err(|e| FoilDataError::Shape(e.to_string()))
}

/// Static stall angle: where the drag slope first reaches the threshold,
/// searched between 2 and 40 degrees.
pub fn static_stall_angle(sheldahl: &Array2<f64>, threshold: f64) -> Result<f64, FoilDataError> {
    let points = sheldahl
        .rows()
        .into_iter()
        .filter(|row| row[0] > 2.0 && row[0] < 40.0)
        .map(|row| (row[0], row[2]));
    for ((a0, cd0), (a1, cd1)) in points.tuple_windows() {
        if (cd1 - cd0) / (a1 - a0) >= threshold {
            return Ok(a0);
        }
    }
    Err(FoilDataError::NoStall)
}

/// Critical lift coefficient for the Leishman-Beddoes model.
///
/// Technically the critical normal force coefficient,
/// `cn_alpha * alpha1 * ((1 + sqrt(f)) / 2)^2`.
pub fn critical_lift_coeff(stall_angle_deg: f64, lift_slope: f64) -> f64 {
    let alpha1 = (ALPHA1_FRACTION * stall_angle_deg).to_radians();
    lift_slope * alpha1 * ((1.0 + F_CRIT.sqrt()) / 2.0).powi(2)
}

/// Read a headered coefficient CSV into an array, columns by position.
pub fn read_coeff_table(path: &Path) -> Result<Array2<f64>, FoilDataError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    Ok(reader.deserialize_array2_dynamic()?)
}

/// Build the hybrid dataset from the per-Reynolds CSVs under `data_dir`.
///
/// Expects `NACA_0021_Jacobs_<re>.csv` and `NACA_0021_Sheldahl_<re>.csv` for
/// every stock Reynolds number.
pub fn build_from_dir(data_dir: &Path) -> Result<String, FoilDataError> {
    let mut builder = HybridFoilBuilder::new();
    for defaults in SECTION_DEFAULTS {
        let jacobs = read_coeff_table(&data_dir.join(format!("NACA_0021_Jacobs_{}.csv", defaults.label)))?;
        let sheldahl =
            read_coeff_table(&data_dir.join(format!("NACA_0021_Sheldahl_{}.csv", defaults.label)))?;
        info!("blending foil data for Re = {}", defaults.label);
        builder.add_section(jacobs, sheldahl, defaults)?;
    }
    builder.zero_moment(true).build()
}

#[derive(Debug, Error)]
pub enum FoilDataError {
    #[error("{0}")]
    Shape(String),
    #[error("{0}")]
    Monotonic(String),
    #[error("data for Reynolds number {0} is already stored")]
    Duplicate(String),
    #[error("no static stall angle found below the drag slope threshold")]
    NoStall,
    #[error(transparent)]
    InterpBuild(#[from] ndarray_interp::BuilderError),
    #[error(transparent)]
    Interp(#[from] ndarray_interp::InterpolateError),
    #[error(transparent)]
    Csv(#[from] ndarray_csv::ReadError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    fn sheldahl_fixture() -> Array2<f64> {
        // drag slope jumps from 0.01/deg to 0.05/deg at 12 degrees
        array![
            [-180.0, 0.0, 0.1, -0.02],
            [-12.0, -1.2, 0.12, -0.01],
            [0.0, 0.0, 0.0, 0.0],
            [4.0, 0.4, 0.04, 0.01],
            [8.0, 0.8, 0.08, 0.02],
            [12.0, 1.2, 0.12, 0.03],
            [16.0, 1.0, 0.32, 0.04],
            [180.0, 0.0, 0.1, 0.02],
        ]
    }

    #[test]
    fn mirrors_positive_angles_once() {
        let jacobs = array![[0.0, 0.0], [5.0, 0.5], [10.0, 1.0]];
        let (alpha, cl) = mirror_jacobs(&jacobs);
        assert_eq!(alpha, array![-10.0, -5.0, 0.0, 5.0, 10.0]);
        assert_eq!(cl, array![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn blended_drag_is_interpolated() {
        let jacobs = array![[0.0, 0.0], [6.0, 0.6]];
        let table = blend_section(&jacobs, &sheldahl_fixture()).unwrap();
        // row at alpha = 6 sits between the Sheldahl points at 4 and 8
        let row = table
            .rows()
            .into_iter()
            .find(|r| (r[0] - 6.0).abs() < 1e-12)
            .unwrap();
        assert_relative_eq!(row[1], 0.6);
        assert_relative_eq!(row[2], 0.06, epsilon = 1e-9);
    }

    #[test]
    fn sheldahl_tails_are_spliced() {
        let jacobs = array![[0.0, 0.0], [6.0, 0.6]];
        let table = blend_section(&jacobs, &sheldahl_fixture()).unwrap();
        // tails beyond the mirrored Jacobs range [-6, 6]
        assert_relative_eq!(table[(0, 0)], -180.0);
        assert_relative_eq!(table[(table.nrows() - 1, 0)], 180.0);
        // angles ascend through the whole table
        for rows in table.rows().into_iter().collect::<Vec<_>>().windows(2) {
            assert!(rows[0][0] < rows[1][0]);
        }
    }

    #[test]
    fn stall_angle_detection() {
        let angle = static_stall_angle(&sheldahl_fixture(), STALL_THRESHOLD).unwrap();
        assert_relative_eq!(angle, 12.0);
    }

    #[test]
    fn no_stall_is_an_error() {
        let flat = array![[0.0, 0.0, 0.0, 0.0], [10.0, 1.0, 0.01, 0.0], [39.0, 1.1, 0.02, 0.0]];
        assert!(matches!(
            static_stall_angle(&flat, STALL_THRESHOLD),
            Err(FoilDataError::NoStall)
        ));
    }

    #[test]
    fn critical_lift_coefficient_formula() {
        // alpha1 = 0.87 * 12 deg = 0.182212 rad, ((1 + sqrt(0.7)) / 2)^2 = 0.843330
        let crit = critical_lift_coeff(12.0, 5.371);
        assert_relative_eq!(crit, 5.371 * 0.182_212 * 0.843_330, epsilon = 1e-4);
    }

    #[test]
    fn duplicate_reynolds_is_rejected() {
        let jacobs = array![[0.0, 0.0], [6.0, 0.6]];
        let mut builder = HybridFoilBuilder::new();
        builder
            .add_section(jacobs.clone(), sheldahl_fixture(), SECTION_DEFAULTS[0])
            .unwrap();
        let err = builder
            .add_section(jacobs, sheldahl_fixture(), SECTION_DEFAULTS[0])
            .unwrap_err();
        assert!(matches!(err, FoilDataError::Duplicate(_)));
    }

    #[test]
    fn built_file_carries_headers_and_sections() {
        let jacobs = array![[0.0, 0.0], [6.0, 0.6]];
        let mut builder = HybridFoilBuilder::new();
        builder
            .add_section(jacobs, sheldahl_fixture(), SECTION_DEFAULTS[1])
            .unwrap();
        let text = builder.zero_moment(true).build().unwrap();
        assert!(text.starts_with("Title: NACA0021\n"));
        assert!(text.contains("Reynolds Number: 1.6e5"));
        assert!(text.contains("AOA (deg) CL CD Cm25"));
        // zeroed moment column
        for line in text.lines().filter(|l| l.contains('\t')) {
            assert!(line.ends_with("\t0"));
        }
    }

    #[test]
    fn unsorted_alpha_is_rejected() {
        let jacobs = array![[6.0, 0.6], [0.0, 0.0]];
        let mut builder = HybridFoilBuilder::new();
        let err = builder
            .add_section(jacobs, sheldahl_fixture(), SECTION_DEFAULTS[0])
            .unwrap_err();
        assert!(matches!(err, FoilDataError::Monotonic(_)));
    }
}
