use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{M_PER_FT, ROTOR_RADIUS};

/// Dynamic stall correction applied by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicStall {
    #[default]
    Off,
    /// Boeing-Vertol model
    Bv,
    /// Leishman-Beddoes model
    Lb,
}

impl DynamicStall {
    /// model index as the solver input file expects it
    pub fn index(self) -> u8 {
        match self {
            DynamicStall::Off => 0,
            DynamicStall::Bv => 1,
            DynamicStall::Lb => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(DynamicStall::Off),
            1 => Some(DynamicStall::Bv),
            2 => Some(DynamicStall::Lb),
            _ => None,
        }
    }
}

impl fmt::Display for DynamicStall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicStall::Off => write!(f, "off"),
            DynamicStall::Bv => write!(f, "bv"),
            DynamicStall::Lb => write!(f, "lb"),
        }
    }
}

impl FromStr for DynamicStall {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(DynamicStall::Off),
            "bv" => Ok(DynamicStall::Bv),
            "lb" => Ok(DynamicStall::Lb),
            _ => Err(ParamError::DynamicStall(s.to_string())),
        }
    }
}

/// Which foil coefficient dataset the solver reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Foils {
    #[default]
    Sheldahl,
    /// Hybrid dataset with Jacobs lift data, see [`crate::foildata`]
    Jacobs,
}

impl Foils {
    /// file name of the dataset under `config/foildata/`
    pub fn file_name(self) -> &'static str {
        match self {
            Foils::Sheldahl => "NACA_0021_Sheldahl.dat",
            Foils::Jacobs => "NACA_0021_Jacobs.dat",
        }
    }
}

impl fmt::Display for Foils {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Foils::Sheldahl => write!(f, "sheldahl"),
            Foils::Jacobs => write!(f, "jacobs"),
        }
    }
}

impl FromStr for Foils {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sheldahl" => Ok(Foils::Sheldahl),
            "jacobs" => Ok(Foils::Jacobs),
            _ => Err(ParamError::Foils(s.to_string())),
        }
    }
}

/// All inputs of a single solver invocation.
///
/// A sweep overrides exactly one field on a base set and leaves the rest at
/// their configured values.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    /// Tip speed ratio
    pub tsr: f64,
    /// Free stream velocity in m/s
    pub u_infty: f64,
    pub dynamic_stall: DynamicStall,
    /// Time steps per revolution
    pub nti: u32,
    /// Number of revolutions to simulate
    pub nr: u32,
    /// Blade elements per blade
    pub nbelem: u32,
    /// Include the tow tank walls
    pub walls: bool,
    pub foils: Foils,
}

impl Default for ParameterSet {
    fn default() -> Self {
        ParameterSet {
            tsr: 3.1,
            u_infty: 1.0,
            dynamic_stall: DynamicStall::Off,
            nti: 24,
            nr: 12,
            nbelem: 10,
            walls: false,
            foils: Foils::Sheldahl,
        }
    }
}

impl ParameterSet {
    /// Rotor speed in rev/min implied by tip speed ratio and free stream
    /// velocity at the reference radius.
    pub fn rpm(&self) -> f64 {
        self.tsr * self.u_infty / ROTOR_RADIUS * 60.0 / (2.0 * PI)
    }

    /// Free stream velocity in the solver's ft/s
    pub fn u_infty_fps(&self) -> f64 {
        self.u_infty / M_PER_FT
    }
}

/// A parameter that can be swept over a range of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepParam {
    Tsr,
    Nti,
    Nbelem,
    DynamicStall,
}

impl SweepParam {
    pub fn name(self) -> &'static str {
        match self {
            SweepParam::Tsr => "tsr",
            SweepParam::Nti => "nti",
            SweepParam::Nbelem => "nbelem",
            SweepParam::DynamicStall => "dynamic_stall",
        }
    }

    /// Override this field on `params` with `value`.
    ///
    /// Integer valued fields round the value explicitly instead of relying on
    /// any implicit conversion.
    pub fn apply(self, params: &mut ParameterSet, value: f64) -> Result<(), ParamError> {
        match self {
            SweepParam::Tsr => params.tsr = value,
            SweepParam::Nti => params.nti = value.round() as u32,
            SweepParam::Nbelem => params.nbelem = value.round() as u32,
            SweepParam::DynamicStall => {
                let index = value.round();
                params.dynamic_stall = (index >= 0.0)
                    .then(|| DynamicStall::from_index(index as u8))
                    .flatten()
                    .ok_or(ParamError::DynamicStallIndex(value))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SweepParam {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsr" => Ok(SweepParam::Tsr),
            "nti" => Ok(SweepParam::Nti),
            "nbelem" => Ok(SweepParam::Nbelem),
            "dynamic_stall" | "dynamic-stall" => Ok(SweepParam::DynamicStall),
            _ => Err(ParamError::SweepParam(s.to_string())),
        }
    }
}

/// The values a sweep visits, resolved when the command line is parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepValues {
    /// Half open numeric range, `stop` itself is excluded
    Range { start: f64, stop: f64, step: f64 },
    /// Explicit ordered values
    List(Vec<f64>),
}

impl SweepValues {
    pub fn range(start: f64, stop: f64, step: f64) -> Result<Self, ParamError> {
        if !(step > 0.0) {
            return Err(ParamError::Step(step));
        }
        Ok(SweepValues::Range { start, stop, step })
    }

    /// All values in sweep order.
    ///
    /// A range yields `ceil((stop - start) / step)` values, every one of them
    /// strictly below `stop`.
    pub fn values(&self) -> Vec<f64> {
        match self {
            SweepValues::Range { start, stop, step } => {
                let n = ((stop - start) / step).ceil().max(0.0) as usize;
                (0..n).map(|i| start + i as f64 * step).collect()
            }
            SweepValues::List(values) => values.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unknown sweep parameter `{0}`, expected tsr, nti, nbelem or dynamic_stall")]
    SweepParam(String),
    #[error("unknown dynamic stall model `{0}`, expected off, bv or lb")]
    DynamicStall(String),
    #[error("unknown foil dataset `{0}`, expected sheldahl or jacobs")]
    Foils(String),
    #[error("no dynamic stall model with index {0}")]
    DynamicStallIndex(f64),
    #[error("sweep step must be positive, got {0}")]
    Step(f64),
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn range_is_half_open() {
        let values = SweepValues::range(0.4, 3.5, 0.5).unwrap().values();
        assert_eq!(values.len(), 7);
        assert_relative_eq!(values[0], 0.4);
        assert_relative_eq!(values[6], 3.4);
        assert!(values.iter().all(|&v| v < 3.5));
    }

    #[test]
    fn range_excludes_stop_on_exact_multiple() {
        let values = SweepValues::range(0.0, 1.0, 0.5).unwrap().values();
        assert_eq!(values, vec![0.0, 0.5]);
    }

    #[test]
    fn range_count_matches_ceil() {
        let values = SweepValues::range(1.0, 2.1, 0.25).unwrap().values();
        // ceil(1.1 / 0.25) = 5
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn negative_step_is_rejected() {
        assert!(SweepValues::range(0.0, 1.0, -0.5).is_err());
        assert!(SweepValues::range(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn list_preserves_order() {
        let values = SweepValues::List(vec![3.1, 1.9, 2.5]).values();
        assert_eq!(values, vec![3.1, 1.9, 2.5]);
    }

    #[test]
    fn apply_rounds_integer_parameters() {
        let mut params = ParameterSet::default();
        SweepParam::Nti.apply(&mut params, 23.6).unwrap();
        assert_eq!(params.nti, 24);
        SweepParam::Nbelem.apply(&mut params, 16.2).unwrap();
        assert_eq!(params.nbelem, 16);
    }

    #[test]
    fn apply_dynamic_stall_index() {
        let mut params = ParameterSet::default();
        SweepParam::DynamicStall.apply(&mut params, 2.0).unwrap();
        assert_eq!(params.dynamic_stall, DynamicStall::Lb);
        assert!(SweepParam::DynamicStall.apply(&mut params, 3.0).is_err());
        assert!(SweepParam::DynamicStall.apply(&mut params, -1.0).is_err());
    }

    #[test]
    fn rpm_from_tsr_and_velocity() {
        let params = ParameterSet::default();
        // omega = tsr * U / R = 3.1 / 0.5375 rad/s
        assert_relative_eq!(params.rpm(), 55.0745, epsilon = 1e-3);
    }

    #[test]
    fn velocity_unit_conversion() {
        let params = ParameterSet {
            u_infty: 1.0,
            ..ParameterSet::default()
        };
        assert_relative_eq!(params.u_infty_fps(), 3.2808, epsilon = 1e-3);
    }

    #[test]
    fn parse_selectors() {
        assert_eq!("lb".parse::<DynamicStall>().unwrap(), DynamicStall::Lb);
        assert_eq!("jacobs".parse::<Foils>().unwrap(), Foils::Jacobs);
        assert_eq!("tsr".parse::<SweepParam>().unwrap(), SweepParam::Tsr);
        assert!("foo".parse::<SweepParam>().is_err());
    }
}
