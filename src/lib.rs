use std::path::{Path, PathBuf};

pub mod foildata;
pub mod input;
pub mod params;
pub mod probes;
pub mod results;
pub mod solver;
pub mod sweep;
pub mod walls;

pub use params::{DynamicStall, Foils, ParameterSet, SweepParam, SweepValues};
pub use results::RunRecord;

/// RM2 rotor radius in metres, the reference length of the case
pub const ROTOR_RADIUS: f64 = 0.5375;
/// Metres per foot, the solver reports velocities in ft/s
pub const M_PER_FT: f64 = 0.3048;

/// A solver case directory and the external programs acting on it.
///
/// All paths are derived from the case root: the input template and geometry
/// live under `config/`, the solver writes into `results/`, aggregated sweep
/// tables go to `processed/` and the run log marks a completed invocation.
#[derive(Debug, Clone)]
pub struct Case {
    root: PathBuf,
    name: String,
    solver: String,
    geom_generator: Option<String>,
}

impl Case {
    /// create a case rooted at `root` with the following defaults:
    ///
    /// - `name = "RM2"` prefix of the input, geometry and result files
    /// - `solver = "cactus"` the solver executable
    /// - no geometry generator configured
    pub fn new(root: impl Into<PathBuf>) -> Case {
        Case {
            root: root.into(),
            name: "RM2".to_string(),
            solver: "cactus".to_string(),
            geom_generator: None,
        }
    }

    /// update the case name, the prefix of input and result files
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// update the solver executable
    pub fn solver(mut self, solver: impl Into<String>) -> Self {
        self.solver = solver.into();
        self
    }

    /// configure an external geometry generator, invoked as
    /// `<program> <geometry file> <blade element count>`
    pub fn geom_generator(mut self, program: impl Into<String>) -> Self {
        self.geom_generator = Some(program.into());
        self
    }

    pub fn case_name(&self) -> &str {
        &self.name
    }

    pub fn solver_command(&self) -> &str {
        &self.solver
    }

    pub fn geom_generator_command(&self) -> Option<&str> {
        self.geom_generator.as_deref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn template_path(&self) -> PathBuf {
        self.config_dir().join(format!("{}.in.template", self.name))
    }

    pub fn input_path(&self) -> PathBuf {
        self.config_dir().join(format!("{}.in", self.name))
    }

    pub fn geom_path(&self) -> PathBuf {
        self.config_dir().join(format!("{}.geom", self.name))
    }

    /// sidecar recording the blade element count the geometry was built with
    pub fn geom_marker_path(&self) -> PathBuf {
        self.config_dir().join(format!("{}.geom.nbelem", self.name))
    }

    pub fn walls_path(&self) -> PathBuf {
        self.config_dir().join("walls.xyz")
    }

    pub fn foildata_dir(&self) -> PathBuf {
        self.config_dir().join("foildata")
    }

    /// the run log, a non-empty log marks existing results
    pub fn log_path(&self) -> PathBuf {
        self.root.join("cactus.log")
    }

    pub fn rev_data_path(&self) -> PathBuf {
        self.results_dir().join(format!("{}_RevData.csv", self.name))
    }

    pub fn param_path(&self) -> PathBuf {
        self.results_dir().join(format!("{}_Param.csv", self.name))
    }
}
