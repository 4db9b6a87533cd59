use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;

use cactus_sweep::sweep::Disposition;
use cactus_sweep::{
    foildata, probes, results, solver, sweep, walls, Case, DynamicStall, Foils, ParameterSet,
    SweepParam, SweepValues,
};

#[derive(Parser, Debug)]
#[command(name = "cactus-sweep")]
#[command(about = "Run and post-process CACTUS turbine simulations")]
struct Cli {
    /// Case directory containing config/, results/ and processed/
    #[arg(long, default_value = ".")]
    case_dir: PathBuf,

    /// Solver executable
    #[arg(long, default_value = "cactus")]
    solver: String,

    /// Geometry generator executable, invoked as `<program> <geom file> <nbelem>`
    #[arg(long)]
    geom_generator: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Solver parameters shared by `run` and `sweep`, defaults from the case.
#[derive(Args, Debug)]
struct SolverOpts {
    /// Tip speed ratio
    #[arg(long)]
    tsr: Option<f64>,

    /// Free stream velocity in m/s
    #[arg(long)]
    velocity: Option<f64>,

    /// Dynamic stall model (off, bv, lb)
    #[arg(long)]
    dynamic_stall: Option<DynamicStall>,

    /// Time steps per revolution
    #[arg(long)]
    nti: Option<u32>,

    /// Number of revolutions to simulate
    #[arg(long)]
    nr: Option<u32>,

    /// Blade elements per blade
    #[arg(long)]
    nbelem: Option<u32>,

    /// Include the tow tank walls
    #[arg(long)]
    walls: bool,

    /// Foil coefficient dataset (sheldahl, jacobs)
    #[arg(long)]
    foils: Option<Foils>,
}

impl SolverOpts {
    fn parameter_set(&self) -> ParameterSet {
        let mut params = ParameterSet::default();
        if let Some(tsr) = self.tsr {
            params.tsr = tsr;
        }
        if let Some(velocity) = self.velocity {
            params.u_infty = velocity;
        }
        if let Some(dynamic_stall) = self.dynamic_stall {
            params.dynamic_stall = dynamic_stall;
        }
        if let Some(nti) = self.nti {
            params.nti = nti;
        }
        if let Some(nr) = self.nr {
            params.nr = nr;
        }
        if let Some(nbelem) = self.nbelem {
            params.nbelem = nbelem;
        }
        if self.walls {
            params.walls = true;
        }
        if let Some(foils) = self.foils {
            params.foils = foils;
        }
        params
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single simulation
    Run {
        #[command(flatten)]
        opts: SolverOpts,

        /// Replace existing results
        #[arg(long)]
        overwrite: bool,
    },
    /// Run multiple simulations, varying a single parameter
    Sweep {
        /// Parameter to vary (tsr, nti, nbelem, dynamic_stall)
        #[arg(default_value = "tsr")]
        parameter: SweepParam,

        #[arg(default_value_t = 0.4)]
        start: f64,

        #[arg(default_value_t = 3.5)]
        stop: f64,

        #[arg(default_value_t = 0.5)]
        step: f64,

        /// Explicit values instead of a range
        #[arg(long, value_delimiter = ',')]
        list: Option<Vec<f64>>,

        /// Delete an existing sweep table and restart
        #[arg(long)]
        overwrite: bool,

        /// Continue an existing sweep table
        #[arg(short, long)]
        append: bool,

        #[command(flatten)]
        opts: SolverOpts,
    },
    /// Write the tow tank wall mesh
    Walls {
        /// Output path, defaults to config/walls.xyz in the case directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Maximum node spacing in radii
        #[arg(long, default_value_t = 0.5)]
        spacing: f64,
    },
    /// Build the hybrid Jacobs/Sheldahl foil dataset
    Foildata {
        /// Directory with the per-Reynolds coefficient CSVs,
        /// defaults to config/foildata in the case directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output path, defaults next to the input data
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the wake probe specification from an experimental test plan
    Probes {
        /// Test plan CSV with a `y/R` column
        test_plan: PathBuf,

        /// Output path, defaults to config/probes.txt in the case directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut case = Case::new(&cli.case_dir).solver(cli.solver.as_str());
    if let Some(generator) = &cli.geom_generator {
        case = case.geom_generator(generator.as_str());
    }

    match cli.command {
        Command::Run { opts, overwrite } => {
            let params = opts.parameter_set();
            solver::run(&case, &params, overwrite)?;
            let record = results::aggregate(&case, &params)?;
            println!("cp = {:.4}, cd = {:.4}", record.cp, record.cd);
        }
        Command::Sweep {
            parameter,
            start,
            stop,
            step,
            list,
            overwrite,
            append,
            opts,
        } => {
            let values = match list {
                Some(values) => SweepValues::List(values),
                None => SweepValues::range(start, stop, step)?,
            };
            let records = sweep::sweep(
                &case,
                parameter,
                &values,
                &opts.parameter_set(),
                Disposition { overwrite, append },
            )?;
            println!(
                "{} sweep finished, {} points in {}",
                parameter,
                records.len(),
                sweep::table_path(&case, parameter, &opts.parameter_set()).display()
            );
        }
        Command::Walls { output, spacing } => {
            let output = output.unwrap_or_else(|| case.walls_path());
            let tank = walls::TowTank { spacing, ..walls::TowTank::default() };
            fs::create_dir_all(output.parent().context("wall mesh path has no parent")?)?;
            walls::write_tow_tank_walls(&output, &tank)?;
            info!("wrote wall mesh to {}", output.display());
        }
        Command::Foildata { data_dir, output } => {
            let data_dir = data_dir.unwrap_or_else(|| case.foildata_dir());
            let output = output.unwrap_or_else(|| data_dir.join(Foils::Jacobs.file_name()));
            let text = foildata::build_from_dir(&data_dir)?;
            fs::write(&output, text)?;
            info!("wrote foil dataset to {}", output.display());
        }
        Command::Probes { test_plan, output } => {
            let output = output.unwrap_or_else(|| case.config_dir().join("probes.txt"));
            fs::create_dir_all(output.parent().context("probe file path has no parent")?)?;
            probes::generate(&test_plan, &output)?;
            info!("wrote probe file to {}", output.display());
        }
    }
    Ok(())
}
