use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use log::info;
use thiserror::Error;

use crate::input::{self, MaterializeError};
use crate::{Case, ParameterSet};

/// Run the solver for `params`, blocking until it exits.
///
/// A non-empty run log marks existing results: unless `overwrite` is set the
/// call fails fast without touching anything, a guard against clobbering runs
/// that took hours to produce. Otherwise prior output is cleaned, inputs are
/// materialized and the solver is executed with its combined stdout/stderr
/// teed to the log file. There is no timeout and no cancellation, a stuck
/// solver is killed externally.
pub fn run(case: &Case, params: &ParameterSet, overwrite: bool) -> Result<(), RunError> {
    let log_path = case.log_path();
    if !overwrite && log_path.exists() && fs::metadata(&log_path)?.len() > 0 {
        return Err(RunError::ResultsPresent(log_path));
    }

    clean(case)?;
    input::materialize(case, params)?;
    fs::create_dir_all(case.results_dir())?;

    // the solver resolves relative paths in its input file against its
    // working directory, which must be the results directory
    let input_path = case.input_path().canonicalize()?;
    info!(
        "running `{} {}` in {}",
        case.solver_command(),
        input_path.display(),
        case.results_dir().display()
    );

    let mut log = File::create(&log_path)?;
    let mut child = Command::new(case.solver_command())
        .arg(&input_path)
        .current_dir(case.results_dir())
        .stdout(Stdio::piped())
        .stderr(log.try_clone()?)
        .spawn()?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            println!("{line}");
            writeln!(log, "{line}")?;
        }
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(RunError::SolverFailed {
            command: case.solver_command().to_string(),
            status,
        });
    }
    Ok(())
}

/// Remove the results directory and run log of a previous invocation.
pub fn clean(case: &Case) -> io::Result<()> {
    remove_if_present(fs::remove_dir_all(case.results_dir()))?;
    remove_if_present(fs::remove_file(case.log_path()))
}

fn remove_if_present(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "simulation results present ({} is not empty); rerun with overwrite to replace them",
        .0.display()
    )]
    ResultsPresent(PathBuf),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error("solver `{command}` exited with {status}")]
    SolverFailed { command: String, status: ExitStatus },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::Case;

    fn scratch_case() -> (TempDir, Case) {
        let dir = TempDir::new().unwrap();
        let case = Case::new(dir.path());
        fs::create_dir_all(case.config_dir()).unwrap();
        fs::write(case.template_path(), "tsr = {tsr}\n").unwrap();
        fs::write(case.geom_path(), "geometry\n").unwrap();
        (dir, case)
    }

    #[test]
    fn existing_results_fail_fast() {
        let (_dir, case) = scratch_case();
        fs::write(case.log_path(), "previous run\n").unwrap();
        let err = run(&case, &ParameterSet::default(), false).unwrap_err();
        assert!(matches!(err, RunError::ResultsPresent(_)));
        // nothing was materialized
        assert!(!case.input_path().exists());
    }

    #[test]
    fn empty_log_is_not_a_prior_run() {
        let (_dir, case) = scratch_case();
        fs::write(case.log_path(), "").unwrap();
        // solver is bogus, but the guard must not trip before it
        let err = run(&case, &ParameterSet::default(), false).unwrap_err();
        assert!(!matches!(err, RunError::ResultsPresent(_)));
    }

    #[cfg(unix)]
    #[test]
    fn stub_solver_output_is_teed_to_log() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, case) = scratch_case();
        let stub = dir.path().join("solver.sh");
        fs::write(&stub, "#!/bin/sh\necho \"input: $1\"\necho progress\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        let case = case.solver(stub.display().to_string());

        run(&case, &ParameterSet::default(), true).unwrap();
        let log = fs::read_to_string(case.log_path()).unwrap();
        assert!(log.contains("progress"));
        assert!(case.results_dir().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, case) = scratch_case();
        let stub = dir.path().join("solver.sh");
        fs::write(&stub, "#!/bin/sh\necho diverged\nexit 3\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
        let case = case.solver(stub.display().to_string());

        let err = run(&case, &ParameterSet::default(), true).unwrap_err();
        assert!(matches!(err, RunError::SolverFailed { .. }));
    }

    #[test]
    fn clean_ignores_missing_artifacts() {
        let (_dir, case) = scratch_case();
        clean(&case).unwrap();
        fs::create_dir_all(case.results_dir()).unwrap();
        fs::write(case.log_path(), "log\n").unwrap();
        clean(&case).unwrap();
        assert!(!case.results_dir().exists());
        assert!(!case.log_path().exists());
    }
}
