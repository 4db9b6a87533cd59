use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use log::{debug, info};
use thiserror::Error;

use crate::walls::{self, WallsError};
use crate::{Case, ParameterSet};

/// Render the solver input file and any auxiliary geometry for `params`.
///
/// The input file is overwritten in place, callers must not assume the
/// previous configuration is retained. Rendering the same parameter set twice
/// produces byte identical output.
pub fn materialize(case: &Case, params: &ParameterSet) -> Result<(), MaterializeError> {
    let template_path = case.template_path();
    let template = fs::read_to_string(&template_path)
        .map_err(|source| MaterializeError::Template { path: template_path, source })?;
    let rendered = substitute(&template, &placeholder_values(params))?;
    info!("writing solver input to {}", case.input_path().display());
    fs::write(case.input_path(), rendered)?;

    ensure_geometry(case, params)?;
    if params.walls && !case.walls_path().exists() {
        info!("writing tow tank walls to {}", case.walls_path().display());
        walls::write_tow_tank_walls(&case.walls_path(), &walls::TowTank::default())?;
    }
    Ok(())
}

/// The values substituted into the input template.
///
/// Derived quantities (rotor speed, velocity in solver units) are computed
/// here rather than left to the solver.
fn placeholder_values(params: &ParameterSet) -> BTreeMap<&'static str, String> {
    let mut values = BTreeMap::new();
    values.insert("tsr", params.tsr.to_string());
    values.insert("rpm", params.rpm().to_string());
    values.insert("u_infty_fps", params.u_infty_fps().to_string());
    values.insert("dynamic_stall", params.dynamic_stall.index().to_string());
    values.insert("nti", params.nti.to_string());
    values.insert("nr", params.nr.to_string());
    values.insert("nbelem", params.nbelem.to_string());
    values.insert("walls", if params.walls { "1" } else { "0" }.to_string());
    values.insert(
        "foil_data",
        format!("../config/foildata/{}", params.foils.file_name()),
    );
    values
}

/// Replace every `{name}` placeholder in `template`.
///
/// A placeholder with no matching value is an error, leaving one unresolved
/// would hand the solver a broken input file.
fn substitute(
    template: &str,
    values: &BTreeMap<&'static str, String>,
) -> Result<String, MaterializeError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or(MaterializeError::UnterminatedPlaceholder)?;
        let key = &after[..end];
        let value = values
            .get(key)
            .ok_or_else(|| MaterializeError::MissingParameter(key.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Regenerate the geometry file when the blade element count changed.
///
/// The count a geometry was built with is tracked in a sidecar next to it.
/// Without a configured generator an existing geometry without sidecar is
/// accepted as-is, anything else is fatal before the solver runs.
fn ensure_geometry(case: &Case, params: &ParameterSet) -> Result<(), MaterializeError> {
    let geom = case.geom_path();
    let marker = case.geom_marker_path();
    let built_with: Option<u32> = fs::read_to_string(&marker)
        .ok()
        .and_then(|s| s.trim().parse().ok());

    if geom.exists() && built_with == Some(params.nbelem) {
        return Ok(());
    }

    let Some(generator) = case.geom_generator_command() else {
        return match built_with {
            None if geom.exists() => {
                debug!("using pre-built geometry {}", geom.display());
                Ok(())
            }
            None => Err(MaterializeError::MissingGeometry(geom)),
            Some(found) => Err(MaterializeError::StaleGeometry {
                expected: params.nbelem,
                found,
            }),
        };
    };

    info!("generating geometry with {} blade elements", params.nbelem);
    let status = Command::new(generator)
        .arg(&geom)
        .arg(params.nbelem.to_string())
        .status()?;
    if !status.success() {
        return Err(MaterializeError::GeneratorFailed { status });
    }
    if !geom.exists() {
        return Err(MaterializeError::MissingGeometry(geom));
    }
    fs::write(&marker, format!("{}\n", params.nbelem))?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("cannot read input template {}: {source}", .path.display())]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template placeholder `{{{0}}}` has no matching parameter")]
    MissingParameter(String),
    #[error("unterminated `{{` placeholder in input template")]
    UnterminatedPlaceholder,
    #[error("geometry file {} is missing and no geometry generator is configured", .0.display())]
    MissingGeometry(PathBuf),
    #[error(
        "geometry was built for {found} blade elements but {expected} were requested, \
         and no geometry generator is configured"
    )]
    StaleGeometry { expected: u32, found: u32 },
    #[error("geometry generator exited with {status}")]
    GeneratorFailed { status: ExitStatus },
    #[error(transparent)]
    Walls(#[from] WallsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
