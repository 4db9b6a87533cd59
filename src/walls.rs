use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use ndarray::{Array, Array2};
use thiserror::Error;

use crate::ROTOR_RADIUS;

/// A structured grid over one planar quadrilateral.
#[derive(Debug, Clone)]
pub struct QuadGrid {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub z: Array2<f64>,
}

impl QuadGrid {
    /// grid node counts `(n1, n2)`
    pub fn dims(&self) -> (usize, usize) {
        let shape = self.x.shape();
        (shape[0], shape[1])
    }
}

/// Generate a structured grid for a quadrilateral with four coplanar corners.
///
/// Corners are given in circulation order `a -> b -> c -> d`; `n1` nodes span
/// the `a -> b` direction, `n2` nodes the `a -> d` direction. Node positions
/// are bilinear weights of the corners over `(r, s)` in `[-1, 1]^2`.
pub fn gen_quad_grid(
    a: [f64; 3],
    b: [f64; 3],
    c: [f64; 3],
    d: [f64; 3],
    n1: usize,
    n2: usize,
) -> Result<QuadGrid, WallsError> {
    if !coplanar(a, b, c, d) {
        return Err(WallsError::NotCoplanar);
    }
    if n1 < 2 || n2 < 2 {
        return Err(WallsError::TooFewNodes { n1, n2 });
    }

    let r = Array::linspace(-1.0, 1.0, n1);
    let s = Array::linspace(-1.0, 1.0, n2);
    let mut x = Array2::zeros((n1, n2));
    let mut y = Array2::zeros((n1, n2));
    let mut z = Array2::zeros((n1, n2));

    for (i, &r_i) in r.iter().enumerate() {
        for (j, &s_j) in s.iter().enumerate() {
            for (axis, target) in [&mut x, &mut y, &mut z].into_iter().enumerate() {
                target[(i, j)] = 0.25
                    * ((1.0 - r_i) * (1.0 - s_j) * a[axis]
                        + (1.0 + r_i) * (1.0 - s_j) * b[axis]
                        + (1.0 + r_i) * (1.0 + s_j) * c[axis]
                        + (1.0 - r_i) * (1.0 + s_j) * d[axis]);
            }
        }
    }
    Ok(QuadGrid { x, y, z })
}

fn coplanar(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> bool {
    let u = sub(b, a);
    let v = sub(c, a);
    let w = sub(d, a);
    // volume spanned by the three edge vectors
    let det = u[0] * (v[1] * w[2] - v[2] * w[1]) - u[1] * (v[0] * w[2] - v[2] * w[0])
        + u[2] * (v[0] * w[1] - v[1] * w[0]);
    det.abs() < 1e-9
}

fn sub(lhs: [f64; 3], rhs: [f64; 3]) -> [f64; 3] {
    [lhs[0] - rhs[0], lhs[1] - rhs[1], lhs[2] - rhs[2]]
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Node counts giving at most the desired spacing along each direction.
pub fn node_counts(corners: [[f64; 3]; 4], ds1: f64, ds2: f64) -> (usize, usize) {
    let [a, b, c, d] = corners;
    let ab = norm(sub(b, a));
    let bc = norm(sub(c, b));
    let cd = norm(sub(d, c));
    let da = norm(sub(a, d));
    let n1 = (ab.max(cd) / ds1) as usize + 1;
    let n2 = (bc.max(da) / ds2) as usize + 1;
    (n1.max(2), n2.max(2))
}

/// Write a multi-block structured mesh in ASCII Plot3D format.
///
/// Block count, then the dimensions of every block, then per block all x,
/// all y and all z coordinates in Fortran order, one value per line.
pub fn write_plot3d<W: Write>(blocks: &[QuadGrid], writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", blocks.len())?;
    for block in blocks {
        let (n1, n2) = block.dims();
        writeln!(writer, "{} {} {}", n1, n2, 1)?;
    }
    for block in blocks {
        for axis in [&block.x, &block.y, &block.z] {
            for value in axis.t().iter() {
                writeln!(writer, "{value}")?;
            }
        }
    }
    Ok(())
}

/// The tow tank around the turbine, dimensions in metres.
#[derive(Debug, Clone)]
pub struct TowTank {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    /// normalizing radius, wall coordinates are non-dimensional
    pub radius: f64,
    /// maximum node spacing in radii
    pub spacing: f64,
}

impl Default for TowTank {
    fn default() -> Self {
        TowTank {
            width: 3.66,
            height: 2.44,
            length: 10.0,
            radius: ROTOR_RADIUS,
            spacing: 0.5,
        }
    }
}

impl TowTank {
    /// The four side walls of the tank as structured grids, shifted so the
    /// turbine center is the origin and normalized by the radius.
    pub fn wall_grids(&self) -> Result<Vec<QuadGrid>, WallsError> {
        let (w, h, l) = (self.width, self.height, self.length);
        // box corners, x along the tank, y up, z across
        let corners = [
            [0.0, 0.0, w],
            [0.0, h, w],
            [l, h, w],
            [l, 0.0, w],
            [0.0, 0.0, 0.0],
            [0.0, h, 0.0],
            [l, h, 0.0],
            [l, 0.0, 0.0],
        ];
        let center = [l / 2.0, h / 2.0, w / 2.0];
        let corners = corners.map(|corner| {
            [
                (corner[0] - center[0]) / self.radius,
                (corner[1] - center[1]) / self.radius,
                (corner[2] - center[2]) / self.radius,
            ]
        });

        // right, top, left, bottom
        let quads = [[0, 1, 2, 3], [1, 5, 6, 2], [5, 4, 7, 6], [4, 0, 3, 7]];
        let mut grids = Vec::with_capacity(quads.len());
        for quad in quads {
            let [a, b, c, d] = quad.map(|node| corners[node]);
            let (n1, n2) = node_counts([a, b, c, d], self.spacing, self.spacing);
            grids.push(gen_quad_grid(a, b, c, d, n1, n2)?);
        }
        Ok(grids)
    }
}

/// Write the tow tank wall mesh to `path`.
pub fn write_tow_tank_walls(path: &Path, tank: &TowTank) -> Result<(), WallsError> {
    let grids = tank.wall_grids()?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_plot3d(&grids, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum WallsError {
    #[error("quadrilateral corners are not coplanar")]
    NotCoplanar,
    #[error("a wall grid needs at least 2x2 nodes, got {n1}x{n2}")]
    TooFewNodes { n1: usize, n2: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn grid_interpolates_the_corners() {
        let grid = gen_quad_grid(
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            3,
            3,
        )
        .unwrap();
        // corners
        assert_relative_eq!(grid.x[(0, 0)], 0.0);
        assert_relative_eq!(grid.x[(2, 0)], 2.0);
        assert_relative_eq!(grid.y[(2, 2)], 1.0);
        assert_relative_eq!(grid.y[(0, 2)], 1.0);
        // centroid at r = s = 0
        assert_relative_eq!(grid.x[(1, 1)], 1.0);
        assert_relative_eq!(grid.y[(1, 1)], 0.5);
        assert_relative_eq!(grid.z[(1, 1)], 0.0);
    }

    #[test]
    fn skew_corners_are_rejected() {
        let err = gen_quad_grid(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.5],
            [0.0, 1.0, 0.0],
            3,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, WallsError::NotCoplanar));
    }

    #[test]
    fn node_counts_from_spacing() {
        let corners = [
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [10.0, 4.0, 0.0],
            [0.0, 4.0, 0.0],
        ];
        assert_eq!(node_counts(corners, 0.5, 0.5), (21, 9));
    }

    #[test]
    fn plot3d_layout() {
        let grid = gen_quad_grid(
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            2,
            2,
        )
        .unwrap();
        let mut out = Vec::new();
        write_plot3d(&[grid], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "2 2 1");
        // x values in transposed (Fortran) order: (0,0) (1,0) (0,1) (1,1)
        assert_eq!(&lines[2..6], &["0", "1", "0", "1"]);
        // then y, then z
        assert_eq!(&lines[6..10], &["0", "0", "1", "1"]);
        assert_eq!(&lines[10..14], &["0", "0", "0", "0"]);
    }

    #[test]
    fn tank_walls_are_centered_and_normalized() {
        let tank = TowTank::default();
        let grids = tank.wall_grids().unwrap();
        assert_eq!(grids.len(), 4);
        for grid in &grids {
            // x spans the tank length around the turbine
            let x_min = grid.x.iter().cloned().fold(f64::INFINITY, f64::min);
            let x_max = grid.x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert_relative_eq!(x_min, -tank.length / 2.0 / tank.radius, epsilon = 1e-9);
            assert_relative_eq!(x_max, tank.length / 2.0 / tank.radius, epsilon = 1e-9);
        }
    }
}
