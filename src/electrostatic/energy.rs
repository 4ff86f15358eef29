//! Electric field derivation and field energy integrals.
//!
//! `Ex` lives on horizontal cell edges `(Ny+1, Nx)` and `Ey` on vertical cell
//! edges `(Ny, Nx+1)`. Within a cell both components are taken to vary
//! linearly between their two edges, which the 2x2 Gauss-Legendre rule
//! integrates exactly once squared.

use ndarray::{Array1, Array2};

use crate::Error;
use crate::electrostatic::IndexBeta;

/// Relative positions of the two Gauss-Legendre points on `[0, 1]`,
/// `(1 -/+ 1/sqrt(3))/2`.
const GAUSS_A0: f64 = 0.21132486540518713;
const GAUSS_A1: f64 = 0.7886751345948129;

/// Writes `E = -grad(V)` by forward differences.
pub fn calculate_e_field(
    v_field: &Array2<f64>,
    dx: &Array1<f64>,
    dy: &Array1<f64>,
    ex_field: &mut Array2<f64>,
    ey_field: &mut Array2<f64>,
) {
    let nx = dx.len();
    let ny = dy.len();
    for y in 0..ny+1 {
        for x in 0..nx {
            ex_field[[y, x]] = -(v_field[[y, x+1]]-v_field[[y, x]])/dx[x];
        }
    }
    for y in 0..ny {
        for x in 0..nx+1 {
            ey_field[[y, x]] = -(v_field[[y+1, x]]-v_field[[y, x]])/dy[y];
        }
    }
}

/// Integral of `|E|^2` over one `dx*dy` cell from its four edge samples.
#[inline]
fn gauss_legendre_cell(ex0: f64, ex1: f64, ey0: f64, ey1: f64, dx: f64, dy: f64) -> f64 {
    let ex0_sample = ex0*GAUSS_A1 + ex1*GAUSS_A0;
    let ex1_sample = ex0*GAUSS_A0 + ex1*GAUSS_A1;
    let ey0_sample = ey0*GAUSS_A1 + ey1*GAUSS_A0;
    let ey1_sample = ey0*GAUSS_A0 + ey1*GAUSS_A1;

    let f00 = ex0_sample.powi(2) + ey0_sample.powi(2);
    let f01 = ex0_sample.powi(2) + ey1_sample.powi(2);
    let f10 = ex1_sample.powi(2) + ey0_sample.powi(2);
    let f11 = ex1_sample.powi(2) + ey1_sample.powi(2);
    (f00+f01+f10+f11)*(dx*dy)/4.0
}

/// Energy (per unit permittivity) with vacuum everywhere.
pub fn calculate_homogenous_energy(
    ex_field: &Array2<f64>,
    ey_field: &Array2<f64>,
    dx: &Array1<f64>,
    dy: &Array1<f64>,
) -> f64 {
    let mut energy = 0.0;
    for (y, &dy) in dy.iter().enumerate() {
        for (x, &dx) in dx.iter().enumerate() {
            energy += gauss_legendre_cell(
                ex_field[[y, x]], ex_field[[y+1, x]],
                ey_field[[y, x]], ey_field[[y, x+1]],
                dx, dy,
            );
        }
    }
    energy
}

/// Energy (per unit vacuum permittivity) weighted by each cell's relative permittivity.
///
/// A cell blends the background permittivity `ek_table[0]` with its own
/// table entry: `(1-beta)*ek_table[0] + beta*ek_table[index]`.
pub fn calculate_inhomogenous_energy(
    ex_field: &Array2<f64>,
    ey_field: &Array2<f64>,
    dx: &Array1<f64>,
    dy: &Array1<f64>,
    ek_table: &Array1<f64>,
    ek_index_beta: &Array2<IndexBeta>,
) -> Result<f64, Error> {
    let er0 = lookup(ek_table, 0)?;
    let mut energy = 0.0;
    for (y, &dy) in dy.iter().enumerate() {
        for (x, &dx) in dx.iter().enumerate() {
            let cell = gauss_legendre_cell(
                ex_field[[y, x]], ex_field[[y+1, x]],
                ey_field[[y, x]], ey_field[[y, x+1]],
                dx, dy,
            );
            let IndexBeta { index, beta } = ek_index_beta[[y, x]];
            let beta = beta as f64;
            let er_cell = (1.0-beta)*er0 + beta*lookup(ek_table, index as usize)?;
            energy += er_cell*cell;
        }
    }
    Ok(energy)
}

#[inline]
fn lookup(ek_table: &Array1<f64>, index: usize) -> Result<f64, Error> {
    ek_table.get(index).copied().ok_or_else(|| Error::UnknownTableIndex {
        table_name: "Dielectric".to_string(),
        index,
        length: ek_table.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_potential_gradient(nx: usize, ny: usize) -> (Array1<f64>, Array1<f64>, Array2<f64>) {
        let dx = Array1::from_elem(nx, 0.5);
        let dy = Array1::from(vec![0.1, 0.2, 0.3, 0.4][..ny].to_vec());
        let mut v = Array2::<f64>::zeros((ny+1, nx+1));
        let mut y_line = 0.0;
        for y in 0..ny+1 {
            for x in 0..nx+1 {
                // V = 2*y, so Ey = -2 and Ex = 0
                v[[y, x]] = 2.0*y_line;
            }
            if y < ny {
                y_line += dy[y];
            }
        }
        (dx, dy, v)
    }

    #[test]
    fn uniform_field_energy_is_area_times_field_squared() {
        let (dx, dy, v) = uniform_potential_gradient(3, 4);
        let mut ex = Array2::zeros((5, 3));
        let mut ey = Array2::zeros((4, 4));
        calculate_e_field(&v, &dx, &dy, &mut ex, &mut ey);
        assert!(ex.iter().all(|&e| e.abs() < 1e-12));
        assert!(ey.iter().all(|&e| (e+2.0).abs() < 1e-12));

        let area = 1.5*1.0;
        let energy = calculate_homogenous_energy(&ex, &ey, &dx, &dy);
        assert_relative_eq!(energy, 4.0*area, max_relative = 1e-12);
    }

    #[test]
    fn dielectric_blend_scales_cell_energy() {
        let (dx, dy, v) = uniform_potential_gradient(2, 2);
        let mut ex = Array2::zeros((3, 2));
        let mut ey = Array2::zeros((2, 3));
        calculate_e_field(&v, &dx, &dy, &mut ex, &mut ey);
        let homogenous = calculate_homogenous_energy(&ex, &ey, &dx, &dy);

        let ek_table = Array1::from(vec![1.0, 4.0]);
        let mut ek_index_beta = Array2::from_elem((2, 2), IndexBeta::default());
        assert_relative_eq!(
            calculate_inhomogenous_energy(&ex, &ey, &dx, &dy, &ek_table, &ek_index_beta).unwrap(),
            homogenous,
            max_relative = 1e-12,
        );

        ek_index_beta.fill(IndexBeta::new(1, 0.5));
        assert_relative_eq!(
            calculate_inhomogenous_energy(&ex, &ey, &dx, &dy, &ek_table, &ek_index_beta).unwrap(),
            2.5*homogenous,
            max_relative = 1e-6,
        );
    }

    #[test]
    fn linear_field_is_integrated_exactly() {
        // Ex varies linearly along y inside a single cell
        let ex = ndarray::arr2(&[[1.0], [3.0]]);
        let ey = Array2::zeros((1, 2));
        let dx = Array1::from(vec![2.0]);
        let dy = Array1::from(vec![1.0]);
        // int_0^1 (1+2y)^2 dy * dx = (13/3)*2
        let energy = calculate_homogenous_energy(&ex, &ey, &dx, &dy);
        assert_relative_eq!(energy, 26.0/3.0, max_relative = 1e-12);
    }

    #[test]
    fn unknown_dielectric_index_is_an_error() {
        let ex = Array2::zeros((2, 1));
        let ey = Array2::zeros((1, 2));
        let dx = Array1::from(vec![1.0]);
        let dy = Array1::from(vec![1.0]);
        let ek_table = Array1::from(vec![1.0]);
        let ek_index_beta = Array2::from_elem((1, 1), IndexBeta::new(3, 1.0));
        assert!(matches!(
            calculate_inhomogenous_energy(&ex, &ey, &dx, &dy, &ek_table, &ek_index_beta),
            Err(Error::UnknownTableIndex { index: 3, length: 1, .. }),
        ));
    }
}
