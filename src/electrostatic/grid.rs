use std::time::Instant;

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2};

use crate::{Error, LinearSolver, SolverError};
use crate::electrostatic::{assemble_laplacian, energy, CsrMatrix, ImpedanceResult, SparseLu};
use crate::view::LoHi;

/// A table index with a blend factor.
///
/// For a node, `beta > 0.5` forces its voltage to `v_table[index]`. For a
/// cell, `beta` blends `ek_table[index]` over the background permittivity.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IndexBeta {
    pub index: u16,
    pub beta: f32,
}

impl IndexBeta {
    /// Creates a new `IndexBeta`, clamping `beta` into `[0, 1]`.
    #[inline]
    pub fn new(index: u16, beta: f32) -> Self {
        Self { index, beta: beta.clamp(0.0, 1.0) }
    }

    /// Whether a node with this value is held at a fixed voltage.
    #[inline]
    pub fn is_forced(&self) -> bool {
        self.beta > 0.5
    }
}

/// Information about a factorisation.
#[derive(Copy, Clone, Debug)]
pub struct BakeResult {
    /// Seconds spent assembling and factorising.
    pub time_taken: f64,
    pub total_nodes: usize,
    pub total_forced_nodes: usize,
    pub matrix_nnz: usize,
    pub factor_nnz: usize,
}

/// Information about a solve.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub total_steps: usize,
    pub total_cells: usize,
    /// Seconds spent building the right hand side, solving and deriving `E`.
    pub time_taken: f64,
    /// Cells solved per second.
    pub cell_rate: f64,
    /// Steps per second.
    pub step_rate: f64,
    /// Set when the linear solve failed, in which case the fields are not usable.
    pub solver_error: Option<SolverError>,
}

impl RunResult {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.solver_error.is_none()
    }
}

/// A non-uniform 2D grid of `Ny*Nx` cells and `(Ny+1)*(Nx+1)` nodes.
///
/// Configure it by writing the cell sizes, forced nodes and dielectric cells,
/// then [`bake`](Self::bake) once and [`run`](Self::run) for every set of
/// table values. The voltage and dielectric tables may change between runs.
/// Changing which nodes are forced requires a new bake.
pub struct Grid {
    ny: usize,
    nx: usize,
    dx: Array1<f64>,
    dy: Array1<f64>,
    v_index_beta: Array2<IndexBeta>,
    v_table: Array1<f64>,
    v_field: Array2<f64>,
    ex_field: Array2<f64>,
    ey_field: Array2<f64>,
    ek_index_beta: Array2<IndexBeta>,
    ek_table: Array1<f64>,
    /// Reference voltage the field energies are normalised by.
    pub v_input: f64,
    solver: Option<Box<dyn LinearSolver>>,
    baked_mask: Option<Array2<bool>>,
}

impl Grid {
    /// Creates a grid of unit cells with no forced nodes in vacuum.
    pub fn new(ny: usize, nx: usize) -> Self {
        Self {
            ny,
            nx,
            dx: Array1::ones(nx),
            dy: Array1::ones(ny),
            v_index_beta: Array2::default((ny+1, nx+1)),
            v_table: Array1::zeros(3),
            v_field: Array2::zeros((ny+1, nx+1)),
            ex_field: Array2::zeros((ny+1, nx)),
            ey_field: Array2::zeros((ny, nx+1)),
            ek_index_beta: Array2::default((ny, nx)),
            ek_table: Array1::ones(1),
            v_input: 1.0,
            solver: None,
            baked_mask: None,
        }
    }

    /// `(Ny, Nx)` in cells.
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn total_cells(&self) -> usize {
        self.nx*self.ny
    }

    #[inline]
    pub fn total_nodes(&self) -> usize {
        (self.nx+1)*(self.ny+1)
    }

    #[inline]
    pub fn dx(&self) -> &Array1<f64> {
        &self.dx
    }

    #[inline]
    pub fn dy(&self) -> &Array1<f64> {
        &self.dy
    }

    /// Sets the cell widths, which must all be positive.
    pub fn set_dx(&mut self, dx: &[f64]) -> Result<(), Error> {
        check_deltas("dx", dx, self.nx)?;
        self.dx.iter_mut().zip(dx.iter()).for_each(|(a, &b)| *a = b);
        Ok(())
    }

    /// Sets the cell heights, which must all be positive.
    pub fn set_dy(&mut self, dy: &[f64]) -> Result<(), Error> {
        check_deltas("dy", dy, self.ny)?;
        self.dy.iter_mut().zip(dy.iter()).for_each(|(a, &b)| *a = b);
        Ok(())
    }

    #[inline]
    pub fn v_index_beta(&self) -> ArrayView2<IndexBeta> {
        self.v_index_beta.view()
    }

    #[inline]
    pub fn v_index_beta_mut(&mut self) -> ArrayViewMut2<IndexBeta> {
        self.v_index_beta.view_mut()
    }

    /// Nodes `[start, end)` as `[y, x]` corners.
    #[inline]
    pub fn v_index_beta_region(
        &mut self,
        start: [usize; 2],
        end: [usize; 2],
    ) -> Result<ArrayViewMut2<IndexBeta>, Error> {
        self.v_index_beta.view_mut().hi(&end)?.lo(&start)
    }

    #[inline]
    pub fn ek_index_beta(&self) -> ArrayView2<IndexBeta> {
        self.ek_index_beta.view()
    }

    #[inline]
    pub fn ek_index_beta_mut(&mut self) -> ArrayViewMut2<IndexBeta> {
        self.ek_index_beta.view_mut()
    }

    /// Cells `[start, end)` as `[y, x]` corners.
    #[inline]
    pub fn ek_index_beta_region(
        &mut self,
        start: [usize; 2],
        end: [usize; 2],
    ) -> Result<ArrayViewMut2<IndexBeta>, Error> {
        self.ek_index_beta.view_mut().hi(&end)?.lo(&start)
    }

    #[inline]
    pub fn v_table(&self) -> &Array1<f64> {
        &self.v_table
    }

    /// Replaces the forced voltage table. Does not require a new bake.
    #[inline]
    pub fn set_v_table(&mut self, v_table: Array1<f64>) {
        self.v_table = v_table;
    }

    #[inline]
    pub fn ek_table(&self) -> &Array1<f64> {
        &self.ek_table
    }

    /// Replaces the relative permittivity table. Entry 0 is the background.
    #[inline]
    pub fn set_ek_table(&mut self, ek_table: Array1<f64>) {
        self.ek_table = ek_table;
    }

    /// Node voltages, shape `(Ny+1, Nx+1)`.
    #[inline]
    pub fn v_field(&self) -> &Array2<f64> {
        &self.v_field
    }

    /// Horizontal field on horizontal cell edges, shape `(Ny+1, Nx)`.
    #[inline]
    pub fn ex_field(&self) -> &Array2<f64> {
        &self.ex_field
    }

    /// Vertical field on vertical cell edges, shape `(Ny, Nx+1)`.
    #[inline]
    pub fn ey_field(&self) -> &Array2<f64> {
        &self.ey_field
    }

    /// Which nodes are currently forced.
    pub fn forced_mask(&self) -> Array2<bool> {
        self.v_index_beta.map(IndexBeta::is_forced)
    }

    #[inline]
    pub fn is_baked(&self) -> bool {
        self.solver.is_some()
    }

    /// Drops the factorisation.
    #[inline]
    pub fn unbake(&mut self) {
        self.solver = None;
        self.baked_mask = None;
    }

    /// Assembles the Laplacian and factorises it with [`SparseLu`].
    #[inline]
    pub fn bake(&mut self) -> Result<BakeResult, Error> {
        self.bake_with(SparseLu::factorise)
    }

    /// Assembles the Laplacian and factorises it with a custom strategy.
    pub fn bake_with<S, F>(&mut self, factorise: F) -> Result<BakeResult, Error>
    where
        S: LinearSolver + 'static,
        F: FnOnce(&CsrMatrix) -> Result<S, SolverError>,
    {
        self.unbake();
        let start = Instant::now();

        let mask = self.forced_mask();
        let a = assemble_laplacian(&self.dx, &self.dy, &mask);
        debug!(
            "Created CSR matrix ({0}x{0}, {1} non-zeros) in {2:.3e} s",
            a.nrows(), a.nnz(), start.elapsed().as_secs_f64(),
        );

        let factorise_start = Instant::now();
        let solver = factorise(&a)?;
        debug!(
            "Calculated LU factorisation ({} non-zeros) in {:.3e} s",
            solver.nnz(), factorise_start.elapsed().as_secs_f64(),
        );

        let result = BakeResult {
            time_taken: start.elapsed().as_secs_f64(),
            total_nodes: a.nrows(),
            total_forced_nodes: mask.iter().filter(|&&forced| forced).count(),
            matrix_nnz: a.nnz(),
            factor_nnz: solver.nnz(),
        };
        self.solver = Some(Box::new(solver));
        self.baked_mask = Some(mask);
        Ok(result)
    }

    /// Solves for the voltage field and derives the electric field.
    ///
    /// A failed linear solve is not an `Err`: it is logged and returned in
    /// [`RunResult::solver_error`], and the fields hold whatever the solver
    /// produced.
    pub fn run(&mut self) -> Result<RunResult, Error> {
        let start = Instant::now();
        let solver = self.solver.as_ref().ok_or(Error::NotBaked)?;
        let baked_mask = self.baked_mask.as_ref().ok_or(Error::NotBaked)?;
        let is_same_topology = baked_mask.iter()
            .zip(self.v_index_beta.iter())
            .all(|(&forced, index_beta)| forced == index_beta.is_forced());
        if !is_same_topology {
            return Err(Error::TopologyChanged);
        }

        // b holds the forced voltage on forced rows, zero elsewhere
        for (v, index_beta) in self.v_field.iter_mut().zip(self.v_index_beta.iter()) {
            *v = if index_beta.is_forced() {
                let index = index_beta.index as usize;
                *self.v_table.get(index).ok_or_else(|| Error::UnknownTableIndex {
                    table_name: "Voltage".to_string(),
                    index,
                    length: self.v_table.len(),
                })?
            } else {
                0.0
            };
        }
        debug!("Created b vector in {:.3e} s", start.elapsed().as_secs_f64());

        let solve_start = Instant::now();
        let expected_shape = vec![self.ny+1, self.nx+1];
        let rhs = self.v_field.as_slice_mut().ok_or(Error::BadShape {
            array_name: "Voltage field".to_string(),
            input_shape: expected_shape.clone(),
            expected_shape,
        })?;
        let solver_error = solver.solve(rhs).err();
        debug!("Solved voltage field in {:.3e} s", solve_start.elapsed().as_secs_f64());
        if let Some(ref error) = solver_error {
            warn!("LU solver failed: {}", error);
        }

        let field_start = Instant::now();
        energy::calculate_e_field(
            &self.v_field, &self.dx, &self.dy,
            &mut self.ex_field, &mut self.ey_field,
        );
        debug!("Calculated electric field in {:.3e} s", field_start.elapsed().as_secs_f64());

        let time_taken = start.elapsed().as_secs_f64();
        let total_cells = self.total_cells();
        let total_steps = 1;
        let rate = |count: usize| if time_taken > 0.0 { (count as f64)/time_taken } else { 0.0 };
        Ok(RunResult {
            total_steps,
            total_cells,
            time_taken,
            cell_rate: rate(total_cells),
            step_rate: rate(total_steps),
            solver_error,
        })
    }

    /// Zeroes the voltage and electric fields.
    pub fn reset(&mut self) {
        self.v_field.fill(0.0);
        self.ex_field.fill(0.0);
        self.ey_field.fill(0.0);
    }

    /// Derives the line parameters from the current fields.
    #[inline]
    pub fn calculate_impedance(&self) -> Result<ImpedanceResult, Error> {
        self.calculate_impedance_with_table(&self.ek_table)
    }

    /// Derives the line parameters with a different permittivity table.
    ///
    /// The field solution does not depend on permittivity, so this evaluates
    /// alternative materials without another run.
    pub fn calculate_impedance_with_table(
        &self,
        ek_table: &Array1<f64>,
    ) -> Result<ImpedanceResult, Error> {
        let start = Instant::now();
        let energy_homogenous = energy::calculate_homogenous_energy(
            &self.ex_field, &self.ey_field, &self.dx, &self.dy,
        );
        debug!("Calculated homogenous energy in {:.3e} s", start.elapsed().as_secs_f64());

        let start = Instant::now();
        let energy_inhomogenous = energy::calculate_inhomogenous_energy(
            &self.ex_field, &self.ey_field, &self.dx, &self.dy,
            ek_table, &self.ek_index_beta,
        )?;
        debug!("Calculated inhomogenous energy in {:.3e} s", start.elapsed().as_secs_f64());

        Ok(ImpedanceResult::from_energies(self.v_input, energy_homogenous, energy_inhomogenous))
    }
}

fn check_deltas(name: &str, deltas: &[f64], expected: usize) -> Result<(), Error> {
    let all_positive = deltas.iter().all(|&d| d.is_finite() && d > 0.0);
    if deltas.len() != expected || !all_positive {
        return Err(Error::BadShape {
            array_name: name.to_string(),
            input_shape: vec![deltas.len()],
            expected_shape: vec![expected],
        });
    }
    Ok(())
}
