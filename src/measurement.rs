//! Impedance measurements that reuse one factorisation across voltage setups.

use ndarray::Array1;

use crate::{Error, Grid, ImpedanceResult, SolverError};

/// Voltage table slot of the ground conductors.
pub const GROUND_INDEX: u16 = 0;
/// Voltage table slot of the (positive) signal conductor.
pub const SIGNAL_POSITIVE_INDEX: u16 = 1;
/// Voltage table slot of the negative conductor of a differential pair.
pub const SIGNAL_NEGATIVE_INDEX: u16 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasurementKind {
    SingleEnded,
    Differential,
}

/// What to measure on a painted grid.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementSetup {
    pub kind: MeasurementKind,
    pub signal_amplitude: f64,
    /// Dielectric table entries that are replaced by the background
    /// permittivity for the unmasked result. No unmasked result when empty.
    pub soldermask_indices: Vec<usize>,
}

impl Default for MeasurementSetup {
    fn default() -> Self {
        Self {
            kind: MeasurementKind::SingleEnded,
            signal_amplitude: 1.0,
            soldermask_indices: Vec::new(),
        }
    }
}

/// Signal at `amplitude`, everything else grounded.
pub fn configure_single_ended_voltage(grid: &mut Grid, amplitude: f64) {
    grid.set_v_table(Array1::from(vec![0.0, amplitude, amplitude]));
    grid.v_input = amplitude;
}

/// Pair driven at `+/-amplitude`.
pub fn configure_odd_mode_voltage(grid: &mut Grid, amplitude: f64) {
    grid.set_v_table(Array1::from(vec![0.0, amplitude, -amplitude]));
    grid.v_input = 2.0*amplitude;
}

/// Pair driven together at `amplitude`.
pub fn configure_even_mode_voltage(grid: &mut Grid, amplitude: f64) {
    grid.set_v_table(Array1::from(vec![0.0, amplitude, amplitude]));
    grid.v_input = 2.0*amplitude;
}

/// Copy of `ek_table` with every soldermask entry set to the background permittivity.
pub fn unmask_dielectric(ek_table: &Array1<f64>, soldermask_indices: &[usize]) -> Array1<f64> {
    let mut unmasked = ek_table.clone();
    if let Some(&er0) = ek_table.get(0) {
        for &index in soldermask_indices.iter() {
            if let Some(ek) = unmasked.get_mut(index) {
                *ek = er0;
            }
        }
    }
    unmasked
}

#[derive(Clone, Debug)]
pub struct SingleEndedMeasurement {
    pub masked: ImpedanceResult,
    pub unmasked: Option<ImpedanceResult>,
}

#[derive(Clone, Debug)]
pub struct DifferentialMeasurement {
    pub odd_masked: ImpedanceResult,
    pub even_masked: ImpedanceResult,
    pub odd_unmasked: Option<ImpedanceResult>,
    /// `(Z_even - Z_odd)/(Z_even + Z_odd)`
    pub coupling_factor: f64,
}

#[derive(Clone, Debug)]
pub enum MeasurementResults {
    SingleEnded(SingleEndedMeasurement),
    Differential(DifferentialMeasurement),
}

/// The impedances of a grid and whether any of the runs behind them failed.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub results: MeasurementResults,
    /// First solver failure across the runs, if any.
    pub solver_error: Option<SolverError>,
}

impl Measurement {
    /// The impedance a search targets: single ended `Z0` or differential `Z0`.
    pub fn impedance(&self) -> &ImpedanceResult {
        match self.results {
            MeasurementResults::SingleEnded(ref m) => &m.masked,
            MeasurementResults::Differential(ref m) => &m.odd_masked,
        }
    }

    /// Whether a run failed or the headline result carries no field energy.
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.solver_error.is_some() || self.impedance().is_degenerate()
    }
}

/// Bakes the grid if needed and measures it with each voltage setup in turn.
///
/// The field does not depend on permittivity, so the unmasked results reuse
/// the run of their masked counterpart.
pub fn perform_measurement(grid: &mut Grid, setup: &MeasurementSetup) -> Result<Measurement, Error> {
    if !grid.is_baked() {
        grid.bake()?;
    }
    let unmasked_table = (!setup.soldermask_indices.is_empty())
        .then(|| unmask_dielectric(grid.ek_table(), &setup.soldermask_indices));
    let amplitude = setup.signal_amplitude;
    let mut solver_error = None;

    let mut calculate = |grid: &mut Grid| -> Result<(ImpedanceResult, Option<ImpedanceResult>), Error> {
        let run = grid.run()?;
        if solver_error.is_none() {
            solver_error = run.solver_error;
        }
        let masked = grid.calculate_impedance()?;
        let unmasked = match unmasked_table {
            Some(ref table) => Some(grid.calculate_impedance_with_table(table)?),
            None => None,
        };
        Ok((masked, unmasked))
    };

    let results = match setup.kind {
        MeasurementKind::SingleEnded => {
            configure_single_ended_voltage(grid, amplitude);
            let (masked, unmasked) = calculate(grid)?;
            MeasurementResults::SingleEnded(SingleEndedMeasurement { masked, unmasked })
        },
        MeasurementKind::Differential => {
            configure_even_mode_voltage(grid, amplitude);
            let (even_masked, _) = calculate(grid)?;
            configure_odd_mode_voltage(grid, amplitude);
            let (odd_masked, odd_unmasked) = calculate(grid)?;
            let (z_odd, z_even) = (odd_masked.z0, even_masked.z0);
            MeasurementResults::Differential(DifferentialMeasurement {
                odd_masked,
                even_masked,
                odd_unmasked,
                coupling_factor: (z_even-z_odd)/(z_even+z_odd),
            })
        },
    };
    Ok(Measurement { results, solver_error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexBeta;
    use approx::assert_relative_eq;

    /// Two signal strips between ground planes, with a mask layer over the strips.
    fn pair_grid() -> Grid {
        let (ny, nx) = (6, 12);
        let mut grid = Grid::new(ny, nx);
        let ground = IndexBeta::new(GROUND_INDEX, 1.0);
        grid.v_index_beta_mut().row_mut(0).fill(ground);
        grid.v_index_beta_mut().row_mut(ny).fill(ground);
        grid.v_index_beta_region([3, 3], [4, 5]).unwrap().fill(IndexBeta::new(SIGNAL_POSITIVE_INDEX, 1.0));
        grid.v_index_beta_region([3, 7], [4, 9]).unwrap().fill(IndexBeta::new(SIGNAL_NEGATIVE_INDEX, 1.0));
        grid.ek_index_beta_mut().fill(IndexBeta::new(1, 1.0));
        grid.ek_index_beta_region([2, 0], [4, 12]).unwrap().fill(IndexBeta::new(2, 1.0));
        grid.set_ek_table(Array1::from(vec![1.0, 4.0, 3.0]));
        grid
    }

    #[test]
    fn unmasking_restores_background() {
        let table = Array1::from(vec![1.0, 4.0, 3.5]);
        let unmasked = unmask_dielectric(&table, &[2, 9]);
        assert_eq!(unmasked.to_vec(), vec![1.0, 4.0, 1.0]);
    }

    #[test]
    fn single_ended_uses_unit_reference() {
        let mut grid = pair_grid();
        let setup = MeasurementSetup { soldermask_indices: vec![2], ..Default::default() };
        let measurement = perform_measurement(&mut grid, &setup).unwrap();
        assert!(!measurement.is_failed());
        assert_eq!(grid.v_input, 1.0);
        let result = match measurement.results {
            MeasurementResults::SingleEnded(ref m) => m,
            MeasurementResults::Differential(_) => panic!("expected single ended"),
        };
        // removing the mask lowers the loaded capacitance
        let unmasked = result.unmasked.as_ref().unwrap();
        assert!(unmasked.z0 > result.masked.z0);
        assert_relative_eq!(unmasked.energy_homogenous, result.masked.energy_homogenous);
    }

    #[test]
    fn differential_pair_has_weaker_even_coupling() {
        let mut grid = pair_grid();
        let setup = MeasurementSetup { kind: MeasurementKind::Differential, ..Default::default() };
        let measurement = perform_measurement(&mut grid, &setup).unwrap();
        let result = match measurement.results {
            MeasurementResults::Differential(ref m) => m,
            MeasurementResults::SingleEnded(_) => panic!("expected differential"),
        };
        assert!(result.odd_unmasked.is_none());
        assert!(result.coupling_factor > 0.0 && result.coupling_factor < 1.0);
        assert_relative_eq!(measurement.impedance().z0, result.odd_masked.z0);
        assert_eq!(grid.v_table().to_vec(), vec![0.0, 1.0, -1.0]);
    }
}
