use tline_es2d::prelude::*;
use tline_es2d::DenseLu;

use approx::assert_relative_eq;
use ndarray::Array1;
use physical_constants::{SPEED_OF_LIGHT_IN_VACUUM, VACUUM_ELECTRIC_PERMITTIVITY};

const WIDTH: f64 = 50.0;
const HEIGHT: f64 = 1.0;
const PERMITTIVITY: f64 = 4.1;

fn plate_grid(config: GridBuilderConfig) -> Grid {
    padded_plate_grid(config, GridBuilderPadding::default())
}

fn padded_plate_grid(config: GridBuilderConfig, padding: GridBuilderPadding) -> Grid {
    let regions = vec![
        Region::Dielectric {
            epsilon_index: 1,
            shapes: vec![Shape::rectangle(0.0, WIDTH, 0.0, HEIGHT)],
        },
        Region::Voltage { voltage_index: 1, shapes: vec![Shape::rectangle(0.0, WIDTH, 0.0, 0.0)] },
        Region::Voltage { voltage_index: 2, shapes: vec![Shape::rectangle(0.0, WIDTH, HEIGHT, HEIGHT)] },
    ];
    let mut grid = GridBuilder::new(&regions, config, padding)
        .unwrap()
        .into_grid();
    grid.set_ek_table(Array1::from(vec![1.0, PERMITTIVITY]));
    grid.set_v_table(Array1::from(vec![0.0, 1.0, -1.0]));
    grid.v_input = 2.0;
    grid
}

/// `Z0` of an ideal parallel plate line from `C = er*e0*W/h`.
fn analytic_z0() -> f64 {
    let e0 = VACUUM_ELECTRIC_PERMITTIVITY;
    let c0 = SPEED_OF_LIGHT_IN_VACUUM;
    let ch = e0*WIDTH/HEIGHT;
    let cih = PERMITTIVITY*ch;
    let lh = 1.0/(c0*c0*ch);
    (lh/cih).sqrt()
}

#[test]
fn impedance_matches_analytic_parallel_plate() {
    let mut grid = plate_grid(GridBuilderConfig::default());
    grid.bake().unwrap();
    assert!(grid.run().unwrap().is_ok());
    let impedance = grid.calculate_impedance().unwrap();

    assert!(!impedance.is_degenerate());
    assert_relative_eq!(impedance.z0, analytic_z0(), max_relative = 0.05);
    assert_relative_eq!(impedance.effective_permittivity(), PERMITTIVITY, max_relative = 1e-6);
}

#[test]
fn finer_grid_gives_the_same_answer() {
    let fine = GridBuilderConfig { min_x_subdivisions: 40, min_y_subdivisions: 20, ..Default::default() };
    let mut grid = plate_grid(fine);
    assert_eq!(grid.size(), (20, 40));
    grid.bake().unwrap();
    grid.run().unwrap();
    let impedance = grid.calculate_impedance().unwrap();
    assert_relative_eq!(impedance.z0, analytic_z0(), max_relative = 0.05);
}

#[test]
fn dense_and_sparse_factorisations_agree() {
    let mut grid = plate_grid(GridBuilderConfig::default());
    grid.bake().unwrap();
    grid.run().unwrap();
    let sparse = grid.calculate_impedance().unwrap();

    grid.bake_with(DenseLu::factorise).unwrap();
    grid.run().unwrap();
    let dense = grid.calculate_impedance().unwrap();
    assert_relative_eq!(sparse.z0, dense.z0, max_relative = 1e-9);
}

fn padded_z0(min_x_subdivisions: usize, min_y_subdivisions: usize) -> f64 {
    let config = GridBuilderConfig { min_x_subdivisions, min_y_subdivisions, ..Default::default() };
    let mut grid = padded_plate_grid(config, GridBuilderPadding::all());
    grid.bake().unwrap();
    assert!(grid.run().unwrap().is_ok());
    let impedance = grid.calculate_impedance().unwrap();
    assert!(!impedance.is_degenerate());
    impedance.z0
}

#[test]
fn padded_plates_converge_below_ideal_impedance() {
    let coarse = padded_z0(10, 5);
    let medium = padded_z0(20, 10);
    let reference = padded_z0(40, 20);

    // fringing fields add capacitance outside the plates
    for &z0 in [coarse, medium, reference].iter() {
        assert!(z0 < analytic_z0());
        assert!(z0 > 0.9*analytic_z0());
    }
    assert!((medium-reference).abs() < (coarse-reference).abs());
}
