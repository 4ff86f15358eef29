use tline_es2d::prelude::*;
use tline_es2d::search::SearchOutput;

use approx::assert_relative_eq;
use ndarray::Array1;

#[test]
fn shorted_domain_solves_to_constant_voltage() {
    let mut grid = Grid::new(4, 6);
    grid.set_dx(&[0.1, 0.2, 0.4, 0.4, 0.2, 0.1]).unwrap();
    grid.v_index_beta_mut().fill(IndexBeta::new(1, 1.0));
    grid.set_v_table(Array1::from(vec![0.0, 2.5]));

    let bake = grid.bake().unwrap();
    assert_eq!(bake.total_forced_nodes, grid.total_nodes());
    assert!(grid.run().unwrap().is_ok());
    for &v in grid.v_field().iter() {
        assert_relative_eq!(v, 2.5);
    }

    let impedance = grid.calculate_impedance().unwrap();
    assert!(impedance.energy_homogenous.abs() < 1e-12);
    assert!(impedance.is_degenerate());
    assert!(SearchOutput::is_failed(&impedance));
}

#[test]
fn conductors_at_equal_voltage_are_degenerate() {
    // signal and ground plates both driven to the same potential
    let regions = vec![
        Region::Voltage { voltage_index: 0, shapes: vec![Shape::rectangle(0.0, 4.0, 0.0, 0.0)] },
        Region::Voltage { voltage_index: 1, shapes: vec![Shape::rectangle(0.0, 4.0, 1.0, 1.0)] },
    ];
    let mut grid = GridBuilder::new(&regions, GridBuilderConfig::default(), GridBuilderPadding::default())
        .unwrap()
        .into_grid();
    grid.set_v_table(Array1::from(vec![1.0, 1.0]));
    grid.bake().unwrap();
    grid.run().unwrap();
    assert!(grid.v_field().iter().all(|&v| (v-1.0).abs() < 1e-9));
    assert!(grid.calculate_impedance().unwrap().is_degenerate());
}
