use tline_es2d::prelude::*;
use tline_es2d::measurement::{GROUND_INDEX, SIGNAL_POSITIVE_INDEX};
use tline_es2d::search::SearchResults;

use ndarray::Array1;

// all lengths in mm
const DIELECTRIC_HEIGHT: f64 = 0.2;
const COPPER_THICKNESS: f64 = 0.035;
const ETCH_UNDERCUT: f64 = 0.01;
const FR4_PERMITTIVITY: f64 = 4.1;

/// An etched trace on top of a dielectric over a ground plane.
fn microstrip(trace_width: f64) -> Vec<Region> {
    let half_width = trace_width/2.0;
    let taper = ETCH_UNDERCUT.min(half_width/2.0);
    vec![
        Region::Dielectric {
            epsilon_index: 1,
            shapes: vec![Shape::horizontal_band(0.0, DIELECTRIC_HEIGHT)],
        },
        Region::Voltage {
            voltage_index: GROUND_INDEX,
            shapes: vec![Shape::horizontal_band(DIELECTRIC_HEIGHT, DIELECTRIC_HEIGHT+COPPER_THICKNESS)],
        },
        Region::Voltage {
            voltage_index: SIGNAL_POSITIVE_INDEX,
            shapes: vec![Shape::trapezoid(
                -half_width, half_width,
                -half_width+taper, half_width-taper,
                0.0, -COPPER_THICKNESS,
            )],
        },
    ]
}

fn measure(trace_width: f64) -> Result<Measurement, Error> {
    let padding = GridBuilderPadding { x_left: true, x_right: true, y_top: true, y_bottom: false };
    let config = GridBuilderConfig { padding_size_multiplier: 2.0, ..Default::default() };
    let mut grid = GridBuilder::new(&microstrip(trace_width), config, padding)?.into_grid();
    grid.set_ek_table(Array1::from(vec![1.0, FR4_PERMITTIVITY]));

    let bake = grid.bake()?;
    println!(
        "width {:.4} mm: {}x{} cells, {} forced nodes, {} LU non-zeros",
        trace_width, grid.height(), grid.width(), bake.total_forced_nodes, bake.factor_nnz,
    );
    perform_measurement(&mut grid, &MeasurementSetup::default())
}

fn main() {
    let measurement = measure(0.35).unwrap();
    let impedance = measurement.impedance();
    println!(
        "\n-- Microstrip --\n\
        Z0:           {:<9.3} Ω\n\
        εr effective: {:<9.3}\n\
        Cih:          {:<9.3e} F/m\n\
        Lh:           {:<9.3e} H/m\n\
        Delay:        {:<9.3e} s/m\n",
        impedance.z0,
        impedance.effective_permittivity(),
        impedance.cih,
        impedance.lh,
        impedance.propagation_delay,
    );

    println!("-- Searching for a 50 Ω trace width --");
    let mut desc = SearchDescriptor::new(50.0, ImpedanceCorrelation::Negative);
    desc.initial_value = Some(0.35);
    desc.min_value = Some(0.05);
    desc.max_value = Some(2.0);
    desc.verbose = true;
    let results: SearchResults<Measurement> = perform_parameter_search(&desc, measure).unwrap();

    let best = results.best();
    println!(
        "\nStopped with {:?} after {} steps\n\
        Best width:   {:.4} mm\n\
        Z0:           {:.3} Ω\n\
        Error:        {:.3e}",
        results.stop_reason,
        results.samples.len(),
        best.value,
        best.impedance,
        results.best_relative_error(),
    );
}
