use tline_es2d::prelude::*;
use tline_es2d::measurement::{
    MeasurementResults, GROUND_INDEX, SIGNAL_NEGATIVE_INDEX, SIGNAL_POSITIVE_INDEX,
};

use ndarray::Array1;

// all lengths in mm
const TRACE_WIDTH: f64 = 0.15;
const TRACE_SEPARATION: f64 = 0.15;
const COPPER_THICKNESS: f64 = 0.035;
const DIELECTRIC_HEIGHT: f64 = 0.1;
const SOLDERMASK_THICKNESS: f64 = 0.02;

fn main() {
    let x_positive = TRACE_SEPARATION/2.0;
    let x_negative = -TRACE_SEPARATION/2.0-TRACE_WIDTH;
    let mask_top = -COPPER_THICKNESS-SOLDERMASK_THICKNESS;
    let mask_left = x_negative-SOLDERMASK_THICKNESS;
    let mask_right = x_positive+TRACE_WIDTH+SOLDERMASK_THICKNESS;

    let regions = vec![
        Region::Dielectric {
            epsilon_index: 1,
            shapes: vec![Shape::horizontal_band(0.0, DIELECTRIC_HEIGHT)],
        },
        Region::Dielectric {
            epsilon_index: 2,
            shapes: vec![Shape::rectangle(mask_left, mask_right, mask_top, 0.0)],
        },
        Region::Voltage {
            voltage_index: GROUND_INDEX,
            shapes: vec![Shape::horizontal_band(DIELECTRIC_HEIGHT, DIELECTRIC_HEIGHT+COPPER_THICKNESS)],
        },
        Region::Voltage {
            voltage_index: SIGNAL_POSITIVE_INDEX,
            shapes: vec![Shape::rectangle(x_positive, x_positive+TRACE_WIDTH, -COPPER_THICKNESS, 0.0)
                .with_min_gridlines(Some(20), None)],
        },
        Region::Voltage {
            voltage_index: SIGNAL_NEGATIVE_INDEX,
            shapes: vec![Shape::rectangle(x_negative, x_negative+TRACE_WIDTH, -COPPER_THICKNESS, 0.0)
                .with_min_gridlines(Some(20), None)],
        },
    ];

    let padding = GridBuilderPadding { x_left: true, x_right: true, y_top: true, y_bottom: false };
    let builder = GridBuilder::new(&regions, GridBuilderConfig::default(), padding).unwrap();
    let mut grid = builder.into_grid();
    grid.set_ek_table(Array1::from(vec![1.0, 4.1, 3.8]));

    let setup = MeasurementSetup {
        kind: MeasurementKind::Differential,
        soldermask_indices: vec![2],
        ..Default::default()
    };
    let measurement = perform_measurement(&mut grid, &setup).unwrap();
    if let Some(ref error) = measurement.solver_error {
        println!("Solver reported: {}", error);
    }

    if let MeasurementResults::Differential(ref result) = measurement.results {
        println!(
            "\n-- Differential Pair --\n\
            Grid:               {}x{} cells\n\
            Z differential:     {:.3} Ω\n\
            Z even:             {:.3} Ω\n\
            Z diff (no mask):   {:.3} Ω\n\
            Coupling factor:    {:.4}",
            grid.height(), grid.width(),
            result.odd_masked.z0,
            result.even_masked.z0,
            result.odd_unmasked.map_or(f64::NAN, |r| r.z0),
            result.coupling_factor,
        );
    }
}
