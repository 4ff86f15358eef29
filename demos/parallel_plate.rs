use tline_es2d::prelude::*;
use tline_es2d::electrostatic::{C_0, EPSILON_0};

use ndarray::Array1;

fn main() {
    let width = 50.0; // [mm]
    let height = 1.0; // [mm]
    let permittivity = 4.1;

    // plates span the whole grid, so the side walls see no fringing
    let regions = vec![
        Region::Dielectric {
            epsilon_index: 1,
            shapes: vec![Shape::rectangle(0.0, width, 0.0, height)],
        },
        Region::Voltage { voltage_index: 1, shapes: vec![Shape::rectangle(0.0, width, 0.0, 0.0)] },
        Region::Voltage { voltage_index: 2, shapes: vec![Shape::rectangle(0.0, width, height, height)] },
    ];
    let builder = GridBuilder::new(&regions, GridBuilderConfig::default(), GridBuilderPadding::default())
        .unwrap();
    let mut grid = builder.into_grid();
    grid.set_ek_table(Array1::from(vec![1.0, permittivity]));
    grid.set_v_table(Array1::from(vec![0.0, 1.0, -1.0]));
    grid.v_input = 2.0;

    grid.bake().unwrap();
    let run = grid.run().unwrap();
    let impedance = grid.calculate_impedance().unwrap();

    let capacitance = permittivity*EPSILON_0*width/height;
    let expected_z0 = (1.0/(C_0*C_0*capacitance/permittivity)/capacitance).sqrt();
    println!(
        "\n-- Parallel Plate --\n\
        Cells:        {}\n\
        Solve time:   {:.3e} s\n\
        Z0:           {:.4} Ω\n\
        Analytic Z0:  {:.4} Ω\n\
        Cih:          {:.4e} F/m\n\
        Analytic C:   {:.4e} F/m",
        run.total_cells,
        run.time_taken,
        impedance.z0,
        expected_z0,
        impedance.cih,
        capacitance,
    );
}
