use std::path::Path;

use crate::{Error, Grid};

/// Where a grid's fields should be saved.
#[derive(Debug)]
pub struct SaveSettings<P: AsRef<Path>> {
    /// The path to the save file.
    pub filename: P,
    /// Whether or not to replace an existing file.
    pub overwrite: bool,
}

impl Grid {
    /// Writes the cell sizes, tables and fields to an HDF5 file.
    pub fn save<P: AsRef<Path>>(&self, settings: &SaveSettings<P>) -> Result<(), Error> {
        let filename = settings.filename.as_ref();
        if filename.exists() && !settings.overwrite {
            return Err(Error::FileExists(filename.display().to_string()));
        }
        let file = hdf5::File::create(filename)?;

        file.new_dataset_builder().with_data(self.dx()).create("dx")?;
        file.new_dataset_builder().with_data(self.dy()).create("dy")?;
        file.new_dataset_builder().with_data(self.v_table()).create("v_table")?;
        file.new_dataset_builder().with_data(self.ek_table()).create("ek_table")?;
        file.new_dataset_builder().with_data(self.v_field()).create("v_field")?;
        file.new_dataset_builder().with_data(self.ex_field()).create("ex_field")?;
        file.new_dataset_builder().with_data(self.ey_field()).create("ey_field")?;

        file.new_attr::<f64>()
            .shape(hdf5::Extents::Scalar)
            .create("v_input")?
            .write_scalar(&self.v_input)?;

        file.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_file_is_only_replaced_on_request() {
        let path = std::env::temp_dir().join("tline_es2d_save_test.h5");
        let grid = Grid::new(2, 3);
        grid.save(&SaveSettings { filename: &path, overwrite: true }).unwrap();
        assert!(matches!(
            grid.save(&SaveSettings { filename: &path, overwrite: false }),
            Err(Error::FileExists(_)),
        ));
        let file = hdf5::File::open(&path).unwrap();
        assert_eq!(file.dataset("v_field").unwrap().shape(), vec![3, 4]);
        assert_eq!(file.dataset("ex_field").unwrap().shape(), vec![3, 3]);
    }

    #[test]
    fn input_voltage_is_saved_as_attribute() {
        let path = std::env::temp_dir().join("tline_es2d_save_v_input_test.h5");
        let mut grid = Grid::new(2, 2);
        grid.v_input = 2.5;
        grid.save(&SaveSettings { filename: &path, overwrite: true }).unwrap();
        let file = hdf5::File::open(&path).unwrap();
        let v_input: f64 = file.attr("v_input").unwrap().read_scalar().unwrap();
        assert_eq!(v_input, 2.5);
    }
}
