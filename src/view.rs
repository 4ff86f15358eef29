//! Aliasing sub-views over grid arrays.
//!
//! Every grid buffer is an owned [`ndarray`] array. Reshape, transpose, stride,
//! reverse, fill and assign come from `ndarray` itself; this module adds the
//! `lo`/`hi` corner slicing the grid builder uses to paint rectangular regions
//! directly into a grid.

use ndarray::{ArrayBase, Dimension, RawData, Slice};

use crate::Error;

/// Corner based slicing of an n-dimensional array.
///
/// `lo(index)` drops everything before `index` along each axis and
/// `hi(index)` drops everything from `index` onwards. Chaining
/// `view.hi(end)?.lo(start)?` selects the half open box `[start, end)`.
/// The result aliases the original buffer.
pub trait LoHi: Sized {
    fn lo(self, index: &[usize]) -> Result<Self, Error>;
    fn hi(self, index: &[usize]) -> Result<Self, Error>;
}

impl<S: RawData, D: Dimension> LoHi for ArrayBase<S, D> {
    #[inline]
    fn lo(mut self, index: &[usize]) -> Result<Self, Error> {
        check_corner(self.shape(), index)?;
        self.slice_each_axis_inplace(|ax| Slice::from(index[ax.axis.index()]..));
        Ok(self)
    }

    #[inline]
    fn hi(mut self, index: &[usize]) -> Result<Self, Error> {
        check_corner(self.shape(), index)?;
        self.slice_each_axis_inplace(|ax| Slice::from(..index[ax.axis.index()]));
        Ok(self)
    }
}

fn check_corner(shape: &[usize], index: &[usize]) -> Result<(), Error> {
    let in_bounds = index.iter().zip(shape.iter()).all(|(i, n)| i <= n);
    if index.len() != shape.len() || !in_bounds {
        return Err(Error::BadShape {
            array_name: "Sub-view corner".to_string(),
            input_shape: index.to_vec(),
            expected_shape: shape.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};

    #[test]
    fn lo_hi_selects_box_and_aliases() {
        let mut data = Array2::<f64>::zeros((4, 5));
        data.view_mut()
            .hi(&[3, 4]).unwrap()
            .lo(&[1, 2]).unwrap()
            .fill(1.0);

        assert_eq!(data.sum(), 4.0);
        assert!(data.slice(s![1..3, 2..4]).iter().all(|&v| v == 1.0));
        assert_eq!(data[[0, 0]], 0.0);
        assert_eq!(data[[3, 4]], 0.0);
    }

    #[test]
    fn reversed_view_paints_from_the_end() {
        let mut data = ndarray::Array1::<f64>::zeros(5);
        let mut view = data.view_mut().lo(&[2]).unwrap();
        view.invert_axis(ndarray::Axis(0));
        for (i, v) in view.iter_mut().enumerate() {
            *v = i as f64;
        }
        assert_eq!(data.to_vec(), vec![0.0, 0.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn rank_mismatch_is_an_error() {
        let data = Array2::<f64>::zeros((2, 2));
        assert!(matches!(data.view().lo(&[1]), Err(Error::BadShape { .. })));
        assert!(matches!(data.view().hi(&[1, 3]), Err(Error::BadShape { .. })));
    }
}
