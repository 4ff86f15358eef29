use ndarray::{Array1, Array2};

use crate::electrostatic::CsrMatrix;

/// Assembles `A` for `A*v = b` over the `(Ny+1)*(Nx+1)` grid nodes.
///
/// Nodes are flattened row major, `i = x + y*(Nx+1)`. Every node contributes
/// one row. Forced nodes and the four domain corners get identity rows. The
/// rest constrain the divergence of `E = -grad(V)` to zero with a five point
/// stencil over the unequal neighbouring cell sizes:
///
/// ```text
/// div(E)[y,x] = (Ex[y,x]-Ex[y,x-1])/(dx[x]+dx[x-1])
///             + (Ey[y,x]-Ey[y-1,x])/(dy[y]+dy[y-1])
/// Ex[y,x] = -(V[y,x+1]-V[y,x])/dx[x]
/// Ey[y,x] = -(V[y+1,x]-V[y,x])/dy[y]
/// ```
///
/// Nodes on a domain edge only carry the term along that edge, which leaves
/// a zero normal derivative at the outer boundary.
pub fn assemble_laplacian(
    dx: &Array1<f64>,
    dy: &Array1<f64>,
    is_forced: &Array2<bool>,
) -> CsrMatrix {
    let nx = dx.len();
    let ny = dy.len();
    let row_stride = nx+1;
    let total_nodes = (ny+1)*(nx+1);
    let mut a = CsrMatrix::with_capacity(total_nodes, total_nodes, 5*total_nodes);

    for y in 0..ny+1 {
        for x in 0..nx+1 {
            a.push_row();
            let iv = x + y*row_stride;
            let has_x_constraint = x > 0 && x < nx;
            let has_y_constraint = y > 0 && y < ny;
            if is_forced[[y, x]] || !(has_x_constraint || has_y_constraint) {
                a.push_entry(1.0, iv);
                continue;
            }

            // columns: iv-(Nx+1), iv-1, iv, iv+1, iv+(Nx+1)
            let mut column_value = [0.0; 5];
            if has_x_constraint {
                let dx_0 = dx[x-1];
                let dx_1 = dx[x];
                let norm = dx_0+dx_1;
                column_value[1] -= (1.0/dx_0)/norm;
                column_value[2] += (1.0/dx_0 + 1.0/dx_1)/norm;
                column_value[3] -= (1.0/dx_1)/norm;
            }
            if has_y_constraint {
                let dy_0 = dy[y-1];
                let dy_1 = dy[y];
                let norm = dy_0+dy_1;
                column_value[0] -= (1.0/dy_0)/norm;
                column_value[2] += (1.0/dy_0 + 1.0/dy_1)/norm;
                column_value[4] -= (1.0/dy_1)/norm;
            }

            for (i, &value) in column_value.iter().enumerate() {
                if value != 0.0 {
                    // only reached for neighbours that exist
                    let column = match i {
                        0 => iv-row_stride,
                        1 => iv-1,
                        2 => iv,
                        3 => iv+1,
                        _ => iv+row_stride,
                    };
                    a.push_entry(value, column);
                }
            }
        }
    }
    a.push_row();
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn one_row_per_node() {
        let dx = Array1::from(vec![1.0, 2.0, 0.5]);
        let dy = Array1::from(vec![1.0, 1.0]);
        let forced = Array2::from_elem((3, 4), false);
        let a = assemble_laplacian(&dx, &dy, &forced);
        assert_eq!(a.nrows(), 12);
        assert_eq!(a.ncols(), 12);
    }

    #[test]
    fn interior_rows_sum_to_zero() {
        let dx = Array1::from(vec![0.1, 0.3, 0.9, 2.7]);
        let dy = Array1::from(vec![1.0, 0.5, 0.25]);
        let forced = Array2::from_elem((4, 5), false);
        let a = assemble_laplacian(&dx, &dy, &forced);
        for row in 0..a.nrows() {
            let (cols, values) = a.row(row);
            if cols.len() > 1 {
                assert_abs_diff_eq!(values.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
                assert!(values.iter().zip(cols.iter()).all(|(&v, &c)| (c == row) == (v > 0.0)));
            }
        }
        // a linear potential along x solves the interior rows exactly
        let mut lines = vec![0.0];
        for d in dx.iter() {
            lines.push(lines.last().copied().unwrap_or(0.0) + d);
        }
        let v: Vec<f64> = (0..4).flat_map(|_| lines.iter().copied()).collect();
        let av = a.mul_vec(&v);
        for (row, value) in av.iter().enumerate() {
            if a.row(row).0.len() > 1 {
                assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn forced_nodes_and_corners_are_identity_rows() {
        let dx = Array1::from(vec![1.0; 3]);
        let dy = Array1::from(vec![1.0; 3]);
        let mut forced = Array2::from_elem((4, 4), false);
        forced[[1, 2]] = true;
        let a = assemble_laplacian(&dx, &dy, &forced);

        for iv in [0, 3, 12, 15, 6] {
            let (cols, values) = a.row(iv);
            assert_eq!(cols, &[iv]);
            assert_eq!(values, &[1.0]);
        }
        // left edge node only couples vertically
        let (cols, _) = a.row(4);
        assert_eq!(cols, &[0, 4, 8]);
    }
}
