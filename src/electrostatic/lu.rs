use std::collections::BTreeSet;

use crate::{LinearSolver, SolverError};
use crate::electrostatic::CsrMatrix;
use crate::electrostatic::ordering::reverse_cuthill_mckee;

/// Pivots within this fraction of the largest candidate may keep the diagonal.
const PIVOT_THRESHOLD: f64 = 1e-3;

/// Sparse LU factorisation `A*Q = P*L*U`.
///
/// Columns are pre-ordered with reverse Cuthill-McKee to keep fill-in
/// banded, then factorised left-looking one column at a time. Each column is
/// solved against the `L` columns it reaches, visited in increasing step
/// order, and its pivot is chosen by threshold partial pivoting that
/// prefers the diagonal entry.
#[derive(Clone, Debug)]
pub struct SparseLu {
    n: usize,
    /// `column_order[k]` is the column of `A` eliminated at step `k`.
    column_order: Vec<usize>,
    /// `pivot_row[k]` is the row of `A` pivoted at step `k`.
    pivot_row: Vec<usize>,
    /// Strictly lower part of `L` by step, as (row of `A`, value).
    l_columns: Vec<Vec<(usize, f64)>>,
    /// Strictly upper part of `U` by step, as (step, value).
    u_columns: Vec<Vec<(usize, f64)>>,
    u_diag: Vec<f64>,
}

impl SparseLu {
    /// Factorises a square matrix.
    pub fn factorise(a: &CsrMatrix) -> Result<Self, SolverError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(SolverError::DimensionMismatch {
                rows: n,
                cols: a.ncols(),
                rhs: n,
            });
        }

        let column_order = reverse_cuthill_mckee(a);
        let columns = a.transpose();

        let mut pivot_row = Vec::with_capacity(n);
        let mut row_step: Vec<Option<usize>> = vec![None; n];
        let mut l_columns: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut u_columns: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut u_diag = Vec::with_capacity(n);

        // dense scatter of the active column, indexed by row of A
        let mut x = vec![0.0; n];
        let mut is_nonzero = vec![false; n];
        let mut pattern: Vec<usize> = Vec::new();
        let mut reach: BTreeSet<usize> = BTreeSet::new();

        for (k, &col) in column_order.iter().enumerate() {
            let (rows, values) = columns.row(col);
            for (&row, &value) in rows.iter().zip(values.iter()) {
                if !is_nonzero[row] {
                    is_nonzero[row] = true;
                    pattern.push(row);
                }
                x[row] += value;
                if let Some(step) = row_step[row] {
                    reach.insert(step);
                }
            }

            // triangular solve against earlier steps in topological order
            let mut u_column = Vec::new();
            while let Some(step) = reach.pop_first() {
                let u = x[pivot_row[step]];
                if u == 0.0 {
                    continue;
                }
                u_column.push((step, u));
                for &(row, l) in l_columns[step].iter() {
                    if !is_nonzero[row] {
                        is_nonzero[row] = true;
                        pattern.push(row);
                    }
                    x[row] -= l*u;
                    if let Some(next_step) = row_step[row] {
                        reach.insert(next_step);
                    }
                }
            }

            let max_abs = pattern.iter()
                .filter(|&&row| row_step[row].is_none())
                .map(|&row| x[row].abs())
                .fold(0.0, f64::max);
            if !(max_abs > f64::MIN_POSITIVE) || !max_abs.is_finite() {
                return Err(SolverError::SingularMatrix { column: col });
            }
            let diagonal_ok = row_step[col].is_none() && x[col].abs() >= PIVOT_THRESHOLD*max_abs;
            let pivot = if diagonal_ok {
                col
            } else {
                pattern.iter()
                    .copied()
                    .filter(|&row| row_step[row].is_none())
                    .max_by(|&a, &b| x[a].abs().total_cmp(&x[b].abs()))
                    .ok_or(SolverError::SingularMatrix { column: col })?
            };

            let diag = x[pivot];
            let l_column: Vec<(usize, f64)> = pattern.iter()
                .copied()
                .filter(|&row| row != pivot && row_step[row].is_none() && x[row] != 0.0)
                .map(|row| (row, x[row]/diag))
                .collect();

            row_step[pivot] = Some(k);
            pivot_row.push(pivot);
            l_columns.push(l_column);
            u_columns.push(u_column);
            u_diag.push(diag);

            for &row in pattern.iter() {
                x[row] = 0.0;
                is_nonzero[row] = false;
            }
            pattern.clear();
        }

        Ok(Self {
            n,
            column_order,
            pivot_row,
            l_columns,
            u_columns,
            u_diag,
        })
    }
}

impl LinearSolver for SparseLu {
    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverError> {
        let n = self.n;
        if rhs.len() != n {
            return Err(SolverError::DimensionMismatch { rows: n, cols: n, rhs: rhs.len() });
        }

        // forward substitution L*y = P*b
        let mut b = rhs.to_vec();
        let mut y = vec![0.0; n];
        for k in 0..n {
            let yk = b[self.pivot_row[k]];
            y[k] = yk;
            if yk == 0.0 {
                continue;
            }
            for &(row, l) in self.l_columns[k].iter() {
                b[row] -= l*yk;
            }
        }

        // backward substitution U*z = y, column oriented
        for k in (0..n).rev() {
            let zk = y[k]/self.u_diag[k];
            y[k] = zk;
            if zk == 0.0 {
                continue;
            }
            for &(step, u) in self.u_columns[k].iter() {
                y[step] -= u*zk;
            }
        }

        for (k, &col) in self.column_order.iter().enumerate() {
            rhs[col] = y[k];
        }
        match rhs.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(SolverError::NonFiniteSolution { index }),
            None => Ok(()),
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.n
    }

    fn nnz(&self) -> usize {
        self.n
            + self.l_columns.iter().map(|column| column.len()).sum::<usize>()
            + self.u_columns.iter().map(|column| column.len()).sum::<usize>()
    }
}

/// Dense LU factorisation with partial pivoting.
///
/// Stores the full `n*n` factors, so it is only meant for small systems and
/// for cross checking [`SparseLu`].
#[derive(Clone, Debug)]
pub struct DenseLu {
    lu: ndarray::Array2<f64>,
    pivots: Vec<usize>,
}

impl DenseLu {
    pub fn factorise(a: &CsrMatrix) -> Result<Self, SolverError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(SolverError::DimensionMismatch {
                rows: n,
                cols: a.ncols(),
                rhs: n,
            });
        }
        let mut lu = a.to_dense();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let (max_row, max_val) = (k..n)
                .map(|i| (i, lu[[i, k]].abs()))
                .fold((k, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !(max_val > 1e-15) {
                return Err(SolverError::SingularMatrix { column: k });
            }

            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    lu.swap([k, j], [max_row, j]);
                }
            }

            let pivot = lu[[k, k]];
            for i in (k+1)..n {
                let factor = lu[[i, k]]/pivot;
                if factor == 0.0 {
                    continue;
                }
                lu[[i, k]] = factor;
                for j in (k+1)..n {
                    lu[[i, j]] -= factor*lu[[k, j]];
                }
            }
        }

        Ok(Self { lu, pivots })
    }
}

impl LinearSolver for DenseLu {
    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverError> {
        let n = self.pivots.len();
        if rhs.len() != n {
            return Err(SolverError::DimensionMismatch { rows: n, cols: n, rhs: rhs.len() });
        }

        let b = rhs.to_vec();
        for i in 0..n {
            rhs[i] = b[self.pivots[i]];
        }
        // forward substitution (L*y = P*b)
        for i in 0..n {
            for j in 0..i {
                rhs[i] -= self.lu[[i, j]]*rhs[j];
            }
        }
        // back substitution (U*x = y)
        for i in (0..n).rev() {
            for j in (i+1)..n {
                rhs[i] -= self.lu[[i, j]]*rhs[j];
            }
            rhs[i] /= self.lu[[i, i]];
        }

        match rhs.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(SolverError::NonFiniteSolution { index }),
            None => Ok(()),
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.pivots.len()
    }

    #[inline]
    fn nnz(&self) -> usize {
        self.lu.len()
    }
}
