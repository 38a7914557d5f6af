use rand::Rng;
use serde::{Serialize, Deserialize};
use std::ops::{Add, Sub};

/// Dense row-major matrix.
///
/// Regression-layer weights are stored with one row per output unit, so a
/// `bbox_pred` layer for `C` classes has `4 * C` rows and `fan_in` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    /// Uniform samples in `[-scale, scale)`.
    pub fn random<R: Rng>(rows: usize, cols: usize, scale: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for row in res.data.iter_mut() {
            for x in row.iter_mut() {
                *x = (rng.gen::<f64>() * 2.0 - 1.0) * scale;
            }
        }
        res
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let cols = data.first().map(|r| r.len()).unwrap_or(0);
        Matrix {
            rows: data.len(),
            cols,
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// Multiplies every element of row `i` by `factors[i]`.
    ///
    /// Returns `None` when `factors` does not have one entry per row.
    pub fn scale_rows(&self, factors: &[f64]) -> Option<Matrix> {
        if factors.len() != self.rows {
            return None;
        }
        let data = self
            .data
            .iter()
            .zip(factors)
            .map(|(row, &f)| row.iter().map(|&x| x * f).collect())
            .collect();
        Some(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Sum of absolute values, used as a cheap parameter fingerprint in logs.
    pub fn l1_norm(&self) -> f64 {
        self.data.iter().flatten().map(|x| x.abs()).sum()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.shape() != rhs.shape() {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = self;
        for (row, rhs_row) in res.data.iter_mut().zip(rhs.data) {
            for (x, y) in row.iter_mut().zip(rhs_row) {
                *x += y;
            }
        }
        res
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.shape() != rhs.shape() {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = self;
        for (row, rhs_row) in res.data.iter_mut().zip(rhs.data) {
            for (x, y) in row.iter_mut().zip(rhs_row) {
                *x -= y;
            }
        }
        res
    }
}
