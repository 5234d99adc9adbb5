//! Dense matrix kernel
//!
//! A minimal mutable dense matrix over `f64` and the closed set of
//! operations the solver uses: arithmetic, transpose and multiply,
//! vector products, block combine/extract, 3x3 inversion, and a plain-text
//! serialization form. Every operation is shape-checked and reports a
//! typed [`MatrixError`] instead of panicking.
//!
//! Matrix-matrix multiply can optionally run over worker threads that pull
//! tiles of output cells from one shared counter; the result is bitwise
//! identical to the serial loop.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matrix error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    /// Matrix dimensions incompatible for the attempted operation
    #[error("shape mismatch: {0}x{1} vs {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),

    /// Operation requires data but the matrix is zero-sized
    #[error("operation on an empty matrix")]
    EmptyMatrix,

    /// Index outside the matrix shape
    #[error("index ({0}, {1}) out of bounds for {2}x{3} matrix")]
    OutOfBounds(usize, usize, usize, usize),

    /// Operation requires a square matrix
    #[error("matrix is not square: {0}x{1}")]
    NotSquare(usize, usize),

    /// Operation requires a 3x3 matrix
    #[error("matrix is not 3x3: {0}x{1}")]
    Not3x3(usize, usize),

    /// Matrix is singular
    #[error("matrix is singular")]
    Singular,

    /// Operation requires a row or column vector
    #[error("matrix is not a vector: {0}x{1}")]
    NotAVector(usize, usize),

    /// Division by zero (e.g. normalizing a zero vector)
    #[error("division by zero")]
    DivideByZero,

    /// Text form could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type for matrix operations
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Configuration for the tiled parallel multiply.
///
/// With `max_threads <= 1` (the default) every multiply runs the serial
/// reference loop. Otherwise multiplies whose output exceeds
/// `parallel_threshold` cells are split into tiles of `chunk_size` cells
/// handed out through one shared atomic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplyConfig {
    /// Number of worker threads to use
    pub max_threads: usize,
    /// Output cells per tile
    pub chunk_size: usize,
    /// Minimum output cell count before threads are used
    pub parallel_threshold: usize,
}

impl Default for MultiplyConfig {
    fn default() -> Self {
        Self {
            max_threads: 1,
            chunk_size: 64,
            parallel_threshold: 4096,
        }
    }
}

/// Dense row-major matrix of `f64`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Create a zero-filled matrix with the given shape
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Create a matrix with every element set to `value`
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Create an identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Create a column vector from a slice
    pub fn column_from_slice(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Number of rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True if the matrix holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if the matrix is a row or column vector
    #[inline]
    pub fn is_vector(&self) -> bool {
        !self.is_empty() && (self.rows == 1 || self.cols == 1)
    }

    /// Number of elements of a vector (rows x cols for matrices)
    #[inline]
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// Raw row-major element slice
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Checked element read
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    /// Checked element write
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            Err(MatrixError::OutOfBounds(row, col, self.rows, self.cols))
        } else {
            Ok(())
        }
    }

    fn check_same_shape(&self, rhs: &DenseMatrix) -> Result<()> {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Arithmetic
    // ------------------------------------------------------------------

    /// Element-wise sum, returning a new matrix
    pub fn add(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        let mut result = self.clone();
        result.add_in_place(rhs)?;
        Ok(result)
    }

    /// Element-wise sum in place
    pub fn add_in_place(&mut self, rhs: &DenseMatrix) -> Result<()> {
        self.check_same_shape(rhs)?;
        for (a, b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    /// Element-wise difference, returning a new matrix
    pub fn sub(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        let mut result = self.clone();
        result.sub_in_place(rhs)?;
        Ok(result)
    }

    /// Element-wise difference in place
    pub fn sub_in_place(&mut self, rhs: &DenseMatrix) -> Result<()> {
        self.check_same_shape(rhs)?;
        for (a, b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a -= b;
        }
        Ok(())
    }

    /// Scaled copy of the matrix
    pub fn scaled(&self, factor: f64) -> DenseMatrix {
        let mut result = self.clone();
        result.scale_in_place(factor);
        result
    }

    /// Scale every element in place
    pub fn scale_in_place(&mut self, factor: f64) {
        for a in self.data.iter_mut() {
            *a *= factor;
        }
    }

    /// Overwrite with the identity matrix
    pub fn set_identity(&mut self) -> Result<()> {
        if self.rows != self.cols {
            return Err(MatrixError::NotSquare(self.rows, self.cols));
        }
        self.set_zero();
        for i in 0..self.rows {
            self.data[i * self.cols + i] = 1.0;
        }
        Ok(())
    }

    /// Overwrite every element with zero
    pub fn set_zero(&mut self) {
        for a in self.data.iter_mut() {
            *a = 0.0;
        }
    }

    /// Overwrite every element with a uniform random value in `[lo, hi]`
    pub fn set_random(&mut self, lo: f64, hi: f64) {
        let mut rng = rand::thread_rng();
        for a in self.data.iter_mut() {
            *a = rng.gen_range(lo..=hi);
        }
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    /// Transposed copy of the matrix
    pub fn transpose(&self) -> DenseMatrix {
        let mut result = DenseMatrix::new(self.cols, self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                result.data[col * self.rows + row] = self.data[row * self.cols + col];
            }
        }
        result
    }

    /// Matrix product `self * rhs` (serial reference implementation)
    pub fn matmul(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.cols != rhs.rows {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        if self.is_empty() || rhs.is_empty() {
            return Err(MatrixError::EmptyMatrix);
        }

        let mut result = DenseMatrix::new(self.rows, rhs.cols);
        for row in 0..self.rows {
            for col in 0..rhs.cols {
                result.data[row * rhs.cols + col] = self.row_dot_col(rhs, row, col);
            }
        }
        Ok(result)
    }

    #[inline]
    fn row_dot_col(&self, rhs: &DenseMatrix, row: usize, col: usize) -> f64 {
        let mut sum = 0.0;
        for k in 0..self.cols {
            sum += self.data[row * self.cols + k] * rhs.data[k * rhs.cols + col];
        }
        sum
    }

    /// Matrix product with optional tile-based parallelism.
    ///
    /// Worker threads repeatedly claim `chunk_size` output cells from a
    /// shared counter until the output is exhausted. Each cell is computed
    /// by the same dot-product loop as [`Self::matmul`], so the result is
    /// numerically identical to the serial path.
    pub fn matmul_chunked(&self, rhs: &DenseMatrix, config: &MultiplyConfig) -> Result<DenseMatrix> {
        if self.cols != rhs.rows {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        if self.is_empty() || rhs.is_empty() {
            return Err(MatrixError::EmptyMatrix);
        }

        let total = self.rows * rhs.cols;
        if config.max_threads <= 1 || total < config.parallel_threshold {
            return self.matmul(rhs);
        }

        let chunk = config.chunk_size.max(1);
        let counter = AtomicUsize::new(0);
        let out_cols = rhs.cols;

        let mut partials: Vec<Vec<(usize, Vec<f64>)>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..config.max_threads)
                .map(|_| {
                    scope.spawn(|| {
                        let mut tiles = Vec::new();
                        loop {
                            let start = counter.fetch_add(chunk, Ordering::SeqCst);
                            if start >= total {
                                break;
                            }
                            let end = (start + chunk).min(total);
                            let mut values = Vec::with_capacity(end - start);
                            for idx in start..end {
                                let row = idx / out_cols;
                                let col = idx % out_cols;
                                values.push(self.row_dot_col(rhs, row, col));
                            }
                            tiles.push((start, values));
                        }
                        tiles
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("matrix multiply worker panicked"))
                .collect()
        });

        let mut result = DenseMatrix::new(self.rows, out_cols);
        for tiles in partials.drain(..) {
            for (start, values) in tiles {
                result.data[start..start + values.len()].copy_from_slice(&values);
            }
        }
        Ok(result)
    }

    /// Element-wise (Hadamard) product
    pub fn component_mul(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(rhs)?;
        let mut result = self.clone();
        for (a, b) in result.data.iter_mut().zip(rhs.data.iter()) {
            *a *= b;
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Vector operations
    // ------------------------------------------------------------------

    /// Dot product of two vectors (row or column, equal element counts)
    pub fn dot(&self, rhs: &DenseMatrix) -> Result<f64> {
        if self.is_empty() || rhs.is_empty() {
            return Err(MatrixError::EmptyMatrix);
        }
        if !self.is_vector() || !rhs.is_vector() {
            return Err(MatrixError::NotAVector(self.rows, self.cols));
        }
        if self.element_count() != rhs.element_count() {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        Ok(self
            .data
            .iter()
            .zip(rhs.data.iter())
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Cross product of two 3-vectors, returned with the shape of `self`
    pub fn cross(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if !self.is_vector() || !rhs.is_vector() {
            return Err(MatrixError::NotAVector(self.rows, self.cols));
        }
        if self.element_count() != 3 || rhs.element_count() != 3 {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        let a = &self.data;
        let b = &rhs.data;
        let mut result = self.clone();
        result.data[0] = a[1] * b[2] - a[2] * b[1];
        result.data[1] = a[2] * b[0] - a[0] * b[2];
        result.data[2] = a[0] * b[1] - a[1] * b[0];
        Ok(result)
    }

    /// Euclidean magnitude of a vector
    pub fn magnitude(&self) -> Result<f64> {
        if self.is_empty() {
            return Err(MatrixError::EmptyMatrix);
        }
        if !self.is_vector() {
            return Err(MatrixError::NotAVector(self.rows, self.cols));
        }
        Ok(self.data.iter().map(|a| a * a).sum::<f64>().sqrt())
    }

    /// Unit-magnitude copy of a vector
    pub fn normalized(&self) -> Result<DenseMatrix> {
        let mag = self.magnitude()?;
        if mag == 0.0 {
            return Err(MatrixError::DivideByZero);
        }
        Ok(self.scaled(1.0 / mag))
    }

    // ------------------------------------------------------------------
    // Block operations
    // ------------------------------------------------------------------

    /// Append `rhs` to the right of `self` (row counts must match).
    ///
    /// Combining onto an empty matrix returns a copy of `rhs`.
    pub fn combine_as_row(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.is_empty() {
            return Ok(rhs.clone());
        }
        if self.rows != rhs.rows {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        let mut result = DenseMatrix::new(self.rows, self.cols + rhs.cols);
        for row in 0..self.rows {
            let out = row * result.cols;
            result.data[out..out + self.cols]
                .copy_from_slice(&self.data[row * self.cols..(row + 1) * self.cols]);
            result.data[out + self.cols..out + result.cols]
                .copy_from_slice(&rhs.data[row * rhs.cols..(row + 1) * rhs.cols]);
        }
        Ok(result)
    }

    /// Stack `rhs` below `self` (column counts must match).
    ///
    /// Combining onto an empty matrix returns a copy of `rhs`.
    pub fn combine_as_column(&self, rhs: &DenseMatrix) -> Result<DenseMatrix> {
        if self.is_empty() {
            return Ok(rhs.clone());
        }
        if self.cols != rhs.cols {
            return Err(MatrixError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        let mut result = DenseMatrix::new(self.rows + rhs.rows, self.cols);
        result.data[..self.data.len()].copy_from_slice(&self.data);
        result.data[self.data.len()..].copy_from_slice(&rhs.data);
        Ok(result)
    }

    /// Extract the block `[start_row..=end_row, start_col..=end_col]`
    pub fn submatrix(
        &self,
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    ) -> Result<DenseMatrix> {
        if end_row < start_row || end_col < start_col {
            return Err(MatrixError::ShapeMismatch(
                start_row, start_col, end_row, end_col,
            ));
        }
        self.check_index(end_row, end_col)?;

        let mut result = DenseMatrix::new(end_row - start_row + 1, end_col - start_col + 1);
        for row in 0..result.rows {
            for col in 0..result.cols {
                result.data[row * result.cols + col] =
                    self.data[(start_row + row) * self.cols + (start_col + col)];
            }
        }
        Ok(result)
    }

    /// Overwrite the block starting at `(start_row, start_col)` with `m`
    pub fn set_submatrix(&mut self, start_row: usize, start_col: usize, m: &DenseMatrix) -> Result<()> {
        if m.is_empty() {
            return Ok(());
        }
        self.check_index(start_row + m.rows - 1, start_col + m.cols - 1)?;
        for row in 0..m.rows {
            for col in 0..m.cols {
                self.data[(start_row + row) * self.cols + (start_col + col)] =
                    m.data[row * m.cols + col];
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 3x3 operations
    // ------------------------------------------------------------------

    /// Determinant of a 3x3 matrix
    pub fn determinant_3x3(&self) -> Result<f64> {
        if self.rows != 3 || self.cols != 3 {
            return Err(MatrixError::Not3x3(self.rows, self.cols));
        }
        let d = &self.data;
        Ok(d[0] * (d[4] * d[8] - d[5] * d[7]) - d[1] * (d[3] * d[8] - d[5] * d[6])
            + d[2] * (d[3] * d[7] - d[4] * d[6]))
    }

    /// Inverse of a 3x3 matrix via the adjugate
    pub fn inverse_3x3(&self) -> Result<DenseMatrix> {
        let det = self.determinant_3x3()?;
        if det == 0.0 {
            return Err(MatrixError::Singular);
        }
        let d = &self.data;
        let mut result = DenseMatrix::new(3, 3);
        result.data[0] = (d[4] * d[8] - d[5] * d[7]) / det;
        result.data[1] = (d[2] * d[7] - d[1] * d[8]) / det;
        result.data[2] = (d[1] * d[5] - d[2] * d[4]) / det;
        result.data[3] = (d[5] * d[6] - d[3] * d[8]) / det;
        result.data[4] = (d[0] * d[8] - d[2] * d[6]) / det;
        result.data[5] = (d[2] * d[3] - d[0] * d[5]) / det;
        result.data[6] = (d[3] * d[7] - d[4] * d[6]) / det;
        result.data[7] = (d[1] * d[6] - d[0] * d[7]) / det;
        result.data[8] = (d[0] * d[4] - d[1] * d[3]) / det;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Text serialization
    // ------------------------------------------------------------------

    /// Serialize to the plain text form: first line `rows cols`, then one
    /// line per row of whitespace-separated values. Values use the
    /// shortest decimal form that parses back to the identical `f64`.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {}\n", self.rows, self.cols);
        for row in 0..self.rows {
            let line: Vec<String> = (0..self.cols)
                .map(|col| format!("{}", self.data[row * self.cols + col]))
                .collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    /// Parse the plain text form produced by [`Self::to_text`]
    pub fn from_text(text: &str) -> Result<DenseMatrix> {
        let mut tokens = text.split_whitespace();
        let rows: usize = tokens
            .next()
            .ok_or_else(|| MatrixError::Parse("missing row count".into()))?
            .parse()
            .map_err(|e| MatrixError::Parse(format!("bad row count: {}", e)))?;
        let cols: usize = tokens
            .next()
            .ok_or_else(|| MatrixError::Parse("missing column count".into()))?
            .parse()
            .map_err(|e| MatrixError::Parse(format!("bad column count: {}", e)))?;

        let mut data = Vec::with_capacity(rows * cols);
        for token in tokens {
            let value: f64 = token
                .parse()
                .map_err(|e| MatrixError::Parse(format!("bad value {:?}: {}", token, e)))?;
            data.push(value);
        }
        if data.len() != rows * cols {
            return Err(MatrixError::Parse(format!(
                "expected {} values, found {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(DenseMatrix { rows, cols, data })
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.cols + col]
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(rows: usize, cols: usize) -> DenseMatrix {
        let mut m = DenseMatrix::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                m[(row, col)] = (row * cols + col) as f64 * 0.37 - 1.5;
            }
        }
        m
    }

    #[test]
    fn test_construction_and_access() {
        let m = DenseMatrix::filled(2, 3, 4.5);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.get(1, 2).unwrap(), 4.5);
        assert!(matches!(
            m.get(2, 0),
            Err(MatrixError::OutOfBounds(2, 0, 2, 3))
        ));
    }

    #[test]
    fn test_add_sub_scale() {
        let a = sample(2, 2);
        let b = DenseMatrix::filled(2, 2, 1.0);
        let sum = a.add(&b).unwrap();
        let diff = sum.sub(&b).unwrap();
        assert_eq!(diff, a);
        let doubled = a.scaled(2.0);
        assert_relative_eq!(doubled[(1, 1)], a[(1, 1)] * 2.0);
        assert!(a.add(&DenseMatrix::new(3, 2)).is_err());
    }

    #[test]
    fn test_transpose_involution() {
        let m = sample(3, 5);
        assert_eq!(m.transpose().transpose(), m);
    }

    #[test]
    fn test_multiply_identity() {
        let m = sample(4, 4);
        let i = DenseMatrix::identity(4);
        assert_eq!(m.matmul(&i).unwrap(), m);
    }

    #[test]
    fn test_multiply_known_product() {
        let mut a = DenseMatrix::new(2, 3);
        let mut b = DenseMatrix::new(3, 2);
        for (idx, v) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
            a.data[idx] = *v;
            b.data[idx] = *v;
        }
        let product = a.matmul(&b).unwrap();
        assert_eq!(product.as_slice(), &[22.0, 28.0, 49.0, 64.0]);
    }

    #[test]
    fn test_chunked_multiply_matches_serial() {
        let a = sample(23, 17);
        let b = sample(17, 29);
        let serial = a.matmul(&b).unwrap();
        let config = MultiplyConfig {
            max_threads: 4,
            chunk_size: 16,
            parallel_threshold: 1,
        };
        let parallel = a.matmul_chunked(&b, &config).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_dot_and_cross() {
        let a = DenseMatrix::column_from_slice(&[1.0, 2.0, 3.0]);
        let b = DenseMatrix::column_from_slice(&[4.0, 5.0, 6.0]);
        assert_relative_eq!(a.dot(&b).unwrap(), 32.0);
        // row vector against column vector is allowed
        assert_relative_eq!(a.transpose().dot(&b).unwrap(), 32.0);

        let cross = a.cross(&b).unwrap();
        assert_eq!(cross.as_slice(), &[-3.0, 6.0, -3.0]);
        assert!(sample(2, 2).dot(&b).is_err());
    }

    #[test]
    fn test_magnitude_and_normalize() {
        let v = DenseMatrix::column_from_slice(&[3.0, 4.0]);
        assert_relative_eq!(v.magnitude().unwrap(), 5.0);
        let unit = v.normalized().unwrap();
        assert_relative_eq!(unit.magnitude().unwrap(), 1.0);

        let zero = DenseMatrix::column_from_slice(&[0.0, 0.0]);
        assert!(matches!(zero.normalized(), Err(MatrixError::DivideByZero)));
    }

    #[test]
    fn test_combine_and_submatrix_roundtrip() {
        let m = sample(3, 2);
        let n = sample(3, 4);
        let combined = m.combine_as_row(&n).unwrap();
        assert_eq!(combined.cols(), 6);
        let extracted = combined.submatrix(0, 2, 2, 5).unwrap();
        assert_eq!(extracted, n);

        let stacked = m.combine_as_column(&sample(1, 2)).unwrap();
        assert_eq!(stacked.rows(), 4);
        assert_eq!(stacked.submatrix(0, 0, 2, 1).unwrap(), m);
    }

    #[test]
    fn test_set_submatrix() {
        let mut m = DenseMatrix::new(4, 4);
        let block = DenseMatrix::filled(2, 2, 7.0);
        m.set_submatrix(1, 1, &block).unwrap();
        assert_eq!(m[(1, 1)], 7.0);
        assert_eq!(m[(2, 2)], 7.0);
        assert_eq!(m[(0, 0)], 0.0);
        assert!(m.set_submatrix(3, 3, &block).is_err());
    }

    #[test]
    fn test_inverse_3x3() {
        let mut m = DenseMatrix::new(3, 3);
        m.data
            .copy_from_slice(&[2.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 3.0]);
        let inv = m.inverse_3x3().unwrap();
        let product = m.matmul(&inv).unwrap();
        let identity = DenseMatrix::identity(3);
        for row in 0..3 {
            for col in 0..3 {
                assert_relative_eq!(product[(row, col)], identity[(row, col)], epsilon = 1e-14);
            }
        }

        let singular = DenseMatrix::filled(3, 3, 1.0);
        assert!(matches!(singular.inverse_3x3(), Err(MatrixError::Singular)));
        assert!(matches!(
            sample(2, 2).determinant_3x3(),
            Err(MatrixError::Not3x3(2, 2))
        ));
    }

    #[test]
    fn test_text_roundtrip() {
        let mut m = sample(3, 4);
        m[(0, 0)] = 1.0 / 3.0;
        m[(2, 3)] = -7.25e-13;
        let text = m.to_text();
        let parsed = DenseMatrix::from_text(&text).unwrap();
        assert_eq!(parsed, m);
        assert!(text.starts_with("3 4\n"));
    }

    #[test]
    fn test_text_parse_errors() {
        assert!(DenseMatrix::from_text("").is_err());
        assert!(DenseMatrix::from_text("2 2\n1 2 3").is_err());
        assert!(DenseMatrix::from_text("2 2\n1 2 3 x").is_err());
    }

    #[test]
    fn test_set_identity_and_random() {
        let mut m = DenseMatrix::new(3, 3);
        m.set_identity().unwrap();
        assert_eq!(m, DenseMatrix::identity(3));
        assert!(DenseMatrix::new(2, 3).set_identity().is_err());

        let mut r = DenseMatrix::new(4, 4);
        r.set_random(-2.0, 3.0);
        assert!(r.as_slice().iter().all(|&v| (-2.0..=3.0).contains(&v)));
    }

    #[test]
    fn test_component_mul() {
        let a = sample(2, 3);
        let ones = DenseMatrix::filled(2, 3, 1.0);
        assert_eq!(a.component_mul(&ones).unwrap(), a);
    }
}
