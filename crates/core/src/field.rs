//! Blocks of trial eigenvectors in the transverse plane-wave basis.
//!
//! A [`FieldBlock`] holds `p` vectors over `local_n` grid points with two
//! complex coefficients (along `m` and `n`) per point. Storage is
//! point-major with bands fastest: `data[(point * 2 + component) * p + band]`.

use num_complex::Complex64;

/// Transverse components per grid point.
pub const TRANSVERSE_COMPONENTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldBlock {
    local_n: usize,
    p: usize,
    data: Vec<Complex64>,
}

impl FieldBlock {
    pub fn zeros(local_n: usize, p: usize) -> Self {
        Self {
            local_n,
            p,
            data: vec![Complex64::default(); local_n * TRANSVERSE_COMPONENTS * p],
        }
    }

    pub fn from_vec(local_n: usize, p: usize, data: Vec<Complex64>) -> Self {
        assert_eq!(
            data.len(),
            local_n * TRANSVERSE_COMPONENTS * p,
            "data length must match local_n * 2 * p"
        );
        Self { local_n, p, data }
    }

    pub fn local_n(&self) -> usize {
        self.local_n
    }

    /// Number of bands (columns).
    pub fn p(&self) -> usize {
        self.p
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn idx(&self, point: usize, component: usize, band: usize) -> usize {
        (point * TRANSVERSE_COMPONENTS + component) * self.p + band
    }

    pub fn get(&self, point: usize, component: usize, band: usize) -> Complex64 {
        self.data[self.idx(point, component, band)]
    }

    pub fn set(&mut self, point: usize, component: usize, band: usize, value: Complex64) {
        let idx = self.idx(point, component, band);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    pub fn fill(&mut self, value: Complex64) {
        self.data.fill(value);
    }

    pub fn same_shape(&self, other: &FieldBlock) -> bool {
        self.local_n == other.local_n && self.p == other.p
    }

    /// `self ← a·self + b·other`.
    pub fn axpby(&mut self, a: f64, b: f64, other: &FieldBlock) {
        assert!(self.same_shape(other), "field blocks must have the same shape");
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst = *dst * a + *src * b;
        }
    }

    /// Local part of `⟨self[:, band], other[:, other_band]⟩` (conjugating
    /// `self`). Distributed callers must sum this over processes.
    pub fn dot_band(&self, band: usize, other: &FieldBlock, other_band: usize) -> Complex64 {
        assert_eq!(self.local_n, other.local_n, "field blocks must cover the same points");
        let mut sum = Complex64::default();
        for point in 0..self.local_n {
            for c in 0..TRANSVERSE_COMPONENTS {
                sum += self.get(point, c, band).conj() * other.get(point, c, other_band);
            }
        }
        sum
    }

    /// Local squared norm of one column.
    pub fn column_norm_sqr(&self, band: usize) -> f64 {
        (0..self.local_n)
            .flat_map(|point| (0..TRANSVERSE_COMPONENTS).map(move |c| (point, c)))
            .map(|(point, c)| self.get(point, c, band).norm_sqr())
            .sum()
    }
}
