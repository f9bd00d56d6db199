//! Distributed grid geometry.
//!
//! The global grid is `nx × ny × nz`, stored row-major with z fastest. Each
//! process owns a contiguous slab of x-planes; the same slab layout is used
//! for the reciprocal-space trial vectors and the real-space FFT scratch.

use serde::{Deserialize, Serialize};

use crate::error::MaxwellError;

/// Process-local share of the x dimension, as dictated by the transform
/// bridge's distribution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlabLayout {
    pub local_nx: usize,
    pub local_x_start: usize,
    /// x-planes to allocate locally (>= `local_nx`); distributed transforms
    /// may need padding.
    pub alloc_nx: usize,
}

impl SlabLayout {
    /// The whole grid on one process.
    pub fn serial(nx: usize) -> Self {
        Self {
            local_nx: nx,
            local_x_start: 0,
            alloc_nx: nx,
        }
    }

    /// Block distribution of `nx` planes over `size` processes: every rank
    /// gets `ceil(nx / size)` planes except the tail, which may get fewer
    /// (or none).
    pub fn block(nx: usize, rank: usize, size: usize) -> Result<Self, MaxwellError> {
        if size == 0 {
            return Err(MaxwellError::invalid("process count must be non-zero"));
        }
        if rank >= size {
            return Err(MaxwellError::invalid(format!(
                "rank {rank} is out of range for {size} processes"
            )));
        }
        let block = nx.div_ceil(size);
        let start = (rank * block).min(nx);
        let end = (start + block).min(nx);
        Ok(Self {
            local_nx: end - start,
            local_x_start: start,
            alloc_nx: block.max(1),
        })
    }
}

/// Immutable description of the (distributed) plane-wave grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub local_nx: usize,
    pub local_x_start: usize,
    /// Size of the last non-trivial dimension.
    pub last_dim: usize,
    /// Padded last dimension for real-to-complex layouts, `2 * (last_dim / 2 + 1)`.
    pub last_dim_size: usize,
    /// Product of the remaining global dimensions, `N / last_dim`.
    pub other_dims: usize,
    pub num_bands: usize,
    pub num_fft_bands: usize,
    /// Total number of grid points.
    pub n: usize,
    pub local_n: usize,
    /// Global index of the first local point.
    pub n_start: usize,
    pub alloc_n: usize,
}

impl GridGeometry {
    pub fn new(
        dims: [usize; 3],
        num_bands: usize,
        num_fft_bands: usize,
        layout: SlabLayout,
    ) -> Result<Self, MaxwellError> {
        let [nx, ny, nz] = dims;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MaxwellError::invalid(format!(
                "grid dimensions must be non-zero, got {nx}x{ny}x{nz}"
            )));
        }
        if num_bands == 0 {
            return Err(MaxwellError::invalid("num_bands must be non-zero"));
        }
        if num_fft_bands == 0 {
            return Err(MaxwellError::invalid("num_fft_bands must be non-zero"));
        }
        if layout.local_x_start + layout.local_nx > nx || layout.alloc_nx < layout.local_nx {
            return Err(MaxwellError::allocation(format!(
                "slab layout {layout:?} is inconsistent with nx = {nx}"
            )));
        }

        let plane = ny
            .checked_mul(nz)
            .ok_or_else(|| MaxwellError::allocation("grid plane size overflows"))?;
        let n = nx
            .checked_mul(plane)
            .ok_or_else(|| MaxwellError::allocation("grid size overflows"))?;
        let local_n = layout.local_nx * plane;
        let alloc_n = layout.alloc_nx * plane;

        let last_dim = if nz > 1 {
            nz
        } else if ny > 1 {
            ny
        } else {
            nx
        };

        Ok(Self {
            nx,
            ny,
            nz,
            local_nx: layout.local_nx,
            local_x_start: layout.local_x_start,
            last_dim,
            last_dim_size: 2 * (last_dim / 2 + 1),
            other_dims: n / last_dim,
            num_bands,
            num_fft_bands: num_fft_bands.min(num_bands),
            n,
            local_n,
            n_start: layout.local_x_start * plane,
            alloc_n,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Reduced-dimensionality (2D or 1D) problem.
    pub fn is_2d(&self) -> bool {
        self.nz == 1
    }

    /// Number of non-trivial dimensions.
    pub fn rank(&self) -> usize {
        if self.nz > 1 {
            3
        } else if self.ny > 1 {
            2
        } else {
            1
        }
    }

    pub fn layout(&self) -> SlabLayout {
        SlabLayout {
            local_nx: self.local_nx,
            local_x_start: self.local_x_start,
            alloc_nx: self.alloc_n / (self.ny * self.nz),
        }
    }

    /// Global `(x, y, z)` indices of the local point `i`.
    #[inline]
    pub fn local_coords(&self, i: usize) -> [usize; 3] {
        let plane = self.ny * self.nz;
        let x = self.local_x_start + i / plane;
        let rem = i % plane;
        [x, rem / self.nz, rem % self.nz]
    }

    /// Local index of the global point, if this process owns it.
    pub fn local_index(&self, coords: [usize; 3]) -> Option<usize> {
        let [x, y, z] = coords;
        if x < self.local_x_start || x >= self.local_x_start + self.local_nx {
            return None;
        }
        Some(((x - self.local_x_start) * self.ny + y) * self.nz + z)
    }

    /// Whether the DC point `(0, 0, 0)` lives on this process.
    pub fn owns_origin(&self) -> bool {
        self.local_x_start == 0 && self.local_nx > 0
    }
}
