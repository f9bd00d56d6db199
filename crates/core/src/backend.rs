//! Traits for the external transform bridge.
//!
//! The engine never implements a Fourier transform itself. It owns the
//! buffer layout and orchestrates calls into a [`TransformBridge`], which
//! any (possibly distributed) FFT library can implement.
//!
//! # Buffer layout
//!
//! Transform buffers are point-major over the local slab, with `howmany`
//! independent transforms interleaved per point:
//!
//! ```text
//! data[point * howmany + j]   for point in 0..local_n, j in 0..howmany
//! ```
//!
//! The slice handed to a bridge always spans `alloc_n * howmany` values, so
//! a distributed transform may use the padding between `local_n` and
//! `alloc_n` as in-place workspace. Only the first `local_n` points hold
//! data on entry and are read back on return.
//!
//! Real-space and reciprocal-space data share the slab layout reported by
//! [`TransformPlanner::slab_layout`].
//!
//! # Collectives
//!
//! Every bridge call and every [`Collective`] reduction is blocking and
//! collective: all processes must issue them in the same order, the same
//! number of times, with matching shapes.

use num_complex::Complex64;

use crate::error::MaxwellError;
use crate::grid::{GridGeometry, SlabLayout};

pub trait Collective {
    /// Sum of `value` over all processes.
    fn all_reduce_sum(&self, value: f64) -> f64;
}

/// Single-process collective.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl Collective for Serial {
    fn all_reduce_sum(&self, value: f64) -> f64 {
        value
    }
}

pub trait TransformPlanner {
    type Bridge: TransformBridge;

    /// Local slab this process owns for a grid of the given dimensions.
    fn slab_layout(&self, dims: [usize; 3]) -> Result<SlabLayout, MaxwellError>;

    /// Plans forward and inverse transforms for up to
    /// `3 * geometry.num_fft_bands` interleaved fields.
    fn plan(&self, geometry: &GridGeometry) -> Result<Self::Bridge, MaxwellError>;
}

pub trait TransformBridge: Collective {
    /// Real space to reciprocal space, kernel `exp(-i G·r)`, unnormalized.
    fn forward(&mut self, data: &mut [Complex64], howmany: usize);

    /// Reciprocal space to real space, kernel `exp(+i G·r)`, unnormalized.
    fn inverse(&mut self, data: &mut [Complex64], howmany: usize);

    /// Releases transform resources.
    fn teardown(self)
    where
        Self: Sized,
    {
    }
}
