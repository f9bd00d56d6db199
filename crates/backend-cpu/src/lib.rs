//! CPU transform bridge built on rustfft.
//!
//! The 3D transform is done axis by axis on the interleaved layout expected
//! by the engine (`data[point * howmany + j]`, z fastest). Lines along z and
//! y stay inside one x-plane, so planes are processed in parallel with
//! rayon. Lines along x span the whole slab; they are gathered into a
//! contiguous transpose buffer, transformed in parallel and scattered back.

use std::sync::Arc;

use log::debug;
use mpb3d_core::backend::{Collective, TransformBridge, TransformPlanner};
use mpb3d_core::grid::{GridGeometry, SlabLayout};
use mpb3d_core::MaxwellError;
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

/// Plans single-process rustfft transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuPlanner;

impl CpuPlanner {
    pub fn new() -> Self {
        Self
    }
}

struct AxisPlan {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

pub struct CpuBridge {
    dims: [usize; 3],
    /// Plans for the non-trivial axes, indexed by axis.
    axes: [Option<AxisPlan>; 3],
    /// Line-major copy used when one axis spans the whole buffer.
    transpose: Vec<Complex64>,
}

impl TransformPlanner for CpuPlanner {
    type Bridge = CpuBridge;

    fn slab_layout(&self, dims: [usize; 3]) -> Result<SlabLayout, MaxwellError> {
        Ok(SlabLayout::serial(dims[0]))
    }

    fn plan(&self, geometry: &GridGeometry) -> Result<CpuBridge, MaxwellError> {
        if geometry.local_nx != geometry.nx {
            return Err(MaxwellError::Allocation(format!(
                "CPU bridge needs the whole grid on one process, got {} of {} planes",
                geometry.local_nx, geometry.nx
            )));
        }
        let dims = geometry.dims();
        let mut planner = FftPlanner::<f64>::new();
        let axes = dims.map(|len| {
            (len > 1).then(|| AxisPlan {
                len,
                forward: planner.plan_fft_forward(len),
                inverse: planner.plan_fft_inverse(len),
            })
        });
        debug!(
            "planned CPU transforms for {}x{}x{} (up to {} interleaved fields)",
            dims[0],
            dims[1],
            dims[2],
            3 * geometry.num_fft_bands
        );
        Ok(CpuBridge {
            dims,
            axes,
            transpose: Vec::new(),
        })
    }
}

impl CpuBridge {
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    fn transform(&mut self, data: &mut [Complex64], howmany: usize, forward: bool) {
        let Self {
            dims,
            axes,
            transpose,
        } = self;
        if howmany == 0 {
            return;
        }
        let [nx, ny, nz] = *dims;
        let len = nx * ny * nz * howmany;
        debug_assert!(data.len() >= len, "transform buffer is too short");
        let data = &mut data[..len];

        // Distance between consecutive elements along x, y and z.
        let strides = [ny * nz * howmany, nz * howmany, howmany];
        for axis in (0..3).rev() {
            if let Some(plan) = &axes[axis] {
                let fft = if forward { &plan.forward } else { &plan.inverse };
                transform_axis(fft.as_ref(), data, plan.len, strides[axis], transpose);
            }
        }
    }
}

/// Transforms every line of length `n` and stride `stride`. The buffer is a
/// sequence of independent blocks of `n * stride` values, each holding
/// `stride` interleaved lines.
fn transform_axis(
    fft: &dyn Fft<f64>,
    data: &mut [Complex64],
    n: usize,
    stride: usize,
    transpose: &mut Vec<Complex64>,
) {
    let block_len = n * stride;
    if data.len() <= block_len {
        transform_single_block(fft, data, n, stride, transpose);
        return;
    }
    let scratch_len = fft.get_inplace_scratch_len();
    data.par_chunks_mut(block_len).for_each_init(
        || {
            (
                vec![Complex64::default(); n],
                vec![Complex64::default(); scratch_len],
            )
        },
        |(line, scratch), block| {
            for s in 0..stride {
                for (i, value) in line.iter_mut().enumerate() {
                    *value = block[i * stride + s];
                }
                fft.process_with_scratch(line, scratch);
                for (i, value) in line.iter().enumerate() {
                    block[i * stride + s] = *value;
                }
            }
        },
    );
}

/// One block holds every line, so chunking the buffer gives no parallelism.
/// Lines are gathered into rows of `transpose`, one row per line.
fn transform_single_block(
    fft: &dyn Fft<f64>,
    data: &mut [Complex64],
    n: usize,
    stride: usize,
    transpose: &mut Vec<Complex64>,
) {
    let scratch_len = fft.get_inplace_scratch_len();
    transpose.clear();
    transpose.resize(n * stride, Complex64::default());

    let src: &[Complex64] = data;
    transpose.par_chunks_mut(n).enumerate().for_each_init(
        || vec![Complex64::default(); scratch_len],
        |scratch, (s, line)| {
            for (i, value) in line.iter_mut().enumerate() {
                *value = src[i * stride + s];
            }
            fft.process_with_scratch(line, scratch);
        },
    );

    let lines: &[Complex64] = transpose;
    data.par_chunks_mut(stride).enumerate().for_each(|(i, row)| {
        for (s, value) in row.iter_mut().enumerate() {
            *value = lines[s * n + i];
        }
    });
}

impl Collective for CpuBridge {
    fn all_reduce_sum(&self, value: f64) -> f64 {
        value
    }
}

impl TransformBridge for CpuBridge {
    fn forward(&mut self, data: &mut [Complex64], howmany: usize) {
        self.transform(data, howmany, true);
    }

    fn inverse(&mut self, data: &mut [Complex64], howmany: usize) {
        self.transform(data, howmany, false);
    }

    fn teardown(self) {
        debug!(
            "releasing CPU transforms for {}x{}x{}",
            self.dims[0], self.dims[1], self.dims[2]
        );
    }
}

#[cfg(test)]
mod _tests_maxwell;
