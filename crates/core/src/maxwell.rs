//! Engine handle: geometry, transform bridge and FFT scratch.

use log::{debug, warn};
use num_complex::Complex64;

use crate::backend::{Collective, TransformBridge, TransformPlanner};
use crate::basis::BlochContext;
use crate::config::MaxwellConfig;
use crate::dielectric::{DielectricFunction, DielectricOptions, DielectricTensorField};
use crate::error::MaxwellError;
use crate::grid::GridGeometry;
use crate::lattice::Lattice3D;
use crate::operator::{MaxwellOperator, OperatorStats};

/// Owns everything the operator needs besides the per-k and per-material
/// state. Created once per problem size.
pub struct MaxwellData<T: TransformBridge> {
    geometry: GridGeometry,
    bridge: T,
    fft_data: Vec<Complex64>,
    stats: OperatorStats,
}

impl<T: TransformBridge> MaxwellData<T> {
    /// Computes the local decomposition with the planner's distribution
    /// rules, plans the transforms and allocates the scratch buffer.
    pub fn create<P>(
        dims: [usize; 3],
        num_bands: usize,
        num_fft_bands: usize,
        planner: &P,
    ) -> Result<Self, MaxwellError>
    where
        P: TransformPlanner<Bridge = T>,
    {
        if num_fft_bands > num_bands {
            warn!("num_fft_bands = {num_fft_bands} exceeds num_bands = {num_bands}, capping");
        }
        let layout = planner.slab_layout(dims)?;
        let geometry = GridGeometry::new(dims, num_bands, num_fft_bands, layout)?;
        let bridge = planner.plan(&geometry)?;

        let len = geometry
            .alloc_n
            .checked_mul(3)
            .and_then(|v| v.checked_mul(geometry.num_fft_bands))
            .ok_or_else(|| {
                MaxwellError::allocation(format!(
                    "scratch size 3 x {} x {} overflows",
                    geometry.alloc_n, geometry.num_fft_bands
                ))
            })?;
        let mut fft_data = Vec::new();
        fft_data.try_reserve_exact(len).map_err(|err| {
            MaxwellError::allocation(format!("cannot allocate {len} complex scratch values: {err}"))
        })?;
        fft_data.resize(len, Complex64::default());

        debug!(
            "created maxwell data: {}x{}x{} grid, local slab {}+{}, {} bands ({} per transform)",
            geometry.nx,
            geometry.ny,
            geometry.nz,
            geometry.local_x_start,
            geometry.local_nx,
            geometry.num_bands,
            geometry.num_fft_bands
        );

        Ok(Self {
            geometry,
            bridge,
            fft_data,
            stats: OperatorStats::default(),
        })
    }

    pub fn from_config<P>(config: &MaxwellConfig, planner: &P) -> Result<Self, MaxwellError>
    where
        P: TransformPlanner<Bridge = T>,
    {
        config.validate()?;
        Self::create(
            config.grid.size,
            config.grid.num_bands,
            config.grid.effective_num_fft_bands(),
            planner,
        )
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn bridge(&self) -> &T {
        &self.bridge
    }

    pub fn stats(&self) -> OperatorStats {
        self.stats
    }

    /// Samples the dielectric, reducing the means through the bridge.
    pub fn sample_dielectric<F>(
        &self,
        lattice: &Lattice3D,
        epsilon: &F,
        opts: &DielectricOptions,
    ) -> Result<DielectricTensorField, MaxwellError>
    where
        F: DielectricFunction + ?Sized,
    {
        DielectricTensorField::sample(&self.geometry, lattice, epsilon, opts, &self.bridge)
    }

    /// Binds this engine to a k-point and a dielectric.
    pub fn operator<'a>(
        &'a mut self,
        bloch: &'a BlochContext,
        dielectric: &'a DielectricTensorField,
    ) -> Result<MaxwellOperator<'a, T>, MaxwellError> {
        MaxwellOperator::new(self, bloch, dielectric)
    }

    pub fn all_reduce_sum(&self, value: f64) -> f64 {
        self.bridge.all_reduce_sum(value)
    }

    pub fn teardown(self) {
        debug!("tearing down maxwell data");
        self.bridge.teardown();
    }

    pub(crate) fn fft_parts(&mut self) -> (&mut [Complex64], &mut T) {
        (&mut self.fft_data, &mut self.bridge)
    }

    pub(crate) fn record_application(&mut self, columns: usize, is_current_eigenvector: bool) {
        self.stats.applications += 1;
        self.stats.columns += columns as u64;
        if is_current_eigenvector {
            self.stats.eigenvector_applications += 1;
        }
    }
}
