//! End-to-end operator tests on the rustfft bridge.

#![cfg(test)]

use mpb3d_core::basis::BlochContext;
use mpb3d_core::dielectric::{DielectricOptions, DielectricTensorField};
use mpb3d_core::field::FieldBlock;
use mpb3d_core::geometry::{Geometry3D, Inclusion};
use mpb3d_core::lattice::Lattice3D;
use mpb3d_core::maxwell::MaxwellData;
use mpb3d_core::operator::{BlockConstraint, BlockOperator};
use mpb3d_core::polarization::Polarization;
use mpb3d_core::target::TargetOperator;
use mpb3d_core::MaxwellError;
use num_complex::Complex64;

use crate::{CpuBridge, CpuPlanner};

fn engine(
    dims: [usize; 3],
    num_bands: usize,
    k: [f64; 3],
    polarization: Polarization,
    geometry: &Geometry3D,
    mesh: [usize; 3],
) -> (MaxwellData<CpuBridge>, BlochContext, DielectricTensorField) {
    let data = MaxwellData::create(dims, num_bands, num_bands, &CpuPlanner::new()).unwrap();
    let bloch = BlochContext::new(
        data.geometry(),
        geometry.lattice.reciprocal().unwrap(),
        k,
        polarization,
    )
    .unwrap();
    let opts = DielectricOptions {
        mesh_size: mesh,
        ..DielectricOptions::default()
    };
    let eps = data.sample_dielectric(&geometry.lattice, geometry, &opts).unwrap();
    (data, bloch, eps)
}

fn trial_block(local_n: usize, p: usize, seed: u64) -> FieldBlock {
    let mut block = FieldBlock::zeros(local_n, p);
    for (idx, value) in block.as_mut_slice().iter_mut().enumerate() {
        let t = (idx as f64 + 1.0) * (seed as f64 + 0.25);
        *value = Complex64::new((0.41 * t).cos(), (0.23 * t).sin());
    }
    block
}

fn inner(a: &FieldBlock, b: &FieldBlock) -> Complex64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| x.conj() * y)
        .sum()
}

/// Eigenvalues of a real symmetric matrix by cyclic Jacobi rotations,
/// sorted ascending.
fn jacobi_eigenvalues(mut a: Vec<Vec<f64>>) -> Vec<f64> {
    let n = a.len();
    let total: f64 = a.iter().flatten().map(|v| v * v).sum();
    for _sweep in 0..64 {
        let mut off = 0.0;
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    off += a[i][j] * a[i][j];
                }
            }
        }
        if off <= 1e-28 * total {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
            }
        }
    }
    let mut eigs: Vec<f64> = (0..n).map(|i| a[i][i]).collect();
    eigs.sort_by(|x, y| x.total_cmp(y));
    eigs
}

/// Dense matrix of `op` restricted to transverse component `component`,
/// embedded as the real symmetric `[[X, -Y], [Y, X]]` for `X + iY`.
fn dense_component_block<O: BlockOperator>(op: &mut O, local_n: usize, component: usize) -> Vec<Vec<f64>> {
    let mut embedded = vec![vec![0.0; 2 * local_n]; 2 * local_n];
    let mut x = FieldBlock::zeros(local_n, 1);
    let mut y = FieldBlock::zeros(local_n, 1);
    for j in 0..local_n {
        x.fill(Complex64::default());
        x.set(j, component, 0, Complex64::new(1.0, 0.0));
        op.apply(&x, &mut y, false).unwrap();
        for i in 0..local_n {
            let v = y.get(i, component, 0);
            embedded[i][j] = v.re;
            embedded[i + local_n][j + local_n] = v.re;
            embedded[i][j + local_n] = -v.im;
            embedded[i + local_n][j] = v.im;
        }
    }
    embedded
}

#[test]
fn vacuum_constant_field_at_gamma_has_zero_frequency() {
    let vacuum = Geometry3D::uniform(Lattice3D::cubic(1.0), 1.0);
    let (mut data, bloch, eps) = engine([8, 8, 8], 2, [0.0; 3], Polarization::None, &vacuum, [1, 1, 1]);
    let mut op = data.operator(&bloch, &eps).unwrap();
    let mut x = FieldBlock::zeros(512, 2);
    assert_eq!(op.zero_k_set_const_bands(&mut x).unwrap(), 2);
    let mut ax = FieldBlock::zeros(512, 2);
    op.apply(&x, &mut ax, false).unwrap();
    assert!(ax.as_slice().iter().all(|v| v.norm() == 0.0));
}

#[test]
fn vacuum_plane_waves_have_free_space_eigenvalues() {
    let vacuum = Geometry3D::uniform(Lattice3D::cubic(1.0), 1.0);
    let k = [0.1, 0.2, -0.15];
    let (mut data, bloch, eps) = engine([8, 8, 8], 1, k, Polarization::None, &vacuum, [1, 1, 1]);
    let point = data.geometry().local_index([2, 7, 5]).unwrap();
    let mut op = data.operator(&bloch, &eps).unwrap();

    let mut x = FieldBlock::zeros(512, 1);
    x.set(point, 0, 0, Complex64::new(0.3, 0.4));
    x.set(point, 1, 0, Complex64::new(-1.0, 0.2));
    let mut ax = FieldBlock::zeros(512, 1);
    op.apply(&x, &mut ax, false).unwrap();

    // centered indices (2, -1, -3)
    let q = [2.1f64, -0.8, -3.15];
    let lambda = q.iter().map(|v| v * v).sum::<f64>();
    for i in 0..512 {
        for c in 0..2 {
            let expected = x.get(i, c, 0) * lambda;
            assert!((ax.get(i, c, 0) - expected).norm() < 1e-10);
        }
    }
}

#[test]
fn sphere_crystal_operator_is_hermitian() {
    let crystal = Geometry3D {
        lattice: Lattice3D::cubic(1.0),
        eps_bg: 1.0,
        inclusions: vec![Inclusion::Sphere {
            center: [0.5, 0.5, 0.5],
            radius: 0.3,
            eps: 12.0,
        }],
    };
    let (mut data, bloch, eps) = engine([6, 6, 6], 3, [0.2, 0.1, 0.0], Polarization::None, &crystal, [2, 2, 2]);
    let mut op = data.operator(&bloch, &eps).unwrap();
    let x = trial_block(216, 3, 1);
    let y = trial_block(216, 3, 2);
    let mut ax = FieldBlock::zeros(216, 3);
    let mut ay = FieldBlock::zeros(216, 3);
    op.apply(&x, &mut ax, false).unwrap();
    op.apply(&y, &mut ay, false).unwrap();
    let lhs = inner(&x, &ay);
    let rhs = inner(&y, &ax).conj();
    assert!((lhs - rhs).norm() < 1e-9 * lhs.norm().max(1.0));
    assert!(inner(&x, &ax).re > 0.0);
}

#[test]
fn te_field_on_flat_grid_stays_along_z() {
    let rods = Geometry3D {
        lattice: Lattice3D::cubic(1.0),
        eps_bg: 1.0,
        inclusions: vec![Inclusion::Cylinder {
            center: [0.5, 0.5, 0.0],
            radius: 0.2,
            eps: 8.9,
        }],
    };
    let (mut data, bloch, eps) = engine([8, 8, 1], 2, [0.1, 0.0, 0.0], Polarization::TE, &rods, [3, 3, 1]);
    let mut op = data.operator(&bloch, &eps).unwrap();

    let mut x = trial_block(64, 2, 3);
    op.constrain(&mut x).unwrap();
    let mut ax = FieldBlock::zeros(64, 2);
    op.apply(&x, &mut ax, false).unwrap();

    let basis = bloch.basis().entries();
    for (i, kpg) in basis.iter().enumerate() {
        for b in 0..2 {
            assert!(ax.get(i, 1, b).norm() < 1e-12);
            let hm = ax.get(i, 0, b);
            let hn = ax.get(i, 1, b);
            let h = [
                hm * kpg.m[0] + hn * kpg.n[0],
                hm * kpg.m[1] + hn * kpg.n[1],
                hm * kpg.m[2] + hn * kpg.n[2],
            ];
            assert!(h[0].norm() < 1e-12 && h[1].norm() < 1e-12);
        }
    }
    assert!(ax.column_norm_sqr(0) > 1e-6);
}

#[test]
fn te_on_full_3d_grid_is_rejected() {
    let data = MaxwellData::create([8, 8, 8], 2, 2, &CpuPlanner::new()).unwrap();
    let reciprocal = Lattice3D::cubic(1.0).reciprocal().unwrap();
    let err = BlochContext::new(data.geometry(), reciprocal, [0.1, 0.0, 0.0], Polarization::TE)
        .unwrap_err();
    assert!(matches!(err, MaxwellError::InvalidConfiguration(_)));
    data.teardown();
}

#[test]
fn quarter_wave_stack_target_finds_mode_near_second_gap() {
    // Layers of ε = 1 (thickness 6/11) and ε = 1.44 (5/11) have equal
    // optical thickness; the closed gap at Γ sits at f = 11/12.
    let lattice = Lattice3D::cubic(1.0);
    let stack = Geometry3D::bilayer(lattice, 1.0, 1.44, 6.0 / 11.0);
    let (mut data, bloch, eps) = engine([44, 1, 1], 1, [0.0; 3], Polarization::None, &stack, [1, 1, 1]);
    let target_frequency = 11.0 / 12.0;
    let sigma = target_frequency * target_frequency;

    let mut op = data.operator(&bloch, &eps).unwrap();
    let base_eigs = jacobi_eigenvalues(dense_component_block(&mut op, 44, 0));
    let nearest = base_eigs
        .iter()
        .copied()
        .min_by(|a, b| (a - sigma).abs().total_cmp(&(b - sigma).abs()))
        .unwrap();
    assert!(base_eigs[0].abs() < 1e-9);
    assert!((nearest.sqrt() - target_frequency).abs() < 0.05 * target_frequency);

    let mut target = TargetOperator::new(op, target_frequency).unwrap();
    let target_eigs = jacobi_eigenvalues(dense_component_block(&mut target, 44, 0));
    assert!(target_eigs[0] >= -1e-7);
    let expected = (nearest - sigma) * (nearest - sigma);
    assert!((target_eigs[0] - expected).abs() < 1e-6);
}
