#![cfg(test)]

use super::error::MaxwellError;
use super::lattice::Lattice3D;

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[test]
fn reciprocal_of_cubic_lattice_is_inverse_length() {
    let g = Lattice3D::cubic(2.0).reciprocal().unwrap();
    assert!((g.g1[0] - 0.5).abs() < 1e-12);
    assert!((g.g2[1] - 0.5).abs() < 1e-12);
    assert!((g.g3[2] - 0.5).abs() < 1e-12);
    assert!(g.g1[1].abs() < 1e-12 && g.g1[2].abs() < 1e-12);
}

#[test]
fn reciprocal_vectors_form_dual_basis() {
    let lattice = Lattice3D::from_vectors([2.0, 0.5, 0.1], [0.25, 1.5, -0.2], [0.3, 0.0, 1.2]);
    let g = lattice.reciprocal().unwrap();
    let r = [lattice.r1, lattice.r2, lattice.r3];
    let gs = [g.g1, g.g2, g.g3];
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((dot(r[i], gs[j]) - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn hexagonal_reciprocal_stays_in_plane() {
    let g = Lattice3D::hexagonal(1.0).reciprocal().unwrap();
    assert_eq!(g.g1[2], 0.0);
    assert_eq!(g.g2[2], 0.0);
}

#[test]
fn cartesian_fractional_roundtrip_is_identity() {
    let lattice = Lattice3D::hexagonal(2.0);
    let frac = [0.35, 0.4, 0.1];
    let cart = lattice.fractional_to_cartesian(frac);
    let recovered = lattice.cartesian_to_fractional(cart).unwrap();
    for d in 0..3 {
        assert!((recovered[d] - frac[d]).abs() < 1e-12);
    }
}

#[test]
fn reduced_k_maps_through_reciprocal_basis() {
    let g = Lattice3D::orthorhombic(1.0, 2.0, 4.0).reciprocal().unwrap();
    let k = g.to_cartesian([0.5, 0.5, 0.5]);
    assert!((k[0] - 0.5).abs() < 1e-12);
    assert!((k[1] - 0.25).abs() < 1e-12);
    assert!((k[2] - 0.125).abs() < 1e-12);
}

#[test]
fn volume_of_orthorhombic_cell() {
    assert!((Lattice3D::orthorhombic(1.0, 2.0, 3.0).volume() - 6.0).abs() < 1e-12);
}

#[test]
fn linearly_dependent_vectors_are_rejected() {
    let lattice = Lattice3D::from_vectors([1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let err = lattice.reciprocal().unwrap_err();
    assert!(matches!(err, MaxwellError::InvalidConfiguration(_)));
}

#[test]
fn small_unit_lattices_keep_their_reciprocal() {
    let g = Lattice3D::cubic(1e-6).reciprocal().unwrap();
    assert!((g.g1[0] - 1e6).abs() < 1e-6);
    assert!((g.g3[2] - 1e6).abs() < 1e-6);

    let flat = Lattice3D::from_vectors([1e-6, 0.0, 0.0], [0.0, 1e-6, 0.0], [1e-6, 1e-6, 1e-24]);
    let err = flat.reciprocal().unwrap_err();
    assert!(matches!(err, MaxwellError::InvalidConfiguration(_)));
}
