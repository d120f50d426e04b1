//! Small geometry helpers shared by moves, contexts and configuration

use nalgebra::{Unit, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Draw a rotation uniformly from SO(3) (Shoemake's subgroup algorithm).
pub fn uniform_random_rotation<R: Rng + ?Sized>(rng: &mut R) -> UnitQuaternion<f64> {
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen();
    let u3: f64 = rng.gen();

    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    let (w, i) = (a * (2.0 * PI * u2).sin(), a * (2.0 * PI * u2).cos());
    let (j, k) = (b * (2.0 * PI * u3).sin(), b * (2.0 * PI * u3).cos());

    UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, i, j, k))
}

/// Draw a rotation about a random axis with angle uniform in `[-max_angle, max_angle]`.
pub fn bounded_random_rotation<R: Rng + ?Sized>(rng: &mut R, max_angle: f64) -> UnitQuaternion<f64> {
    let angle = (rng.gen::<f64>() - 0.5) * 2.0 * max_angle;
    // Gaussian components give an isotropic axis
    let axis: Vector3<f64> = Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    );

    if axis.norm() > 0.0 {
        UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle)
    } else {
        UnitQuaternion::identity()
    }
}

/// Draw a translation uniformly from the cube `[-max, max]^3`.
pub fn random_translation<R: Rng + ?Sized>(rng: &mut R, max: f64) -> Vector3<f64> {
    let dx = (rng.gen::<f64>() - 0.5) * 2.0 * max;
    let dy = (rng.gen::<f64>() - 0.5) * 2.0 * max;
    let dz = (rng.gen::<f64>() - 0.5) * 2.0 * max;

    Vector3::new(dx, dy, dz)
}

/// Apply the minimum-image convention for an orthorhombic box.
pub fn minimum_image(mut d: Vector3<f64>, box_lengths: &Vector3<f64>) -> Vector3<f64> {
    for dim in 0..3 {
        let l = box_lengths[dim];
        if l > 0.0 {
            d[dim] -= l * (d[dim] / l).round();
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_rotation_preserves_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = Vector3::new(0.3, -1.2, 2.0);
        for _ in 0..100 {
            let q = uniform_random_rotation(&mut rng);
            assert!((q.transform_vector(&v).norm() - v.norm()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bounded_rotation_respects_max_angle() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let q = bounded_random_rotation(&mut rng, 0.2);
            assert!(q.angle() <= 0.2 + 1e-12);
        }
    }

    #[test]
    fn test_bounded_rotation_axes_are_isotropic() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut second = Vector3::zeros();
        let mut fourth = Vector3::zeros();
        let mut count = 0.0;
        for _ in 0..20_000 {
            let q = bounded_random_rotation(&mut rng, 1.0);
            if let Some(axis) = q.axis() {
                second += axis.component_mul(&axis);
                fourth += axis.map(|c| c.powi(4));
                count += 1.0;
            }
        }
        // Uniform directions on the sphere: <x^2> = 1/3, <x^4> = 1/5
        for k in 0..3 {
            assert!((second[k] / count - 1.0 / 3.0).abs() < 0.01);
            assert!((fourth[k] / count - 0.2).abs() < 0.01);
        }
    }

    #[test]
    fn test_minimum_image() {
        let box_lengths = Vector3::new(3.0, 3.0, 3.0);
        let d = minimum_image(Vector3::new(2.5, -2.0, 0.5), &box_lengths);
        assert!((d - Vector3::new(-0.5, 1.0, 0.5)).norm() < 1e-12);
    }
}
