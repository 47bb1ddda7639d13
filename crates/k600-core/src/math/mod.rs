// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geometry helpers shared by the detector processors: a small `f64` vector,
//! the detector's spherical-angle convention, and the seeded PRNG used for
//! resolution smearing.

mod prng;
mod vec3;

pub use prng::Prng;
pub use vec3::Vec3;

/// Polar/azimuthal direction in degrees.
///
/// * `theta` is measured from the +z (beam) axis, `0..=180`.
/// * `phi` is measured from +x towards +y, `0..360`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Spherical {
    /// Polar angle in degrees.
    pub theta: f64,
    /// Azimuthal angle in degrees.
    pub phi: f64,
}

/// Converts a Cartesian position into the detector's `(theta, phi)` convention.
///
/// The azimuth is resolved quadrant by quadrant from `atan(y / x)`:
///
/// * `x == 0`: `phi` is `0` for `y == 0`, `90` for `y > 0`, `270` for `y < 0`.
/// * `x > 0, y > 0`: unchanged; `x < 0`: `+180`; `x > 0, y < 0`: `+360`.
///
/// Points on the x axis (`y == 0`) keep `atan(0) = 0` for either sign of `x`.
/// The origin has no direction and maps to `theta = 0`.
pub fn to_spherical(x: f64, y: f64, z: f64) -> Spherical {
    let norm = (x * x + y * y + z * z).sqrt();
    let theta = if norm > 0.0 {
        (z / norm).clamp(-1.0, 1.0).acos().to_degrees()
    } else {
        0.0
    };
    Spherical {
        theta,
        phi: azimuth(x, y),
    }
}

fn azimuth(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        return if y > 0.0 {
            90.0
        } else if y < 0.0 {
            270.0
        } else {
            0.0
        };
    }

    let phi = (y / x).atan().to_degrees();
    if x < 0.0 && y != 0.0 {
        phi + 180.0
    } else if x > 0.0 && y < 0.0 {
        phi + 360.0
    } else if phi == 0.0 {
        // atan(-0.0) would otherwise leak a negative zero.
        0.0
    } else {
        phi
    }
}
