//! Procedural colour cycling along a band's point sequence.

use std::f64::consts::PI;

/// RGBA colour of point `index` in a band of `band_length` points.
///
/// Each channel is a sine over the band, phase-shifted by a third of a turn
/// (scaled by `density`), rounded to two decimals and clamped to [0, 1].
/// Alpha is always 1.
pub fn color_at(index: usize, band_length: usize, density: f64) -> [f64; 4] {
    let omega = 2.0 * PI / band_length.max(1) as f64 * density;
    let phase = omega * index as f64;

    let channel = |offset: f64| {
        let value = 0.5 + 0.5 * (phase + offset).sin();
        let rounded = (value * 100.0).round() / 100.0;
        if rounded.is_finite() {
            rounded.clamp(0.0, 1.0)
        } else {
            0.0
        }
    };

    [
        channel(0.0),
        channel(2.0 * PI / 3.0 * density),
        channel(4.0 * PI / 3.0 * density),
        1.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_stay_in_unit_range() {
        for density in [0.0, 1.0, 2.0, 2.35, -3.5, 1e6] {
            for len in [1, 2, 7, 512, 1024] {
                for i in (0..len).step_by(3) {
                    let c = color_at(i, len, density);
                    assert!(c.iter().all(|v| (0.0..=1.0).contains(v)), "{:?}", c);
                    assert_eq!(c[3], 1.0);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(color_at(17, 512, 2.0), color_at(17, 512, 2.0));
        assert_eq!(color_at(300, 1024, 2.35), color_at(300, 1024, 2.35));
    }

    #[test]
    fn test_first_point_values() {
        // sin(0) = 0 → red 0.5; green/blue from the third-turn offsets
        let c = color_at(0, 512, 1.0);
        assert_eq!(c[0], 0.5);
        assert_eq!(c[1], 0.93);
        assert_eq!(c[2], 0.07);
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let c = color_at(5, 97, 2.35);
        for v in &c[..3] {
            assert!((v * 100.0 - (v * 100.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_length_band_does_not_produce_nan() {
        let c = color_at(0, 0, 2.0);
        assert!(c.iter().all(|v| v.is_finite()));
    }
}
