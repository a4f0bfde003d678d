//! Recursive radix-2 discrete Fourier transform.
//!
//! Callers hand in arbitrary-length complex input. Every sample is sanitized
//! (non-finite components become zero) and the sequence is zero-padded to the
//! next power of two before the forward transform runs. The inverse transform
//! sanitizes the same way, only accepts power-of-two lengths and normalizes by
//! `N`.
//!
//! Each recursion level allocates fresh even/odd halves; input slices are never
//! mutated.

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;
use thiserror::Error;

/// Complex sample in 64-bit floating point
pub type ComplexSample = Complex64;

/// Errors raised for malformed transform calls
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Input has the wrong shape for the requested operation
    #[error("invalid input for {operation}: {reason}")]
    InvalidInput {
        operation: &'static str,
        reason: String,
    },
}

/// Forward transform of `input`, zero-padded to a power of two.
///
/// Output length is the padded length; bin 0 is DC. Empty and single-sample
/// inputs come back unchanged.
pub fn transform(input: &[ComplexSample]) -> Vec<ComplexSample> {
    let padded = pad_to_power_of_two(sanitize(input));
    fft(&padded, -1.0)
}

/// Inverse transform of a power-of-two-length spectrum, normalized by `N`.
pub fn inverse_transform(input: &[ComplexSample]) -> Result<Vec<ComplexSample>, TransformError> {
    let n = input.len();
    if n > 1 && !n.is_power_of_two() {
        return Err(TransformError::InvalidInput {
            operation: "inverse transform",
            reason: format!("length {} is not a power of two", n),
        });
    }

    let scale = n.max(1) as f64;
    Ok(fft(&sanitize(input), 1.0)
        .into_iter()
        .map(|c| ComplexSample::new(c.re / scale, c.im / scale))
        .collect())
}

/// Forward transform of a loosely typed TOML array of `{ re, im }` tables.
///
/// Anything that is not an array is rejected. Elements and fields that are not
/// numbers (strings, booleans, missing keys, NaN) are treated as zero.
pub fn transform_value(value: &toml::Value) -> Result<Vec<ComplexSample>, TransformError> {
    let items = value
        .as_array()
        .ok_or_else(|| TransformError::InvalidInput {
            operation: "transform",
            reason: format!("expected an array of samples, got {}", value.type_str()),
        })?;

    let samples: Vec<ComplexSample> = items.iter().map(sample_from_value).collect();
    Ok(transform(&samples))
}

/// Replace non-finite components with zero
pub fn sanitize(input: &[ComplexSample]) -> Vec<ComplexSample> {
    input
        .iter()
        .map(|c| ComplexSample::new(finite_or_zero(c.re), finite_or_zero(c.im)))
        .collect()
}

/// Smallest power of two >= `len` (0 and 1 map to themselves)
pub fn padded_len(len: usize) -> usize {
    if len <= 1 {
        len
    } else {
        len.next_power_of_two()
    }
}

fn pad_to_power_of_two(mut samples: Vec<ComplexSample>) -> Vec<ComplexSample> {
    samples.resize(padded_len(samples.len()), ComplexSample::new(0.0, 0.0));
    samples
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn sample_from_value(value: &toml::Value) -> ComplexSample {
    let component = |key: &str| match value.get(key) {
        Some(toml::Value::Float(f)) => finite_or_zero(*f),
        Some(toml::Value::Integer(i)) => *i as f64,
        _ => 0.0,
    };
    ComplexSample::new(component("re"), component("im"))
}

/// Cooley-Tukey decimation in time. `sign` is -1 for forward, +1 for inverse.
fn fft(input: &[ComplexSample], sign: f64) -> Vec<ComplexSample> {
    let n = input.len();
    if n <= 1 {
        return input.to_vec();
    }

    let half = n / 2;
    let mut even = Vec::with_capacity(half);
    let mut odd = Vec::with_capacity(half);
    for pair in input.chunks_exact(2) {
        even.push(pair[0]);
        odd.push(pair[1]);
    }

    let even = fft(&even, sign);
    let odd = fft(&odd, sign);

    let mut combined = vec![ComplexSample::new(0.0, 0.0); n];
    for k in 0..half {
        let angle = sign * 2.0 * PI * k as f64 / n as f64;
        let twiddle = ComplexSample::new(angle.cos(), angle.sin());
        let term = odd[k] * twiddle;
        combined[k] = even[k] + term;
        combined[k + half] = even[k] - term;
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn c(re: f64, im: f64) -> ComplexSample {
        ComplexSample::new(re, im)
    }

    fn assert_close(a: &[ComplexSample], b: &[ComplexSample]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!(
                (x.re - y.re).abs() < EPS && (x.im - y.im).abs() < EPS,
                "sample {} differs: {} vs {}",
                i,
                x,
                y
            );
        }
    }

    fn naive_dft(input: &[ComplexSample]) -> Vec<ComplexSample> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input.iter().enumerate().fold(c(0.0, 0.0), |acc, (t, x)| {
                    let angle = -2.0 * PI * (k * t) as f64 / n as f64;
                    acc + x * c(angle.cos(), angle.sin())
                })
            })
            .collect()
    }

    #[test]
    fn test_empty_and_single_sample() {
        assert!(transform(&[]).is_empty());
        assert_eq!(transform(&[c(1.0, 0.0)]), vec![c(1.0, 0.0)]);
        assert!(inverse_transform(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_constant_signal_concentrates_in_dc() {
        let out = transform(&[c(1.0, 0.0); 4]);
        assert_close(&out, &[c(4.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)]);
    }

    #[test]
    fn test_impulse_has_flat_spectrum() {
        let mut input = vec![c(0.0, 0.0); 8];
        input[0] = c(1.0, 0.0);
        assert_close(&transform(&input), &[c(1.0, 0.0); 8]);
    }

    #[test]
    fn test_matches_naive_dft_after_padding() {
        let input = vec![c(0.5, -1.0), c(2.0, 0.25), c(-1.5, 3.0), c(0.0, 1.0), c(4.0, -2.0)];
        let out = transform(&input);
        assert_eq!(out.len(), 8);

        let mut padded = input.clone();
        padded.resize(8, c(0.0, 0.0));
        assert_close(&out, &naive_dft(&padded));
    }

    #[test]
    fn test_output_length_is_power_of_two() {
        for len in [2, 3, 5, 8, 13, 100, 513] {
            let out = transform(&vec![c(1.0, 1.0); len]);
            assert!(out.len().is_power_of_two());
            assert!(out.len() >= len);
            assert!(out.len() < 2 * len);
        }
    }

    #[test]
    fn test_zero_input_gives_zero_output() {
        for len in [3, 6, 16] {
            let out = transform(&vec![c(0.0, 0.0); len]);
            assert_eq!(out.len(), padded_len(len));
            assert!(out.iter().all(|s| s.re == 0.0 && s.im == 0.0));
        }
    }

    #[test]
    fn test_round_trip_recovers_input() {
        let input: Vec<ComplexSample> = (0..64)
            .map(|i| c((i as f64 * 0.3).sin(), (i as f64 * 0.7).cos() * 0.5))
            .collect();
        let restored = inverse_transform(&transform(&input)).unwrap();
        assert_close(&restored, &input);
    }

    #[test]
    fn test_non_finite_components_are_zeroed() {
        let dirty = transform(&[c(f64::NAN, f64::INFINITY), c(2.0, f64::NEG_INFINITY)]);
        let clean = transform(&[c(0.0, 0.0), c(2.0, 0.0)]);
        assert_eq!(dirty, clean);
    }

    #[test]
    fn test_inverse_non_finite_components_are_zeroed() {
        let out = inverse_transform(&[c(f64::NAN, 0.0), c(1.0, f64::INFINITY)]).unwrap();
        assert!(out.iter().all(|s| s.re.is_finite() && s.im.is_finite()));
        assert_close(&out, &[c(0.5, 0.0), c(-0.5, 0.0)]);
    }

    #[test]
    fn test_lenient_value_sanitizes_non_numeric_fields() {
        let doc: toml::Table = toml::from_str(
            r#"
            dirty = [{ re = nan, im = "x" }]
            clean = [{ re = 0.0, im = 0.0 }]
            "#,
        )
        .unwrap();

        let dirty = transform_value(&doc["dirty"]).unwrap();
        let clean = transform_value(&doc["clean"]).unwrap();
        assert_eq!(dirty, clean);
        assert_eq!(dirty, vec![c(0.0, 0.0)]);
    }

    #[test]
    fn test_lenient_value_accepts_integers_and_missing_fields() {
        let doc: toml::Table =
            toml::from_str("samples = [{ re = 1 }, { im = 2 }, 7, { re = 1, im = 0 }]").unwrap();
        let out = transform_value(&doc["samples"]).unwrap();
        let expected = transform(&[c(1.0, 0.0), c(0.0, 2.0), c(0.0, 0.0), c(1.0, 0.0)]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_lenient_value_rejects_non_array() {
        let err = transform_value(&toml::Value::String("nope".into())).unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput { .. }));
    }

    #[test]
    fn test_inverse_rejects_non_power_of_two() {
        let err = inverse_transform(&[c(1.0, 0.0); 3]).unwrap_err();
        assert_eq!(
            err,
            TransformError::InvalidInput {
                operation: "inverse transform",
                reason: "length 3 is not a power of two".into(),
            }
        );
    }

    #[test]
    fn test_inverse_does_not_depend_on_prior_forward_size() {
        // A fresh spectrum of any power-of-two size is accepted
        let _ = transform(&[c(1.0, 0.0); 16]);
        let out = inverse_transform(&[c(4.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)]).unwrap();
        assert_close(&out, &[c(1.0, 0.0); 4]);
    }
}
