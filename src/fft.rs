use std::f64::consts::PI;
use std::mem;

use crate::qmath::{self, Complex};

/// Precalculated twiddle tables and preallocated recursion scratch for one
/// FFT size. The scratch pairs are written during every transform, so a
/// cache must never be shared between simultaneously running transforms.
pub struct FftCache {
    cos: Vec<f32>,
    sin: Vec<f32>,
    even: Vec<Vec<Complex>>,
    odd: Vec<Vec<Complex>>,
}

impl FftCache {
    /// Build the tables for transforms of `size` samples.
    pub fn new(size: usize) -> Self {
        assert!(
            size >= 2 && size.is_power_of_two(),
            "FFT size must be a power of 2, at least 2, got {}",
            size
        );
        let half_size = size / 2;
        let step = -2.0 * PI / size as f64;
        let mut cos = Vec::with_capacity(half_size);
        let mut sin = Vec::with_capacity(half_size);
        for i in 0..half_size {
            let rotation = i as f64 * step;
            cos.push(rotation.cos() as f32);
            sin.push(rotation.sin() as f32);
        }
        let depths = qmath::log2(size);
        let mut even = Vec::with_capacity(depths);
        let mut odd = Vec::with_capacity(depths);
        for depth in 0..depths {
            even.push(vec![Complex::default(); 1 << depth]);
            odd.push(vec![Complex::default(); 1 << depth]);
        }
        Self { cos, sin, even, odd }
    }

    /// Half the FFT size the cache was created for.
    #[inline]
    pub fn size(&self) -> usize {
        self.cos.len()
    }
}

/// One recursion level. `samples.len()` is 2^(depth + 1) and at most the
/// cache size; the scratch pair of this depth is moved out for the duration
/// of the call so deeper levels can borrow the cache freely.
fn process(samples: &mut [Complex], cache: &mut FftCache, depth: usize, inverse: bool) {
    let half = samples.len() >> 1;
    let mut even = mem::take(&mut cache.even[depth]);
    let mut odd = mem::take(&mut cache.odd[depth]);
    for sample in 0..half {
        even[sample] = samples[2 * sample];
        odd[sample] = samples[2 * sample + 1];
    }

    if depth != 0 {
        process(&mut even, cache, depth - 1, inverse);
        process(&mut odd, cache, depth - 1, inverse);
    }

    let step = cache.size() / half;
    for i in 0..half {
        let cos = cache.cos[i * step];
        let sin = if inverse {
            -cache.sin[i * step]
        } else {
            cache.sin[i * step]
        };
        let rotated = Complex::new(
            odd[i].re * cos - odd[i].im * sin,
            odd[i].re * sin + odd[i].im * cos,
        );
        samples[i] = even[i] + rotated;
        samples[i + half] = even[i] - rotated;
    }

    cache.even[depth] = even;
    cache.odd[depth] = odd;
}

/// Forward transform, in place. The length must be a power of two no larger
/// than twice the cache's `size()`.
pub fn fft(samples: &mut [Complex], cache: &mut FftCache) {
    if samples.len() < 2 {
        return;
    }
    process(samples, cache, qmath::log2(samples.len()) - 1, false);
}

/// Inverse transform, in place, including the 1/N scaling.
pub fn ifft(samples: &mut [Complex], cache: &mut FftCache) {
    if samples.len() < 2 {
        return;
    }
    process(samples, cache, qmath::log2(samples.len()) - 1, true);
    let scale = 1.0 / samples.len() as f32;
    for sample in samples {
        sample.re *= scale;
        sample.im *= scale;
    }
}

/// Transform a real signal and overwrite it with the magnitudes of its
/// spectrum. The full mirrored length is written; the first half is the
/// physical band up to the Nyquist frequency.
pub fn fft_1d(samples: &mut [f32], cache: &mut FftCache) {
    if samples.len() < 2 {
        return;
    }
    let depth = qmath::log2(samples.len()) - 1;
    let half = samples.len() >> 1;
    let mut even = mem::take(&mut cache.even[depth]);
    let mut odd = mem::take(&mut cache.odd[depth]);
    for sample in 0..half {
        even[sample] = Complex::new(samples[2 * sample], 0.0);
        odd[sample] = Complex::new(samples[2 * sample + 1], 0.0);
    }

    if depth != 0 {
        process(&mut even, cache, depth - 1, false);
        process(&mut odd, cache, depth - 1, false);
    }

    let step = cache.size() / half;
    for i in 0..half {
        let cos = cache.cos[i * step];
        let sin = cache.sin[i * step];
        let rotated = Complex::new(
            odd[i].re * cos - odd[i].im * sin,
            odd[i].re * sin + odd[i].im * cos,
        );
        samples[i] = (even[i] + rotated).magnitude();
        samples[i + half] = (even[i] - rotated).magnitude();
    }

    cache.even[depth] = even;
    cache.odd[depth] = odd;
}

/// Forward transform with an optional cache. Without one, a temporary cache
/// sized to the signal is created for the call.
pub fn in_place_fft(samples: &mut [Complex], cache: Option<&mut FftCache>) {
    if samples.len() < 2 {
        return;
    }
    match cache {
        Some(cache) => fft(samples, cache),
        None => fft(samples, &mut FftCache::new(samples.len())),
    }
}

/// Inverse transform with an optional cache.
pub fn in_place_ifft(samples: &mut [Complex], cache: Option<&mut FftCache>) {
    if samples.len() < 2 {
        return;
    }
    match cache {
        Some(cache) => ifft(samples, cache),
        None => ifft(samples, &mut FftCache::new(samples.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_signal(rng: &mut StdRng, length: usize) -> Vec<Complex> {
        (0..length)
            .map(|_| Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    fn peak(samples: &[Complex]) -> f32 {
        samples.iter().map(|s| s.magnitude()).fold(0.0, f32::max)
    }

    #[test]
    fn round_trip_all_sizes() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut size = 2;
        while size <= 4096 {
            let reference = random_signal(&mut rng, size);
            let mut samples = reference.clone();
            let mut cache = FftCache::new(size);
            fft(&mut samples, &mut cache);
            ifft(&mut samples, &mut cache);
            let limit = 1e-4 * peak(&reference);
            for (result, original) in samples.iter().zip(&reference) {
                assert!(
                    (result.re - original.re).abs() <= limit
                        && (result.im - original.im).abs() <= limit,
                    "size {} diverged: {:?} vs {:?}",
                    size,
                    result,
                    original
                );
            }
            size <<= 1;
        }
    }

    #[test]
    fn linearity() {
        let mut rng = StdRng::seed_from_u64(42);
        let size = 256;
        let x = random_signal(&mut rng, size);
        let y = random_signal(&mut rng, size);
        let (a, b) = (0.75f32, -1.5f32);
        let mut cache = FftCache::new(size);

        let mut combined: Vec<Complex> = x
            .iter()
            .zip(&y)
            .map(|(x, y)| Complex::new(a * x.re + b * y.re, a * x.im + b * y.im))
            .collect();
        fft(&mut combined, &mut cache);

        let mut fx = x.clone();
        fft(&mut fx, &mut cache);
        let mut fy = y.clone();
        fft(&mut fy, &mut cache);

        for i in 0..size {
            let expected = Complex::new(
                a * fx[i].re + b * fy[i].re,
                a * fx[i].im + b * fy[i].im,
            );
            assert!((combined[i].re - expected.re).abs() < 1e-4 * size as f32);
            assert!((combined[i].im - expected.im).abs() < 1e-4 * size as f32);
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let size = 512;
        let mut samples = vec![Complex::default(); size];
        samples[0].re = 1.0;
        let mut cache = FftCache::new(size);
        fft(&mut samples, &mut cache);
        for bin in samples {
            assert!((bin.magnitude() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn magnitude_variant_matches_complex_transform() {
        let mut rng = StdRng::seed_from_u64(7);
        let size = 1024;
        let real: Vec<f32> = (0..size).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut cache = FftCache::new(size);
        let mut complex: Vec<Complex> =
            real.iter().map(|s| Complex::new(*s, 0.0)).collect();
        fft(&mut complex, &mut cache);

        let mut magnitudes = real;
        fft_1d(&mut magnitudes, &mut cache);

        for (magnitude, bin) in magnitudes.iter().zip(&complex) {
            assert!((magnitude - bin.magnitude()).abs() < 1e-3);
        }
    }

    #[test]
    fn cosine_concentrates_into_two_bins() {
        let size = 1024;
        let mut samples: Vec<Complex> = (0..size)
            .map(|n| {
                Complex::new(
                    (2.0 * std::f64::consts::PI * 64.0 * n as f64 / size as f64).cos() as f32,
                    0.0,
                )
            })
            .collect();
        let mut cache = FftCache::new(size);
        fft(&mut samples, &mut cache);
        assert!((samples[64].magnitude() - 512.0).abs() < 1e-2);
        assert!((samples[960].magnitude() - 512.0).abs() < 1e-2);
        for (bin, value) in samples.iter().enumerate() {
            if bin != 64 && bin != 960 {
                assert!(
                    value.magnitude() < 1e-3,
                    "leakage at bin {}: {}",
                    bin,
                    value.magnitude()
                );
            }
        }
    }

    #[test]
    fn wrappers_accept_missing_cache() {
        let mut samples = vec![Complex::default(); 64];
        samples[0].re = 1.0;
        let reference = samples.clone();
        in_place_fft(&mut samples, None);
        in_place_ifft(&mut samples, None);
        for (result, original) in samples.iter().zip(&reference) {
            assert!((result.re - original.re).abs() < 1e-6);
            assert!((result.im - original.im).abs() < 1e-6);
        }
    }
}
