use crate::biquad::Filter;
use crate::fft::{self, FftCache};

/// Default FFT size of the analyzer, fine enough for sub-Hz placement of
/// correction filters at common sample rates.
pub const DEFAULT_RESOLUTION: usize = 65536;

/// Derives the magnitude response of a filter by measuring its impulse
/// response. Owns the filter under measurement; replacing it drops the
/// previous one.
pub struct FilterAnalyzer {
    filter: Box<dyn Filter>,
    sample_rate: u32,
    resolution: usize,
    /// Dirac impulse, kept around so a measurement is a copy, not a refill.
    impulse_reference: Vec<f32>,
    spectrum: Vec<f32>,
    cache: FftCache,

    // Knobs of the brute-force EQ search built on top of this analyzer.
    pub start_q: f64,
    pub gain_precision: f64,
    pub min_gain: f64,
    pub max_gain: f64,
    pub iterations: u32,
}

impl FilterAnalyzer {
    pub fn new(filter: Box<dyn Filter>, sample_rate: u32) -> Self {
        let resolution = DEFAULT_RESOLUTION;
        let mut impulse_reference = vec![0.0; resolution];
        impulse_reference[0] = 1.0;
        Self {
            filter,
            sample_rate,
            resolution,
            impulse_reference,
            spectrum: vec![0.0; resolution],
            cache: FftCache::new(resolution),
            start_q: 10.0,
            gain_precision: 0.01,
            min_gain: -100.0,
            max_gain: 20.0,
            iterations: 8,
        }
    }

    /// Replace the measured filter, keeping the sample rate.
    pub fn reset(&mut self, filter: Box<dyn Filter>) {
        self.filter = filter;
    }

    /// Replace the measured filter and the sample rate.
    pub fn reset_with_rate(&mut self, filter: Box<dyn Filter>, sample_rate: u32) {
        self.filter = filter;
        self.sample_rate = sample_rate;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Change the measurement FFT size, reallocating the reference and cache.
    pub fn set_resolution(&mut self, resolution: usize) {
        if self.resolution == resolution {
            return;
        }
        self.resolution = resolution;
        self.impulse_reference = vec![0.0; resolution];
        self.impulse_reference[0] = 1.0;
        self.spectrum = vec![0.0; resolution];
        self.cache = FftCache::new(resolution);
    }

    /// Magnitude response of the filter. The first half of the returned
    /// slice is the physical band on a linear axis from 0 to half the
    /// sample rate; the rest is its mirror.
    pub fn get_spectrum(&mut self) -> &[f32] {
        self.spectrum.copy_from_slice(&self.impulse_reference);
        self.filter.process(&mut self.spectrum, 0, 1);
        fft::fft_1d(&mut self.spectrum, &mut self.cache);
        &self.spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::{PeakingFilter, REFERENCE_Q};

    #[test]
    fn flat_filter_has_flat_spectrum() {
        let filter = PeakingFilter::new(48000, 1000.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(filter), 48000);
        analyzer.set_resolution(4096);
        let spectrum = analyzer.get_spectrum();
        for bin in &spectrum[..2048] {
            assert!((bin - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn peaking_boost_shows_at_its_center() {
        let filter = PeakingFilter::new(48000, 1000.0, 1.0, 6.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(filter), 48000);
        analyzer.set_resolution(16384);
        let spectrum = analyzer.get_spectrum();

        let center_bin = (1000.0 * 16384.0 / 48000.0) as usize;
        let center_db = 20.0 * spectrum[center_bin].log10();
        assert!((center_db - 6.0).abs() < 0.5, "center at {} dB", center_db);

        let low_bin = (100.0 * 16384.0 / 48000.0) as usize;
        let low_db = 20.0 * spectrum[low_bin].log10();
        assert!(low_db.abs() < 0.5, "skirt at {} dB", low_db);
    }

    #[test]
    fn resolution_change_reseeds_the_impulse() {
        let filter = PeakingFilter::new(48000, 1000.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(filter), 48000);
        analyzer.set_resolution(2048);
        assert_eq!(analyzer.resolution(), 2048);
        assert_eq!(analyzer.get_spectrum().len(), 2048);
    }
}
