use std::ops::Range;

use crate::analyzer::FilterAnalyzer;
use crate::biquad::PeakingFilter;
use crate::graph::{self, DEFAULT_DB_FLOOR};
use crate::qmath;

const LOG10_20: f64 = 1.301029995663981; // log10 of the lowest corrected band

/// One correction band: a peaking filter description.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakingEq {
    pub center_freq: f64,
    pub q: f64,
    pub gain: f64,
}

/// Measure the analyzer's current filter against the untouched error curve:
/// response in dB on the log axis, mixed with the error, summed as |.|.
fn brute_force_step(
    source: &[f32],
    analyzer: &mut FilterAnalyzer,
) -> (Vec<f32>, f32) {
    let sample_rate = analyzer.sample_rate();
    let half = analyzer.resolution() / 2;
    let spectrum = analyzer.get_spectrum();
    let mut changed = graph::to_log_graph(
        &spectrum[..half],
        20.0,
        sample_rate as f64 * 0.5,
        sample_rate,
        source.len(),
    );
    graph::to_decibels(&mut changed, DEFAULT_DB_FLOOR);
    qmath::mix(source, &mut changed);
    let sum = qmath::sum_abs(&changed);
    (changed, sum)
}

/// Find the Q that lets a peaking filter at `freq` flatten `target` best.
///
/// `target` is the error curve in dB; `gain` is the error read at `freq`.
/// The candidate filters cut what the error adds, so the gain is
/// sign-flipped and snapped to the configured grid, and the winning
/// residual is written back into `target`. The returned band carries that
/// correction gain.
pub fn brute_force_q(
    target: &mut [f32],
    analyzer: &mut FilterAnalyzer,
    freq: f64,
    gain: f64,
) -> PeakingEq {
    let mut q = analyzer.start_q;
    let mut q_step = q * 0.5;
    let gain = (qmath::clamp(-gain, -analyzer.max_gain, -analyzer.min_gain)
        / analyzer.gain_precision)
        .round()
        * analyzer.gain_precision;
    let mut target_sum = qmath::sum_abs(target);
    let source = target.to_vec();
    let sample_rate = analyzer.sample_rate();
    for _ in 0..analyzer.iterations {
        for candidate in [q - q_step, q + q_step] {
            analyzer.reset(Box::new(PeakingFilter::new(
                sample_rate,
                freq,
                candidate,
                gain,
            )));
            let (changed, sum) = brute_force_step(&source, analyzer);
            if target_sum > sum {
                target_sum = sum;
                target.copy_from_slice(&changed);
                q = candidate;
            }
        }
        q_step *= 0.5;
    }
    PeakingEq {
        center_freq: freq,
        q,
        gain,
    }
}

/// Correct the worst error within a window of the curve. The window indices
/// address `target`, whose full span maps logarithmically onto
/// [20 Hz, half the sample rate]. The first of equal maxima wins.
pub fn brute_force_band(
    target: &mut [f32],
    analyzer: &mut FilterAnalyzer,
    window: Range<usize>,
) -> PeakingEq {
    let pow_range = (analyzer.sample_rate() as f64 * 0.5).log10() - LOG10_20;
    let mut max = target[window.start].abs();
    let mut max_at = window.start;
    for i in window.start + 1..window.end {
        let abs = target[i].abs();
        if max < abs {
            max = abs;
            max_at = i;
        }
    }
    let freq = 10.0f64.powf(LOG10_20 + pow_range * max_at as f64 / target.len() as f64);
    brute_force_q(target, analyzer, freq, target[max_at] as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::{PeakingFilter, REFERENCE_Q};

    const SAMPLE_RATE: u32 = 48000;
    const BANDS: usize = 1024;

    /// dB curve of a single peaking filter on the standard log axis.
    fn filter_curve(freq: f64, q: f64, gain: f64) -> Vec<f32> {
        let filter = PeakingFilter::new(SAMPLE_RATE, freq, q, gain);
        let mut analyzer = FilterAnalyzer::new(Box::new(filter), SAMPLE_RATE);
        analyzer.set_resolution(16384);
        let half = analyzer.resolution() / 2;
        let spectrum = analyzer.get_spectrum();
        let mut curve = crate::graph::to_log_graph(
            &spectrum[..half],
            20.0,
            SAMPLE_RATE as f64 * 0.5,
            SAMPLE_RATE,
            BANDS,
        );
        crate::graph::to_decibels(&mut curve, DEFAULT_DB_FLOOR);
        curve
    }

    #[test]
    fn recovers_a_synthetic_peak() {
        // An 8 dB bump at 1 kHz with Q 2 should come back as its own cut.
        let mut target = filter_curve(1000.0, 2.0, 8.0);
        let placeholder = PeakingFilter::new(SAMPLE_RATE, 20.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(placeholder), SAMPLE_RATE);
        analyzer.set_resolution(16384);

        let band = brute_force_band(&mut target, &mut analyzer, 0..BANDS);
        assert!(
            (band.center_freq - 1000.0).abs() < 10.0,
            "center {}",
            band.center_freq
        );
        assert!((band.q - 2.0).abs() <= 0.3, "q {}", band.q);
        assert!((band.gain + 8.0).abs() <= 0.1, "gain {}", band.gain);
    }

    #[test]
    fn correction_flattens_the_error() {
        let mut target = filter_curve(500.0, 4.0, 5.0);
        let initial = qmath::sum_abs(&target);
        let placeholder = PeakingFilter::new(SAMPLE_RATE, 20.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(placeholder), SAMPLE_RATE);
        analyzer.set_resolution(16384);

        brute_force_band(&mut target, &mut analyzer, 0..BANDS);
        let remaining = qmath::sum_abs(&target);
        assert!(
            remaining < initial * 0.2,
            "residual {} of {}",
            remaining,
            initial
        );
    }

    #[test]
    fn gain_is_snapped_and_clamped() {
        // A 30 dB error cannot be corrected past the configured limit.
        let mut target = vec![0.0f32; BANDS];
        target[512] = 30.0;
        let placeholder = PeakingFilter::new(SAMPLE_RATE, 20.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(placeholder), SAMPLE_RATE);
        analyzer.set_resolution(4096);

        let band = brute_force_band(&mut target, &mut analyzer, 0..BANDS);
        assert!((band.gain + 20.0).abs() < 1e-9, "gain {}", band.gain);
    }

    #[test]
    fn first_of_equal_maxima_wins() {
        let mut target = vec![0.0f32; BANDS];
        target[100] = 4.0;
        target[700] = 4.0;
        let placeholder = PeakingFilter::new(SAMPLE_RATE, 20.0, REFERENCE_Q, 0.0);
        let mut analyzer = FilterAnalyzer::new(Box::new(placeholder), SAMPLE_RATE);
        analyzer.set_resolution(4096);

        let band = brute_force_band(&mut target, &mut analyzer, 0..BANDS);
        let expected = 10.0f64
            .powf(LOG10_20 + ((SAMPLE_RATE as f64 * 0.5).log10() - LOG10_20) * 100.0 / BANDS as f64);
        assert!((band.center_freq - expected).abs() < 1e-6);
    }
}
