/// Resample a linear-frequency magnitude response onto a logarithmic
/// frequency axis. `response` is the physical half of a spectrum, so its
/// length covers 0..sample_rate/2; hence the factor of two in the
/// bin positioner.
pub fn to_log_graph(
    response: &[f32],
    start_freq: f64,
    end_freq: f64,
    sample_rate: u32,
    result_size: usize,
) -> Vec<f32> {
    let mut graph = Vec::with_capacity(result_size);
    let step = 10.0f64.powf((end_freq.log10() - start_freq.log10()) / (result_size - 1) as f64);
    let positioner = response.len() as f64 * 2.0 / sample_rate as f64;
    let last = response.len() - 1;
    let mut frequency = start_freq;
    for _ in 0..result_size {
        // The end frequency maps exactly onto the bin past the Nyquist one;
        // keep rounding drift from walking off the response.
        graph.push(response[((frequency * positioner) as usize).min(last)]);
        frequency *= step;
    }
    graph
}

/// Convert a magnitude curve to decibels in place, clamped from below.
/// Zero magnitudes would be -inf and land on the floor instead.
pub fn to_decibels(curve: &mut [f32], floor_db: f32) {
    for value in curve {
        *value = (20.0 * value.log10()).max(floor_db);
    }
}

/// The floor used throughout the EQ search.
pub const DEFAULT_DB_FLOOR: f32 = -100.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_resampling_indices_never_decrease() {
        // A ramp makes the sampled source index directly observable.
        let response: Vec<f32> = (0..2048).map(|i| i as f32).collect();
        let graph = to_log_graph(&response, 20.0, 24000.0, 48000, 1024);
        for pair in graph.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(graph[0], (20.0f64 * 2048.0 * 2.0 / 48000.0) as usize as f32);
    }

    #[test]
    fn last_bin_stays_in_range() {
        let response = vec![1.0f32; 512];
        let graph = to_log_graph(&response, 20.0, 24000.0, 48000, 128);
        assert_eq!(graph.len(), 128);
    }

    #[test]
    fn decibel_conversion_clamps_zeros() {
        let mut curve = vec![1.0, 10.0, 0.0];
        to_decibels(&mut curve, DEFAULT_DB_FLOOR);
        assert_eq!(curve[0], 0.0);
        assert!((curve[1] - 20.0).abs() < 1e-5);
        assert_eq!(curve[2], DEFAULT_DB_FLOOR);
    }
}
