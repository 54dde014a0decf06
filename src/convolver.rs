use crate::fft::{self, FftCache};
use crate::qmath::{self, Complex};

/// Overlap-save convolution of a stream with a fixed impulse response.
/// One instance is bound to exactly one continuous stream: the carried-over
/// tail in `future` belongs to the samples that came before.
pub struct FastConvolver {
    /// Frequency-domain impulse, zero-padded to twice the next power of two.
    filter: Vec<Complex>,
    /// Per-block scratch, same length as `filter`.
    present: Vec<Complex>,
    /// Overlap carry, `filter.len() + delay` real samples.
    future: Vec<f32>,
    cache: FftCache,
    delay: usize,
}

impl FastConvolver {
    pub fn new(impulse: &[f32], delay: usize) -> Self {
        assert!(!impulse.is_empty(), "the impulse response must not be empty");
        // Doubling leaves room for the tail of each block to fall off into.
        let filter_length = 2 << qmath::log2_ceil(impulse.len());
        let mut cache = FftCache::new(filter_length);
        let mut filter = vec![Complex::default(); filter_length];
        for (bin, sample) in filter.iter_mut().zip(impulse) {
            bin.re = *sample;
        }
        fft::fft(&mut filter, &mut cache);
        Self {
            present: vec![Complex::default(); filter_length],
            future: vec![0.0; filter_length + delay],
            filter,
            cache,
            delay,
        }
    }

    /// Convolve one channel of an interleaved buffer in place.
    pub fn process(&mut self, samples: &mut [f32], channel: usize, channels: usize) {
        let end = samples.len() / channels;
        let block = self.filter.len() >> 1;
        let mut start = 0;
        while start < end {
            self.process_timeslot(samples, channel, channels, start, end.min(start + block));
            start += block;
        }
    }

    fn process_timeslot(
        &mut self,
        samples: &mut [f32],
        channel: usize,
        channels: usize,
        from: usize,
        to: usize,
    ) {
        let source_length = to - from;
        for i in 0..source_length {
            self.present[i] = Complex::new(samples[(from + i) * channels + channel], 0.0);
        }
        self.present[source_length..].fill(Complex::default());

        self.process_cache(source_length + (self.filter.len() >> 1));

        for i in 0..source_length {
            samples[(from + i) * channels + channel] = self.future[i];
        }

        self.future.copy_within(source_length.., 0);
        let future_length = self.future.len();
        self.future[future_length - source_length..].fill(0.0);
    }

    /// Convolve the loaded block and add the result onto the delayed tail.
    fn process_cache(&mut self, max_result_length: usize) {
        fft::fft(&mut self.present, &mut self.cache);
        qmath::convolve(&mut self.present, &self.filter);
        fft::ifft(&mut self.present, &mut self.cache);

        for i in 0..max_result_length {
            self.future[self.delay + i] += self.present[i].re;
        }
    }
}
