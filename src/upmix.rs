use crate::channel::Vector3;
use crate::render::Layout;

/// Look-ahead peak limiter. Attacks immediately when a block would clip and
/// releases at one gain unit per second of audio.
pub struct Normalizer {
    gain: f32,
    sample_rate: u32,
    channel_count: usize,
}

impl Normalizer {
    pub fn new(sample_rate: u32, channel_count: usize) -> Self {
        Self {
            gain: 1.0,
            sample_rate,
            channel_count,
        }
    }

    /// Current attenuation, 1 when no compression is active.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Attenuate one interleaved block in place.
    pub fn process(&mut self, target: &mut [f32]) {
        let mut max_sample = 1.0f32;
        for sample in target.iter() {
            let abs_sample = sample.abs();
            if max_sample < abs_sample {
                max_sample = abs_sample;
            }
        }
        if max_sample * self.gain > 1.0 {
            self.gain = 0.9 / max_sample;
        }
        for sample in target.iter_mut() {
            *sample *= self.gain;
        }
        self.gain += target.len() as f32 / (self.channel_count as f32 * self.sample_rate as f32);
        if self.gain > 1.0 {
            self.gain = 1.0;
        }
    }
}

// Envelope slots past the source channels: two for the matrix upmixer, and
// one more low-pass slot for LFE separation.
const MATRIX_SLOTS: usize = 2;

/// Height-aware upmixer. Tracks the high-frequency envelope of every source
/// channel to estimate how far above the floor it should play, then renders
/// each channel into the target layout.
pub struct Cavernize {
    center_stays: bool,
    effect_scale: f32,
    smoothness: f32,
    lfe_volume: f32,
    sample_rate: u32,
    channel_count: usize,

    last_normals: Vec<f32>,
    last_highs: Vec<f32>,
    last_lows: Vec<f32>,
    heights: Vec<f32>,
    normalizer: Normalizer,
}

impl Cavernize {
    /// `effect` and `smoothness` are the user-facing fractions (1 = 100%).
    pub fn new(
        effect: f32,
        smoothness: f32,
        lfe_volume: f32,
        center_stays: bool,
        sample_rate: u32,
        channel_count: usize,
        target_channels: usize,
    ) -> Self {
        let cache_size = channel_count + MATRIX_SLOTS;
        Self {
            center_stays,
            effect_scale: effect * 15.0,
            smoothness,
            lfe_volume,
            sample_rate,
            channel_count,
            last_normals: vec![0.0; cache_size],
            last_highs: vec![0.0; cache_size],
            last_lows: vec![0.0; cache_size + 1],
            heights: vec![0.0; cache_size],
            normalizer: Normalizer::new(sample_rate, target_channels),
        }
    }

    /// Smoothed height estimates, one per source channel, then the matrix
    /// center and surround slots.
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Update one channel's height estimate from a block. The high-passed
    /// envelope rises on transients, its low-passed copy measures the
    /// sustained level; height is how far the transient level exceeds it.
    fn channel_height_check(
        &mut self,
        source: &[f32],
        frames: usize,
        channels: usize,
        channel: usize,
        slot: usize,
        smooth_factor: f32,
    ) {
        let mut depth = 0.0001f32;
        let mut height = 0.0001f32;
        let mut sample = channel;
        let end = frames * channels;
        while sample < end {
            let value = source[sample];
            self.last_highs[slot] = 0.9 * (self.last_highs[slot] + value - self.last_normals[slot]);
            height = height.max(self.last_highs[slot].abs());
            self.last_lows[slot] = self.last_lows[slot] * 0.99 + self.last_highs[slot] * 0.01;
            depth = depth.max(self.last_lows[slot].abs());
            self.last_normals[slot] = value;
            sample += channels;
        }
        let height = (-(depth * 1.2 - height) * self.effect_scale).clamp(0.0, 1.0);
        self.heights[slot] =
            ((height - self.heights[slot]) * smooth_factor + self.heights[slot]).clamp(0.0, 1.0);
    }

    /// Upmix one block of `frames` interleaved source frames into `target`,
    /// interleaved over the target layout, and normalize the result.
    #[allow(clippy::too_many_arguments)]
    pub fn upconvert(
        &mut self,
        source: &[f32],
        source_layout: &Layout,
        target_layout: &Layout,
        target: &mut [f32],
        frames: usize,
        lfe_separation: bool,
        matrix_upmix: bool,
    ) {
        let channels = self.channel_count;
        let smooth_factor = 1.0
            - ((self.sample_rate as f32 - frames as f32) * self.smoothness.powf(0.1)
                + frames as f32)
                / self.sample_rate as f32
                * 0.999;

        for c in 0..channels {
            let speaker = &source_layout.channels()[c];
            if speaker.x() != 0.0 || speaker.y() != 0.0 || !self.center_stays {
                self.channel_height_check(source, frames, channels, c, c, smooth_factor);
            }
        }

        let target_length = target_layout.len() * frames;
        target[..target_length].fill(0.0);

        for c in 0..channels {
            let speaker = &source_layout.channels()[c];
            if !speaker.lfe {
                let position = Vector3::new(
                    speaker.cubical_pos().x,
                    self.heights[c],
                    speaker.cubical_pos().z,
                );
                target_layout.render(source, c, channels, position, target);
            } else {
                target_layout.render_lfe(source, self.lfe_volume, c, channels, target);
            }
        }

        if !lfe_separation {
            // Every channel feeds the subwoofers through a one-pole low pass.
            let mut mono_mix = vec![0.0f32; frames];
            for channel in 0..channels {
                let mut sample = channel;
                for mono in mono_mix.iter_mut() {
                    *mono += source[sample];
                    sample += channels;
                }
            }
            let slot = channels + MATRIX_SLOTS;
            for mono in mono_mix.iter_mut() {
                self.last_lows[slot] = 0.9995 * self.last_lows[slot] + 0.0005 * *mono;
                *mono = self.last_lows[slot] * 6.0;
            }
            target_layout.render_lfe(&mono_mix, self.lfe_volume, 0, 1, target);
        }

        if matrix_upmix {
            if channels == 2 || channels == 4 {
                // Derive a phantom center from the front pair.
                let mut center_mix = vec![0.0f32; frames];
                for (frame, center) in center_mix.iter_mut().enumerate() {
                    let left = channels * frame;
                    *center = (source[left] + source[left + 1]) * 0.5;
                }
                if !self.center_stays {
                    self.channel_height_check(&center_mix, frames, 1, 0, channels, smooth_factor);
                }
                target_layout.render(
                    &center_mix,
                    0,
                    1,
                    Vector3::new(0.0, self.heights[channels], 1.0),
                    target,
                );
            }
            if channels == 2 || channels == 3 {
                // The out-of-phase component becomes a rear surround pair.
                let mut surround_mix = vec![0.0f32; frames];
                for (frame, surround) in surround_mix.iter_mut().enumerate() {
                    let left = channels * frame;
                    *surround = (source[left] - source[left + 1]) * 0.5;
                }
                self.channel_height_check(&surround_mix, frames, 1, 0, channels + 1, smooth_factor);
                let height = self.heights[channels + 1];
                target_layout.render(
                    &surround_mix,
                    0,
                    1,
                    Vector3::new(-1.0, height, -0.5),
                    target,
                );
                for surround in surround_mix.iter_mut() {
                    *surround = -*surround;
                }
                target_layout.render(
                    &surround_mix,
                    0,
                    1,
                    Vector3::new(1.0, height, -0.5),
                    target,
                );
            }
        }

        self.normalizer.process(&mut target[..target_length]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{default_channel_set, SpatialTarget};

    const BLOCK: usize = 240;
    const RATE: u32 = 48000;

    fn layout_512() -> Layout {
        Layout::new(SpatialTarget::Surround5_1_2.channels().unwrap())
    }

    #[test]
    fn normalizer_caps_peaks_and_recovers() {
        let mut normalizer = Normalizer::new(100, 2);
        let mut block = vec![0.0f32; 20];
        block[7] = 2.0;
        normalizer.process(&mut block);
        let peak = block.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak <= 0.9 + 1e-6);
        assert!(normalizer.gain() < 1.0);

        // Two seconds of silence bring the gain all the way back.
        let mut silence = vec![0.0f32; 2 * 2 * 100];
        normalizer.process(&mut silence);
        assert_eq!(normalizer.gain(), 1.0);
    }

    #[test]
    fn quiet_blocks_pass_unscaled() {
        let mut normalizer = Normalizer::new(48000, 2);
        let mut block = vec![0.5f32; 96];
        normalizer.process(&mut block);
        assert_eq!(normalizer.gain(), 1.0);
        assert!(block.iter().all(|s| (*s - 0.5).abs() < 1e-7));
    }

    #[test]
    fn center_ping_stays_in_the_center_speaker() {
        let source_layout = Layout::new(default_channel_set(5));
        let target_layout = layout_512();
        let mut upmixer = Cavernize::new(0.75, 0.8, 1.0, true, RATE, 5, target_layout.len());

        let mut source = vec![0.0f32; 5 * BLOCK];
        for frame in 0..BLOCK {
            source[frame * 5 + 2] =
                0.5 * (2.0 * std::f32::consts::PI * 1000.0 * frame as f32 / RATE as f32).sin();
        }
        let mut target = vec![0.0f32; target_layout.len() * BLOCK];
        upmixer.upconvert(
            &source,
            &source_layout,
            &target_layout,
            &mut target,
            BLOCK,
            true,
            false,
        );

        let mut per_speaker = vec![0.0f32; target_layout.len()];
        for (index, sample) in target.iter().enumerate() {
            let speaker = index % target_layout.len();
            per_speaker[speaker] = per_speaker[speaker].max(sample.abs());
        }
        assert!(per_speaker[2] > 0.5, "center got {}", per_speaker[2]);
        for (speaker, level) in per_speaker.iter().enumerate() {
            if speaker != 2 {
                assert!(*level < 1e-6, "speaker {} leaked {}", speaker, level);
            }
        }
    }

    #[test]
    fn source_lfe_routes_to_target_lfe() {
        let source_layout = Layout::new(default_channel_set(6));
        let target_layout = layout_512();
        let mut upmixer = Cavernize::new(0.75, 0.8, 1.0, true, RATE, 6, target_layout.len());

        let mut source = vec![0.0f32; 6 * BLOCK];
        for frame in 0..BLOCK {
            source[frame * 6 + 3] = 0.25;
        }
        let mut target = vec![0.0f32; target_layout.len() * BLOCK];
        upmixer.upconvert(
            &source,
            &source_layout,
            &target_layout,
            &mut target,
            BLOCK,
            true,
            false,
        );
        assert!(target[3].abs() > 0.2);
        assert!(target[0].abs() < 1e-6);
    }

    #[test]
    fn matrix_upmix_fills_center_and_surround() {
        let source_layout = Layout::new(default_channel_set(2));
        let target_layout = layout_512();
        let mut upmixer = Cavernize::new(0.75, 0.8, 1.0, true, RATE, 2, target_layout.len());

        // In-phase content: center fires, surround difference is silent.
        let mut source = vec![0.0f32; 2 * BLOCK];
        for frame in 0..BLOCK {
            let value =
                0.25 * (2.0 * std::f32::consts::PI * 500.0 * frame as f32 / RATE as f32).sin();
            source[frame * 2] = value;
            source[frame * 2 + 1] = value;
        }
        let mut target = vec![0.0f32; target_layout.len() * BLOCK];
        upmixer.upconvert(
            &source,
            &source_layout,
            &target_layout,
            &mut target,
            BLOCK,
            true,
            true,
        );

        let level = |speaker: usize| {
            target
                .iter()
                .skip(speaker)
                .step_by(target_layout.len())
                .fold(0.0f32, |a, s| a.max(s.abs()))
        };
        assert!(level(2) > 0.1, "center silent");
        assert!(level(4) < 1e-6, "surround leaked in-phase content");
        assert!(level(5) < 1e-6);
    }

    #[test]
    fn out_of_phase_content_reaches_the_surrounds() {
        let source_layout = Layout::new(default_channel_set(2));
        let target_layout = layout_512();
        let mut upmixer = Cavernize::new(0.75, 0.8, 1.0, true, RATE, 2, target_layout.len());

        let mut source = vec![0.0f32; 2 * BLOCK];
        for frame in 0..BLOCK {
            let value =
                0.25 * (2.0 * std::f32::consts::PI * 500.0 * frame as f32 / RATE as f32).sin();
            source[frame * 2] = value;
            source[frame * 2 + 1] = -value;
        }
        let mut target = vec![0.0f32; target_layout.len() * BLOCK];
        upmixer.upconvert(
            &source,
            &source_layout,
            &target_layout,
            &mut target,
            BLOCK,
            true,
            true,
        );

        let level = |speaker: usize| {
            target
                .iter()
                .skip(speaker)
                .step_by(target_layout.len())
                .fold(0.0f32, |a, s| a.max(s.abs()))
        };
        assert!(level(4) > 0.05, "surrounds silent");
        assert!(level(5) > 0.05);
    }

    #[test]
    fn transients_raise_the_height_estimate() {
        let source_layout = Layout::new(default_channel_set(2));
        let target_layout = layout_512();
        let mut upmixer = Cavernize::new(0.75, 0.8, 1.0, true, RATE, 2, target_layout.len());
        let mut target = vec![0.0f32; target_layout.len() * BLOCK];

        // A quiet steady sine keeps the estimate near the floor.
        let mut sine = vec![0.0f32; 2 * BLOCK];
        for frame in 0..BLOCK {
            sine[frame * 2] =
                0.01 * (2.0 * std::f32::consts::PI * 1000.0 * frame as f32 / RATE as f32).sin();
        }
        for _ in 0..20 {
            upmixer.upconvert(
                &sine,
                &source_layout,
                &target_layout,
                &mut target,
                BLOCK,
                true,
                false,
            );
        }
        let settled = upmixer.heights()[0];

        // A click drives it up.
        let mut click = vec![0.0f32; 2 * BLOCK];
        click[0] = 1.0;
        upmixer.upconvert(
            &click,
            &source_layout,
            &target_layout,
            &mut target,
            BLOCK,
            true,
            false,
        );
        let excited = upmixer.heights()[0];
        assert!(
            excited > settled,
            "height did not rise: {} vs {}",
            excited,
            settled
        );

        // And silence lets it glide back down.
        let silence = vec![0.0f32; 2 * BLOCK];
        for _ in 0..100 {
            upmixer.upconvert(
                &silence,
                &source_layout,
                &target_layout,
                &mut target,
                BLOCK,
                true,
                false,
            );
        }
        assert!(upmixer.heights()[0] < excited);
    }
}
