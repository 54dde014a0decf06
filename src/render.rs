use std::f32::consts::FRAC_PI_2;

use crate::channel::{AudioChannel, Vector3};

/// Immutable target speaker arrangement of one rendering session. Built at
/// setup, addressed by index while rendering; changing speakers between
/// renders means building a new layout.
pub struct Layout {
    channels: Vec<AudioChannel>,
}

impl Layout {
    pub fn new(channels: Vec<AudioChannel>) -> Self {
        assert!(
            channels.iter().any(|c| !c.lfe),
            "a layout needs at least one full-range speaker"
        );
        Self { channels }
    }

    #[inline]
    pub fn channels(&self) -> &[AudioChannel] {
        &self.channels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[inline]
    fn pos(&self, channel: i32) -> Vector3 {
        self.channels[channel as usize].cubical_pos()
    }

    fn width_ratio(&self, left: i32, right: i32, pos: f32) -> f32 {
        if left == right {
            return 0.5;
        }
        let left_x = self.pos(left).x;
        (pos - left_x) / (self.pos(right).x - left_x)
    }

    fn length_ratio(&self, rear: i32, front: i32, pos: f32) -> f32 {
        if rear == front {
            return 0.5;
        }
        let rear_z = self.pos(rear).z;
        (pos - rear_z) / (self.pos(front).z - rear_z)
    }

    /// Place a channel on the left/right side of a row; an exact width match
    /// takes both sides.
    fn assign_lr(
        &self,
        channel: i32,
        left: &mut i32,
        right: &mut i32,
        position: Vector3,
        channel_pos: Vector3,
    ) {
        if channel_pos.x == position.x {
            *left = channel;
            *right = channel;
        } else if channel_pos.x < position.x {
            if *left == -1 || self.pos(*left).x < channel_pos.x {
                *left = channel;
            }
        } else if *right == -1 || self.pos(*right).x > channel_pos.x {
            *right = channel;
        }
    }

    /// Sort a channel of one horizontal layer into its front or rear row,
    /// restarting a row when a closer depth shows up.
    #[allow(clippy::too_many_arguments)]
    fn assign_horizontal_layer(
        &self,
        channel: i32,
        fl: &mut i32,
        fr: &mut i32,
        rl: &mut i32,
        rr: &mut i32,
        closest_front: &mut f32,
        closest_rear: &mut f32,
        position: Vector3,
        channel_pos: Vector3,
    ) {
        if channel_pos.z > position.z {
            if channel_pos.z < *closest_front {
                *closest_front = channel_pos.z;
                *fl = -1;
                *fr = -1;
            }
            if channel_pos.z == *closest_front {
                self.assign_lr(channel, fl, fr, position, channel_pos);
            }
        } else {
            if channel_pos.z > *closest_rear {
                *closest_rear = channel_pos.z;
                *rl = -1;
                *rr = -1;
            }
            if channel_pos.z == *closest_rear {
                self.assign_lr(channel, rl, rr, position, channel_pos);
            }
        }
    }

    /// Fill missing corners of a layer from the opposite side or row.
    fn fix_incomplete_layer(fl: &mut i32, fr: &mut i32, rl: &mut i32, rr: &mut i32) {
        if *fl == -1 || *fr == -1 || *rl == -1 || *rr == -1 {
            if *fl != -1 || *fr != -1 {
                if *fl == -1 {
                    *fl = *fr;
                }
                if *fr == -1 {
                    *fr = *fl;
                }
                if *rl == -1 && *rr == -1 {
                    *rl = *fl;
                    *rr = *fr;
                }
            }
            if *rl != -1 || *rr != -1 {
                if *rl == -1 {
                    *rl = *rr;
                }
                if *rr == -1 {
                    *rr = *rl;
                }
                if *fl == -1 && *fr == -1 {
                    *fl = *rl;
                    *fr = *rr;
                }
            }
        }
    }

    /// Mix a strided source channel onto one target speaker with a
    /// constant-power pan gain.
    fn copy(
        &self,
        samples: &[f32],
        channel: usize,
        channels: usize,
        target: &mut [f32],
        speaker: i32,
        gain: f32,
    ) {
        let constant_power = (gain * FRAC_PI_2).sin();
        let targets = self.channels.len();
        let mut source = channel;
        let mut destination = speaker as usize;
        while source < samples.len() {
            target[destination] += samples[source] * constant_power;
            source += channels;
            destination += targets;
        }
    }

    /// Render a strided source channel at a position inside the room cube,
    /// mixing it onto the up to eight speakers that enclose the position.
    /// `target` is interleaved over this layout's speakers.
    pub fn render(
        &self,
        samples: &[f32],
        channel: usize,
        channels: usize,
        position: Vector3,
        target: &mut [f32],
    ) {
        // Speaker indices per direction: bottom/top, front/rear, left/right.
        let (mut bfl, mut bfr, mut brl, mut brr) = (-1i32, -1i32, -1i32, -1i32);
        let (mut tfl, mut tfr, mut trl, mut trr) = (-1i32, -1i32, -1i32, -1i32);
        let mut closest_top = 1.1f32;
        let mut closest_bottom = -1.1f32;
        let (mut closest_tf, mut closest_tr) = (1.1f32, -1.1f32);
        let (mut closest_bf, mut closest_br) = (1.1f32, -1.1f32);

        for speaker in &self.channels {
            if !speaker.lfe {
                let channel_y = speaker.cubical_pos().y;
                if channel_y < position.y {
                    if channel_y > closest_bottom {
                        closest_bottom = channel_y;
                    }
                } else if channel_y < closest_top {
                    closest_top = channel_y;
                }
            }
        }
        for (index, speaker) in self.channels.iter().enumerate() {
            if !speaker.lfe {
                let channel_pos = speaker.cubical_pos();
                if channel_pos.y == closest_bottom {
                    self.assign_horizontal_layer(
                        index as i32,
                        &mut bfl,
                        &mut bfr,
                        &mut brl,
                        &mut brr,
                        &mut closest_bf,
                        &mut closest_br,
                        position,
                        channel_pos,
                    );
                }
                if channel_pos.y == closest_top {
                    self.assign_horizontal_layer(
                        index as i32,
                        &mut tfl,
                        &mut tfr,
                        &mut trl,
                        &mut trr,
                        &mut closest_tf,
                        &mut closest_tr,
                        position,
                        channel_pos,
                    );
                }
            }
        }
        Self::fix_incomplete_layer(&mut tfl, &mut tfr, &mut trl, &mut trr);
        if bfl == -1 && bfr == -1 && brl == -1 && brr == -1 {
            bfl = tfl;
            bfr = tfr;
            brl = trl;
            brr = trr;
        } else {
            Self::fix_incomplete_layer(&mut bfl, &mut bfr, &mut brl, &mut brr);
        }
        if tfl == -1 || tfr == -1 || trl == -1 || trr == -1 {
            tfl = bfl;
            tfr = bfr;
            trl = brl;
            trr = brr;
        }

        // Spatial mix ratios between the layers and within each layer.
        let (top_vol, bottom_vol) = if tfl != bfl {
            let bottom_y = self.pos(bfl).y;
            let top = (position.y - bottom_y) / (self.pos(tfl).y - bottom_y);
            (top, 1.0 - top)
        } else {
            (0.5, 0.5)
        };
        let mut bf_vol = self.length_ratio(brl, bfl, position.z);
        let mut tf_vol = self.length_ratio(trl, tfl, position.z);
        let bfr_vol = self.width_ratio(bfl, bfr, position.x);
        let brr_vol = self.width_ratio(brl, brr, position.x);
        let tfr_vol = self.width_ratio(tfl, tfr, position.x);
        let trr_vol = self.width_ratio(trl, trr, position.x);
        let mut br_vol = 1.0 - bf_vol;
        let mut tr_vol = 1.0 - tf_vol;
        bf_vol *= bottom_vol;
        br_vol *= bottom_vol;
        tf_vol *= top_vol;
        tr_vol *= top_vol;

        self.copy(samples, channel, channels, target, bfl, bf_vol * (1.0 - bfr_vol));
        self.copy(samples, channel, channels, target, bfr, bf_vol * bfr_vol);
        self.copy(samples, channel, channels, target, brl, br_vol * (1.0 - brr_vol));
        self.copy(samples, channel, channels, target, brr, br_vol * brr_vol);
        self.copy(samples, channel, channels, target, tfl, tf_vol * (1.0 - tfr_vol));
        self.copy(samples, channel, channels, target, tfr, tf_vol * tfr_vol);
        self.copy(samples, channel, channels, target, trl, tr_vol * (1.0 - trr_vol));
        self.copy(samples, channel, channels, target, trr, tr_vol * trr_vol);
    }

    /// Mix a strided source channel onto every LFE speaker of the layout.
    pub fn render_lfe(
        &self,
        samples: &[f32],
        lfe_gain: f32,
        channel: usize,
        channels: usize,
        target: &mut [f32],
    ) {
        for index in 0..self.channels.len() {
            if self.channels[index].lfe {
                self.copy(samples, channel, channels, target, index as i32, lfe_gain);
            }
        }
    }
}
