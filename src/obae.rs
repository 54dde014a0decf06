use std::error::Error;

use crate::channel::AudioChannel;
use crate::format::{AudioFormat, StreamInfo};

/// Object-based MXF carrier. The track map is wired up, including the
/// cinema channel order, but content decoding and encoding are not
/// implemented yet; every content call reports that.
pub struct Obae {
    info: StreamInfo,
}

impl Obae {
    pub fn new() -> Self {
        Self {
            info: StreamInfo::default(),
        }
    }
}

impl Default for Obae {
    fn default() -> Self {
        Self::new()
    }
}

/// First index of a non-LFE `(-azimuth, +azimuth)` speaker pair.
fn pair_position(channels: &[AudioChannel], azimuth: f32) -> Option<usize> {
    channels.windows(2).position(|pair| {
        !pair[0].lfe && !pair[1].lfe && pair[0].y() == -azimuth && pair[1].y() == azimuth
    })
}

impl AudioFormat for Obae {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StreamInfo {
        &mut self.info
    }

    fn read_header(&mut self) -> Result<(), Box<dyn Error>> {
        Err("Object-based MXF input is not supported yet".into())
    }

    fn write_header(&mut self) -> Result<(), Box<dyn Error>> {
        Err("Object-based MXF output is not supported yet".into())
    }

    fn read(&mut self, _samples: &mut [f32]) -> Result<(), Box<dyn Error>> {
        Err("Object-based MXF input is not supported yet".into())
    }

    fn write(&mut self, _samples: &[f32]) -> Result<(), Box<dyn Error>> {
        Err("Object-based MXF output is not supported yet".into())
    }

    /// Home track maps carry the rear surround pair before the sides;
    /// cinema deliveries want the sides first. Swap the two pairs when the
    /// layout holds them in home order. Already-cinema maps are left alone.
    fn force_dcp_order(&mut self) {
        let channels = &mut self.info.channels;
        if let (Some(rears), Some(sides)) =
            (pair_position(channels, 150.0), pair_position(channels, 110.0))
        {
            if rears < sides {
                channels.swap(rears, sides);
                channels.swap(rears + 1, sides + 1);
            }
        }
    }
}
