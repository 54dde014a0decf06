/*
 Copyright (c) 2025 cavernize contributors

 This file is part of cavernize

 cavernize is free software: you can redistribute it and/or modify it
 under the terms of the GNU General Public License as published by the
 Free Software Foundation, either version 3 of the License, or
 (at your option) any later version.

 cavernize is distributed in the hope that it will be useful, but
 WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 GNU General Public License for more details.
 You should have received a copy of the GNU General Public License
 along with cavernize. If not, see <https://www.gnu.org/licenses/>.
*/

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::channel::AudioChannel;
use crate::format::{
    read_exact_buf, read_f32le, read_i32le, read_i64le, read_u8, write_f32le, write_i32le,
    write_i64le, AudioFormat, Quality, StreamInfo,
};

fn quality_to_header(quality: Quality) -> u8 {
    match quality {
        Quality::Int8 => 0,
        Quality::Int16 => 1,
        Quality::Float32 => 2,
    }
}

fn header_to_quality(header: u8) -> Result<Quality, Box<dyn Error>> {
    match header {
        0 => Ok(Quality::Int8),
        1 => Ok(Quality::Int16),
        2 => Ok(Quality::Float32),
        other => Err(format!("Unknown Limitless quality marker: {}", other).into()),
    }
}

/// Limitless Audio Format: position-tagged channels, one-second blocks, and
/// silent channels dropped per block behind a small layout bitmap.
pub struct Limitless {
    info: StreamInfo,
    reader: Option<BufReader<File>>,
    writer: Option<BufWriter<File>>,

    // Reader position within the running one-second block.
    written_channels: Vec<bool>,
    channels_to_read: usize,
    samples_this_second: u64,

    // Writer cache of one second of interleaved content.
    cache: Vec<f32>,
    cache_position: usize,
    samples_cached: u64,
}

impl Limitless {
    pub fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            info: StreamInfo::default(),
            reader: Some(BufReader::new(File::open(path)?)),
            writer: None,
            written_channels: Vec::new(),
            channels_to_read: 0,
            samples_this_second: 0,
            cache: Vec::new(),
            cache_position: 0,
            samples_cached: 0,
        })
    }

    pub fn create(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            info: StreamInfo::default(),
            reader: None,
            writer: Some(BufWriter::new(File::create(path)?)),
            written_channels: Vec::new(),
            channels_to_read: 0,
            samples_this_second: 0,
            cache: Vec::new(),
            cache_position: 0,
            samples_cached: 0,
        })
    }

    fn layout_byte_count(channels: usize) -> usize {
        channels.div_ceil(8)
    }

    /// Fetch the layout bitmap that opens every one-second block.
    fn get_layout(&mut self) -> Result<(), Box<dyn Error>> {
        let channels = self.info.channels.len();
        let reader = self.reader.as_mut().ok_or("not opened for reading")?;
        let layout_bytes = read_exact_buf(reader, Self::layout_byte_count(channels))?;
        self.written_channels.clear();
        self.channels_to_read = 0;
        for channel in 0..channels {
            let written = (layout_bytes[channel / 8] >> (channel % 8)) & 1 != 0;
            self.written_channels.push(written);
            if written {
                self.channels_to_read += 1;
            }
        }
        self.samples_this_second = self.info.sample_rate as u64 * channels as u64;
        Ok(())
    }

    /// Flush the cached second (or its written head) to the file.
    fn dump_block(&mut self, until: usize) -> Result<(), Box<dyn Error>> {
        let channels = self.info.channels.len();
        let mut to_write = vec![false; channels];
        for channel in 0..channels {
            let mut sample = channel;
            while sample < until {
                if self.cache[sample] != 0.0 {
                    to_write[channel] = true;
                    break;
                }
                sample += channels;
            }
        }

        let mut layout_bytes = vec![0u8; Self::layout_byte_count(channels)];
        for (channel, written) in to_write.iter().enumerate() {
            if *written {
                layout_bytes[channel / 8] |= 1 << (channel % 8);
            }
        }
        let writer = self.writer.as_mut().ok_or("not opened for writing")?;
        writer.write_all(&layout_bytes)?;

        match self.info.quality {
            Quality::Int8 => {
                for (i, sample) in self.cache[..until].iter().enumerate() {
                    if to_write[i % channels] {
                        writer.write_all(&[((sample + 1.0) * 127.0) as u8])?;
                    }
                }
            }
            Quality::Int16 => {
                for (i, sample) in self.cache[..until].iter().enumerate() {
                    if to_write[i % channels] {
                        writer.write_all(&((sample * 32767.0) as i16).to_le_bytes())?;
                    }
                }
            }
            Quality::Float32 => {
                for (i, sample) in self.cache[..until].iter().enumerate() {
                    if to_write[i % channels] {
                        write_f32le(writer, *sample)?;
                    }
                }
            }
        }
        self.cache_position = 0;
        Ok(())
    }
}

impl AudioFormat for Limitless {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StreamInfo {
        &mut self.info
    }

    fn read_header(&mut self) -> Result<(), Box<dyn Error>> {
        let reader = self.reader.as_mut().ok_or("not opened for reading")?;
        let marker = read_exact_buf(reader, 9)?;
        if &marker != b"LIMITLESS" {
            return Err("Not a Limitless Audio Format file".into());
        }
        let head = read_exact_buf(reader, 4)?;
        if &head != b"HEAD" {
            return Err("Limitless header marker not found".into());
        }
        self.info.quality = header_to_quality(read_u8(reader)?)?;
        let _channel_mode = read_u8(reader)?;
        let channel_count = read_i32le(reader)?;
        if channel_count <= 0 {
            return Err("Invalid Limitless channel count".into());
        }
        let reader = self.reader.as_mut().unwrap();
        let mut channels = Vec::with_capacity(channel_count as usize);
        for _ in 0..channel_count {
            let x = read_f32le(reader)?;
            let y = read_f32le(reader)?;
            let lfe = read_u8(reader)? != 0;
            channels.push(AudioChannel::new(x, y, lfe));
        }
        self.info.sample_rate = read_i32le(reader)? as u32;
        let total_samples = read_i64le(reader)?;
        self.info.channels = channels;
        self.info.total_frames = total_samples as u64 / channel_count as u64;
        self.samples_this_second = 0;
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), Box<dyn Error>> {
        let channels = self.info.channels.len();
        self.cache = vec![0.0; channels * self.info.sample_rate as usize];
        self.cache_position = 0;
        self.samples_cached = 0;

        let quality = quality_to_header(self.info.quality);
        let sample_rate = self.info.sample_rate as i32;
        let total_samples = self.info.total_frames as i64 * channels as i64;
        let speakers: Vec<(f32, f32, bool)> = self
            .info
            .channels
            .iter()
            .map(|c| (c.x(), c.y(), c.lfe))
            .collect();

        let writer = self.writer.as_mut().ok_or("not opened for writing")?;
        writer.write_all(b"LIMITLESS")?;
        writer.write_all(b"HEAD")?;
        writer.write_all(&[quality, 0])?; // quality, reserved channel mode
        write_i32le(writer, channels as i32)?;
        for (x, y, lfe) in speakers {
            write_f32le(writer, x)?;
            write_f32le(writer, y)?;
            writer.write_all(&[lfe as u8])?;
        }
        write_i32le(writer, sample_rate)?;
        write_i64le(writer, total_samples)?;
        Ok(())
    }

    fn read(&mut self, samples: &mut [f32]) -> Result<(), Box<dyn Error>> {
        let channels = self.info.channels.len();
        let mut out_pos = 0;
        let mut sample_count = samples.len() as u64;
        while sample_count > 0 {
            if self.samples_this_second == 0 {
                self.get_layout()?;
            }
            let samples_to_read = self.samples_this_second.min(sample_count);
            let to_read_per_channel = samples_to_read as usize / channels;
            let samples_needed = to_read_per_channel * self.channels_to_read;
            let quality = self.info.quality;
            let reader = self.reader.as_mut().ok_or("not opened for reading")?;
            let bytes = read_exact_buf(reader, samples_needed * quality.bytes_per_sample())?;
            let mut input_pos = 0;
            for _ in 0..to_read_per_channel {
                for channel in 0..channels {
                    samples[out_pos] = if self.written_channels[channel] {
                        let value = match quality {
                            Quality::Int8 => bytes[input_pos] as f32 / 127.0 - 1.0,
                            Quality::Int16 => i16::from_le_bytes([
                                bytes[2 * input_pos],
                                bytes[2 * input_pos + 1],
                            ]) as f32
                                / 32767.0,
                            Quality::Float32 => f32::from_le_bytes([
                                bytes[4 * input_pos],
                                bytes[4 * input_pos + 1],
                                bytes[4 * input_pos + 2],
                                bytes[4 * input_pos + 3],
                            ]),
                        };
                        input_pos += 1;
                        value
                    } else {
                        0.0
                    };
                    out_pos += 1;
                }
            }
            self.samples_this_second -= samples_to_read;
            sample_count -= samples_to_read;
        }
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn Error>> {
        let mut from = 0;
        while from < samples.len() {
            while from < samples.len() && self.cache_position < self.cache.len() {
                self.cache[self.cache_position] = samples[from];
                self.cache_position += 1;
                from += 1;
            }
            if self.cache_position == self.cache.len() {
                self.dump_block(self.cache.len())?;
            }
        }
        self.samples_cached += samples.len() as u64;
        if self.samples_cached == self.info.total_frames * self.info.channels.len() as u64
            && self.cache_position > 0
        {
            self.dump_block(self.cache_position)?;
        }
        Ok(())
    }
}

impl Drop for Limitless {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::default_channel_set;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("cavernize-test-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn float_content_survives_bit_exact() {
        let path = temp_path("roundtrip.laf");
        let channels = 3;
        let rate = 100u32;
        let frames = 250usize; // crosses a block boundary into a partial one

        // Channel 1 stays silent to exercise the per-block channel drop.
        let mut source = vec![0.0f32; frames * channels];
        for frame in 0..frames {
            source[frame * channels] = (frame as f32 * 0.013).sin();
            source[frame * channels + 2] = 1.0 - frame as f32 * 0.003;
        }

        let mut writer = Limitless::create(&path).unwrap();
        writer.info_mut().quality = Quality::Float32;
        writer.info_mut().sample_rate = rate;
        writer.info_mut().channels = default_channel_set(channels);
        writer.info_mut().total_frames = frames as u64;
        writer.write_header().unwrap();
        // Feed in uneven chunks to cross the cache boundary mid-write.
        writer.write(&source[..90]).unwrap();
        writer.write(&source[90..390]).unwrap();
        writer.write(&source[390..]).unwrap();
        drop(writer);

        let mut reader = Limitless::open(&path).unwrap();
        reader.read_header().unwrap();
        assert_eq!(reader.info().quality, Quality::Float32);
        assert_eq!(reader.info().sample_rate, rate);
        assert_eq!(reader.info().channels.len(), channels);
        assert_eq!(reader.info().total_frames, frames as u64);

        let mut loaded = vec![0.0f32; frames * channels];
        reader.read(&mut loaded).unwrap();
        assert_eq!(source, loaded);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn silent_seconds_take_no_content_space() {
        let path = temp_path("silent.laf");
        let rate = 50u32;
        let frames = 100usize;

        let mut writer = Limitless::create(&path).unwrap();
        writer.info_mut().quality = Quality::Float32;
        writer.info_mut().sample_rate = rate;
        writer.info_mut().channels = default_channel_set(2);
        writer.info_mut().total_frames = frames as u64;
        writer.write_header().unwrap();
        writer.write(&vec![0.0f32; frames * 2]).unwrap();
        drop(writer);

        let header = 9 + 4 + 2 + 4 + 2 * 9 + 4 + 8;
        let expected = header + 2; // two seconds, one layout byte each
        assert_eq!(std::fs::metadata(&path).unwrap().len(), expected as u64);

        let mut reader = Limitless::open(&path).unwrap();
        reader.read_header().unwrap();
        let mut loaded = vec![1.0f32; frames * 2];
        reader.read(&mut loaded).unwrap();
        assert!(loaded.iter().all(|s| *s == 0.0));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn channel_positions_survive_the_header() {
        let path = temp_path("positions.laf");
        let mut writer = Limitless::create(&path).unwrap();
        writer.info_mut().quality = Quality::Int16;
        writer.info_mut().sample_rate = 48000;
        writer.info_mut().channels = vec![
            AudioChannel::new(0.0, -30.0, false),
            AudioChannel::new(-45.0, 70.0, false),
            AudioChannel::new(0.0, 0.0, true),
        ];
        writer.info_mut().total_frames = 0;
        writer.write_header().unwrap();
        drop(writer);

        let mut reader = Limitless::open(&path).unwrap();
        reader.read_header().unwrap();
        let channels = reader.info().channels.clone();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].y(), -30.0);
        assert_eq!(channels[1].x(), -45.0);
        assert!(channels[2].lfe);
        assert!(!channels[0].lfe);
        std::fs::remove_file(&path).unwrap();
    }
}
