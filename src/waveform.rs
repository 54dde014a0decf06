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
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::channel::default_channel_set;
use crate::format::{
    read_exact_buf, read_u16le, read_u32le, write_u16le, write_u32le, AudioFormat, Quality,
    StreamInfo,
};

/// RIFF/WAVE reader and writer. Channel-based only; positions come from the
/// standard ordering for the channel count since the chunk carries none.
pub struct Waveform {
    info: StreamInfo,
    reader: Option<BufReader<File>>,
    writer: Option<BufWriter<File>>,
}

impl Waveform {
    pub fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            info: StreamInfo::default(),
            reader: Some(BufReader::new(File::open(path)?)),
            writer: None,
        })
    }

    pub fn create(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            info: StreamInfo::default(),
            reader: None,
            writer: Some(BufWriter::new(File::create(path)?)),
        })
    }
}

impl AudioFormat for Waveform {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StreamInfo {
        &mut self.info
    }

    fn read_header(&mut self) -> Result<(), Box<dyn Error>> {
        let reader = self.reader.as_mut().ok_or("not opened for reading")?;

        let mut marker = [0u8; 4];
        reader.read_exact(&mut marker)?;
        if &marker != b"RIFF" {
            return Err("Not a RIFF file".into());
        }
        let _file_length = read_u32le(reader)?;
        reader.read_exact(&mut marker)?;
        if &marker != b"WAVE" {
            return Err("Not a WAVE file".into());
        }
        reader.read_exact(&mut marker)?;
        if &marker != b"fmt " {
            return Err("WAVE format chunk not found".into());
        }
        let _fmt_size = read_u32le(reader)?;
        let format_flags = read_u16le(reader)?;
        let channel_count = read_u16le(reader)?;
        let sample_rate = read_u32le(reader)?;
        let _bytes_per_second = read_u32le(reader)?;
        let _block_align = read_u16le(reader)?;
        let bit_depth = read_u16le(reader)?;

        // Slide a 4-byte window over whatever chunks sit between the format
        // description and the content.
        reader.read_exact(&mut marker)?;
        while &marker != b"data" {
            marker.copy_within(1.., 0);
            let mut next = [0u8; 1];
            reader.read_exact(&mut next)?;
            marker[3] = next[0];
        }
        let data_length = read_u32le(reader)?;

        self.info.quality = match (format_flags, bit_depth) {
            (3, 32) => Quality::Float32,
            (1, 8) => Quality::Int8,
            (1, 16) => Quality::Int16,
            (flags, bits) => {
                return Err(format!(
                    "Unsupported WAVE sample format (tag {}, {} bits)",
                    flags, bits
                )
                .into())
            }
        };
        self.info.sample_rate = sample_rate;
        self.info.channels = default_channel_set(channel_count as usize);
        self.info.total_frames =
            data_length as u64 / ((bit_depth as u64 / 8) * channel_count as u64);
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), Box<dyn Error>> {
        let info = &self.info;
        let writer = self.writer.as_mut().ok_or("not opened for writing")?;
        let channels = info.channels.len() as u16;
        let bits = info.quality.bits();
        let block_align = channels * (bits / 8);
        let data_length = info.total_frames as u32 * block_align as u32;

        writer.write_all(b"RIFF")?;
        write_u32le(writer, 36 + data_length)?;
        writer.write_all(b"WAVE")?;

        writer.write_all(b"fmt ")?;
        write_u32le(writer, 16)?;
        let format_tag = if info.quality == Quality::Float32 { 3 } else { 1 };
        write_u16le(writer, format_tag)?;
        write_u16le(writer, channels)?;
        write_u32le(writer, info.sample_rate)?;
        write_u32le(writer, info.sample_rate * block_align as u32)?;
        write_u16le(writer, block_align)?;
        write_u16le(writer, bits)?;

        writer.write_all(b"data")?;
        write_u32le(writer, data_length)?;
        Ok(())
    }

    fn read(&mut self, samples: &mut [f32]) -> Result<(), Box<dyn Error>> {
        let quality = self.info.quality;
        let reader = self.reader.as_mut().ok_or("not opened for reading")?;
        match quality {
            Quality::Int8 => {
                let bytes = read_exact_buf(reader, samples.len())?;
                for (sample, byte) in samples.iter_mut().zip(bytes) {
                    *sample = byte as f32 / 127.0 - 1.0;
                }
            }
            Quality::Int16 => {
                let bytes = read_exact_buf(reader, samples.len() * 2)?;
                for (sample, pair) in samples.iter_mut().zip(bytes.chunks_exact(2)) {
                    *sample = i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32767.0;
                }
            }
            Quality::Float32 => {
                let bytes = read_exact_buf(reader, samples.len() * 4)?;
                for (sample, quad) in samples.iter_mut().zip(bytes.chunks_exact(4)) {
                    *sample = f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]);
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn Error>> {
        let quality = self.info.quality;
        let writer = self.writer.as_mut().ok_or("not opened for writing")?;
        match quality {
            Quality::Int8 => {
                let bytes: Vec<u8> = samples.iter().map(|s| ((s + 1.0) * 127.0) as u8).collect();
                writer.write_all(&bytes)?;
            }
            Quality::Int16 => {
                let mut bytes = Vec::with_capacity(samples.len() * 2);
                for sample in samples {
                    bytes.extend_from_slice(&((sample * 32767.0) as i16).to_le_bytes());
                }
                writer.write_all(&bytes)?;
            }
            Quality::Float32 => {
                let mut bytes = Vec::with_capacity(samples.len() * 4);
                for sample in samples {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                writer.write_all(&bytes)?;
            }
        }
        Ok(())
    }
}

impl Drop for Waveform {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}
