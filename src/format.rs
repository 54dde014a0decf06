use std::error::Error;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::channel::AudioChannel;
use crate::limitless::Limitless;
use crate::obae::Obae;
use crate::waveform::Waveform;

/// Sample encodings the containers can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    Int8,
    Int16,
    Float32,
}

impl Quality {
    pub fn bits(self) -> u16 {
        match self {
            Quality::Int8 => 8,
            Quality::Int16 => 16,
            Quality::Float32 => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Target quality from the command line bit depth switch.
    pub fn from_bits(bits: i32) -> Option<Self> {
        match bits {
            8 => Some(Quality::Int8),
            16 => Some(Quality::Int16),
            32 => Some(Quality::Float32),
            _ => None,
        }
    }
}

/// Stream metadata shared by every container implementation.
pub struct StreamInfo {
    pub quality: Quality,
    pub sample_rate: u32,
    pub channels: Vec<AudioChannel>,
    /// Frames per channel, not interleaved samples.
    pub total_frames: u64,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            quality: Quality::Float32,
            sample_rate: 48000,
            channels: Vec::new(),
            total_frames: 0,
        }
    }
}

/// Capability surface of an audio container. A source reads its header once
/// and then streams interleaved float frames; a target receives its
/// metadata, writes the header, then streams frames in.
pub trait AudioFormat {
    fn info(&self) -> &StreamInfo;
    fn info_mut(&mut self) -> &mut StreamInfo;
    fn read_header(&mut self) -> Result<(), Box<dyn Error>>;
    fn write_header(&mut self) -> Result<(), Box<dyn Error>>;
    /// Fill `samples` with interleaved content; the length must be a whole
    /// number of frames.
    fn read(&mut self, samples: &mut [f32]) -> Result<(), Box<dyn Error>>;
    /// Append interleaved content; the length must be a whole number of
    /// frames.
    fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn Error>>;
    /// Reorder channels for digital cinema packaging where the container
    /// requires it. Call after the channel list is set and before binding a
    /// renderer to the layout, so content lands on the reordered tracks.
    /// Most containers keep the session order.
    fn force_dcp_order(&mut self) {}
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Pick a reader implementation from the file extension.
pub fn open_source(path: &Path) -> Result<Box<dyn AudioFormat>, Box<dyn Error>> {
    match extension_of(path).as_str() {
        "wav" => Ok(Box::new(Waveform::open(path)?)),
        "laf" => Ok(Box::new(Limitless::open(path)?)),
        "mxf" => Ok(Box::new(Obae::new())),
        other => Err(format!("Unknown input format: \"{}\"", other).into()),
    }
}

/// Pick a writer implementation from the file extension.
pub fn create_target(path: &Path) -> Result<Box<dyn AudioFormat>, Box<dyn Error>> {
    match extension_of(path).as_str() {
        "wav" => Ok(Box::new(Waveform::create(path)?)),
        "laf" => Ok(Box::new(Limitless::create(path)?)),
        "mxf" => Ok(Box::new(Obae::new())),
        other => Err(format!("Unknown output format: \"{}\"", other).into()),
    }
}

// Little-endian scalar plumbing shared by the container implementations.

pub(crate) fn read_exact_buf<R: Read>(reader: &mut R, length: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut bytes = [0u8; 1];
    reader.read_exact(&mut bytes)?;
    Ok(bytes[0])
}

pub(crate) fn read_u16le<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut bytes = [0u8; 2];
    reader.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

pub(crate) fn read_i32le<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

pub(crate) fn read_u32le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn read_i64le<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(i64::from_le_bytes(bytes))
}

pub(crate) fn read_f32le<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

pub(crate) fn write_u16le<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn write_i32le<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn write_u32le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn write_i64le<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn write_f32le<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}
