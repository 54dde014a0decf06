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
use std::io::Read;
use std::path::{Path, PathBuf};

use cavernize::channel::{AudioChannel, SpatialTarget};
use cavernize::format::{self, AudioFormat, Quality};
use cavernize::render::Layout;
use cavernize::upmix::Cavernize;
use cavernize::{ColorLogger, MyError, TermResult};
use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::{debug, info, warn, LevelFilter};

/// Frames rendered per update tick.
const UPDATE_RATE: usize = 240;

#[derive(Parser)]
#[command(
    name = "cavernize",
    about = "Upmix channel-based surround content into height-aware 3D speaker layouts",
    version
)]
struct Cli {
    /// Input file path (.wav, .laf, .mxf). Repeat to concatenate sources;
    /// they must share bit depth, channel count and sample rate.
    #[arg(short = 'i', long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Output bit depth: 8, 16, or 32 (float) [default: same as input]
    #[arg(long = "br", alias = "bitrate")]
    bit_rate: Option<i32>,

    /// Target layout: 0 = copy without upmixing, 1 = the layout configured
    /// on this machine, or a preset (301, 312, 402, 404, 512)
    #[arg(long = "cav", alias = "cavernize", default_value = "1")]
    cavernize: i32,

    /// Channel count override for the first input
    #[arg(long = "cc", alias = "count")]
    channel_count: Option<usize>,

    /// Channel position override: <channel> <x> <y> <lfe>. Repeatable.
    #[arg(long = "co", alias = "override", num_args = 4,
        value_names = ["CHANNEL", "X", "Y", "LFE"])]
    channel_override: Vec<String>,

    /// Keep the center channel on the floor
    #[arg(long = "cs", alias = "center", default_value = "on", value_parser = parse_switch)]
    center_stays: bool,

    /// Height effect strength in percent (0+)
    #[arg(long = "ef", default_value = "75")]
    effect: f32,

    /// Keep the source LFE channel separate instead of refilling it from a
    /// low-passed downmix
    #[arg(long = "lfe", default_value = "on", value_parser = parse_switch)]
    lfe_separation: bool,

    /// LFE channel volume in percent (0+)
    #[arg(long = "lfev", default_value = "100")]
    lfe_volume: f32,

    /// Derive center and surround content from the front pair
    #[arg(long = "mx", default_value = "on", value_parser = parse_switch)]
    matrix_upmix: bool,

    /// Height smoothness in percent (0-100)
    #[arg(long = "sm", default_value = "80")]
    smoothness: f32,

    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Output file path (.wav or .laf)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got \"{}\"", other)),
    }
}

fn main() -> TermResult {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not failures; everything else is.
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => TermResult(Ok(())),
                _ => TermResult(Err(MyError::Message(String::new()))),
            };
        }
    };

    let logger = ColorLogger::new(false, cli.verbose);
    let multi = MultiProgress::new();
    if let Err(e) = LogWrapper::new(multi.clone(), logger).try_init() {
        eprintln!("Failed to initialize logger: {}", e);
    }
    log::set_max_level(if cli.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    });

    match run(&cli, &multi) {
        Ok(()) => TermResult(Ok(())),
        Err(e) => TermResult(Err(e.into())),
    }
}

fn run(cli: &Cli, multi: &MultiProgress) -> Result<(), Box<dyn Error>> {
    info!("Cavernize v{}", env!("CARGO_PKG_VERSION"));

    let target_quality = match cli.bit_rate {
        Some(bits) => Some(Quality::from_bits(bits).ok_or_else(|| {
            format!("Bit rate can only be 8, 16, or 32 bits per sample. \"{}\" is invalid.", bits)
        })?),
        None => None,
    };
    let upmix_target = SpatialTarget::from_code(cli.cavernize)
        .ok_or_else(|| format!("Unknown target layout code: {}", cli.cavernize))?;
    if cli.effect < 0.0 {
        return Err("The effect strength can't be negative.".into());
    }
    if cli.lfe_volume < 0.0 {
        return Err("The LFE volume can't be negative.".into());
    }
    if !(0.0..=100.0).contains(&cli.smoothness) {
        return Err("Smoothness must be between 0 and 100%.".into());
    }

    // Open every source up front so metadata mismatches surface before any
    // content is written.
    let mut sources = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        debug!("Opening input: {}", input.display());
        let mut source = format::open_source(input)?;
        source.read_header()?;
        sources.push(source);
    }

    apply_channel_overrides(cli, sources[0].as_mut())?;

    let first = &sources[0];
    let source_quality = first.info().quality;
    let source_channels = first.info().channels.len();
    let sample_rate = first.info().sample_rate;
    let mut total_frames = 0u64;
    for source in &sources {
        let info = source.info();
        if info.quality != source_quality {
            return Err("Bit rate of the sources differ.".into());
        }
        if info.channels.len() != source_channels {
            return Err("Channel count of the sources differ.".into());
        }
        if info.sample_rate != sample_rate {
            return Err("Sample rate of the sources differ.".into());
        }
        total_frames += info.total_frames;
    }

    let target_channels = match upmix_target {
        SpatialTarget::Disabled => first.info().channels.clone(),
        SpatialTarget::User => resolve_user_layout(),
        preset => preset.channels().unwrap(),
    };

    let mut target = format::create_target(&cli.output)?;
    target.info_mut().quality = target_quality.unwrap_or(source_quality);
    target.info_mut().sample_rate = sample_rate;
    target.info_mut().channels = target_channels;
    target.info_mut().total_frames = total_frames;
    // Cinema wrappers fix their track order; this has to happen before the
    // render layout binds to the channel list below.
    if cli.output.extension().map(|e| e.eq_ignore_ascii_case("mxf")) == Some(true) {
        target.force_dcp_order();
    }

    let mut upmixer = if upmix_target != SpatialTarget::Disabled {
        let source_layout = Layout::new(first.info().channels.clone());
        let target_layout = Layout::new(target.info().channels.clone());
        debug!(
            "Upmixing {} channels to {} speakers, effect {}%, smoothness {}%",
            source_channels,
            target_layout.len(),
            cli.effect,
            cli.smoothness
        );
        let cavernizer = Cavernize::new(
            cli.effect / 100.0,
            cli.smoothness / 100.0,
            cli.lfe_volume / 100.0,
            cli.center_stays,
            sample_rate,
            source_channels,
            target_layout.len(),
        );
        Some((cavernizer, source_layout, target_layout))
    } else {
        None
    };

    target.write_header()?;

    let target_channel_count = target.info().channels.len();
    let mut samples = vec![0.0f32; UPDATE_RATE * source_channels];
    let mut rendered = vec![0.0f32; UPDATE_RATE * target_channel_count];
    let style = ProgressStyle::with_template("{prefix} {bar:20.cyan/blue} {percent}{msg}")
        .map_err(|e| e.to_string())?;

    let total_sources = sources.len();
    for (index, source) in sources.iter_mut().enumerate() {
        let source_frames = source.info().total_frames;
        let progress = multi
            .add(ProgressBar::new(100))
            .with_style(style.clone())
            .with_prefix(format!("[{}/{}] {}", index + 1, total_sources, cli.inputs[index].display()))
            .with_message("%");

        let mut position = 0u64;
        while position < source_frames {
            let frames = UPDATE_RATE.min((source_frames - position) as usize);
            let read_samples = frames * source_channels;
            source.read(&mut samples[..read_samples])?;
            match upmixer.as_mut() {
                Some((cavernizer, source_layout, target_layout)) => {
                    let write_samples = frames * target_channel_count;
                    cavernizer.upconvert(
                        &samples[..read_samples],
                        source_layout,
                        target_layout,
                        &mut rendered[..write_samples],
                        frames,
                        cli.lfe_separation,
                        cli.matrix_upmix,
                    );
                    target.write(&rendered[..write_samples])?;
                }
                None => target.write(&samples[..read_samples])?,
            }
            position += frames as u64;
            progress.set_position(100 * position / source_frames.max(1));
        }
        progress.finish();
    }

    info!("Wrote to file: {}", cli.output.display());
    Ok(())
}

/// Apply the channel count and position overrides to the first source.
fn apply_channel_overrides(
    cli: &Cli,
    source: &mut dyn AudioFormat,
) -> Result<(), Box<dyn Error>> {
    if let Some(count) = cli.channel_count {
        if count == 0 {
            return Err("The channel count override must be positive.".into());
        }
        let channels = &mut source.info_mut().channels;
        channels.resize(count, AudioChannel::new(0.0, 0.0, false));
    }
    for override_args in cli.channel_override.chunks(4) {
        let channel: usize = override_args[0]
            .parse()
            .map_err(|_| "The overridden channel must be an integer.")?;
        let x: f32 = override_args[1]
            .parse()
            .map_err(|_| "The overridden X angle must be a number.")?;
        let y: f32 = override_args[2]
            .parse()
            .map_err(|_| "The overridden Y angle must be a number.")?;
        let lfe = parse_switch(&override_args[3])?;
        let channels = &mut source.info_mut().channels;
        if channel >= channels.len() {
            return Err(
                "Channel ID out of range. The channel count can be overridden with \"--cc\"."
                    .into(),
            );
        }
        channels[channel].set_position(x, y);
        channels[channel].lfe = lfe;
    }
    Ok(())
}

/// Layout the user configured for this machine, falling back to 5.1.2.
fn resolve_user_layout() -> Vec<AudioChannel> {
    if let Some(channels) = read_user_layout() {
        return channels;
    }
    warn!("Cavern is not configured on this computer. A 5.1.2 output (L,R,C,LFE,SL,SR,TL,TR) will be used.");
    SpatialTarget::Surround5_1_2.channels().unwrap()
}

fn read_user_layout() -> Option<Vec<AudioChannel>> {
    let base = std::env::var_os("APPDATA")?;
    let path = Path::new(&base).join("Cavern").join("Save.dat");
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    let mut tokens = contents.split_whitespace();
    let count: usize = tokens.next()?.parse().ok()?;
    let mut channels = Vec::with_capacity(count);
    for _ in 0..count {
        let x: f32 = tokens.next()?.parse().ok()?;
        let y: f32 = tokens.next()?.parse().ok()?;
        let lfe = tokens.next()?.eq_ignore_ascii_case("true");
        channels.push(AudioChannel::new(x, y, lfe));
    }
    Some(channels)
}
