use core::fmt;
use std::io::{self, Write};
use std::process::{ExitCode, Termination};

use colored::Colorize;
use log::{error, Level, LevelFilter, Metadata, Record};

pub mod analyzer;
pub mod biquad;
pub mod channel;
pub mod convolver;
pub mod eq;
pub mod fft;
pub mod format;
pub mod graph;
pub mod limitless;
pub mod obae;
pub mod qmath;
pub mod render;
pub mod upmix;
pub mod waveform;

pub use analyzer::FilterAnalyzer;
pub use biquad::{Filter, PeakingFilter};
pub use channel::{AudioChannel, SpatialTarget, Vector3};
pub use convolver::FastConvolver;
pub use eq::PeakingEq;
pub use fft::FftCache;
pub use format::{AudioFormat, Quality};
pub use qmath::Complex;
pub use render::Layout;
pub use upmix::{Cavernize, Normalizer};

#[derive(Debug)]
pub enum MyError {
    Message(String),
}

impl fmt::Display for MyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MyError::Message(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MyError {}

pub type MyResult<T> = Result<T, MyError>;

pub struct TermResult(pub MyResult<()>);

impl Termination for TermResult {
    fn report(self) -> ExitCode {
        match self.0 {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("{}", err);
                ExitCode::FAILURE
            }
        }
    }
}

// Convert boxed dynamic errors into MyError
impl From<Box<dyn std::error::Error>> for MyError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        MyError::Message(err.to_string())
    }
}

impl From<String> for MyError {
    fn from(message: String) -> Self {
        MyError::Message(message)
    }
}

#[derive(Clone)]
pub struct ColorLogger {
    max_level: LevelFilter,
}

impl ColorLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let max_level = if quiet {
            LevelFilter::Off
        } else if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        };
        Self { max_level }
    }
}

impl log::Log for ColorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            match record.level() {
                Level::Error => eprintln!(
                    "{} {}",
                    "[ERROR]".red().bold(),
                    format!("{}", record.args()).red().bold()
                ),
                Level::Warn => eprintln!(
                    "{} {}",
                    "[WARN]".yellow().bold(),
                    format!("{}", record.args()).yellow().bold()
                ),
                _ => eprintln!(
                    "[{}] {}",
                    record.level().to_string().blue(),
                    record.args()
                ),
            }
        }
        self.flush();
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
