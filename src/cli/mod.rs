//! CLI Module
//!
//! Command-line interface for the tonewarp engine.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tonewarp - colour a recording with tone, speed, noise and echo
#[derive(Parser, Debug)]
#[command(name = "tonewarp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the format and levels of an audio file
    #[command(name = "info")]
    Info {
        /// Input audio file
        input: PathBuf,
    },

    /// Render a file through the effect chain
    #[command(name = "render")]
    Render {
        /// Input audio file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        #[command(flatten)]
        export: ExportArgs,

        /// Preset id to apply before the individual parameters
        #[arg(long)]
        preset: Option<String>,

        /// Preset catalog (JSON)
        #[arg(long)]
        presets: Option<PathBuf>,
    },

    /// Render a file with randomly drawn parameters
    #[command(name = "randomize")]
    Randomize {
        /// Input audio file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// List the presets of a catalog
    #[command(name = "presets")]
    Presets {
        /// Preset catalog (JSON)
        catalog: PathBuf,
    },
}

/// Per-field overrides; unset fields keep their current value
#[derive(Args, Debug, Default, Clone)]
pub struct ParamArgs {
    /// Playback-rate multiplier (0.5-2.0)
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Detune in semitones (-12 to 12)
    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<f64>,

    /// Low-pass cutoff in Hz (20-20000)
    #[arg(long)]
    pub frequency: Option<f64>,

    /// Output level in percent (0-300)
    #[arg(long)]
    pub volume: Option<f64>,

    /// Background noise mix in percent (0-100)
    #[arg(long)]
    pub noise: Option<f64>,

    /// Echo mix in percent (0-100)
    #[arg(long)]
    pub echo: Option<f64>,
}

/// Output options shared by every rendering command
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output format: wav, mp3 or aac
    #[arg(long, default_value = "wav")]
    pub format: String,

    /// Quality: high, medium or low
    #[arg(long, default_value = "high")]
    pub quality: String,

    /// Keep rendering until the echo has died away
    #[arg(long)]
    pub echo_tail: bool,

    /// Peak-normalize the output
    #[arg(long)]
    pub normalize: bool,
}
