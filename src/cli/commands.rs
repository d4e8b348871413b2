//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use tracing::info;

use super::{ExportArgs, ParamArgs};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::export::{ExportOptions, ExportedAudio};
use crate::params::{Field, PresetCatalog};
use crate::processor::AudioEngine;

/// Load the engine configuration, or the defaults without a file
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!("Loading config: {}", path.display());
            EngineConfig::from_json_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Print the format and levels of an audio file.
pub fn info(config: EngineConfig, input: &Path) -> Result<()> {
    let mut engine = AudioEngine::new(config)?;
    let track = engine.load_file(input)?;
    let buffer = track.buffer();

    println!("File:        {}", track.name());
    println!("Id:          {}", track.id());
    println!("Sample rate: {} Hz", track.sample_rate());
    println!("Channels:    {}", track.channels());
    match track.specs().bits_per_sample {
        Some(bits) => println!("Bit depth:   {}", bits),
        None => println!("Bit depth:   unknown"),
    }
    println!("Duration:    {:.3} s", track.duration_secs());
    println!("Peak:        {:.4}", buffer.peak());
    println!("RMS:         {:.4}", buffer.rms());

    Ok(())
}

/// Render a file with explicit parameters and an optional preset.
pub fn render(
    config: EngineConfig,
    input: &Path,
    output: &Path,
    params: &ParamArgs,
    export: &ExportArgs,
    preset: Option<&str>,
    presets: Option<&Path>,
) -> Result<()> {
    info!("Rendering {} -> {}", input.display(), output.display());

    let mut engine = AudioEngine::new(config)?;
    engine.load_file(input)?;

    if let Some(catalog) = presets {
        engine.set_presets(PresetCatalog::from_json_file(catalog)?);
    }
    if let Some(id) = preset {
        engine.select_preset(id)?;
    }
    apply_params(&mut engine, params);

    let exported = engine.export_to_file(output, &export_options(export, output)?)?;
    print_summary(&engine, &exported, output);
    Ok(())
}

/// Render a file with randomly drawn parameters.
pub fn randomize(mut config: EngineConfig, input: &Path, output: &Path, seed: Option<u64>, export: &ExportArgs) -> Result<()> {
    if seed.is_some() {
        config.randomizer.seed = seed;
    }

    let mut engine = AudioEngine::new(config)?;
    engine.load_file(input)?;
    if let Some(state) = engine.randomize() {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    let exported = engine.export_to_file(output, &export_options(export, output)?)?;
    print_summary(&engine, &exported, output);
    Ok(())
}

/// List the presets of a catalog.
pub fn list_presets(catalog: &Path) -> Result<()> {
    let catalog = PresetCatalog::from_json_file(catalog)?;

    if catalog.is_empty() {
        println!("No presets in catalog.");
        return Ok(());
    }

    println!("Presets:");
    println!("{:-<60}", "");
    for preset in catalog.iter() {
        let summary: Vec<String> = preset
            .state
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        println!("{:<16} {:<20} {}", preset.id, preset.name, summary.join(" "));
    }
    println!("{:-<60}", "");

    Ok(())
}

fn apply_params(engine: &mut AudioEngine, params: &ParamArgs) {
    let overrides = [
        (Field::Tempo, params.tempo),
        (Field::Pitch, params.pitch),
        (Field::Frequency, params.frequency),
        (Field::Volume, params.volume),
        (Field::Noise, params.noise),
        (Field::Echo, params.echo),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            let stored = engine.set_parameter(field, value);
            if stored != value {
                info!("{} clamped from {} to {}", field, value, stored);
            }
        }
    }
}

fn export_options(args: &ExportArgs, output: &Path) -> Result<ExportOptions> {
    let filename = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| ExportOptions::default().filename);
    Ok(ExportOptions {
        format: args.format.parse()?,
        quality: args.quality.parse()?,
        filename,
        include_echo_tail: args.echo_tail,
        normalize: args.normalize,
    })
}

fn print_summary(engine: &AudioEngine, exported: &ExportedAudio, output: &Path) {
    println!("Written: {} ({})", output.display(), exported.mime_type());
    println!(
        "{} Hz, {} ch, {:.3} s, {} bytes",
        exported.sample_rate,
        exported.channels,
        exported.duration_secs(),
        exported.bytes.len()
    );
    println!("SHA-256: {}", exported.sha256);
    let modified = engine.modified_fields();
    if !modified.is_empty() {
        let names: Vec<&str> = modified.iter().map(|f| f.name()).collect();
        println!("Modified: {}", names.join(", "));
    }
}
