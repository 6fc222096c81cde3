//! edfscope - inspect EDF/EDF+ recordings from the command line
//!
//! Prints the recording header as JSON. With `--signal`, decodes one signal,
//! runs its filter preset and resamples it to the display point budget.
//! With `--annotations`, prints the EDF+ annotation events.

use std::fs::File;
use std::ops::Range;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use memmap2::Mmap;
use serde::Serialize;

use edfscope::analysis::resample_pair;
use edfscope::parsers::RecordingDecoder;
use edfscope::settings::PipelineSettings;

#[derive(Parser, Debug)]
#[command(name = "edfscope", version, about = "Inspect EDF/EDF+ recordings")]
struct Args {
    /// Recording to open
    file: PathBuf,

    /// Signal to decode, by index or label
    #[arg(long)]
    signal: Option<String>,

    /// Data record range, e.g. 0..30
    #[arg(long, value_parser = parse_range)]
    records: Option<Range<usize>>,

    /// Settings JSON to use instead of the user config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter preset name; defaults to the first preset matching the label
    #[arg(long)]
    preset: Option<String>,

    /// Display point budget
    #[arg(long)]
    points: Option<usize>,

    /// Print annotation events
    #[arg(long)]
    annotations: bool,
}

fn parse_range(text: &str) -> std::result::Result<Range<usize>, String> {
    let (start, end) = text
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got {:?}", text))?;
    let start: usize = start.trim().parse().map_err(|e| format!("bad start: {}", e))?;
    let end: usize = end.trim().parse().map_err(|e| format!("bad end: {}", e))?;
    if start > end {
        return Err(format!("start {} is after end {}", start, end));
    }
    Ok(start..end)
}

#[derive(Serialize)]
struct SignalOutput<'a> {
    label: &'a str,
    physical_dimension: &'a str,
    sampling_frequency: f64,
    preset: Option<&'a str>,
    times: Vec<f64>,
    values: Vec<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => PipelineSettings::load_from(path)?,
        None => PipelineSettings::load(),
    };

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    // SAFETY: read-only mapping; the recording must not be truncated while open
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", args.file.display()))?;

    let decoder = RecordingDecoder::new(&mmap[..]);
    let header = decoder
        .header()
        .with_context(|| format!("Failed to decode header of {}", args.file.display()))?;

    tracing::info!(
        "Opened {}: {} signals, {} records of {} s",
        args.file.display(),
        header.signal_count,
        header.data_records,
        header.record_duration
    );

    let stdout = std::io::stdout();

    if args.annotations {
        let events = decoder.read_annotations(args.records.clone())?;
        tracing::info!("Read {} annotation events", events.len());
        serde_json::to_writer_pretty(stdout.lock(), &events)?;
        println!();
        return Ok(());
    }

    let Some(selector) = args.signal.as_deref() else {
        serde_json::to_writer_pretty(stdout.lock(), header)?;
        println!();
        return Ok(());
    };

    let index = match selector.parse::<usize>() {
        Ok(i) => i,
        Err(_) => match header.find_signal(selector) {
            Some(i) => i,
            None => bail!("No signal labelled {:?}", selector),
        },
    };
    let descriptor = header
        .signals
        .get(index)
        .with_context(|| format!("Signal {} out of range", index))?;
    if descriptor.is_annotation() {
        bail!("Signal {} holds annotations; use --annotations", index);
    }

    let sample_rate = descriptor.sampling_frequency(header.record_duration);
    let mut values = decoder.read_signal(index, args.records.clone())?;

    let preset = match &args.preset {
        Some(name) => Some(
            settings
                .preset(name)
                .with_context(|| format!("No filter preset named {:?}", name))?,
        ),
        None => settings.preset_for_label(&descriptor.label),
    };
    if let Some(preset) = preset {
        tracing::info!("Applying preset {} to {}", preset.name, descriptor.label);
        preset
            .apply(sample_rate, &mut values)
            .with_context(|| format!("Preset {} failed", preset.name))?;
    }

    let first_record = args.records.as_ref().map_or(0, |r| r.start);
    let t0 = first_record as f64 * header.record_duration;
    let times: Vec<f64> = (0..values.len())
        .map(|i| t0 + i as f64 / sample_rate)
        .collect();

    let points = args.points.unwrap_or(settings.display_points);
    let (times, values) = if settings.upsample {
        (
            edfscope::analysis::resample(&times, points, true).into_owned(),
            edfscope::analysis::resample(&values, points, true).into_owned(),
        )
    } else {
        resample_pair(&times, &values, points)
    };

    let output = SignalOutput {
        label: &descriptor.label,
        physical_dimension: &descriptor.physical_dimension,
        sampling_frequency: sample_rate,
        preset: preset.map(|p| p.name.as_str()),
        times,
        values,
    };
    serde_json::to_writer_pretty(stdout.lock(), &output)?;
    println!();
    Ok(())
}
