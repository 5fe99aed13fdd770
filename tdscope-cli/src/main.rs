//! CLI for the tdscope TDMS inspection utility.
//!
//! Provides commands for exploring file structure, extracting a channel
//! window with its spectrum, and generating synthetic test files.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tdscope::config::{DEFAULT_CHANNEL, DEFAULT_GROUP};
use tdscope::file::WF_INCREMENT;
use tdscope::inspect::DEFAULT_PREVIEW_LEN;
use tdscope::writer::{ChannelData, Segment, TdmsWriter};
use tdscope::{DEFAULT_FALLBACK_RATE_HZ, ScopeError, SignalPlot, WorkflowConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// tdscope — Inspect and window channel data from TDMS files.
#[derive(Parser)]
#[command(name = "tdscope", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List groups, channels, properties, lengths and sampling rates.
    Explore {
        /// Path to the TDMS file.
        file: PathBuf,

        /// Number of leading samples to show per channel.
        #[arg(long, default_value_t = DEFAULT_PREVIEW_LEN)]
        preview: u64,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },

    /// Extract a channel window and its magnitude spectrum.
    Visualize {
        /// JSON workflow configuration; flags override its fields.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the TDMS file.
        file: Option<PathBuf>,

        /// Group containing the channel [default: Log].
        #[arg(long)]
        group: Option<String>,

        /// Channel to read [default: Dev1/ai0].
        #[arg(long)]
        channel: Option<String>,

        /// Seconds to read from the start of the channel [default: 3].
        #[arg(long, conflicts_with = "full")]
        duration: Option<f64>,

        /// Read the entire channel.
        #[arg(long)]
        full: bool,

        /// Sampling rate to assume when the channel has no wf_increment.
        #[arg(long, conflicts_with = "assume_1mhz")]
        fallback_rate: Option<f64>,

        /// Assume 1 MHz when the channel has no wf_increment.
        #[arg(long)]
        assume_1mhz: bool,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: PlotFormat,

        /// Directory to write output files into instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic sine-wave TDMS file.
    Generate {
        /// Path of the file to create.
        out: PathBuf,

        /// Tone frequency in Hz.
        #[arg(long, default_value = "1000")]
        frequency: f64,

        /// Tone amplitude.
        #[arg(long, default_value = "1")]
        amplitude: f64,

        /// Sampling rate in Hz.
        #[arg(long, default_value = "1000000")]
        rate: f64,

        /// Total number of samples.
        #[arg(long, default_value = "10000")]
        samples: usize,

        /// Number of segments to split the samples across.
        #[arg(long, default_value = "1")]
        segments: usize,

        /// Group name.
        #[arg(long, default_value = DEFAULT_GROUP)]
        group: String,

        /// Channel name.
        #[arg(long, default_value = DEFAULT_CHANNEL)]
        channel: String,
    },
}

/// Output format for `explore`.
#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Human-readable report.
    Text,
    /// JSON document.
    Json,
}

/// Output format for `visualize`.
#[derive(Clone, ValueEnum)]
enum PlotFormat {
    /// Comma-separated values, one table per domain.
    Csv,
    /// JSON document with both domains.
    Json,
}

/// Flags of `tdscope visualize` that shape the workflow configuration.
struct VisualizeArgs {
    config: Option<PathBuf>,
    file: Option<PathBuf>,
    group: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    full: bool,
    fallback_rate: Option<f64>,
    assume_1mhz: bool,
}

/// Tone written by `tdscope generate`.
struct ToneSpec {
    frequency: f64,
    amplitude: f64,
    rate: f64,
    samples: usize,
    segments: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Explore {
            file,
            preview,
            format,
        } => cmd_explore(&file, preview, &format),
        Commands::Visualize {
            config,
            file,
            group,
            channel,
            duration,
            full,
            fallback_rate,
            assume_1mhz,
            format,
            output,
        } => {
            let args = VisualizeArgs {
                config,
                file,
                group,
                channel,
                duration,
                full,
                fallback_rate,
                assume_1mhz,
            };
            cmd_visualize(&args, &format, output.as_deref())
        }
        Commands::Generate {
            out,
            frequency,
            amplitude,
            rate,
            samples,
            segments,
            group,
            channel,
        } => {
            let tone = ToneSpec {
                frequency,
                amplitude,
                rate,
                samples,
                segments,
            };
            cmd_generate(&out, &group, &channel, &tone)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if let Some(ScopeError::ChannelNotFound { .. }) = e.downcast_ref::<ScopeError>() {
            eprintln!(
                "Hint: run `tdscope explore <file>` to list the available groups and channels."
            );
        }
        std::process::exit(1);
    }
}

/// Implements `tdscope explore <file>`.
fn cmd_explore(
    file: &Path,
    preview: u64,
    format: &ReportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = tdscope::inspect_path(file, preview)?;
    match format {
        ReportFormat::Text => print!("{report}"),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Implements `tdscope visualize`.
fn cmd_visualize(
    args: &VisualizeArgs,
    format: &PlotFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = visualize_config(args)?;
    let plot = tdscope::visualize(&config)?;

    match output {
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            match format {
                PlotFormat::Csv => {
                    write_time_csv(&mut out, &plot)?;
                    writeln!(out)?;
                    write_spectrum_csv(&mut out, &plot)?;
                }
                PlotFormat::Json => {
                    serde_json::to_writer_pretty(&mut out, &plot)?;
                    writeln!(out)?;
                }
            }
        }
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            match format {
                PlotFormat::Csv => {
                    let time_path = dir.join("time_domain.csv");
                    let mut out = BufWriter::new(File::create(&time_path)?);
                    write_time_csv(&mut out, &plot)?;
                    out.flush()?;

                    let spectrum_path = dir.join("spectrum.csv");
                    let mut out = BufWriter::new(File::create(&spectrum_path)?);
                    write_spectrum_csv(&mut out, &plot)?;
                    out.flush()?;

                    println!("Wrote {}", time_path.display());
                    println!("Wrote {}", spectrum_path.display());
                }
                PlotFormat::Json => {
                    let path = dir.join("signal.json");
                    let mut out = BufWriter::new(File::create(&path)?);
                    serde_json::to_writer_pretty(&mut out, &plot)?;
                    out.flush()?;
                    println!("Wrote {}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Merges a JSON configuration (if any) with command-line overrides.
fn visualize_config(args: &VisualizeArgs) -> Result<WorkflowConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, &args.file) {
        (Some(path), _) => WorkflowConfig::from_json_file(path)?,
        (None, Some(file)) => WorkflowConfig::new(file),
        (None, None) => return Err("no input file: pass a TDMS path or --config".into()),
    };

    if let Some(file) = &args.file {
        config.file_path.clone_from(file);
    }
    if let Some(group) = &args.group {
        config.group_name.clone_from(group);
    }
    if let Some(channel) = &args.channel {
        config.channel_name.clone_from(channel);
    }
    if args.full {
        config.window_duration_seconds = None;
    } else if let Some(seconds) = args.duration {
        config.window_duration_seconds = Some(seconds);
    }
    if args.assume_1mhz {
        config.fallback_rate_hz = Some(DEFAULT_FALLBACK_RATE_HZ);
    } else if let Some(rate) = args.fallback_rate {
        config.fallback_rate_hz = Some(rate);
    }

    config.validate()?;
    Ok(config)
}

fn write_time_csv<W: Write>(out: &mut W, plot: &SignalPlot) -> io::Result<()> {
    writeln!(
        out,
        "# group={}, channel={}, fs={} Hz, points={}/{}",
        plot.group, plot.channel, plot.sample_rate_hz, plot.loaded_points, plot.total_points
    )?;
    writeln!(out, "time_s,amplitude")?;
    for (t, v) in plot.time_domain.time_s.iter().zip(&plot.time_domain.amplitude) {
        writeln!(out, "{t},{v}")?;
    }
    Ok(())
}

fn write_spectrum_csv<W: Write>(out: &mut W, plot: &SignalPlot) -> io::Result<()> {
    writeln!(
        out,
        "# group={}, channel={}, bins={}",
        plot.group,
        plot.channel,
        plot.frequency_domain.len()
    )?;
    writeln!(out, "frequency_hz,magnitude")?;
    let spectrum = &plot.frequency_domain;
    for (f, m) in spectrum.frequencies_hz.iter().zip(&spectrum.magnitudes) {
        writeln!(out, "{f},{m}")?;
    }
    Ok(())
}

/// Implements `tdscope generate <out>`.
#[allow(clippy::cast_precision_loss)] // Sample indices are far below 2^52
fn cmd_generate(
    out: &Path,
    group: &str,
    channel: &str,
    tone: &ToneSpec,
) -> Result<(), Box<dyn std::error::Error>> {
    if !tone.rate.is_finite() || tone.rate <= 0.0 {
        return Err(format!("--rate must be positive, found {}", tone.rate).into());
    }
    if tone.segments == 0 || !tone.samples.is_multiple_of(tone.segments) {
        return Err(format!(
            "--samples ({}) must split evenly into --segments ({})",
            tone.samples, tone.segments
        )
        .into());
    }

    let signal: Vec<f64> = (0..tone.samples)
        .map(|i| tone.amplitude * (2.0 * PI * tone.frequency * i as f64 / tone.rate).sin())
        .collect();
    let chunk_len = tone.samples / tone.segments;
    let mut chunks = signal.chunks(chunk_len.max(1));

    let mut writer = TdmsWriter::create(out)?;
    let first = chunks.next().map(<[f64]>::to_vec).unwrap_or_default();
    writer.write_segment(
        &Segment::new()
            .file_property("name", "tdscope synthetic tone")
            .channel(group, channel, ChannelData::F64(first))
            .channel_property(group, channel, WF_INCREMENT, 1.0 / tone.rate)
            .channel_property(group, channel, "unit_string", "Volts"),
    )?;
    for chunk in chunks {
        writer.write_segment(&Segment::continuation(vec![ChannelData::F64(chunk.to_vec())]))?;
    }
    writer.finish()?;

    info!(path = %out.display(), samples = tone.samples, segments = tone.segments, "file written");
    println!(
        "Wrote {} ({} samples of {} Hz at {} Hz in '{group}'/'{channel}')",
        out.display(),
        tone.samples,
        tone.frequency,
        tone.rate
    );
    Ok(())
}
