//! # tdscope
//!
//! Inspect and window channel data from TDMS measurement files.
//!
//! tdscope opens NI TDMS files, exposes their group/channel hierarchy and
//! properties, and reads bounded windows of channel samples without loading
//! whole channels into memory. On top of that adapter sit two workflows: a
//! structural report of a file, and the time/frequency arrays needed to
//! plot one channel.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Open resolves metadata only; samples are decoded per read from a memory map
//! - Every read takes an explicit bound; reading a whole channel is opt-in
//! - Missing sampling rates are errors unless a fallback is requested
//! - Typed errors naming the file, group, and channel involved
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tdscope::{MeasurementFile, SamplingWindow, Spectrum};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = MeasurementFile::open("LogFile.tdms")?;
//! let channel = file.channel("Log", "Dev1/ai0")?;
//!
//! let fs = channel.sampling_rate()?.ok_or("channel has no wf_increment")?;
//! let samples = channel.read_window(SamplingWindow::duration(3.0))?;
//!
//! let spectrum = Spectrum::compute(&samples, fs);
//! if let Some((freq, magnitude)) = spectrum.peak() {
//!     println!("peak at {freq} Hz ({magnitude})");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`file`] — Opening files, groups, channels, windowed reads
//! - [`window`] — Sampling windows and sampling-rate policy
//! - [`spectrum`] — Frequency-domain transform and time axis
//! - [`inspect`] — Structural report workflow
//! - [`visualize`] — Plot data workflow
//! - [`config`] — Workflow configuration
//! - [`property`] — Property values
//! - [`tdms`] — Binary format decoding
//! - [`writer`] — Minimal TDMS writer
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod file;
pub mod inspect;
pub mod property;
pub mod spectrum;
pub mod tdms;
pub mod visualize;
pub mod window;
pub mod writer;

// Re-export primary API types at crate root for convenience.
pub use config::WorkflowConfig;
pub use error::{ConfigError, FileReadError, Result, ScopeError, WriteError};
pub use file::{Channel, Group, MeasurementFile};
pub use inspect::{FileReport, inspect, inspect_path};
pub use property::{Properties, PropertyValue, Timestamp};
pub use spectrum::{Spectrum, time_axis};
pub use tdms::DataType;
pub use visualize::{SignalPlot, TimeDomain, visualize};
pub use window::{DEFAULT_FALLBACK_RATE_HZ, SampleRatePolicy, SamplingWindow};
