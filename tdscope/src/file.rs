//! Signal source adapter over an opened measurement file.
//!
//! [`MeasurementFile::open`] memory-maps the file and resolves its structure
//! (groups, channels, properties, lengths) without decoding any samples.
//! Samples are only materialized by [`Channel::read_window`] and
//! [`Channel::preview`], which always take an explicit bound.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tdscope::{MeasurementFile, SamplingWindow};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = MeasurementFile::open("LogFile.tdms")?;
//! for group in file.groups() {
//!     for channel in group.channels() {
//!         println!("{}/{}: {} points", group.name(), channel.name(), channel.len());
//!     }
//! }
//!
//! let channel = file.channel("Log", "Dev1/ai0")?;
//! let first_second = channel.read_window(SamplingWindow::duration(1.0))?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{FileReadError, Result, ScopeError};
use crate::property::{Properties, PropertyValue};
use crate::tdms::{self, ChannelMeta, DataType, FileMeta, GroupMeta};
use crate::window::SamplingWindow;

/// Property holding the time in seconds between consecutive samples.
pub const WF_INCREMENT: &str = "wf_increment";

/// An opened measurement file.
///
/// The memory mapping is owned by this value and released when it is
/// dropped, on success and error paths alike.
#[derive(Debug)]
pub struct MeasurementFile {
    /// Path the file was opened from (for error reporting).
    path: PathBuf,
    /// Read-only mapping of the whole file.
    data: Mmap,
    /// Structural metadata resolved at open time.
    meta: FileMeta,
}

impl MeasurementFile {
    /// Opens a measurement file and resolves its structural metadata.
    ///
    /// No sample arrays are decoded here.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::FileRead`] if the file does not exist, cannot be
    /// mapped, or is not a valid TDMS file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let file = File::open(path).map_err(|e| FileReadError::Open {
            path: path_str.clone(),
            source: e,
        })?;
        let len = file
            .metadata()
            .map_err(|e| FileReadError::Open {
                path: path_str.clone(),
                source: e,
            })?
            .len();
        if len == 0 {
            return Err(FileReadError::Format {
                path: path_str,
                offset: 0,
                reason: "file is empty".to_string(),
            }
            .into());
        }

        // SAFETY: The mapping is read-only and owned by the returned value.
        // Concurrent truncation by another process is outside our contract;
        // every decoded slice is bounds-checked against the mapped length.
        let data = unsafe {
            Mmap::map(&file).map_err(|e| FileReadError::MemoryMap {
                path: path_str.clone(),
                source: e,
            })?
        };

        let meta = tdms::parse(&data, &path_str)?;
        debug!(
            path = %path_str,
            bytes = len,
            groups = meta.groups.len(),
            "opened measurement file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            data,
            meta,
        })
    }

    /// Returns the path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file-level properties.
    pub fn properties(&self) -> &Properties {
        &self.meta.properties
    }

    /// Returns the number of segments in the file.
    pub fn segment_count(&self) -> usize {
        self.meta.segment_count
    }

    /// Returns the groups in order of first appearance in the file.
    pub fn groups(&self) -> impl ExactSizeIterator<Item = Group<'_>> {
        self.meta
            .groups
            .iter()
            .map(move |meta| Group { file: self, meta })
    }

    /// Looks up a group by name.
    pub fn group(&self, name: &str) -> Option<Group<'_>> {
        self.groups().find(|group| group.name() == name)
    }

    /// Resolves a `group`/`channel` path.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ChannelNotFound`] if either the group or the
    /// channel does not exist.
    pub fn channel(&self, group: &str, channel: &str) -> Result<Channel<'_>> {
        self.group(group)
            .and_then(|g| g.channel(channel))
            .ok_or_else(|| ScopeError::ChannelNotFound {
                group: group.to_string(),
                channel: channel.to_string(),
            })
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

/// A named container of channels.
#[derive(Debug, Clone, Copy)]
pub struct Group<'f> {
    file: &'f MeasurementFile,
    meta: &'f GroupMeta,
}

impl<'f> Group<'f> {
    /// Returns the group name.
    pub fn name(&self) -> &'f str {
        &self.meta.name
    }

    /// Returns the group properties.
    pub fn properties(&self) -> &'f Properties {
        &self.meta.properties
    }

    /// Returns the channels in order of first appearance in the file.
    pub fn channels(&self) -> impl ExactSizeIterator<Item = Channel<'f>> + use<'f> {
        let file = self.file;
        let group = self.meta;
        group
            .channels
            .iter()
            .map(move |meta| Channel { file, group, meta })
    }

    /// Looks up a channel by name.
    pub fn channel(&self, name: &str) -> Option<Channel<'f>> {
        self.channels().find(|channel| channel.name() == name)
    }
}

/// A named sequence of samples plus its properties.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'f> {
    file: &'f MeasurementFile,
    group: &'f GroupMeta,
    meta: &'f ChannelMeta,
}

impl<'f> Channel<'f> {
    /// Returns the channel name.
    pub fn name(&self) -> &'f str {
        &self.meta.name
    }

    /// Returns the name of the group this channel belongs to.
    pub fn group_name(&self) -> &'f str {
        &self.group.name
    }

    /// Returns the channel properties.
    pub fn properties(&self) -> &'f Properties {
        &self.meta.properties
    }

    /// Returns the element type of the raw data, if the channel has any.
    pub fn data_type(&self) -> Option<DataType> {
        self.meta.data_type
    }

    /// Returns the number of samples in the channel.
    pub fn len(&self) -> u64 {
        self.meta.len
    }

    /// Returns `true` if the channel holds no samples.
    pub fn is_empty(&self) -> bool {
        self.meta.len == 0
    }

    /// Returns the sampling rate `1 / wf_increment` in Hz.
    ///
    /// Returns `Ok(None)` when the increment property is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::InvalidSamplingParameter`] if the increment is
    /// present but zero, negative, non-finite, or not a number.
    pub fn sampling_rate(&self) -> Result<Option<f64>> {
        let Some(value) = self.meta.properties.get(WF_INCREMENT) else {
            return Ok(None);
        };
        let increment = match value {
            PropertyValue::String(_) | PropertyValue::Bool(_) | PropertyValue::Timestamp(_) => {
                return Err(
                    self.invalid_parameter(format!("{WF_INCREMENT} is not numeric: {value}"))
                );
            }
            numeric => numeric.as_f64().unwrap_or(f64::NAN),
        };
        if increment == 0.0 {
            return Err(self.invalid_parameter(format!("{WF_INCREMENT} is zero")));
        }
        if !increment.is_finite() || increment < 0.0 {
            return Err(self.invalid_parameter(format!(
                "{WF_INCREMENT} must be positive and finite, found {increment}"
            )));
        }
        Ok(Some(1.0 / increment))
    }

    /// Reads the samples covered by `window`.
    ///
    /// Requests reaching past the end of the channel are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::MissingSamplingRate`] or
    /// [`ScopeError::InvalidSamplingParameter`] if a duration window cannot
    /// be converted to a sample count, and [`ScopeError::FileRead`] if the
    /// samples cannot be decoded.
    pub fn read_window(&self, window: SamplingWindow) -> Result<Vec<f64>> {
        let (start, count) = window.resolve(self)?;
        debug!(
            group = self.group_name(),
            channel = self.name(),
            start,
            count,
            "reading window"
        );
        tdms::read_samples(&self.file.data, &self.file.path_str(), self.meta, start, count)
    }

    /// Reads at most the first `n` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::FileRead`] if the samples cannot be decoded.
    pub fn preview(&self, n: u64) -> Result<Vec<f64>> {
        self.read_window(SamplingWindow::span(0, n))
    }

    pub(crate) fn invalid_parameter(&self, reason: impl Into<String>) -> ScopeError {
        ScopeError::InvalidSamplingParameter {
            group: self.group_name().to_string(),
            channel: self.name().to_string(),
            reason: reason.into(),
        }
    }
}
