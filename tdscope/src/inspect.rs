//! Structural inspection workflow.
//!
//! Walks every group and channel of a file and collects what a person
//! needs to find the data: names, properties, lengths, a short sample
//! preview, and the sampling rate where the channel declares one. The
//! [`FileReport`] renders as deterministic text and serializes to JSON.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{FileReadError, Result, ScopeError};
use crate::file::{Channel, MeasurementFile};
use crate::property::Properties;

/// Number of samples previewed per channel by default.
pub const DEFAULT_PREVIEW_LEN: u64 = 5;

/// Structure of a whole file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// Path the file was opened from.
    pub path: String,
    /// File-level properties.
    pub properties: Properties,
    /// Groups in file order.
    pub groups: Vec<GroupReport>,
}

/// Structure of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    /// Group name.
    pub name: String,
    /// Group properties.
    pub properties: Properties,
    /// Channels in file order.
    pub channels: Vec<ChannelReport>,
}

/// Summary of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    /// Channel name.
    pub name: String,
    /// Number of samples.
    pub length: u64,
    /// Raw element type, if the channel has data.
    pub data_type: Option<&'static str>,
    /// The first samples of the channel.
    pub preview: Vec<f64>,
    /// Why no preview is shown for a channel that has samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_unavailable: Option<String>,
    /// `1 / wf_increment`, when the channel declares an increment.
    pub sampling_rate_hz: Option<f64>,
    /// Channel properties.
    pub properties: Properties,
}

/// Opens `path` and inspects it.
///
/// # Errors
///
/// Returns [`ScopeError::FileRead`] if the file cannot be opened and
/// [`ScopeError::InvalidSamplingParameter`] if a channel declares an
/// unusable increment.
pub fn inspect_path<P: AsRef<Path>>(path: P, preview_len: u64) -> Result<FileReport> {
    let file = MeasurementFile::open(path)?;
    inspect(&file, preview_len)
}

/// Inspects an opened file, previewing up to `preview_len` samples per channel.
///
/// Channels whose element type cannot be read as numbers are reported
/// without a preview instead of aborting the report.
///
/// # Errors
///
/// Returns [`ScopeError::InvalidSamplingParameter`] if a channel declares an
/// unusable increment, or [`ScopeError::FileRead`] if sample data is corrupt.
pub fn inspect(file: &MeasurementFile, preview_len: u64) -> Result<FileReport> {
    info!(path = %file.path().display(), "exploring file");

    let groups = file
        .groups()
        .map(|group| {
            let channels = group
                .channels()
                .map(|channel| channel_report(&channel, preview_len))
                .collect::<Result<Vec<_>>>()?;
            Ok(GroupReport {
                name: group.name().to_string(),
                properties: group.properties().clone(),
                channels,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FileReport {
        path: file.path().display().to_string(),
        properties: file.properties().clone(),
        groups,
    })
}

fn channel_report(channel: &Channel<'_>, preview_len: u64) -> Result<ChannelReport> {
    let (preview, preview_unavailable) = match channel.preview(preview_len) {
        Ok(preview) => (preview, None),
        Err(ScopeError::FileRead(FileReadError::Unsupported { reason, .. })) => {
            (Vec::new(), Some(reason))
        }
        Err(e) => return Err(e),
    };

    Ok(ChannelReport {
        name: channel.name().to_string(),
        length: channel.len(),
        data_type: channel.data_type().map(|t| t.name()),
        preview,
        preview_unavailable,
        sampling_rate_hz: channel.sampling_rate()?,
        properties: channel.properties().clone(),
    })
}

struct PropertyList<'a>(&'a Properties);

impl fmt::Display for PropertyList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{name}': {value}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File: {}", self.path)?;
        if !self.properties.is_empty() {
            writeln!(f, "  properties: {}", PropertyList(&self.properties))?;
        }
        writeln!(f)?;

        for group in &self.groups {
            writeln!(f, "Group '{}'", group.name)?;
            if !group.properties.is_empty() {
                writeln!(f, "  properties: {}", PropertyList(&group.properties))?;
            }
            if group.channels.is_empty() {
                writeln!(f, "  (no channels)")?;
            }
            for channel in &group.channels {
                write!(f, "{channel}")?;
            }
            writeln!(f, "{}", "-".repeat(40))?;
        }
        Ok(())
    }
}

impl fmt::Display for ChannelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.length == 0 {
            writeln!(f, "  Channel '{}' (no samples)", self.name)?;
            return writeln!(f, "    properties: {}", PropertyList(&self.properties));
        }

        writeln!(f, "  Channel '{}'", self.name)?;
        match self.data_type {
            Some(data_type) => writeln!(f, "    points: {} ({data_type})", self.length)?,
            None => writeln!(f, "    points: {}", self.length)?,
        }
        match &self.preview_unavailable {
            Some(reason) => writeln!(f, "    first values: unavailable ({reason})")?,
            None => {
                let values: Vec<String> = self.preview.iter().map(|v| format!("{v:?}")).collect();
                writeln!(f, "    first values: [{}]", values.join(", "))?;
            }
        }
        if let Some(rate) = self.sampling_rate_hz {
            writeln!(f, "    sampling rate: {rate:.2} Hz")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::WF_INCREMENT;
    use crate::writer::{ChannelData, Segment, TdmsWriter};
    use tempfile::tempdir;

    fn write(path: &Path, segment: Segment) {
        let mut writer = TdmsWriter::create(path).unwrap();
        writer.write_segment(&segment).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_report_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.tdms");
        write(
            &path,
            Segment::new()
                .file_property("name", "LogFile")
                .group_property("Log", "operator", "lab")
                .channel("Log", "Dev1/ai0", ChannelData::F64(vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 1e-6)
                .channel_property("Log", "Dev1/ai0", "unit_string", "V")
                .channel("Log", "Dev1/ai1", ChannelData::F64(Vec::new()))
                .channel_property("Log", "Dev1/ai1", "unit_string", "V")
                .group("Empty"),
        );

        let report = inspect_path(&path, DEFAULT_PREVIEW_LEN).unwrap();
        assert_eq!(report.groups.len(), 2);
        let log = &report.groups[0];
        assert_eq!(log.name, "Log");
        assert_eq!(log.channels.len(), 2);

        let ai0 = &log.channels[0];
        assert_eq!(ai0.length, 6);
        assert_eq!(ai0.data_type, Some("f64"));
        assert_eq!(ai0.preview, vec![0.5, 1.0, 1.5, 2.0, 2.5]);
        assert_eq!(ai0.sampling_rate_hz, Some(1_000_000.0));

        let ai1 = &log.channels[1];
        assert_eq!(ai1.length, 0);
        assert!(ai1.preview.is_empty());
        assert_eq!(ai1.sampling_rate_hz, None);

        assert!(report.groups[1].channels.is_empty());
    }

    #[test]
    fn test_text_report_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("text.tdms");
        write(
            &path,
            Segment::new()
                .channel("Log", "Dev1/ai0", ChannelData::I16(vec![1, 2, 3]))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 0.5)
                .channel("Log", "meta", ChannelData::F64(Vec::new()))
                .channel_property("Log", "meta", "b", 2i64)
                .channel_property("Log", "meta", "a", "x")
                .group("Empty"),
        );

        let text = inspect_path(&path, 2).unwrap().to_string();
        assert_eq!(text, inspect_path(&path, 2).unwrap().to_string());

        let expected = format!(
            "File: {}\n\n\
             Group 'Log'\n\
             \x20 Channel 'Dev1/ai0'\n\
             \x20   points: 3 (i16)\n\
             \x20   first values: [1.0, 2.0]\n\
             \x20   sampling rate: 2.00 Hz\n\
             \x20 Channel 'meta' (no samples)\n\
             \x20   properties: {{'a': 'x', 'b': 2}}\n\
             ----------------------------------------\n\
             Group 'Empty'\n\
             \x20 (no channels)\n\
             ----------------------------------------\n",
            path.display()
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_zero_increment_aborts_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zero.tdms");
        write(
            &path,
            Segment::new()
                .channel("Log", "Dev1/ai0", ChannelData::F64(vec![1.0]))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 0.0),
        );
        assert!(matches!(
            inspect_path(&path, 5).unwrap_err(),
            ScopeError::InvalidSamplingParameter { .. }
        ));
    }

    #[test]
    fn test_string_channel_reported_without_preview() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strings.tdms");
        write(
            &path,
            Segment::new().channel("Notes", "text", ChannelData::String(vec!["hi".to_string()])),
        );
        let report = inspect_path(&path, 5).unwrap();
        let channel = &report.groups[0].channels[0];
        assert_eq!(channel.length, 1);
        assert!(channel.preview_unavailable.is_some());
        assert!(report.to_string().contains("first values: unavailable"));
    }

    #[test]
    fn test_json_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("json.tdms");
        write(
            &path,
            Segment::new()
                .channel("Log", "Dev1/ai0", ChannelData::F64(vec![0.0; 3]))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 1e-6),
        );
        let report = inspect_path(&path, 5).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        let channel = &json["groups"][0]["channels"][0];
        assert_eq!(channel["name"], "Dev1/ai0");
        assert_eq!(channel["length"], 3);
        assert_eq!(channel["sampling_rate_hz"], 1_000_000.0);
        assert!(channel.get("preview_unavailable").is_none());
    }
}
