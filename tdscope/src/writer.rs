//! Minimal TDMS writer.
//!
//! Produces files the decoder in [`crate::tdms`] reads back: full metadata
//! segments with file, group and channel properties, plus raw-only
//! continuation segments that reuse the previous segment's layout the way
//! streaming loggers append data. Used for fixtures, benchmarks and
//! synthetic signals.
//!
//! # Example
//!
//! ```rust,no_run
//! use tdscope::writer::{ChannelData, Segment, TdmsWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = TdmsWriter::create("synthetic.tdms")?;
//! writer.write_segment(
//!     &Segment::new()
//!         .channel("Log", "Dev1/ai0", ChannelData::F64(vec![0.0; 1000]))
//!         .channel_property("Log", "Dev1/ai0", "wf_increment", 1e-6),
//! )?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, WriteError};
use crate::property::PropertyValue;
use crate::tdms::{
    DataType, FORMAT_VERSION, NO_RAW_DATA, ObjectPath, SEGMENT_TAG, TOC_BIG_ENDIAN,
    TOC_INTERLEAVED, TOC_META_DATA, TOC_NEW_OBJ_LIST, TOC_RAW_DATA,
};

/// Raw values for one channel in one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    /// Signed 8-bit samples.
    I8(Vec<i8>),
    /// Signed 16-bit samples.
    I16(Vec<i16>),
    /// Signed 32-bit samples.
    I32(Vec<i32>),
    /// Signed 64-bit samples.
    I64(Vec<i64>),
    /// Unsigned 8-bit samples.
    U8(Vec<u8>),
    /// Unsigned 16-bit samples.
    U16(Vec<u16>),
    /// Unsigned 32-bit samples.
    U32(Vec<u32>),
    /// Unsigned 64-bit samples.
    U64(Vec<u64>),
    /// Single precision samples.
    F32(Vec<f32>),
    /// Double precision samples.
    F64(Vec<f64>),
    /// Boolean samples.
    Bool(Vec<bool>),
    /// String values.
    String(Vec<String>),
}

macro_rules! encode_numeric {
    ($values:expr, $out:expr, $big_endian:expr, $index:expr) => {{
        let v = $values[$index];
        if $big_endian {
            $out.extend_from_slice(&v.to_be_bytes());
        } else {
            $out.extend_from_slice(&v.to_le_bytes());
        }
    }};
}

impl ChannelData {
    /// The element type written for this data.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::I8(_) => DataType::I8,
            Self::I16(_) => DataType::I16,
            Self::I32(_) => DataType::I32,
            Self::I64(_) => DataType::I64,
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::U32(_) => DataType::U32,
            Self::U64(_) => DataType::U64,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
            Self::Bool(_) => DataType::Bool,
            Self::String(_) => DataType::String,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends value `index` for fixed-width types.
    fn encode_value(&self, index: usize, out: &mut Vec<u8>, big_endian: bool) {
        match self {
            Self::I8(v) => encode_numeric!(v, out, big_endian, index),
            Self::I16(v) => encode_numeric!(v, out, big_endian, index),
            Self::I32(v) => encode_numeric!(v, out, big_endian, index),
            Self::I64(v) => encode_numeric!(v, out, big_endian, index),
            Self::U8(v) => encode_numeric!(v, out, big_endian, index),
            Self::U16(v) => encode_numeric!(v, out, big_endian, index),
            Self::U32(v) => encode_numeric!(v, out, big_endian, index),
            Self::U64(v) => encode_numeric!(v, out, big_endian, index),
            Self::F32(v) => encode_numeric!(v, out, big_endian, index),
            Self::F64(v) => encode_numeric!(v, out, big_endian, index),
            Self::Bool(v) => out.push(u8::from(v[index])),
            Self::String(_) => {}
        }
    }

    /// Appends all values contiguously.
    #[allow(clippy::cast_possible_truncation)] // String payloads are far below 4 GiB
    fn encode(&self, out: &mut Vec<u8>, big_endian: bool) {
        if let Self::String(values) = self {
            // Offset table of cumulative end positions, then the bytes.
            let mut end = 0u32;
            let mut enc = Encoder { out: &mut *out, big_endian };
            for value in values {
                end += value.len() as u32;
                enc.u32(end);
            }
            for value in values {
                out.extend_from_slice(value.as_bytes());
            }
            return;
        }
        for index in 0..self.len() {
            self.encode_value(index, out, big_endian);
        }
    }

    fn string_bytes(&self) -> u64 {
        match self {
            Self::String(values) => values.iter().map(|v| 4 + v.len() as u64).sum(),
            _ => 0,
        }
    }
}

/// Endianness-aware byte sink for metadata.
struct Encoder<'a> {
    out: &'a mut Vec<u8>,
    big_endian: bool,
}

impl Encoder<'_> {
    fn u32(&mut self, v: u32) {
        if self.big_endian {
            self.out.extend_from_slice(&v.to_be_bytes());
        } else {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn u64(&mut self, v: u64) {
        if self.big_endian {
            self.out.extend_from_slice(&v.to_be_bytes());
        } else {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    #[allow(clippy::cast_possible_truncation)] // Names and property strings are far below 4 GiB
    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.out.extend_from_slice(s.as_bytes());
    }

    #[allow(clippy::cast_sign_loss)] // Reinterpreting two's complement bytes
    fn property(&mut self, name: &str, value: &PropertyValue) {
        self.string(name);
        match value {
            PropertyValue::Int(v) => {
                self.u32(DataType::I64.code());
                self.u64(*v as u64);
            }
            PropertyValue::UInt(v) => {
                self.u32(DataType::U64.code());
                self.u64(*v);
            }
            PropertyValue::Float(v) => {
                self.u32(DataType::F64.code());
                self.u64(v.to_bits());
            }
            PropertyValue::String(s) => {
                self.u32(DataType::String.code());
                self.string(s);
            }
            PropertyValue::Bool(b) => {
                self.u32(DataType::Bool.code());
                self.out.push(u8::from(*b));
            }
            PropertyValue::Timestamp(t) => {
                self.u32(DataType::Timestamp.code());
                if self.big_endian {
                    self.u64(t.seconds as u64);
                    self.u64(t.fractions);
                } else {
                    self.u64(t.fractions);
                    self.u64(t.seconds as u64);
                }
            }
        }
    }
}

/// One object entry in a segment's metadata.
#[derive(Debug, Clone)]
struct ObjectSpec {
    path: ObjectPath,
    properties: Vec<(String, PropertyValue)>,
    data: Option<ChannelData>,
}

/// A segment to be written.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    objects: Vec<ObjectSpec>,
    interleaved: bool,
    big_endian: bool,
    /// Raw-only data reusing the previous layout.
    continuation: Option<Vec<ChannelData>>,
}

impl Segment {
    /// An empty metadata segment that starts a new object list.
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw-data-only segment reusing the previous segment's layout.
    ///
    /// `data` must list one entry per data-carrying channel of the previous
    /// layout, in order, with matching types and lengths.
    pub fn continuation(data: Vec<ChannelData>) -> Self {
        Self {
            continuation: Some(data),
            ..Self::default()
        }
    }

    /// Writes raw data interleaved rather than channel by channel.
    #[must_use]
    pub fn interleaved(mut self, interleaved: bool) -> Self {
        self.interleaved = interleaved;
        self
    }

    /// Writes the segment big-endian.
    #[must_use]
    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    /// Sets a file-level property.
    #[must_use]
    pub fn file_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.object(ObjectPath::Root)
            .properties
            .push((name.to_string(), value.into()));
        self
    }

    /// Sets a group property, declaring the group if needed.
    #[must_use]
    pub fn group_property(
        mut self,
        group: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.object(ObjectPath::Group(group.to_string()))
            .properties
            .push((name.to_string(), value.into()));
        self
    }

    /// Declares a group with no properties.
    #[must_use]
    pub fn group(mut self, group: &str) -> Self {
        self.object(ObjectPath::Group(group.to_string()));
        self
    }

    /// Sets the raw data for a channel, declaring the group and channel if needed.
    #[must_use]
    pub fn channel(mut self, group: &str, channel: &str, data: ChannelData) -> Self {
        self.object(ObjectPath::Channel(group.to_string(), channel.to_string()))
            .data = Some(data);
        self
    }

    /// Sets a channel property, declaring the group and channel if needed.
    #[must_use]
    pub fn channel_property(
        mut self,
        group: &str,
        channel: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.object(ObjectPath::Channel(group.to_string(), channel.to_string()))
            .properties
            .push((name.to_string(), value.into()));
        self
    }

    fn object(&mut self, path: ObjectPath) -> &mut ObjectSpec {
        if let ObjectPath::Channel(group, _) = &path {
            let group = ObjectPath::Group(group.clone());
            if !self.objects.iter().any(|o| o.path == group) {
                self.objects.push(ObjectSpec {
                    path: group,
                    properties: Vec::new(),
                    data: None,
                });
            }
        }
        let position = match self.objects.iter().position(|o| o.path == path) {
            Some(position) => position,
            None => {
                self.objects.push(ObjectSpec {
                    path,
                    properties: Vec::new(),
                    data: None,
                });
                self.objects.len() - 1
            }
        };
        &mut self.objects[position]
    }

    /// Objects in write order: root, then each group followed by its channels.
    fn ordered_objects(&self) -> Vec<&ObjectSpec> {
        let mut ordered: Vec<&ObjectSpec> = self
            .objects
            .iter()
            .filter(|o| o.path == ObjectPath::Root)
            .collect();
        for group in self.objects.iter().filter(|o| matches!(o.path, ObjectPath::Group(_))) {
            let ObjectPath::Group(name) = &group.path else {
                continue;
            };
            ordered.push(group);
            ordered.extend(
                self.objects
                    .iter()
                    .filter(|o| matches!(&o.path, ObjectPath::Channel(g, _) if g == name)),
            );
        }
        ordered
    }
}

/// Layout signature of the last written segment, for continuations.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    channels: Vec<(DataType, usize)>,
    interleaved: bool,
    big_endian: bool,
}

/// Streams segments to a file.
pub struct TdmsWriter {
    out: BufWriter<File>,
    path: String,
    layout: Option<Layout>,
}

impl TdmsWriter {
    /// Creates (or truncates) a file for writing.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Io`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::create(path.as_ref()).map_err(|e| WriteError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        Ok(Self {
            out: BufWriter::new(file),
            path: path_str,
            layout: None,
        })
    }

    /// Encodes and appends one segment.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Layout`] if the segment cannot be
    /// represented (e.g. an interleaved string channel or a continuation that
    /// does not match the previous layout), or [`WriteError::Io`] on
    /// I/O failure.
    pub fn write_segment(&mut self, segment: &Segment) -> Result<()> {
        let (toc, metadata, raw) = match &segment.continuation {
            Some(data) => self.encode_continuation(data)?,
            None => self.encode_full(segment)?,
        };

        let mut lead_in = Vec::with_capacity(28);
        lead_in.extend_from_slice(&SEGMENT_TAG);
        lead_in.extend_from_slice(&toc.to_le_bytes());
        let mut enc = Encoder {
            out: &mut lead_in,
            big_endian: toc & TOC_BIG_ENDIAN != 0,
        };
        enc.u32(FORMAT_VERSION);
        enc.u64((metadata.len() + raw.len()) as u64);
        enc.u64(metadata.len() as u64);

        for bytes in [&lead_in, &metadata, &raw] {
            self.out.write_all(bytes).map_err(|e| self.write_error(e))?;
        }
        debug!(
            path = %self.path,
            toc = format_args!("{toc:#x}"),
            metadata_bytes = metadata.len(),
            raw_bytes = raw.len(),
            "wrote segment"
        );
        Ok(())
    }

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Io`] if flushing fails.
    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|e| self.write_error(e))?;
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> WriteError {
        WriteError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn unsupported(&self, reason: impl Into<String>) -> WriteError {
        WriteError::Layout {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    #[allow(clippy::cast_possible_truncation)] // Object and property counts are tiny
    fn encode_full(&mut self, segment: &Segment) -> Result<(u32, Vec<u8>, Vec<u8>)> {
        let objects = segment.ordered_objects();
        let big_endian = segment.big_endian;

        let mut metadata = Vec::new();
        let mut enc = Encoder {
            out: &mut metadata,
            big_endian,
        };
        enc.u32(objects.len() as u32);
        for object in &objects {
            enc.string(&object.path.format());
            match &object.data {
                None => enc.u32(NO_RAW_DATA),
                Some(data) => {
                    let is_string = data.data_type() == DataType::String;
                    enc.u32(if is_string { 28 } else { 20 });
                    enc.u32(data.data_type().code());
                    enc.u32(1);
                    enc.u64(data.len() as u64);
                    if is_string {
                        enc.u64(data.string_bytes());
                    }
                }
            }
            enc.u32(object.properties.len() as u32);
            for (name, value) in &object.properties {
                enc.property(name, value);
            }
        }

        let channels: Vec<&ChannelData> = objects.iter().filter_map(|o| o.data.as_ref()).collect();
        let raw = self.encode_raw(&channels, segment.interleaved, big_endian)?;

        let mut toc = TOC_META_DATA | TOC_NEW_OBJ_LIST;
        if !channels.is_empty() {
            toc |= TOC_RAW_DATA;
        }
        if segment.interleaved {
            toc |= TOC_INTERLEAVED;
        }
        if big_endian {
            toc |= TOC_BIG_ENDIAN;
        }

        self.layout = Some(Layout {
            channels: channels.iter().map(|d| (d.data_type(), d.len())).collect(),
            interleaved: segment.interleaved,
            big_endian,
        });
        Ok((toc, metadata, raw))
    }

    fn encode_continuation(&mut self, data: &[ChannelData]) -> Result<(u32, Vec<u8>, Vec<u8>)> {
        let Some(layout) = self.layout.clone() else {
            return Err(self
                .unsupported("continuation segment written before any layout")
                .into());
        };
        let shape: Vec<(DataType, usize)> = data.iter().map(|d| (d.data_type(), d.len())).collect();
        if shape != layout.channels {
            return Err(self
                .unsupported("continuation segment does not match the previous layout")
                .into());
        }
        let channels: Vec<&ChannelData> = data.iter().collect();
        let raw = self.encode_raw(&channels, layout.interleaved, layout.big_endian)?;

        let mut toc = TOC_RAW_DATA;
        if layout.interleaved {
            toc |= TOC_INTERLEAVED;
        }
        if layout.big_endian {
            toc |= TOC_BIG_ENDIAN;
        }
        Ok((toc, Vec::new(), raw))
    }

    fn encode_raw(
        &self,
        channels: &[&ChannelData],
        interleaved: bool,
        big_endian: bool,
    ) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        if !interleaved {
            for data in channels {
                data.encode(&mut raw, big_endian);
            }
            return Ok(raw);
        }

        if channels.iter().any(|d| d.data_type() == DataType::String) {
            return Err(self.unsupported("string channels cannot be interleaved").into());
        }
        let rows = channels.first().map_or(0, |d| d.len());
        if channels.iter().any(|d| d.len() != rows) {
            return Err(self
                .unsupported("interleaved channels must have equal lengths")
                .into());
        }
        for row in 0..rows {
            for data in channels {
                data.encode_value(row, &mut raw, big_endian);
            }
        }
        Ok(raw)
    }
}
