//! TDMS binary format decoding.
//!
//! A TDMS file is a sequence of segments. Each segment starts with a fixed
//! 28-byte lead-in, optionally followed by metadata describing objects and
//! their properties, followed by raw sample data.
//!
//! # Segment Layout
//!
//! ```text
//! [0..4)     "TDSm" tag
//! [4..8)     ToC bitmask (always little-endian)
//! [8..12)    Format version (4712 or 4713), byte order per ToC from here on
//! [12..20)   Next segment offset, relative to the end of the lead-in
//! [20..28)   Raw data offset, relative to the end of the lead-in
//! [28..)     Metadata, then raw data
//! ```
//!
//! Decoding here is metadata-only. For every channel the parser records
//! where its values live in the file as a list of [`Extent`]s; sample bytes
//! are only decoded when a window is read.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{FileReadError, Result};
use crate::property::{Properties, PropertyValue, Timestamp};

/// Magic tag at the start of every segment.
pub(crate) const SEGMENT_TAG: [u8; 4] = *b"TDSm";

/// Size of the segment lead-in in bytes.
pub(crate) const LEAD_IN_SIZE: u64 = 28;

/// Format version written by current NI software.
pub(crate) const FORMAT_VERSION: u32 = 4713;

/// ToC flag: segment contains metadata.
pub(crate) const TOC_META_DATA: u32 = 1 << 1;
/// ToC flag: segment resets the list of objects carrying raw data.
pub(crate) const TOC_NEW_OBJ_LIST: u32 = 1 << 2;
/// ToC flag: segment contains raw data.
pub(crate) const TOC_RAW_DATA: u32 = 1 << 3;
/// ToC flag: raw data is interleaved rather than contiguous per channel.
pub(crate) const TOC_INTERLEAVED: u32 = 1 << 5;
/// ToC flag: metadata and raw data are big-endian.
pub(crate) const TOC_BIG_ENDIAN: u32 = 1 << 6;
/// ToC flag: segment contains DAQmx raw data.
pub(crate) const TOC_DAQMX_RAW_DATA: u32 = 1 << 7;

/// Raw data index marker: object has no data in this segment.
pub(crate) const NO_RAW_DATA: u32 = 0xFFFF_FFFF;
/// Raw data index marker: index is identical to the previous segment's.
pub(crate) const SAME_RAW_DATA_INDEX: u32 = 0x0000_0000;
/// Raw data index marker: DAQmx format changing scaler.
const DAQMX_FORMAT_CHANGING_SCALER: u32 = 0x6912_0000;
/// Raw data index marker: DAQmx digital line scaler.
const DAQMX_DIGITAL_LINE_SCALER: u32 = 0x6913_0000;

/// Element data types defined by the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// No value.
    Void,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Single precision float (with or without unit).
    F32,
    /// Double precision float (with or without unit).
    F64,
    /// Length-prefixed UTF-8 string.
    String,
    /// Boolean, one byte.
    Bool,
    /// 128-bit timestamp.
    Timestamp,
    /// DAQmx raw data placeholder.
    DaqmxRaw,
}

impl DataType {
    /// Decodes a type code.
    pub fn from_code(code: u32) -> Option<Self> {
        let data_type = match code {
            0x00 => Self::Void,
            0x01 => Self::I8,
            0x02 => Self::I16,
            0x03 => Self::I32,
            0x04 => Self::I64,
            0x05 => Self::U8,
            0x06 => Self::U16,
            0x07 => Self::U32,
            0x08 => Self::U64,
            0x09 | 0x19 => Self::F32,
            0x0A | 0x1A => Self::F64,
            0x20 => Self::String,
            0x21 => Self::Bool,
            0x44 => Self::Timestamp,
            0xFFFF_FFFF => Self::DaqmxRaw,
            _ => return None,
        };
        Some(data_type)
    }

    /// The canonical type code written for this type.
    pub fn code(self) -> u32 {
        match self {
            Self::Void => 0x00,
            Self::I8 => 0x01,
            Self::I16 => 0x02,
            Self::I32 => 0x03,
            Self::I64 => 0x04,
            Self::U8 => 0x05,
            Self::U16 => 0x06,
            Self::U32 => 0x07,
            Self::U64 => 0x08,
            Self::F32 => 0x09,
            Self::F64 => 0x0A,
            Self::String => 0x20,
            Self::Bool => 0x21,
            Self::Timestamp => 0x44,
            Self::DaqmxRaw => 0xFFFF_FFFF,
        }
    }

    /// Fixed element width in bytes, or `None` for variable-width strings.
    pub fn width(self) -> Option<u64> {
        match self {
            Self::Void => Some(0),
            Self::I8 | Self::U8 | Self::Bool => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Timestamp => Some(16),
            Self::String | Self::DaqmxRaw => None,
        }
    }

    /// Whether elements of this type can be read as `f64` samples.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Self::Void | Self::String | Self::Timestamp | Self::DaqmxRaw
        )
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
            Self::DaqmxRaw => "daqmx",
        }
    }

    /// Decodes one element from exactly `width()` bytes as an `f64` sample.
    #[allow(clippy::cast_precision_loss)] // 64-bit integer samples widen lossily, as NumPy does
    fn decode_sample(self, bytes: &[u8], big_endian: bool) -> Option<f64> {
        macro_rules! num {
            ($ty:ty) => {{
                let raw: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().ok()?;
                if big_endian {
                    <$ty>::from_be_bytes(raw)
                } else {
                    <$ty>::from_le_bytes(raw)
                }
            }};
        }
        let value = match self {
            Self::I8 => f64::from(num!(i8)),
            Self::I16 => f64::from(num!(i16)),
            Self::I32 => f64::from(num!(i32)),
            Self::I64 => num!(i64) as f64,
            Self::U8 => f64::from(num!(u8)),
            Self::U16 => f64::from(num!(u16)),
            Self::U32 => f64::from(num!(u32)),
            Self::U64 => num!(u64) as f64,
            Self::F32 => f64::from(num!(f32)),
            Self::F64 => num!(f64),
            Self::Bool => f64::from(u8::from(*bytes.first()? != 0)),
            Self::Void | Self::String | Self::Timestamp | Self::DaqmxRaw => return None,
        };
        Some(value)
    }
}

/// A run of equally spaced values for one channel inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Extent {
    /// Byte offset of the first value.
    pub offset: u64,
    /// Number of values in the run.
    pub count: u64,
    /// Distance in bytes between consecutive values.
    pub stride: u64,
    /// Byte order of the values.
    pub big_endian: bool,
}

impl Extent {
    /// Byte offset just past the last value, for contiguous runs.
    fn end(&self) -> Option<u64> {
        self.count
            .checked_mul(self.stride)
            .and_then(|bytes| self.offset.checked_add(bytes))
    }
}

/// Structural metadata for a channel.
#[derive(Debug, Clone)]
pub(crate) struct ChannelMeta {
    pub name: String,
    pub properties: Properties,
    pub data_type: Option<DataType>,
    pub len: u64,
    pub extents: Vec<Extent>,
    /// Set when some of the channel's data cannot be decoded.
    pub unsupported: Option<String>,
}

impl ChannelMeta {
    fn new(name: String) -> Self {
        Self {
            name,
            properties: Properties::new(),
            data_type: None,
            len: 0,
            extents: Vec::new(),
            unsupported: None,
        }
    }

    /// Appends an extent, merging it into the previous one when contiguous.
    fn push_extent(&mut self, extent: Extent, width: u64) {
        if let Some(last) = self.extents.last_mut()
            && last.stride == width
            && extent.stride == width
            && last.big_endian == extent.big_endian
            && last.end() == Some(extent.offset)
            && let Some(count) = last.count.checked_add(extent.count)
        {
            last.count = count;
            return;
        }
        self.extents.push(extent);
    }
}

/// Structural metadata for a group.
#[derive(Debug, Clone)]
pub(crate) struct GroupMeta {
    pub name: String,
    pub properties: Properties,
    pub channels: Vec<ChannelMeta>,
}

/// Structural metadata for a whole file.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileMeta {
    pub properties: Properties,
    pub groups: Vec<GroupMeta>,
    pub segment_count: usize,
}

/// Parsed object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ObjectPath {
    Root,
    Group(String),
    Channel(String, String),
}

impl ObjectPath {
    /// Parses `/`, `/'group'` or `/'group'/'channel'`.
    pub fn parse(path: &str) -> Option<Self> {
        if path == "/" {
            return Some(Self::Root);
        }
        let mut components = Vec::new();
        let mut chars = path.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '/' || chars.next() != Some('\'') {
                return None;
            }
            let mut name = String::new();
            loop {
                match chars.next()? {
                    '\'' if chars.peek() == Some(&'\'') => {
                        chars.next();
                        name.push('\'');
                    }
                    '\'' => break,
                    other => name.push(other),
                }
            }
            components.push(name);
        }
        match components.len() {
            1 => components.pop().map(Self::Group),
            2 => {
                let channel = components.pop()?;
                let group = components.pop()?;
                Some(Self::Channel(group, channel))
            }
            _ => None,
        }
    }

    /// Formats the path with quote escaping.
    pub fn format(&self) -> String {
        let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
        match self {
            Self::Root => "/".to_string(),
            Self::Group(g) => format!("/{}", quote(g)),
            Self::Channel(g, c) => format!("/{}/{}", quote(g), quote(c)),
        }
    }
}

/// Raw data layout of one channel within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawIndex {
    data_type: DataType,
    count: u64,
    /// Total byte size for string channels.
    string_bytes: u64,
    /// Per-value width of the shared DAQmx buffer.
    daqmx_width: u64,
}

impl RawIndex {
    /// Bytes one chunk of this channel occupies, or `None` on overflow.
    fn chunk_bytes(&self) -> Option<u64> {
        match self.data_type {
            DataType::String => Some(self.string_bytes),
            DataType::DaqmxRaw => self.count.checked_mul(self.daqmx_width),
            other => self.count.checked_mul(other.width().unwrap_or(0)),
        }
    }
}

/// Channel position within [`FileMeta::groups`].
type ChannelKey = (usize, usize);

/// Bounds-checked reader over the file bytes.
struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
    path: &'a str,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8], pos: usize, big_endian: bool, path: &'a str) -> Self {
        Self {
            bytes,
            pos,
            big_endian,
            path,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FileReadError {
        format_error(self.path, self.pos as u64, reason)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.error(format!("unexpected end of data reading {n} bytes")))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.array::<4>()?;
        Ok(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn u64(&mut self) -> Result<u64> {
        let raw = self.array::<8>()?;
        Ok(if self.big_endian {
            u64::from_be_bytes(raw)
        } else {
            u64::from_le_bytes(raw)
        })
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        let text = String::from_utf8(raw.to_vec())
            .map_err(|e| self.error(format!("invalid UTF-8 string: {e}")))?;
        Ok(text)
    }

    #[allow(clippy::cast_possible_wrap)] // Reinterpreting two's complement bytes
    fn value(&mut self, data_type: DataType) -> Result<PropertyValue> {
        let value = match data_type {
            DataType::I8 => PropertyValue::Int(i64::from(self.u8()? as i8)),
            DataType::I16 => {
                let raw = self.array::<2>()?;
                let v = if self.big_endian {
                    i16::from_be_bytes(raw)
                } else {
                    i16::from_le_bytes(raw)
                };
                PropertyValue::Int(i64::from(v))
            }
            DataType::I32 => PropertyValue::Int(i64::from(self.u32()? as i32)),
            DataType::I64 => PropertyValue::Int(self.u64()? as i64),
            DataType::U8 => PropertyValue::UInt(u64::from(self.u8()?)),
            DataType::U16 => {
                let raw = self.array::<2>()?;
                let v = if self.big_endian {
                    u16::from_be_bytes(raw)
                } else {
                    u16::from_le_bytes(raw)
                };
                PropertyValue::UInt(u64::from(v))
            }
            DataType::U32 => PropertyValue::UInt(u64::from(self.u32()?)),
            DataType::U64 => PropertyValue::UInt(self.u64()?),
            DataType::F32 => PropertyValue::Float(f64::from(f32::from_bits(self.u32()?))),
            DataType::F64 => PropertyValue::Float(f64::from_bits(self.u64()?)),
            DataType::String => PropertyValue::String(self.string()?),
            DataType::Bool => PropertyValue::Bool(self.u8()? != 0),
            DataType::Timestamp => {
                // Little-endian stores fractions first, big-endian seconds first.
                let (seconds, fractions) = if self.big_endian {
                    let seconds = self.u64()? as i64;
                    (seconds, self.u64()?)
                } else {
                    let fractions = self.u64()?;
                    (self.u64()? as i64, fractions)
                };
                PropertyValue::Timestamp(Timestamp { seconds, fractions })
            }
            DataType::Void | DataType::DaqmxRaw => {
                return Err(self
                    .error(format!("property of type {} has no value", data_type.name()))
                    .into());
            }
        };
        Ok(value)
    }
}

fn format_error(path: &str, offset: u64, reason: impl Into<String>) -> FileReadError {
    FileReadError::Format {
        path: path.to_string(),
        offset,
        reason: reason.into(),
    }
}

fn to_usize(path: &str, offset: u64, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        format_error(path, offset, format!("offset {value} exceeds address space")).into()
    })
}

/// Incremental parser state carried across segments.
struct Parser<'a> {
    bytes: &'a [u8],
    path: &'a str,
    meta: FileMeta,
    group_index: HashMap<String, usize>,
    channel_index: HashMap<(String, String), ChannelKey>,
    /// Objects carrying raw data in the current segment, in order.
    active: Vec<(ChannelKey, Option<RawIndex>)>,
    /// Last known raw data index per channel.
    previous: HashMap<ChannelKey, RawIndex>,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8], path: &'a str) -> Self {
        Self {
            bytes,
            path,
            meta: FileMeta::default(),
            group_index: HashMap::new(),
            channel_index: HashMap::new(),
            active: Vec::new(),
            previous: HashMap::new(),
        }
    }

    fn group_mut(&mut self, name: &str) -> usize {
        if let Some(&index) = self.group_index.get(name) {
            return index;
        }
        let index = self.meta.groups.len();
        self.meta.groups.push(GroupMeta {
            name: name.to_string(),
            properties: Properties::new(),
            channels: Vec::new(),
        });
        self.group_index.insert(name.to_string(), index);
        index
    }

    fn channel_mut(&mut self, group: &str, channel: &str) -> ChannelKey {
        let lookup = (group.to_string(), channel.to_string());
        if let Some(&key) = self.channel_index.get(&lookup) {
            return key;
        }
        let g = self.group_mut(group);
        let c = self.meta.groups[g].channels.len();
        self.meta.groups[g]
            .channels
            .push(ChannelMeta::new(channel.to_string()));
        self.channel_index.insert(lookup, (g, c));
        (g, c)
    }

    fn channel(&mut self, key: ChannelKey) -> &mut ChannelMeta {
        &mut self.meta.groups[key.0].channels[key.1]
    }

    fn run(mut self) -> Result<FileMeta> {
        let file_len = self.bytes.len() as u64;
        let mut offset = 0u64;

        while offset < file_len {
            offset = self.segment(offset, file_len)?;
            self.meta.segment_count += 1;
        }

        if self.meta.segment_count == 0 {
            return Err(format_error(self.path, 0, "file is empty").into());
        }

        Ok(self.meta)
    }

    /// Parses the segment starting at `offset`, returning the next segment's offset.
    fn segment(&mut self, offset: u64, file_len: u64) -> Result<u64> {
        if file_len - offset < LEAD_IN_SIZE {
            return Err(format_error(
                self.path,
                offset,
                format!("truncated lead-in: {} bytes left", file_len - offset),
            )
            .into());
        }

        let start = to_usize(self.path, offset, offset)?;
        let mut lead_in = Decoder::new(self.bytes, start, false, self.path);
        let tag = lead_in.array::<4>()?;
        if tag != SEGMENT_TAG {
            return Err(format_error(
                self.path,
                offset,
                format!("invalid segment tag: expected {SEGMENT_TAG:?}, found {tag:?}"),
            )
            .into());
        }
        let toc = lead_in.u32()?;
        lead_in.big_endian = toc & TOC_BIG_ENDIAN != 0;
        let version = lead_in.u32()?;
        let next_segment = lead_in.u64()?;
        let raw_data_offset = lead_in.u64()?;

        if version != FORMAT_VERSION && version != 4712 {
            warn!(path = self.path, offset, version, "unexpected TDMS version");
        }

        let body_start = offset + LEAD_IN_SIZE;
        let (segment_end, complete) = if next_segment == u64::MAX {
            debug!(path = self.path, offset, "incomplete final segment, reading to end of file");
            (file_len, false)
        } else {
            match body_start.checked_add(next_segment) {
                Some(end) if end <= file_len => (end, true),
                _ => {
                    warn!(
                        path = self.path,
                        offset, next_segment, "segment extends past end of file, truncating"
                    );
                    (file_len, false)
                }
            }
        };
        let data_start = body_start
            .checked_add(raw_data_offset)
            .filter(|start| *start <= segment_end)
            .ok_or_else(|| {
                format_error(
                    self.path,
                    offset,
                    format!("raw data offset {raw_data_offset} lies outside the segment"),
                )
            })?;

        let big_endian = toc & TOC_BIG_ENDIAN != 0;
        debug!(
            path = self.path,
            offset,
            toc = format_args!("{toc:#x}"),
            big_endian,
            "parsing segment"
        );

        if toc & TOC_META_DATA != 0 {
            if toc & TOC_NEW_OBJ_LIST != 0 {
                self.active.clear();
            }
            let body = to_usize(self.path, body_start, body_start)?;
            self.metadata(Decoder::new(self.bytes, body, big_endian, self.path))?;
        }

        if toc & TOC_RAW_DATA != 0 {
            if toc & TOC_DAQMX_RAW_DATA != 0 {
                debug!(path = self.path, offset, "segment carries DAQmx raw data");
            }
            self.raw_data(
                data_start,
                segment_end,
                complete,
                toc & TOC_INTERLEAVED != 0,
                big_endian,
            )?;
        }

        Ok(segment_end)
    }

    fn metadata(&mut self, mut decoder: Decoder<'_>) -> Result<()> {
        let object_count = decoder.u32()?;
        for _ in 0..object_count {
            let object_path = decoder.string()?;
            let parsed = ObjectPath::parse(&object_path)
                .ok_or_else(|| decoder.error(format!("invalid object path '{object_path}'")))?;
            let index_marker = decoder.u32()?;

            let key = match &parsed {
                ObjectPath::Root => None,
                ObjectPath::Group(g) => {
                    self.group_mut(g);
                    None
                }
                ObjectPath::Channel(g, c) => Some(self.channel_mut(g, c)),
            };

            let raw_index = match index_marker {
                NO_RAW_DATA => None,
                SAME_RAW_DATA_INDEX => {
                    let previous = key.and_then(|k| self.previous.get(&k).copied());
                    Some(previous.ok_or_else(|| {
                        decoder.error(format!(
                            "object '{object_path}' reuses a raw data index it never had"
                        ))
                    })?)
                }
                DAQMX_FORMAT_CHANGING_SCALER | DAQMX_DIGITAL_LINE_SCALER => {
                    Some(Self::daqmx_index(&mut decoder, index_marker)?)
                }
                _ => Some(Self::raw_index(&mut decoder)?),
            };

            if let Some(key) = key {
                if let Some(index) = raw_index {
                    self.previous.insert(key, index);
                    let channel = self.channel(key);
                    if channel.data_type.is_none() || index.data_type != DataType::Void {
                        channel.data_type = Some(index.data_type);
                    }
                    if index.data_type == DataType::DaqmxRaw {
                        channel.unsupported = Some("DAQmx raw data is not supported".to_string());
                    }
                }
                match self.active.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = raw_index,
                    None if raw_index.is_some() => self.active.push((key, raw_index)),
                    None => {}
                }
            } else if raw_index.is_some() {
                return Err(decoder
                    .error(format!("non-channel object '{object_path}' has raw data"))
                    .into());
            }

            let property_count = decoder.u32()?;
            for _ in 0..property_count {
                let name = decoder.string()?;
                let code = decoder.u32()?;
                let data_type = DataType::from_code(code)
                    .ok_or_else(|| decoder.error(format!("unknown property type {code:#x}")))?;
                let value = decoder.value(data_type)?;
                let properties = match &parsed {
                    ObjectPath::Root => &mut self.meta.properties,
                    ObjectPath::Group(g) => {
                        let index = self.group_mut(g);
                        &mut self.meta.groups[index].properties
                    }
                    ObjectPath::Channel(..) => match key {
                        Some(key) => &mut self.channel(key).properties,
                        None => continue,
                    },
                };
                properties.insert(name, value);
            }
        }
        Ok(())
    }

    fn raw_index(decoder: &mut Decoder<'_>) -> Result<RawIndex> {
        let code = decoder.u32()?;
        let data_type = DataType::from_code(code)
            .ok_or_else(|| decoder.error(format!("unknown raw data type {code:#x}")))?;
        let dimension = decoder.u32()?;
        if dimension != 1 {
            return Err(decoder
                .error(format!("raw data dimension must be 1, found {dimension}"))
                .into());
        }
        let count = decoder.u64()?;
        let string_bytes = if data_type == DataType::String {
            decoder.u64()?
        } else {
            0
        };
        let index = RawIndex {
            data_type,
            count,
            string_bytes,
            daqmx_width: 0,
        };
        if index.chunk_bytes().is_none() {
            return Err(decoder
                .error(format!(
                    "{count} values of type {} overflow the raw data size",
                    data_type.name()
                ))
                .into());
        }
        Ok(index)
    }

    fn daqmx_index(decoder: &mut Decoder<'_>, marker: u32) -> Result<RawIndex> {
        let _data_type = decoder.u32()?;
        let _dimension = decoder.u32()?;
        let count = decoder.u64()?;
        let scaler_count = decoder.u32()?;
        let scaler_bytes = if marker == DAQMX_DIGITAL_LINE_SCALER {
            17
        } else {
            20
        };
        for _ in 0..scaler_count {
            decoder.take(scaler_bytes)?;
        }
        let width_count = decoder.u32()?;
        let mut daqmx_width = 0;
        for i in 0..width_count {
            let width = decoder.u32()?;
            if i == 0 {
                daqmx_width = u64::from(width);
            }
        }
        let index = RawIndex {
            data_type: DataType::DaqmxRaw,
            count,
            string_bytes: 0,
            daqmx_width,
        };
        if index.chunk_bytes().is_none() {
            return Err(decoder
                .error(format!("{count} DAQmx values overflow the raw data size"))
                .into());
        }
        Ok(index)
    }

    /// Records where each active channel's values lie in this segment.
    ///
    /// `complete` is false for a final segment cut short by the writer, where
    /// a chunk may legitimately be missing its tail.
    fn raw_data(
        &mut self,
        data_start: u64,
        segment_end: u64,
        complete: bool,
        interleaved: bool,
        big_endian: bool,
    ) -> Result<()> {
        let layout: Vec<(ChannelKey, RawIndex, u64)> = self
            .active
            .iter()
            .filter_map(|(key, index)| index.map(|index| (*key, index)))
            .filter(|(_, index)| index.count > 0)
            .map(|(key, index)| -> Result<(ChannelKey, RawIndex, u64)> {
                let bytes = index.chunk_bytes().ok_or_else(|| {
                    format_error(self.path, data_start, "raw data index overflows the chunk size")
                })?;
                Ok((key, index, bytes))
            })
            .collect::<Result<_>>()?;

        let data_len = segment_end - data_start;
        let daqmx = layout
            .iter()
            .any(|(_, index, _)| index.data_type == DataType::DaqmxRaw);
        // DAQmx channels share one raw buffer, so a chunk is one channel's worth.
        let chunk_size = if daqmx {
            layout.first().map_or(Some(0), |(_, _, bytes)| Some(*bytes))
        } else {
            layout
                .iter()
                .try_fold(0u64, |total, (_, _, bytes)| total.checked_add(*bytes))
        };
        let chunk_size = chunk_size
            .ok_or_else(|| format_error(self.path, data_start, "raw data chunk size overflows"))?;
        if chunk_size == 0 {
            return Ok(());
        }
        if complete && chunk_size > data_len {
            return Err(format_error(
                self.path,
                data_start,
                format!("raw data index needs {chunk_size} bytes but the segment holds {data_len}"),
            )
            .into());
        }

        let chunk_count = data_len / chunk_size;
        if data_len % chunk_size != 0 {
            warn!(
                path = self.path,
                data_start,
                trailing_bytes = data_len % chunk_size,
                "ignoring partial trailing chunk"
            );
        }

        if daqmx || interleaved {
            let row_width: u64 = layout
                .iter()
                .map(|(_, index, _)| index.data_type.width().unwrap_or(0))
                .sum();
            let mut column = 0;
            for (key, index, _) in &layout {
                let width = index.data_type.width();
                let added = self.checked_len(*key, index.count, chunk_count, data_start)?;
                let channel = self.channel(*key);
                channel.len = added;
                match width {
                    Some(width) if !daqmx && width > 0 => {
                        for chunk in 0..chunk_count {
                            channel.push_extent(
                                Extent {
                                    offset: data_start + chunk * chunk_size + column,
                                    count: index.count,
                                    stride: row_width,
                                    big_endian,
                                },
                                width,
                            );
                        }
                        column += width;
                    }
                    _ => {
                        if channel.unsupported.is_none() {
                            channel.unsupported = Some(format!(
                                "{} data in an interleaved segment",
                                index.data_type.name()
                            ));
                        }
                    }
                }
            }
            return Ok(());
        }

        for chunk in 0..chunk_count {
            let mut cursor = data_start + chunk * chunk_size;
            for (key, index, bytes) in &layout {
                let added = self.checked_len(*key, index.count, 1, cursor)?;
                let channel = self.channel(*key);
                channel.len = added;
                if let Some(width) = index.data_type.width().filter(|w| *w > 0) {
                    channel.push_extent(
                        Extent {
                            offset: cursor,
                            count: index.count,
                            stride: width,
                            big_endian,
                        },
                        width,
                    );
                }
                cursor += bytes;
            }
        }
        Ok(())
    }

    /// Channel length after adding `count * chunks` values.
    fn checked_len(
        &mut self,
        key: ChannelKey,
        count: u64,
        chunks: u64,
        offset: u64,
    ) -> Result<u64> {
        let path = self.path;
        let channel = self.channel(key);
        count
            .checked_mul(chunks)
            .and_then(|added| channel.len.checked_add(added))
            .ok_or_else(|| {
                format_error(
                    path,
                    offset,
                    format!("value count of channel '{}' overflows", channel.name),
                )
                .into()
            })
    }
}

/// Parses the structural metadata of a whole file.
///
/// # Errors
///
/// Returns [`FileReadError::Format`] if the bytes are not a valid TDMS file.
pub(crate) fn parse(bytes: &[u8], path: &str) -> Result<FileMeta> {
    let meta = Parser::new(bytes, path).run()?;
    debug!(
        path,
        segments = meta.segment_count,
        groups = meta.groups.len(),
        "parsed file metadata"
    );
    Ok(meta)
}

/// Decodes `count` samples of `channel` starting at sample `start`.
///
/// The caller has already clamped `start` and `count` to the channel length.
///
/// # Errors
///
/// Returns [`FileReadError::Unsupported`] for non-numeric channels and
/// [`FileReadError::Format`] if an extent points outside `bytes`.
pub(crate) fn read_samples(
    bytes: &[u8],
    path: &str,
    channel: &ChannelMeta,
    start: u64,
    count: u64,
) -> Result<Vec<f64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if let Some(reason) = &channel.unsupported {
        return Err(unsupported(path, channel, reason));
    }
    let data_type = match channel.data_type {
        Some(data_type) if data_type.is_numeric() => data_type,
        other => {
            let name = other.map_or("untyped", DataType::name);
            let reason = format!("{name} samples cannot be read as numbers");
            return Err(unsupported(path, channel, &reason));
        }
    };
    let width = data_type.width().unwrap_or(0);

    let mut samples = Vec::with_capacity(to_usize(path, 0, count)?);
    let mut skip = start;
    for extent in &channel.extents {
        let wanted = count - samples.len() as u64;
        if wanted == 0 {
            break;
        }
        if skip >= extent.count {
            skip -= extent.count;
            continue;
        }
        let take = (extent.count - skip).min(wanted);
        for i in skip..skip + take {
            let offset = extent.offset + i * extent.stride;
            let lo = to_usize(path, offset, offset)?;
            let element = lo
                .checked_add(width as usize)
                .and_then(|hi| bytes.get(lo..hi))
                .ok_or_else(|| format_error(path, offset, "sample lies outside the file"))?;
            let value = data_type
                .decode_sample(element, extent.big_endian)
                .ok_or_else(|| format_error(path, offset, "undecodable sample"))?;
            samples.push(value);
        }
        skip = 0;
    }
    Ok(samples)
}

fn unsupported(path: &str, channel: &ChannelMeta, reason: &str) -> crate::error::ScopeError {
    FileReadError::Unsupported {
        path: path.to_string(),
        reason: format!("channel '{}': {reason}", channel.name),
    }
    .into()
}
