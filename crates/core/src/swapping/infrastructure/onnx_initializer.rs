//! Minimal reader for ONNX graph initializers.
//!
//! ONNX Runtime does not expose initializer values through its session API,
//! but the swap model keeps its embedding-projection matrix as the final
//! graph initializer. This walks just enough of the protobuf wire format
//! (`ModelProto.graph` → `GraphProto.initializer` → `TensorProto`) to pull
//! that tensor out as `f32` values. The model file is walked with seeks so
//! only the chosen tensor's bytes are ever held in memory.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ModelProto
const MODEL_GRAPH: u64 = 7;
// GraphProto
const GRAPH_INITIALIZER: u64 = 5;
// TensorProto
const TENSOR_DIMS: u64 = 1;
const TENSOR_DATA_TYPE: u64 = 2;
const TENSOR_FLOAT_DATA: u64 = 4;
const TENSOR_NAME: u64 = 8;
const TENSOR_RAW_DATA: u64 = 9;
const TENSOR_DATA_LOCATION: u64 = 14;

const DATA_TYPE_FLOAT: i64 = 1;
const DATA_LOCATION_EXTERNAL: i64 = 1;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

#[derive(Error, Debug)]
pub enum InitializerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read ONNX model: {0}")]
    Read(#[from] std::io::Error),
    #[error("malformed ONNX protobuf: {0}")]
    Malformed(&'static str),
    #[error("ONNX model has no graph")]
    MissingGraph,
    #[error("ONNX graph has no initializers")]
    NoInitializers,
    #[error("initializer '{name}' has unsupported data type {data_type}")]
    UnsupportedType { name: String, data_type: i64 },
    #[error("initializer '{0}' stores its data externally")]
    ExternalData(String),
    #[error("initializer '{name}' has {actual} values, dims {dims:?} require {expected}")]
    ShapeMismatch {
        name: String,
        dims: Vec<i64>,
        expected: usize,
        actual: usize,
    },
}

/// A dense float tensor pulled from the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct InitializerTensor {
    pub name: String,
    pub dims: Vec<i64>,
    pub data: Vec<f32>,
}

/// Read the last initializer of the ONNX model at `path`.
pub fn read_last_initializer(path: &Path) -> Result<InitializerTensor, InitializerError> {
    let file = File::open(path).map_err(|e| InitializerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    last_initializer(file)
}

/// Locate the last `GraphProto.initializer` in a serialized model and
/// decode it. Every other field is skipped without being read.
pub fn last_initializer<R: Read + Seek>(source: R) -> Result<InitializerTensor, InitializerError> {
    let mut stream = FieldStream::new(source)?;

    let mut graph = None;
    while let Some((field, wire)) = stream.next_key()? {
        if field == MODEL_GRAPH && wire == WIRE_LEN {
            graph = Some(stream.skip_len()?);
        } else {
            stream.skip(wire)?;
        }
    }
    stream.enter(graph.ok_or(InitializerError::MissingGraph)?)?;

    let mut last = None;
    while let Some((field, wire)) = stream.next_key()? {
        if field == GRAPH_INITIALIZER && wire == WIRE_LEN {
            last = Some(stream.skip_len()?);
        } else {
            stream.skip(wire)?;
        }
    }
    let tensor = stream.read_span(last.ok_or(InitializerError::NoInitializers)?)?;
    parse_tensor(&tensor)
}

fn parse_tensor(bytes: &[u8]) -> Result<InitializerTensor, InitializerError> {
    let mut name = String::new();
    let mut dims = Vec::new();
    let mut data_type = 0i64;
    let mut external = false;
    let mut raw: Option<&[u8]> = None;
    let mut floats = Vec::new();

    let mut reader = WireReader::new(bytes);
    while let Some((field, wire)) = reader.next_key()? {
        match (field, wire) {
            (TENSOR_DIMS, WIRE_VARINT) => dims.push(reader.read_varint()? as i64),
            (TENSOR_DIMS, WIRE_LEN) => {
                let mut packed = WireReader::new(reader.read_len()?);
                while !packed.is_empty() {
                    dims.push(packed.read_varint()? as i64);
                }
            }
            (TENSOR_DATA_TYPE, WIRE_VARINT) => data_type = reader.read_varint()? as i64,
            (TENSOR_FLOAT_DATA, WIRE_FIXED32) => floats.push(f32::from_le_bytes(reader.read_fixed32()?)),
            (TENSOR_FLOAT_DATA, WIRE_LEN) => floats.extend(le_floats(reader.read_len()?)?),
            (TENSOR_NAME, WIRE_LEN) => {
                name = String::from_utf8_lossy(reader.read_len()?).into_owned();
            }
            (TENSOR_RAW_DATA, WIRE_LEN) => raw = Some(reader.read_len()?),
            (TENSOR_DATA_LOCATION, WIRE_VARINT) => {
                external = reader.read_varint()? as i64 == DATA_LOCATION_EXTERNAL;
            }
            (_, other) => reader.skip(other)?,
        }
    }

    if external {
        return Err(InitializerError::ExternalData(name));
    }
    if data_type != DATA_TYPE_FLOAT {
        return Err(InitializerError::UnsupportedType { name, data_type });
    }
    let data = match raw {
        Some(raw) => le_floats(raw)?,
        None => floats,
    };

    let expected = dims.iter().map(|&d| d.max(0) as usize).product::<usize>();
    if expected != data.len() {
        return Err(InitializerError::ShapeMismatch {
            name,
            dims,
            expected,
            actual: data.len(),
        });
    }
    Ok(InitializerTensor { name, dims, data })
}

fn le_floats(bytes: &[u8]) -> Result<Vec<f32>, InitializerError> {
    if bytes.len() % 4 != 0 {
        return Err(InitializerError::Malformed("float payload is not a multiple of 4 bytes"));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Byte range of a length-delimited field within the model file.
#[derive(Clone, Copy, Debug)]
struct Span {
    start: u64,
    len: u64,
}

/// Seekable counterpart of [`WireReader`] for walking a model file.
struct FieldStream<R> {
    reader: BufReader<R>,
    pos: u64,
    end: u64,
}

impl<R: Read + Seek> FieldStream<R> {
    fn new(mut source: R) -> Result<Self, InitializerError> {
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader: BufReader::new(source),
            pos: 0,
            end,
        })
    }

    fn next_key(&mut self) -> Result<Option<(u64, u8)>, InitializerError> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let key = self.read_varint()?;
        Ok(Some((key >> 3, (key & 0x7) as u8)))
    }

    fn read_varint(&mut self) -> Result<u64, InitializerError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            if self.pos >= self.end {
                return Err(InitializerError::Malformed("truncated varint"));
            }
            let mut byte = [0u8; 1];
            self.reader.read_exact(&mut byte)?;
            self.pos += 1;
            value |= u64::from(byte[0] & 0x7f) << shift;
            if byte[0] & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(InitializerError::Malformed("varint longer than 10 bytes"))
    }

    fn advance(&mut self, n: u64) -> Result<(), InitializerError> {
        let target = self
            .pos
            .checked_add(n)
            .filter(|&target| target <= self.end)
            .ok_or(InitializerError::Malformed("field runs past end of buffer"))?;
        let offset = i64::try_from(n).map_err(|_| InitializerError::Malformed("field too large"))?;
        self.reader.seek_relative(offset)?;
        self.pos = target;
        Ok(())
    }

    /// Skip a length-delimited payload, returning where it lives.
    fn skip_len(&mut self) -> Result<Span, InitializerError> {
        let len = self.read_varint()?;
        let start = self.pos;
        self.advance(len)?;
        Ok(Span { start, len })
    }

    fn skip(&mut self, wire: u8) -> Result<(), InitializerError> {
        match wire {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.advance(8),
            WIRE_LEN => self.skip_len().map(|_| ()),
            WIRE_FIXED32 => self.advance(4),
            _ => Err(InitializerError::Malformed("unsupported wire type")),
        }
    }

    /// Restrict further reads to the fields inside `span`.
    fn enter(&mut self, span: Span) -> Result<(), InitializerError> {
        self.reader.seek(SeekFrom::Start(span.start))?;
        self.pos = span.start;
        self.end = span.start + span.len;
        Ok(())
    }

    fn read_span(&mut self, span: Span) -> Result<Vec<u8>, InitializerError> {
        let len = usize::try_from(span.len).map_err(|_| InitializerError::Malformed("field too large"))?;
        self.reader.seek(SeekFrom::Start(span.start))?;
        let mut bytes = vec![0u8; len];
        self.reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Cursor over an in-memory protobuf message.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn next_key(&mut self) -> Result<Option<(u64, u8)>, InitializerError> {
        if self.is_empty() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        Ok(Some((key >> 3, (key & 0x7) as u8)))
    }

    fn read_varint(&mut self) -> Result<u64, InitializerError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or(InitializerError::Malformed("truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(InitializerError::Malformed("varint longer than 10 bytes"))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], InitializerError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(InitializerError::Malformed("field runs past end of buffer"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_len(&mut self) -> Result<&'a [u8], InitializerError> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    fn read_fixed32(&mut self) -> Result<[u8; 4], InitializerError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn skip(&mut self, wire: u8) -> Result<(), InitializerError> {
        match wire {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.take(8).map(|_| ()),
            WIRE_LEN => self.read_len().map(|_| ()),
            WIRE_FIXED32 => self.take(4).map(|_| ()),
            _ => Err(InitializerError::Malformed("unsupported wire type")),
        }
    }
}
