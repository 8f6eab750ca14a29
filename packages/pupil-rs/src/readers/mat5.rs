//! MATLAB level-5 MAT-file decoding.
//!
//! Walks the `miMATRIX` element tree, including `miCOMPRESSED` elements and
//! struct arrays, so arrays nested as `S.output.sample` can be reached by a
//! dotted path. Numeric arrays are widened to f64 (real part only). Cell,
//! char, sparse and object arrays are recorded by class and size but not
//! decoded.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use std::io::Read;

const HEADER_LEN: usize = 128;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// Array classes
const MX_STRUCT_CLASS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

macro_rules! read_as {
    ($endian:expr, $method:ident, $bytes:expr) => {
        match $endian {
            Endian::Little => LittleEndian::$method($bytes),
            Endian::Big => BigEndian::$method($bytes),
        }
    };
}

fn class_name(class: u8) -> &'static str {
    match class {
        1 => "cell",
        2 => "struct",
        3 => "object",
        4 => "char",
        5 => "sparse",
        6 => "double",
        7 => "single",
        8 => "int8",
        9 => "uint8",
        10 => "int16",
        11 => "uint16",
        12 => "int32",
        13 => "uint32",
        14 => "int64",
        15 => "uint64",
        _ => "unknown",
    }
}

/// One decoded array
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric {
        dims: Vec<usize>,
        class: &'static str,
        data: Vec<f64>,
    },
    /// Field values are stored element by element: element `i`, field `j`
    /// is `values[i * fields.len() + j]`.
    Struct {
        dims: Vec<usize>,
        fields: Vec<String>,
        values: Vec<MatValue>,
    },
    Other {
        dims: Vec<usize>,
        class: &'static str,
    },
}

impl MatValue {
    pub fn dims(&self) -> &[usize] {
        match self {
            MatValue::Numeric { dims, .. }
            | MatValue::Struct { dims, .. }
            | MatValue::Other { dims, .. } => dims,
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            MatValue::Numeric { class, .. } | MatValue::Other { class, .. } => class,
            MatValue::Struct { .. } => "struct",
        }
    }

    /// Field of the first struct element, the `S(1).name` of MATLAB.
    pub fn field(&self, name: &str) -> Option<&MatValue> {
        match self {
            MatValue::Struct { fields, values, .. } => {
                let index = fields.iter().position(|f| f == name)?;
                values.get(index)
            }
            _ => None,
        }
    }
}

/// Top-level variables of a level-5 MAT file
#[derive(Debug, Clone, Default)]
pub struct Mat5File {
    variables: Vec<(String, MatValue)>,
}

impl Mat5File {
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!(
                "{} bytes is too short for a MAT-file header",
                bytes.len()
            ));
        }
        let endian = match &bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            _ => return Err("missing MAT-file endian indicator".to_string()),
        };

        let mut variables = Vec::new();
        let mut elements = Elements::new(&bytes[HEADER_LEN..], endian);
        while let Some((data_type, data)) = elements.next_element()? {
            match data_type {
                MI_MATRIX => variables.push(parse_matrix(data, endian)?),
                MI_COMPRESSED => {
                    let mut inflated = Vec::new();
                    ZlibDecoder::new(data)
                        .read_to_end(&mut inflated)
                        .map_err(|e| format!("corrupt compressed element: {}", e))?;
                    let mut inner = Elements::new(&inflated, endian);
                    if let Some((MI_MATRIX, matrix)) = inner.next_element()? {
                        variables.push(parse_matrix(matrix, endian)?);
                    }
                }
                other => log::debug!("Skipping top-level MAT element of type {}", other),
            }
        }
        Ok(Self { variables })
    }

    pub fn variables(&self) -> &[(String, MatValue)] {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&MatValue> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Follow a dotted path such as `S.output.sample`.
    pub fn resolve(&self, path: &str) -> Option<&MatValue> {
        let mut parts = path.split('.');
        let mut value = self.get(parts.next()?)?;
        for part in parts {
            value = value.field(part)?;
        }
        Some(value)
    }

    /// Every non-struct array, named by its dotted path. Struct arrays are
    /// entered through their first element.
    pub fn leaves(&self) -> Vec<(String, &MatValue)> {
        fn walk<'a>(prefix: String, value: &'a MatValue, out: &mut Vec<(String, &'a MatValue)>) {
            match value {
                MatValue::Struct { fields, .. } => {
                    for name in fields {
                        if let Some(child) = value.field(name) {
                            walk(format!("{}.{}", prefix, name), child, out);
                        }
                    }
                }
                _ => out.push((prefix, value)),
            }
        }

        let mut out = Vec::new();
        for (name, value) in &self.variables {
            walk(name.clone(), value, &mut out);
        }
        out
    }
}

/// Iterator over the data elements of a buffer
struct Elements<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Elements<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], String> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| "data element size overflows".to_string())?;
        self.buf
            .get(start..end)
            .ok_or_else(|| format!("truncated data element at byte {}", start))
    }

    /// Next `(type, payload)`, or `None` once fewer than a tag's worth of
    /// bytes remain.
    fn next_element(&mut self) -> Result<Option<(u32, &'a [u8])>, String> {
        if self.buf.len().saturating_sub(self.pos) < 8 {
            return Ok(None);
        }
        let first = read_as!(self.endian, read_u32, &self.buf[self.pos..self.pos + 4]);

        // Small data element: type and size packed in 4 bytes, data in the next 4
        if first >> 16 != 0 {
            let data_type = first & 0xFFFF;
            let len = (first >> 16) as usize;
            if len > 4 {
                return Err(format!("small data element of {} bytes", len));
            }
            let data = self.slice(self.pos + 4, len)?;
            self.pos += 8;
            return Ok(Some((data_type, data)));
        }

        let len = read_as!(self.endian, read_u32, &self.buf[self.pos + 4..self.pos + 8]) as usize;
        let data = self.slice(self.pos + 8, len)?;
        self.pos += 8 + len;
        if first != MI_COMPRESSED {
            self.pos += (8 - len % 8) % 8;
        }
        self.pos = self.pos.min(self.buf.len());
        Ok(Some((first, data)))
    }

    fn expect_element(&mut self, what: &str) -> Result<(u32, &'a [u8]), String> {
        self.next_element()?
            .ok_or_else(|| format!("array ends before its {}", what))
    }
}

fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatValue), String> {
    // An empty miMATRIX is an unset struct field
    if data.is_empty() {
        return Ok((
            String::new(),
            MatValue::Other {
                dims: vec![0, 0],
                class: "empty",
            },
        ));
    }

    let mut elements = Elements::new(data, endian);
    let (_, flags) = elements.expect_element("array flags")?;
    if flags.len() < 4 {
        return Err("array flags element too short".to_string());
    }
    let class = (read_as!(endian, read_u32, &flags[..4]) & 0xFF) as u8;

    let (_, dims_raw) = elements.expect_element("dimensions")?;
    let dims: Vec<usize> = dims_raw
        .chunks_exact(4)
        .map(|c| read_as!(endian, read_i32, c).max(0) as usize)
        .collect();
    let count: usize = dims.iter().product();

    let (_, name_raw) = elements.expect_element("name")?;
    let name = String::from_utf8_lossy(name_raw)
        .trim_end_matches('\0')
        .to_string();

    let value = match class {
        MX_STRUCT_CLASS => {
            let (_, len_raw) = elements.expect_element("field name length")?;
            if len_raw.len() < 4 {
                return Err(format!("struct '{}': bad field name length", name));
            }
            let name_len = read_as!(endian, read_i32, &len_raw[..4]).max(1) as usize;
            let (_, names_raw) = elements.expect_element("field names")?;
            let fields: Vec<String> = names_raw
                .chunks(name_len)
                .map(|c| {
                    let end = c.iter().position(|&b| b == 0).unwrap_or(c.len());
                    String::from_utf8_lossy(&c[..end]).into_owned()
                })
                .collect();

            let mut values = Vec::with_capacity(count * fields.len());
            for _ in 0..count * fields.len() {
                let (data_type, field_data) = elements.expect_element("field value")?;
                if data_type != MI_MATRIX {
                    return Err(format!(
                        "struct '{}': field value has element type {}",
                        name, data_type
                    ));
                }
                values.push(parse_matrix(field_data, endian)?.1);
            }
            MatValue::Struct {
                dims,
                fields,
                values,
            }
        }
        6..=15 => {
            let (data_type, real) = elements.expect_element("real part")?;
            let data = numeric(data_type, real, endian)?;
            if data.len() != count {
                return Err(format!(
                    "array '{}' holds {} values for dimensions {:?}",
                    name,
                    data.len(),
                    dims
                ));
            }
            MatValue::Numeric {
                dims,
                class: class_name(class),
                data,
            }
        }
        other => MatValue::Other {
            dims,
            class: class_name(other),
        },
    };
    Ok((name, value))
}

/// Widen a numeric data element to f64. The storage type may be narrower
/// than the array class (MATLAB packs small integers into doubles).
fn numeric(data_type: u32, bytes: &[u8], endian: Endian) -> Result<Vec<f64>, String> {
    let values = match data_type {
        MI_INT8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => bytes.iter().map(|&b| b as f64).collect(),
        MI_INT16 => bytes
            .chunks_exact(2)
            .map(|c| read_as!(endian, read_i16, c) as f64)
            .collect(),
        MI_UINT16 => bytes
            .chunks_exact(2)
            .map(|c| read_as!(endian, read_u16, c) as f64)
            .collect(),
        MI_INT32 => bytes
            .chunks_exact(4)
            .map(|c| read_as!(endian, read_i32, c) as f64)
            .collect(),
        MI_UINT32 => bytes
            .chunks_exact(4)
            .map(|c| read_as!(endian, read_u32, c) as f64)
            .collect(),
        MI_SINGLE => bytes
            .chunks_exact(4)
            .map(|c| read_as!(endian, read_f32, c) as f64)
            .collect(),
        MI_DOUBLE => bytes
            .chunks_exact(8)
            .map(|c| read_as!(endian, read_f64, c))
            .collect(),
        MI_INT64 => bytes
            .chunks_exact(8)
            .map(|c| read_as!(endian, read_i64, c) as f64)
            .collect(),
        MI_UINT64 => bytes
            .chunks_exact(8)
            .map(|c| read_as!(endian, read_u64, c) as f64)
            .collect(),
        other => return Err(format!("unsupported numeric storage type {}", other)),
    };
    Ok(values)
}
