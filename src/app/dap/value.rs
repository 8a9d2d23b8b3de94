//! Decoded DAP2 values
//!
//! Base-type variables decode into `ndarray` arrays (zero-dimensional for
//! scalars); containers keep their fields in declaration order.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, IxDyn};

use crate::errors::DapError;

/// DAP2 atomic types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DapType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    String,
    Url,
}

impl DapType {
    /// Whether values are length-prefixed strings on the wire
    pub fn is_string(self) -> bool {
        matches!(self, DapType::String | DapType::Url)
    }
}

impl FromStr for DapType {
    type Err = DapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "byte" => Ok(DapType::Byte),
            "int16" => Ok(DapType::Int16),
            "uint16" => Ok(DapType::UInt16),
            "int32" => Ok(DapType::Int32),
            "uint32" => Ok(DapType::UInt32),
            "float32" => Ok(DapType::Float32),
            "float64" => Ok(DapType::Float64),
            "string" => Ok(DapType::String),
            "url" => Ok(DapType::Url),
            other => Err(DapError::Decode {
                reason: format!("unknown base type '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DapType::Byte => "Byte",
            DapType::Int16 => "Int16",
            DapType::UInt16 => "UInt16",
            DapType::Int32 => "Int32",
            DapType::UInt32 => "UInt32",
            DapType::Float32 => "Float32",
            DapType::Float64 => "Float64",
            DapType::String => "String",
            DapType::Url => "Url",
        };
        f.write_str(name)
    }
}

/// Materialized base-type data
#[derive(Debug, Clone, PartialEq)]
pub enum DapArray {
    Byte(ArrayD<u8>),
    Int16(ArrayD<i16>),
    UInt16(ArrayD<u16>),
    Int32(ArrayD<i32>),
    UInt32(ArrayD<u32>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Str(ArrayD<String>),
}

macro_rules! each_array {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            DapArray::Byte($array) => $body,
            DapArray::Int16($array) => $body,
            DapArray::UInt16($array) => $body,
            DapArray::Int32($array) => $body,
            DapArray::UInt32($array) => $body,
            DapArray::Float32($array) => $body,
            DapArray::Float64($array) => $body,
            DapArray::Str($array) => $body,
        }
    };
}

impl DapArray {
    /// Dimension sizes
    pub fn shape(&self) -> &[usize] {
        each_array!(self, array => array.shape())
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        each_array!(self, array => array.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type
    pub fn dtype(&self) -> DapType {
        match self {
            DapArray::Byte(_) => DapType::Byte,
            DapArray::Int16(_) => DapType::Int16,
            DapArray::UInt16(_) => DapType::UInt16,
            DapArray::Int32(_) => DapType::Int32,
            DapArray::UInt32(_) => DapType::UInt32,
            DapArray::Float32(_) => DapType::Float32,
            DapArray::Float64(_) => DapType::Float64,
            DapArray::Str(_) => DapType::String,
        }
    }

    /// Numeric data widened to `f64`; `None` for strings
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        match self {
            DapArray::Byte(array) => Some(array.mapv(f64::from)),
            DapArray::Int16(array) => Some(array.mapv(f64::from)),
            DapArray::UInt16(array) => Some(array.mapv(f64::from)),
            DapArray::Int32(array) => Some(array.mapv(f64::from)),
            DapArray::UInt32(array) => Some(array.mapv(f64::from)),
            DapArray::Float32(array) => Some(array.mapv(f64::from)),
            DapArray::Float64(array) => Some(array.clone()),
            DapArray::Str(_) => None,
        }
    }

    /// String data; `None` for numeric types
    pub fn as_strings(&self) -> Option<&ArrayD<String>> {
        match self {
            DapArray::Str(array) => Some(array),
            _ => None,
        }
    }

    /// Reshape flat decoded values into `shape`
    pub(crate) fn from_shape_vec<T>(
        shape: &[usize],
        values: Vec<T>,
        wrap: fn(ArrayD<T>) -> DapArray,
    ) -> Result<DapArray, DapError> {
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(wrap)
            .map_err(|e| DapError::Decode {
                reason: format!("shape {shape:?} does not match payload: {e}"),
            })
    }
}

/// A decoded variable of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum DapValue {
    /// Base-type data, scalars are zero-dimensional
    Array(DapArray),
    /// Fields of a Structure, Grid, Dataset or sequence row, in order
    Structure(Vec<DapValue>),
    /// Sequence rows, or one item per row for values projected out of them
    Sequence(Vec<DapValue>),
}

impl DapValue {
    pub fn as_array(&self) -> Option<&DapArray> {
        match self {
            DapValue::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<DapArray> {
        match self {
            DapValue::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Fields of a structure or row
    pub fn fields(&self) -> Option<&[DapValue]> {
        match self {
            DapValue::Structure(fields) => Some(fields),
            _ => None,
        }
    }

    /// Items of a sequence
    pub fn items(&self) -> Option<&[DapValue]> {
        match self {
            DapValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Single numeric value of a zero-dimensional array
    pub fn as_f64(&self) -> Option<f64> {
        let values = self.as_array()?.to_f64()?;
        match values.len() {
            1 => values.iter().next().copied(),
            _ => None,
        }
    }

    /// Single string value of a zero-dimensional array
    pub fn as_str(&self) -> Option<&str> {
        let values = self.as_array()?.as_strings()?;
        match values.len() {
            1 => values.iter().next().map(String::as_str),
            _ => None,
        }
    }
}
