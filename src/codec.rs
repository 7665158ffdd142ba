//! Structured payload values and their byte encoding
//!
//! Topics and requests carry opaque byte buffers; this module gives
//! clients a common structured representation to put inside them. A
//! [`Value`] tree covers scalars, sequences, maps and dense numeric
//! arrays, and encodes to bytes with bincode so both ends of a pipeline
//! can exchange typed data without agreeing on anything beyond this enum.

use serde::{Deserialize, Serialize};

use crate::error::{RobomqError, Result};

/// A structured payload value
///
/// `NdArray` carries raw element bytes plus a dtype tag and shape; the
/// receiver reinterprets the buffer, so element byte order is the
/// sender's native order. `Opaque` passes through bytes the codec does
/// not interpret, for payloads serialized by some other scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    NdArray {
        data: Vec<u8>,
        dtype: String,
        shape: Vec<u64>,
    },
    Opaque(Vec<u8>),
}

impl Value {
    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Build an `NdArray`, checking the buffer length against dtype and
    /// shape
    pub fn ndarray(data: Vec<u8>, dtype: &str, shape: Vec<u64>) -> Result<Self> {
        let elem = dtype_size(dtype)?;
        let count: u64 = shape.iter().product();
        let expected = count
            .checked_mul(elem as u64)
            .ok_or_else(|| RobomqError::invalid_parameter("shape", "Element count overflows"))?;
        if data.len() as u64 != expected {
            return Err(RobomqError::invalid_parameter(
                "data",
                format!(
                    "Buffer is {} bytes but dtype `{}` with shape {:?} needs {}",
                    data.len(),
                    dtype,
                    shape,
                    expected
                ),
            ));
        }
        Ok(Value::NdArray {
            data,
            dtype: dtype.to_string(),
            shape,
        })
    }
}

/// Bytes per element for a dtype tag
pub fn dtype_size(dtype: &str) -> Result<usize> {
    match dtype {
        "bool" | "int8" | "uint8" => Ok(1),
        "int16" | "uint16" | "float16" => Ok(2),
        "int32" | "uint32" | "float32" => Ok(4),
        "int64" | "uint64" | "float64" => Ok(8),
        other => Err(RobomqError::invalid_parameter(
            "dtype",
            format!("Unknown dtype `{}`", other),
        )),
    }
}
