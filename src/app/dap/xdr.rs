//! XDR payload decoding for DAP2 data responses
//!
//! Layout rules:
//! - arrays start with their element count, repeated once more for
//!   non-string types
//! - bytes are packed and padded to a four-byte boundary, 16-bit integers
//!   occupy four bytes each
//! - strings are a length followed by padded bytes
//! - every sequence row starts with [`START_OF_INSTANCE`], the sequence ends
//!   with [`END_OF_SEQUENCE`]

use crate::app::dap::dds::{DdsNode, NodeKind};
use crate::app::dap::value::{DapArray, DapType, DapValue};
use crate::constants::dap::{END_OF_SEQUENCE, START_OF_INSTANCE};
use crate::errors::{DapError, DapResult};

/// Decode the payload described by `root`
pub fn decode(root: &DdsNode, data: &[u8]) -> DapResult<DapValue> {
    let mut unpacker = Unpacker::new(data);
    let value = unpacker.node(root)?;
    if unpacker.remaining() > 0 {
        tracing::debug!(
            "{} trailing bytes after decoding {}",
            unpacker.remaining(),
            root.name
        );
    }
    Ok(value)
}

struct Unpacker<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Unpacker<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    fn take(&mut self, count: usize) -> DapResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| DapError::Decode {
                reason: format!(
                    "needed {count} bytes at offset {} but only {} remain",
                    self.position,
                    self.remaining()
                ),
            })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn word(&mut self) -> DapResult<[u8; 4]> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(word)
    }

    fn u32(&mut self) -> DapResult<u32> {
        Ok(u32::from_be_bytes(self.word()?))
    }

    fn i32(&mut self) -> DapResult<i32> {
        Ok(i32::from_be_bytes(self.word()?))
    }

    fn f32(&mut self) -> DapResult<f32> {
        Ok(f32::from_be_bytes(self.word()?))
    }

    fn f64(&mut self) -> DapResult<f64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(f64::from_be_bytes(bytes))
    }

    fn padded(&mut self, count: usize) -> DapResult<&'a [u8]> {
        let bytes = self.take(count)?;
        self.take((4 - count % 4) % 4)?;
        Ok(bytes)
    }

    fn string(&mut self) -> DapResult<String> {
        let length = self.u32()? as usize;
        let bytes = self.padded(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn node(&mut self, node: &DdsNode) -> DapResult<DapValue> {
        match &node.kind {
            NodeKind::Base { dtype, shape } => self.base(*dtype, shape).map(DapValue::Array),
            NodeKind::Dataset | NodeKind::Structure | NodeKind::Grid => node
                .children
                .iter()
                .map(|child| self.node(child))
                .collect::<DapResult<Vec<_>>>()
                .map(DapValue::Structure),
            NodeKind::Sequence => self.sequence(node),
        }
    }

    fn sequence(&mut self, node: &DdsNode) -> DapResult<DapValue> {
        let mut rows = Vec::new();
        loop {
            match self.u32()? {
                START_OF_INSTANCE => {
                    let fields = node
                        .children
                        .iter()
                        .map(|child| self.node(child))
                        .collect::<DapResult<Vec<_>>>()?;
                    rows.push(DapValue::Structure(fields));
                }
                END_OF_SEQUENCE => break,
                marker => {
                    return Err(DapError::Decode {
                        reason: format!("invalid sequence marker {marker:#010x} in {}", node.id),
                    })
                }
            }
        }
        Ok(DapValue::Sequence(rows))
    }

    fn base(&mut self, dtype: DapType, shape: &[usize]) -> DapResult<DapArray> {
        let count = if shape.is_empty() {
            1
        } else {
            let count = self.u32()? as usize;
            if !dtype.is_string() {
                self.u32()?;
            }
            let declared: usize = shape.iter().product();
            if count != declared {
                return Err(DapError::Decode {
                    reason: format!("array declared with {declared} elements but payload has {count}"),
                });
            }
            count
        };

        match dtype {
            DapType::Byte if shape.is_empty() => {
                let value = (self.u32()? & 0xff) as u8;
                DapArray::from_shape_vec(shape, vec![value], DapArray::Byte)
            }
            DapType::Byte => {
                let values = self.padded(count)?.to_vec();
                DapArray::from_shape_vec(shape, values, DapArray::Byte)
            }
            DapType::Int16 => {
                let values = self.repeat(count, |u| Ok(u.i32()? as i16))?;
                DapArray::from_shape_vec(shape, values, DapArray::Int16)
            }
            DapType::UInt16 => {
                let values = self.repeat(count, |u| Ok(u.u32()? as u16))?;
                DapArray::from_shape_vec(shape, values, DapArray::UInt16)
            }
            DapType::Int32 => {
                let values = self.repeat(count, Self::i32)?;
                DapArray::from_shape_vec(shape, values, DapArray::Int32)
            }
            DapType::UInt32 => {
                let values = self.repeat(count, Self::u32)?;
                DapArray::from_shape_vec(shape, values, DapArray::UInt32)
            }
            DapType::Float32 => {
                let values = self.repeat(count, Self::f32)?;
                DapArray::from_shape_vec(shape, values, DapArray::Float32)
            }
            DapType::Float64 => {
                let values = self.repeat(count, Self::f64)?;
                DapArray::from_shape_vec(shape, values, DapArray::Float64)
            }
            DapType::String | DapType::Url => {
                let values = self.repeat(count, Self::string)?;
                DapArray::from_shape_vec(shape, values, DapArray::Str)
            }
        }
    }

    fn repeat<T>(
        &mut self,
        count: usize,
        mut read: impl FnMut(&mut Self) -> DapResult<T>,
    ) -> DapResult<Vec<T>> {
        (0..count).map(|_| read(self)).collect()
    }
}
