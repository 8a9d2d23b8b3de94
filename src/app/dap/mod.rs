//! DAP2 protocol decoding
//!
//! A data response is a DDS document, a `\nData:\n` separator and an XDR
//! payload. This module splits the two parts, parses the descriptor with
//! [`dds`], decodes the payload with [`xdr`] and locates individual
//! variables inside the decoded tree.
//!
//! # Examples
//!
//! ```rust
//! use opendap_fetcher::app::dap::{self, DapValue};
//!
//! let mut body = b"Dataset { Int32 k[1]; } d;\nData:\n".to_vec();
//! body.extend_from_slice(&1u32.to_be_bytes());
//! body.extend_from_slice(&1u32.to_be_bytes());
//! body.extend_from_slice(&42i32.to_be_bytes());
//!
//! let response = dap::parse_response(&body).unwrap();
//! let node = response.dds.find("k").unwrap();
//! let value = response.extract(node).unwrap();
//! assert!(matches!(value, DapValue::Array(_)));
//! ```

pub mod dds;
pub mod value;
pub mod xdr;

pub use dds::{DdsNode, NodeKind};
pub use value::{DapArray, DapType, DapValue};

use crate::constants::dap::DATA_SEPARATOR;
use crate::errors::{DapError, DapResult};

/// Parsed descriptor together with its decoded payload
#[derive(Debug, Clone)]
pub struct DataResponse {
    pub dds: DdsNode,
    pub data: DapValue,
}

impl DataResponse {
    /// Value of `node`, descending through every enclosing container
    ///
    /// Values below a sequence are gathered row by row, so a column inside
    /// a sequence yields one item per row.
    pub fn extract(&self, node: &DdsNode) -> Option<DapValue> {
        if std::ptr::eq(node, &self.dds) {
            return Some(self.data.clone());
        }
        let trail = self.dds.trail(node)?;
        let indices: Vec<usize> = trail.iter().map(|(index, _)| *index).collect();
        select(&self.data, &indices)
    }

    /// Number of sequences enclosing `node`, counting `node` itself
    pub fn nesting_level(&self, node: &DdsNode) -> usize {
        self.dds
            .trail(node)
            .map(|trail| {
                trail
                    .iter()
                    .filter(|(_, step)| step.kind == NodeKind::Sequence)
                    .count()
            })
            .unwrap_or(0)
    }
}

fn select(value: &DapValue, indices: &[usize]) -> Option<DapValue> {
    let Some((&first, rest)) = indices.split_first() else {
        return Some(value.clone());
    };
    match value {
        DapValue::Structure(fields) => select(fields.get(first)?, rest),
        DapValue::Sequence(rows) => rows
            .iter()
            .map(|row| select(row, indices))
            .collect::<Option<Vec<_>>>()
            .map(DapValue::Sequence),
        DapValue::Array(_) => None,
    }
}

/// Split a data response into descriptor text and binary payload
///
/// Bodies without the separator that carry a DAP `Error { ... }` document
/// are reported as [`DapError::Remote`].
pub fn split_response(body: &[u8]) -> DapResult<(&str, &[u8])> {
    let Some(split) = find(body, DATA_SEPARATOR) else {
        let text = String::from_utf8_lossy(body);
        return Err(match remote_error_message(&text) {
            Some(message) => DapError::Remote { message },
            None => DapError::Decode {
                reason: "response has no data section".to_string(),
            },
        });
    };

    let dds = std::str::from_utf8(&body[..split]).map_err(|e| DapError::Decode {
        reason: format!("descriptor is not valid UTF-8: {e}"),
    })?;
    Ok((dds, &body[split + DATA_SEPARATOR.len()..]))
}

/// Split, parse and decode a complete data response
pub fn parse_response(body: &[u8]) -> DapResult<DataResponse> {
    let (text, payload) = split_response(body)?;
    let dds = dds::parse(text)?;
    let data = xdr::decode(&dds, payload)?;
    Ok(DataResponse { dds, data })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Message of a DAP2 error document, e.g. `Error { code = 404; message = "..."; };`
pub(crate) fn remote_error_message(text: &str) -> Option<String> {
    let body = text.trim_start().strip_prefix("Error")?;
    let start = body.find("message")?;
    let rest = &body[start + "message".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let message = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default().trim(),
    };
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::dap::{END_OF_SEQUENCE, START_OF_INSTANCE};

    fn sequence_body() -> Vec<u8> {
        let mut body =
            b"Dataset {\n    Sequence {\n        Int32 id;\n        Float64 x;\n    } s;\n} d;\nData:\n"
                .to_vec();
        for (id, x) in [(1i32, 10.5f64), (2, 20.5)] {
            body.extend_from_slice(&START_OF_INSTANCE.to_be_bytes());
            body.extend_from_slice(&id.to_be_bytes());
            body.extend_from_slice(&x.to_be_bytes());
        }
        body.extend_from_slice(&END_OF_SEQUENCE.to_be_bytes());
        body
    }

    #[test]
    fn test_split_keeps_binary_payload_intact() {
        let mut body = b"Dataset { Byte b[1]; } d;\nData:\n".to_vec();
        body.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, b'\n', 0, 0, 0]);
        let (dds, payload) = split_response(&body).unwrap();
        assert_eq!(dds, "Dataset { Byte b[1]; } d;");
        assert_eq!(payload.len(), 12);
    }

    #[test]
    fn test_remote_error_document() {
        let body = br#"Error {
    code = 404;
    message = "No such variable: missing";
};"#;
        match split_response(body) {
            Err(DapError::Remote { message }) => assert_eq!(message, "No such variable: missing"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_column_from_sequence() {
        let response = parse_response(&sequence_body()).unwrap();
        let node = response.dds.find("s.x").unwrap();
        let column = response.extract(node).unwrap();
        let values: Vec<f64> = column
            .items()
            .unwrap()
            .iter()
            .map(|item| item.as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![10.5, 20.5]);
        assert_eq!(response.nesting_level(node), 1);
    }

    #[test]
    fn test_extract_whole_sequence() {
        let response = parse_response(&sequence_body()).unwrap();
        let node = response.dds.find("s").unwrap();
        let rows = response.extract(node).unwrap();
        assert_eq!(rows.items().unwrap().len(), 2);
        assert_eq!(response.nesting_level(node), 1);
    }

    #[test]
    fn test_missing_separator_is_decode_error() {
        assert!(matches!(
            split_response(b"<html>login</html>"),
            Err(DapError::Decode { .. })
        ));
    }
}
