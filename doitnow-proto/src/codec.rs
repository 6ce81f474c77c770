//! JSON encoding for task records and full snapshots.
//!
//! A snapshot is a JSON array of `{ "id": ..., "data": { ... } }` objects.
//! Decoding a snapshot only checks that outer shape; each record body is
//! decoded separately with [`decode_document`] so one malformed record
//! never rejects its siblings.

use serde::Deserialize as _;

use crate::task::{RemoteDocument, TaskDocument};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A record body failed to decode into a [`TaskDocument`].
    #[error("invalid document {id}: {reason}")]
    InvalidDocument {
        /// Identifier of the offending record.
        id: String,
        /// What serde rejected (missing field, unknown variant, ...).
        reason: String,
    },
}

/// Encodes a [`TaskDocument`] into an untyped JSON body.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the document cannot be serialized.
pub fn encode_document(doc: &TaskDocument) -> Result<serde_json::Value, CodecError> {
    serde_json::to_value(doc).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes the body of a [`RemoteDocument`] into a [`TaskDocument`].
///
/// # Errors
///
/// Returns `CodecError::InvalidDocument` if a required field is missing,
/// a field has the wrong type, or a category/priority is outside the
/// closed set.
pub fn decode_document(remote: &RemoteDocument) -> Result<TaskDocument, CodecError> {
    TaskDocument::deserialize(&remote.data).map_err(|e| CodecError::InvalidDocument {
        id: remote.id.to_string(),
        reason: e.to_string(),
    })
}

/// Encodes a full snapshot as pretty-printed JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the snapshot cannot be serialized.
pub fn encode_snapshot(docs: &[RemoteDocument]) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec_pretty(docs).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a snapshot produced by [`encode_snapshot`] (or written by hand).
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not a JSON array of
/// `{id, data}` objects.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<RemoteDocument>, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
