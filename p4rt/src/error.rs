/*
Copyright (c) 2024 The p4rt Authors
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Error taxonomy for the client.
//!
//! Three layers: [`Error`] for failures that end a session or abort a call,
//! [`WriteError`] for a single rejected entry inside an otherwise delivered
//! batch, and [`EncodeError`] for schema violations caught before anything
//! is sent to the device.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use proto::status::Code;

use thiserror::Error as ThisError;

/// A failure that aborts the operation it occurred in.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The transport or the device failed an RPC outright.
    #[error("device call failed: {0}")]
    Connection(#[source] tonic::Status),

    /// The stream channel ended before or after a role was assigned.
    #[error("stream channel closed")]
    StreamClosed,

    /// The device did not grant the primary role within the configured wait.
    #[error("no primary role granted within {0:?}")]
    ArbitrationTimeout(Duration),

    /// A mutating call was attempted while not primary. Callers may retry
    /// once mastership is regained; nothing was sent to the device.
    #[error("not primary for device {0}")]
    NotPrimary(u64),

    /// The device rejected the forwarding pipeline push.
    #[error("forwarding pipeline push failed: {0}")]
    PipelinePush(#[source] tonic::Status),

    /// A batched write failed without attributable per-entry outcomes.
    #[error("batch write failed: {0}")]
    Write(#[source] tonic::Status),

    /// A single-entry write was rejected by the device.
    #[error("table entry rejected: {0}")]
    Entry(#[from] WriteError),

    /// Entry construction failed against the pipeline schema.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A pipeline artifact could not be read from disk.
    #[error("{}: {source}", path.display())]
    LoadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The p4info file is not a valid binary schema.
    #[error("{}: invalid p4info: {source}", path.display())]
    ParseP4Info {
        path: PathBuf,
        #[source]
        source: prost::DecodeError,
    },
}

/// A schema violation detected while building an entry. Construction is
/// pure: when this is returned, no RPC was made.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EncodeError {
    /// No table with this name or alias in the pipeline.
    #[error("no table {0:?} in the pipeline")]
    UnknownTable(String),

    /// The action is not usable in entries of this table.
    #[error("table {table:?} has no entry action {action:?}")]
    UnknownAction { table: String, action: String },

    /// The entry disagrees with the table's declared shape.
    #[error("table {table:?}: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// LPM prefix length outside `0..=bit_width`.
    #[error("field {field:?}: prefix length {prefix_len} out of range for bit<{bit_width}>")]
    InvalidPrefixLength {
        field: String,
        prefix_len: i32,
        bit_width: i32,
    },
}

/// Broad classification of a per-entry write rejection, derived from the
/// canonical gRPC code the device reported for that entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteErrorKind {
    /// Insert of an entry that is already installed.
    AlreadyExists,
    /// Modify or delete of an entry that is not installed.
    NotFound,
    /// The device considers the entry malformed for its pipeline.
    SchemaViolation,
    /// Anything else, resource exhaustion included.
    DeviceRejected,
}

impl WriteErrorKind {
    fn from_canonical(code: i32) -> Self {
        match Code::try_from(code) {
            Ok(Code::AlreadyExists) => WriteErrorKind::AlreadyExists,
            Ok(Code::NotFound) => WriteErrorKind::NotFound,
            Ok(Code::InvalidArgument) | Ok(Code::OutOfRange) => WriteErrorKind::SchemaViolation,
            _ => WriteErrorKind::DeviceRejected,
        }
    }
}

impl fmt::Display for WriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            WriteErrorKind::AlreadyExists => "already exists",
            WriteErrorKind::NotFound => "not found",
            WriteErrorKind::SchemaViolation => "schema violation",
            WriteErrorKind::DeviceRejected => "device rejected",
        };
        f.write_str(s)
    }
}

/// One rejected entry of a batch, in the order the batch was sent.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{kind}: {message}")]
pub struct WriteError {
    pub kind: WriteErrorKind,
    /// Canonical gRPC code the device attached to this entry.
    pub canonical_code: i32,
    /// Target-specific code, scoped by `space`.
    pub code: i32,
    /// Error space of `code`, empty for the canonical space.
    pub space: String,
    pub message: String,
}

impl From<proto::p4runtime::Error> for WriteError {
    fn from(e: proto::p4runtime::Error) -> Self {
        let message = if e.message.is_empty() {
            format!("canonical code {}", e.canonical_code)
        } else {
            e.message
        };
        WriteError {
            kind: WriteErrorKind::from_canonical(e.canonical_code),
            canonical_code: e.canonical_code,
            code: e.code,
            space: e.space,
            message,
        }
    }
}
