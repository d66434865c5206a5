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

//! Table writes and their per-entry outcomes.
//!
//! Batches go to the device non-atomically: each entry succeeds or fails on
//! its own, and a failed batch comes back as a status whose details carry
//! one `p4.v1.Error` per update, successful entries included. The decoder
//! here turns that into a result list aligned with the input.

use prost::Message;

use proto::p4runtime::{self, write_request, TableEntry, WriteRequest};
use proto::status::Code;

use crate::client::SwitchClient;
use crate::entry::{build_update, Operation};
use crate::error::{Error, WriteError, WriteErrorKind};

impl SwitchClient {
    /// Sends `updates` as one non-atomic batch. The result list matches the
    /// input in length and order; rejected entries do not fail the batch.
    /// Failures that cannot be attributed entry by entry fail the whole
    /// call with [`Error::Write`].
    pub async fn write_batch(
        &mut self,
        updates: &[(TableEntry, Operation)],
    ) -> Result<Vec<Result<(), WriteError>>, Error> {
        self.require_primary()?;
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.target();
        let request = WriteRequest {
            device_id: target.device_id,
            role_id: 0,
            election_id: Some(target.election_id.into()),
            updates: updates
                .iter()
                .map(|(entry, op)| build_update(*op, entry.clone()))
                .collect(),
            atomicity: write_request::Atomicity::ContinueOnError as i32,
        };
        match self.rpc().write(request).await {
            Ok(()) => Ok(updates.iter().map(|_| Ok(())).collect()),
            Err(status) => per_entry_results(updates.len(), status),
        }
    }

    pub async fn insert_entry(&mut self, entry: TableEntry) -> Result<(), Error> {
        self.write_one(entry, Operation::Insert).await
    }

    pub async fn modify_entry(&mut self, entry: TableEntry) -> Result<(), Error> {
        self.write_one(entry, Operation::Modify).await
    }

    pub async fn delete_entry(&mut self, entry: TableEntry) -> Result<(), Error> {
        self.write_one(entry, Operation::Delete).await
    }

    async fn write_one(&mut self, entry: TableEntry, op: Operation) -> Result<(), Error> {
        let mut results = self.write_batch(&[(entry, op)]).await?;
        match results.pop() {
            Some(Err(error)) => Err(Error::Entry(error)),
            _ => Ok(()),
        }
    }
}

/// Decodes per-entry outcomes from a failed batch: a `google.rpc.Status` in
/// the gRPC error details, holding one `p4.v1.Error` per update in batch
/// order. A detail list that is absent or does not line up with the batch
/// cannot be attributed and fails the call instead.
fn per_entry_results(
    count: usize,
    status: tonic::Status,
) -> Result<Vec<Result<(), WriteError>>, Error> {
    let details = status.details();
    if details.is_empty() {
        return Err(Error::Write(status));
    }
    let decoded = match proto::status::Status::decode(details) {
        Ok(decoded) => decoded,
        Err(_) => return Err(Error::Write(status)),
    };
    if decoded.details.len() != count {
        return Err(Error::Write(status));
    }
    Ok(decoded
        .details
        .iter()
        .map(|any| match p4runtime::Error::decode(any.value.as_slice()) {
            Ok(error) if error.canonical_code == Code::Ok as i32 => Ok(()),
            Ok(error) => Err(WriteError::from(error)),
            Err(_) => Err(WriteError {
                kind: WriteErrorKind::DeviceRejected,
                canonical_code: Code::Unknown as i32,
                code: 0,
                space: String::new(),
                message: "undecodable per-entry error detail".to_string(),
            }),
        })
        .collect())
}
