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

//! Control-plane client for P4Runtime devices: mastership arbitration over
//! the stream channel, forwarding pipeline installation, and schema-checked
//! table programming.

pub mod arbitration;
pub mod client;
pub mod entry;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod write;

pub use arbitration::{ArbitrationHandle, ElectionId, Mastership, Role};
pub use client::{DeviceRpc, DeviceTarget, GrpcDevice, PipelinePush, SwitchClient};
pub use entry::{
    build_table_entry, build_update, encode_value, ActionSpec, EntryOptions, Match, Operation,
};
pub use error::{EncodeError, Error, WriteError, WriteErrorKind};
pub use pipeline::PipelineConfig;
pub use schema::Switch;
pub use session::{Phase, Session, SessionOptions};

/// IANA-assigned port for P4Runtime over gRPC.
pub const P4RUNTIME_PORT: u16 = 9559;
