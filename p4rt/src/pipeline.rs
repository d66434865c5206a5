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

//! The forwarding pipeline configuration: compiled device program, its
//! p4info schema, and the cookie that tags an installed config.

use std::fs;
use std::path::Path;

use prost::Message;

use proto::p4info::P4Info;
use proto::p4runtime::{forwarding_pipeline_config, ForwardingPipelineConfig};

use crate::error::Error;
use crate::schema::Switch;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// The compiler's schema document, pushed verbatim. The decoded view
    /// below keeps only the modeled subset and never goes back on the wire.
    p4info: Vec<u8>,
    decoded: P4Info,
    device_config: Vec<u8>,
    cookie: u64,
}

impl PipelineConfig {
    /// A cookie of zero means "no cookie": the push then skips the
    /// already-installed probe and the wire config carries no cookie field.
    pub fn new(p4info: P4Info, device_config: Vec<u8>, cookie: u64) -> Self {
        PipelineConfig {
            p4info: p4info.encode_to_vec(),
            decoded: p4info,
            device_config,
            cookie,
        }
    }

    /// Loads the binary p4info schema and the target-specific compiled
    /// program (for bmv2, its JSON) from disk.
    pub fn from_files(p4info_path: &Path, config_path: &Path, cookie: u64) -> Result<Self, Error> {
        let p4info = fs::read(p4info_path).map_err(|source| Error::LoadConfig {
            path: p4info_path.to_path_buf(),
            source,
        })?;
        let decoded = P4Info::decode(p4info.as_slice()).map_err(|source| Error::ParseP4Info {
            path: p4info_path.to_path_buf(),
            source,
        })?;
        let device_config = fs::read(config_path).map_err(|source| Error::LoadConfig {
            path: config_path.to_path_buf(),
            source,
        })?;
        Ok(PipelineConfig {
            p4info,
            decoded,
            device_config,
            cookie,
        })
    }

    /// The schema document exactly as it goes to the device.
    pub fn p4info(&self) -> &[u8] {
        &self.p4info
    }

    /// Parsed schema for building entries against this pipeline.
    pub fn switch(&self) -> Switch {
        Switch::from(&self.decoded)
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub(crate) fn to_proto(&self) -> ForwardingPipelineConfig {
        ForwardingPipelineConfig {
            p4info: self.p4info.clone(),
            p4_device_config: self.device_config.clone(),
            cookie: (self.cookie != 0)
                .then(|| forwarding_pipeline_config::Cookie { cookie: self.cookie }),
        }
    }
}
