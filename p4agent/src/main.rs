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

//! P4Runtime table programming agent.
//!
//! Connects to one device, takes mastership, installs the compiled
//! forwarding pipeline, programs a demonstration set of IPv4 routes, and
//! idles until signalled.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use clap::Parser;

use tokio_util::sync::CancellationToken;

use tracing::{event, Level};

use p4rt::client::{DeviceTarget, GrpcDevice, SwitchClient};
use p4rt::entry::{build_table_entry, encode_value, ActionSpec, EntryOptions, Match, Operation};
use p4rt::pipeline::PipelineConfig;
use p4rt::schema::Switch;
use p4rt::session::{Session, SessionOptions};
use p4rt::ElectionId;

use proto::p4runtime::TableEntry;

mod signals;

// The demonstration routes target the basic IPv4 forwarding tutorial
// pipeline.
const IPV4_LPM_TABLE: &str = "MyIngress.ipv4_lpm";
const DROP_ACTION: &str = "MyIngress.drop";
const FORWARD_ACTION: &str = "MyIngress.ipv4_forward";

#[derive(Debug, Parser)]
#[clap(version, about = "P4Runtime table programming agent")]
struct Args {
    /// Device gRPC endpoint, host:port
    #[clap(long, default_value = "127.0.0.1:9559")]
    addr: String,

    /// P4Runtime device id
    #[clap(long, default_value_t = 0)]
    device_id: u64,

    /// Election id to bid, a decimal unsigned 128-bit value
    #[clap(long, default_value = "1")]
    election_id: String,

    /// Compiled pipeline for the target, e.g. a bmv2 JSON file
    #[clap(long)]
    config: PathBuf,

    /// Binary p4info schema emitted by the P4 compiler
    #[clap(long)]
    p4info: PathBuf,

    /// Pipeline cookie; 0 disables the already-installed check
    #[clap(long, default_value_t = 0)]
    cookie: u64,

    /// Seconds to wait for the primary role before giving up
    #[clap(long, default_value_t = 5)]
    arbitration_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    log_panics::init();

    let args = Args::parse();
    let election_id: ElectionId = args
        .election_id
        .parse()
        .context("--election-id must be a decimal unsigned 128-bit value")?;
    let target = DeviceTarget {
        device_id: args.device_id,
        election_id,
    };

    let pipeline = PipelineConfig::from_files(&args.p4info, &args.config, args.cookie)?;
    let switch = pipeline.switch();
    for table in &switch.tables {
        event!(Level::DEBUG, %table, "pipeline table");
    }
    let entries = demo_entries(&switch)?;

    let cancel = CancellationToken::new();
    tokio::spawn(signals::shutdown_on_signal(cancel.clone()));

    event!(
        Level::INFO,
        addr = %args.addr,
        device_id = args.device_id,
        %election_id,
        "connecting to device"
    );
    let device = GrpcDevice::connect(&args.addr)
        .await
        .with_context(|| format!("connecting to {}", args.addr))?;
    let mut client = SwitchClient::new(Box::new(device), target);

    let session = Session::new(SessionOptions {
        arbitration_timeout: Duration::from_secs(args.arbitration_timeout),
    });
    session.run(&mut client, &pipeline, &entries, cancel).await?;
    Ok(())
}

/// The demonstration route set: both halves of the IPv4 space dropped, one
/// host dropped, one host forwarded out of port 1.
fn demo_entries(switch: &Switch) -> Result<Vec<(TableEntry, Operation)>> {
    let drop = ActionSpec::Direct {
        action: DROP_ACTION.to_string(),
        params: vec![],
    };
    let forward = ActionSpec::Direct {
        action: FORWARD_ACTION.to_string(),
        params: vec![vec![0x03, 0x02, 0x01, 0x00, 0x00, 0x00], encode_value(1, 9)],
    };

    let routes: [([u8; 4], i32, &ActionSpec); 4] = [
        ([0, 0, 0, 0], 1, &drop),
        ([128, 0, 0, 0], 1, &drop),
        ([192, 0, 2, 1], 32, &drop),
        ([192, 0, 2, 2], 32, &forward),
    ];

    let mut entries = Vec::with_capacity(routes.len());
    for (prefix, prefix_len, action) in routes {
        let entry = build_table_entry(
            switch,
            IPV4_LPM_TABLE,
            &[Match::Lpm {
                value: prefix.to_vec(),
                prefix_len,
            }],
            action,
            &EntryOptions::default(),
        )?;
        entries.push((entry, Operation::Insert));
    }
    Ok(entries)
}
