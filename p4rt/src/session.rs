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

//! Session lifecycle: the fixed sequence from connect to stop.
//!
//! One session is one device, one stream, one pipeline push, one initial
//! entry batch, then idling until the stop token fires. Every transition is
//! published on a watch channel, so an embedding program can follow along
//! without parsing logs.

use std::fmt::{self, Display};
use std::time::Duration;

use proto::p4runtime::TableEntry;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use tracing::{event, Level};

use crate::client::SwitchClient;
use crate::entry::Operation;
use crate::error::Error;
use crate::pipeline::PipelineConfig;

/// Phases of a session, entered strictly in declaration order. `Stopped` is
/// terminal and is entered on fatal errors too. The `Ord` impl follows that
/// order, so observers can assert progress even when a watch coalesces
/// consecutive transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    Connecting,
    AwaitingPrimary,
    ConfiguringPipeline,
    InstallingEntries,
    Idle,
    Stopped,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Connecting => "connecting",
            Phase::AwaitingPrimary => "awaiting primary",
            Phase::ConfiguringPipeline => "configuring pipeline",
            Phase::InstallingEntries => "installing entries",
            Phase::Idle => "idle",
            Phase::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Bound on the wait for the first primary grant. Expiry is fatal for
    /// the session.
    pub arbitration_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            arbitration_timeout: Duration::from_secs(5),
        }
    }
}

/// Drives one device session through its fixed sequence.
pub struct Session {
    options: SessionOptions,
    phase: watch::Sender<Phase>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let (phase, _) = watch::channel(Phase::Connecting);
        Session { options, phase }
    }

    /// A watch on phase transitions; `borrow` yields the current phase.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Runs the session to completion: returns once the stop token fires,
    /// or earlier with the fatal error that ended the sequence. Either way
    /// the session finishes in [`Phase::Stopped`].
    pub async fn run(
        &self,
        client: &mut SwitchClient,
        pipeline: &PipelineConfig,
        entries: &[(TableEntry, Operation)],
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let result = self.drive(client, pipeline, entries, &cancel).await;
        if let Err(ref error) = result {
            event!(Level::ERROR, %error, "session failed");
        }
        self.enter(Phase::Stopped);
        result
    }

    async fn drive(
        &self,
        client: &mut SwitchClient,
        pipeline: &PipelineConfig,
        entries: &[(TableEntry, Operation)],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.enter(Phase::Connecting);
        let version = client.capabilities().await?;
        event!(Level::INFO, %version, "connected to P4Runtime device");

        let mut arbitration = client.run(cancel).await?;
        self.enter(Phase::AwaitingPrimary);
        arbitration
            .wait_primary(self.options.arbitration_timeout)
            .await?;
        event!(
            Level::INFO,
            election_id = %client.target().election_id,
            "granted primary role"
        );

        self.enter(Phase::ConfiguringPipeline);
        client.set_forwarding_pipeline(pipeline).await?;

        self.enter(Phase::InstallingEntries);
        if !entries.is_empty() {
            let results = client.write_batch(entries).await?;
            let mut rejected = 0usize;
            for (index, ((_, operation), result)) in entries.iter().zip(&results).enumerate() {
                match result {
                    Ok(()) => event!(Level::INFO, index, %operation, "table entry written"),
                    Err(error) => {
                        rejected += 1;
                        event!(Level::WARN, index, %operation, %error, "table entry rejected");
                    }
                }
            }
            if rejected > 0 {
                event!(
                    Level::WARN,
                    rejected,
                    total = results.len(),
                    "entry batch finished with rejections"
                );
            }
        }

        self.enter(Phase::Idle);
        cancel.cancelled().await;
        event!(Level::INFO, "stop requested, shutting down");
        arbitration.join().await;
        Ok(())
    }

    fn enter(&self, phase: Phase) {
        let changed = self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
        if changed {
            event!(Level::INFO, %phase, "session phase");
        }
    }
}
