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

//! Mastership arbitration over the stream channel.
//!
//! A spawned reader owns the response half of the stream. It republishes
//! every arbitration notification on a watch channel and fires a one-shot
//! readiness gate on the first primary grant. Demotion never rescinds the
//! gate; mutating calls check the current role instead.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;

use proto::p4runtime::{
    stream_message_request, stream_message_response, MasterArbitrationUpdate, PacketIn,
    StreamMessageRequest, StreamMessageResponse, Uint128,
};
use proto::status::Code;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tracing::{event, Level};

use crate::error::Error;

/// 128-bit election identifier. The device grants the primary role to the
/// live stream bidding the highest value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElectionId(pub u128);

impl From<ElectionId> for Uint128 {
    fn from(e: ElectionId) -> Self {
        Uint128 {
            high: (e.0 >> 64) as u64,
            low: e.0 as u64,
        }
    }
}

impl From<&Uint128> for ElectionId {
    fn from(u: &Uint128) -> Self {
        ElectionId(((u.high as u128) << 64) | u.low as u128)
    }
}

impl FromStr for ElectionId {
    type Err = <u128 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ElectionId(str::parse::<u128>(s)?))
    }
}

impl Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role the device assigned to this client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    /// No arbitration outcome yet, or the stream is gone.
    #[default]
    Unknown,
    Backup,
    Primary,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Unknown => "unknown",
            Role::Backup => "backup",
            Role::Primary => "primary",
        };
        write!(f, "{}", s)
    }
}

/// Arbitration state, republished on every device notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mastership {
    pub role: Role,
    /// Election id of the device's current primary, from the latest
    /// notification. `None` before the first notification or when the
    /// device reports that no primary exists.
    pub primary: Option<ElectionId>,
}

/// The arbitration bid that opens a stream channel.
pub fn master_arbitration_update(device_id: u64, election_id: ElectionId) -> StreamMessageRequest {
    StreamMessageRequest {
        update: Some(stream_message_request::Update::Arbitration(
            MasterArbitrationUpdate {
                device_id,
                election_id: Some(election_id.into()),
                ..Default::default()
            },
        )),
    }
}

pub(crate) struct ArbitrationActor {
    stream: BoxStream<'static, Result<StreamMessageResponse, tonic::Status>>,
    state: watch::Sender<Mastership>,
    ready: Option<oneshot::Sender<()>>,
    packets: mpsc::Sender<PacketIn>,
    cancel: CancellationToken,
}

impl ArbitrationActor {
    pub(crate) fn new(
        stream: BoxStream<'static, Result<StreamMessageResponse, tonic::Status>>,
        state: watch::Sender<Mastership>,
        ready: oneshot::Sender<()>,
        packets: mpsc::Sender<PacketIn>,
        cancel: CancellationToken,
    ) -> Self {
        ArbitrationActor {
            stream,
            state,
            ready: Some(ready),
            packets,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.stream.next() => match message {
                    Some(Ok(response)) => self.handle_response(response),
                    Some(Err(status)) => {
                        event!(Level::WARN, %status, "stream channel failed");
                        self.state.send_replace(Mastership::default());
                        break;
                    }
                    None => {
                        event!(Level::WARN, "stream channel closed by device");
                        self.state.send_replace(Mastership::default());
                        break;
                    }
                },
            }
        }
    }

    fn handle_response(&mut self, response: StreamMessageResponse) {
        use stream_message_response::Update;
        match response.update {
            Some(Update::Arbitration(update)) => self.handle_arbitration(update),
            Some(Update::Packet(packet)) => {
                // Never let a slow consumer stall arbitration.
                if self.packets.try_send(packet).is_err() {
                    event!(Level::DEBUG, "dropping packet-in, receiver not keeping up");
                }
            }
            Some(Update::Error(error)) => {
                event!(
                    Level::WARN,
                    canonical_code = error.canonical_code,
                    message = %error.message,
                    "device reported a stream error"
                );
            }
            None => event!(Level::DEBUG, "ignoring stream message with no update"),
        }
    }

    fn handle_arbitration(&mut self, update: MasterArbitrationUpdate) {
        // OK grants mastership to this client. Any other code, normally
        // ALREADY_EXISTS, means some higher bid holds the device.
        let role = match update.status {
            Some(ref status) if status.code == Code::Ok as i32 => Role::Primary,
            _ => Role::Backup,
        };
        let primary = update.election_id.as_ref().map(ElectionId::from);
        if role != self.state.borrow().role {
            event!(
                Level::INFO,
                device_id = update.device_id,
                %role,
                primary = ?primary.map(|e| e.0),
                "mastership changed"
            );
        }
        self.state.send_replace(Mastership { role, primary });
        if role == Role::Primary {
            if let Some(ready) = self.ready.take() {
                // The waiter may have given up already; the grant stands.
                let _ = ready.send(());
            }
        }
    }
}

/// Handle on a running stream reader: the readiness gate, a subscription to
/// role changes, and the reader task itself.
pub struct ArbitrationHandle {
    pub(crate) ready: Option<oneshot::Receiver<()>>,
    pub(crate) granted: bool,
    pub(crate) updates: watch::Receiver<Mastership>,
    pub(crate) reader: JoinHandle<()>,
}

impl ArbitrationHandle {
    /// Current state, without waiting.
    pub fn mastership(&self) -> Mastership {
        self.updates.borrow().clone()
    }

    /// A watch on role changes. Useful for callers that react to demotion
    /// rather than polling before each write.
    pub fn subscribe(&self) -> watch::Receiver<Mastership> {
        self.updates.clone()
    }

    /// Waits for the first primary grant of this session, at most `wait`.
    /// Expiry abandons only the wait: the reader keeps running and a later
    /// grant is still observable through [`ArbitrationHandle::subscribe`].
    pub async fn wait_primary(&mut self, wait: Duration) -> Result<(), Error> {
        if self.granted {
            return Ok(());
        }
        let mut ready = match self.ready.take() {
            Some(ready) => ready,
            None => return Err(Error::StreamClosed),
        };
        match tokio::time::timeout(wait, &mut ready).await {
            Ok(Ok(())) => {
                self.granted = true;
                Ok(())
            }
            Ok(Err(_)) => Err(Error::StreamClosed),
            Err(_) => {
                // Timed out, not consumed. A later wait may still succeed.
                self.ready = Some(ready);
                Err(Error::ArbitrationTimeout(wait))
            }
        }
    }

    /// Waits for the reader to exit. It does so once the stream ends or the
    /// stop token fires.
    pub async fn join(self) {
        let _ = self.reader.await;
    }
}
