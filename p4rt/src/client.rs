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

//! The device boundary and the client facade built on it.
//!
//! [`DeviceRpc`] is the narrow seam to the device: production code wraps the
//! generated gRPC client, tests substitute an in-process fake and drive the
//! same sessions against it. [`SwitchClient`] owns one boundary object plus
//! the session identity and gates every mutating call on mastership.

use async_trait::async_trait;

use futures::stream::BoxStream;
use futures::StreamExt;

use proto::p4runtime::{
    get_forwarding_pipeline_config_request, set_forwarding_pipeline_config_request,
    CapabilitiesRequest, GetForwardingPipelineConfigRequest, GetForwardingPipelineConfigResponse,
    PacketIn, SetForwardingPipelineConfigRequest, StreamMessageRequest, StreamMessageResponse,
    WriteRequest,
};
use proto::p4runtime_grpc::P4RuntimeClient;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use tracing::{event, Level};

use crate::arbitration::{
    self, ArbitrationActor, ArbitrationHandle, ElectionId, Mastership, Role,
};
use crate::error::Error;
use crate::pipeline::PipelineConfig;

/// Buffering per direction on the stream channel and on the packet-in
/// passthrough.
const CHANNEL_SIZE: usize = 128;

/// Response half of the stream channel.
pub type NotificationStream = BoxStream<'static, Result<StreamMessageResponse, tonic::Status>>;

/// The device calls the client depends on, object-safe so sessions run
/// unchanged against a fake in tests.
#[async_trait]
pub trait DeviceRpc: Send {
    /// P4Runtime API version the device implements.
    async fn capabilities(&mut self) -> Result<String, tonic::Status>;

    /// Opens the bidirectional stream channel: the request sender and the
    /// notification stream.
    async fn open_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<StreamMessageRequest>, NotificationStream), tonic::Status>;

    async fn set_forwarding_pipeline_config(
        &mut self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<(), tonic::Status>;

    async fn get_forwarding_pipeline_config(
        &mut self,
        request: GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse, tonic::Status>;

    async fn write(&mut self, request: WriteRequest) -> Result<(), tonic::Status>;
}

/// [`DeviceRpc`] over a connected gRPC channel.
pub struct GrpcDevice {
    client: P4RuntimeClient<tonic::transport::Channel>,
}

impl GrpcDevice {
    pub fn new(client: P4RuntimeClient<tonic::transport::Channel>) -> Self {
        GrpcDevice { client }
    }

    /// Connects to `addr` (`host:port`, plaintext).
    pub async fn connect(addr: &str) -> Result<Self, tonic::transport::Error> {
        let client = P4RuntimeClient::connect(format!("http://{}", addr)).await?;
        Ok(GrpcDevice::new(client))
    }
}

#[async_trait]
impl DeviceRpc for GrpcDevice {
    async fn capabilities(&mut self) -> Result<String, tonic::Status> {
        let response = self.client.capabilities(CapabilitiesRequest {}).await?;
        Ok(response.into_inner().p4runtime_api_version)
    }

    async fn open_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<StreamMessageRequest>, NotificationStream), tonic::Status> {
        let (requests, rx) = mpsc::channel(CHANNEL_SIZE);
        let responses = self.client.stream_channel(ReceiverStream::new(rx)).await?;
        Ok((requests, responses.into_inner().boxed()))
    }

    async fn set_forwarding_pipeline_config(
        &mut self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<(), tonic::Status> {
        self.client.set_forwarding_pipeline_config(request).await?;
        Ok(())
    }

    async fn get_forwarding_pipeline_config(
        &mut self,
        request: GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse, tonic::Status> {
        Ok(self
            .client
            .get_forwarding_pipeline_config(request)
            .await?
            .into_inner())
    }

    async fn write(&mut self, request: WriteRequest) -> Result<(), tonic::Status> {
        self.client.write(request).await?;
        Ok(())
    }
}

/// Identity of one device session: which device, and this client's bid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceTarget {
    pub device_id: u64,
    pub election_id: ElectionId,
}

/// Outcome of a pipeline push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePush {
    /// The device verified and committed the config.
    Committed,
    /// The device already holds a config with this cookie; nothing was
    /// pushed.
    AlreadyCurrent,
}

/// Client facade for a single device.
///
/// Mutating calls take `&mut self`, so one client cannot interleave its own
/// writes. Calls made while not primary fail locally with
/// [`Error::NotPrimary`] and reach no RPC.
pub struct SwitchClient {
    rpc: Box<dyn DeviceRpc>,
    target: DeviceTarget,
    mastership: Option<watch::Receiver<Mastership>>,
    requests: Option<mpsc::Sender<StreamMessageRequest>>,
    packets: Option<mpsc::Receiver<PacketIn>>,
}

impl SwitchClient {
    pub fn new(rpc: Box<dyn DeviceRpc>, target: DeviceTarget) -> Self {
        SwitchClient {
            rpc,
            target,
            mastership: None,
            requests: None,
            packets: None,
        }
    }

    pub fn target(&self) -> DeviceTarget {
        self.target
    }

    pub(crate) fn rpc(&mut self) -> &mut dyn DeviceRpc {
        self.rpc.as_mut()
    }

    /// Protocol version reported by the device.
    pub async fn capabilities(&mut self) -> Result<String, Error> {
        self.rpc.capabilities().await.map_err(Error::Connection)
    }

    /// Opens the stream channel, sends this client's arbitration bid, and
    /// spawns the notification reader. The reader runs until the stream
    /// ends or `cancel` fires; an expired primary wait does not stop it.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ArbitrationHandle, Error> {
        let (requests, responses) = self.rpc.open_stream().await.map_err(Error::Connection)?;
        let bid =
            arbitration::master_arbitration_update(self.target.device_id, self.target.election_id);
        requests.send(bid).await.map_err(|_| Error::StreamClosed)?;

        let (state_tx, state_rx) = watch::channel(Mastership::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (packet_tx, packet_rx) = mpsc::channel(CHANNEL_SIZE);
        let actor = ArbitrationActor::new(responses, state_tx, ready_tx, packet_tx, cancel.clone());
        let reader = tokio::spawn(actor.run());

        self.mastership = Some(state_rx.clone());
        self.requests = Some(requests);
        self.packets = Some(packet_rx);
        Ok(ArbitrationHandle {
            ready: Some(ready_rx),
            granted: false,
            updates: state_rx,
            reader,
        })
    }

    /// Current mastership; `Unknown` before [`SwitchClient::run`] and after
    /// stream loss.
    pub fn mastership(&self) -> Mastership {
        self.mastership
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    pub fn is_primary(&self) -> bool {
        self.mastership().role == Role::Primary
    }

    /// Takes the packet-in receiver. Packets that arrive while nobody holds
    /// the receiver, or while it is full, are dropped.
    pub fn take_packets(&mut self) -> Option<mpsc::Receiver<PacketIn>> {
        self.packets.take()
    }

    pub(crate) fn require_primary(&self) -> Result<(), Error> {
        if self.is_primary() {
            Ok(())
        } else {
            Err(Error::NotPrimary(self.target.device_id))
        }
    }

    /// Pushes the pipeline config, verify-and-commit. With a nonzero cookie
    /// the device is probed first and an identical installed cookie skips
    /// the push.
    pub async fn set_forwarding_pipeline(
        &mut self,
        config: &PipelineConfig,
    ) -> Result<PipelinePush, Error> {
        self.require_primary()?;
        if config.cookie() != 0 {
            if let Some(installed) = self.device_cookie().await {
                if installed == config.cookie() {
                    event!(
                        Level::INFO,
                        cookie = installed,
                        "device already holds this pipeline config"
                    );
                    return Ok(PipelinePush::AlreadyCurrent);
                }
            }
        }
        let request = SetForwardingPipelineConfigRequest {
            device_id: self.target.device_id,
            role_id: 0,
            election_id: Some(self.target.election_id.into()),
            action: set_forwarding_pipeline_config_request::Action::VerifyAndCommit as i32,
            config: Some(config.to_proto()),
        };
        self.rpc
            .set_forwarding_pipeline_config(request)
            .await
            .map_err(Error::PipelinePush)?;
        event!(
            Level::INFO,
            device_id = self.target.device_id,
            cookie = config.cookie(),
            "forwarding pipeline committed"
        );
        Ok(PipelinePush::Committed)
    }

    /// Cookie installed on the device, if any. Probe errors count as "no
    /// config": a device without a pipeline rejects the call.
    async fn device_cookie(&mut self) -> Option<u64> {
        let request = GetForwardingPipelineConfigRequest {
            device_id: self.target.device_id,
            response_type: get_forwarding_pipeline_config_request::ResponseType::CookieOnly as i32,
        };
        match self.rpc.get_forwarding_pipeline_config(request).await {
            Ok(response) => response.config.and_then(|c| c.cookie).map(|c| c.cookie),
            Err(status) => {
                event!(Level::DEBUG, %status, "cookie probe failed, pushing anyway");
                None
            }
        }
    }
}
