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

//! Client for the `p4.v1.P4Runtime` service, covering the methods this
//! crate's users call. Method paths and message types follow
//! p4runtime.proto; the bodies follow the shape tonic's codegen produces.

use tonic::codegen::http::Uri;
use tonic::codegen::*;

use super::p4runtime;

#[derive(Debug, Clone)]
pub struct P4RuntimeClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl P4RuntimeClient<tonic::transport::Channel> {
    /// Attempt to create a new client by connecting to a given endpoint.
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(conn))
    }
}

impl<T> P4RuntimeClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
{
    pub fn new(inner: T) -> Self {
        let inner = tonic::client::Grpc::new(inner);
        Self { inner }
    }

    pub fn with_origin(inner: T, origin: Uri) -> Self {
        let inner = tonic::client::Grpc::with_origin(inner, origin);
        Self { inner }
    }

    /// Batched entity update. Per-update failures come back as
    /// `p4.v1.Error` details on the error status.
    pub async fn write(
        &mut self,
        request: impl tonic::IntoRequest<p4runtime::WriteRequest>,
    ) -> std::result::Result<tonic::Response<p4runtime::WriteResponse>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/p4.v1.P4Runtime/Write");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("p4.v1.P4Runtime", "Write"));
        self.inner.unary(req, path, codec).await
    }

    pub async fn set_forwarding_pipeline_config(
        &mut self,
        request: impl tonic::IntoRequest<p4runtime::SetForwardingPipelineConfigRequest>,
    ) -> std::result::Result<
        tonic::Response<p4runtime::SetForwardingPipelineConfigResponse>,
        tonic::Status,
    > {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static(
            "/p4.v1.P4Runtime/SetForwardingPipelineConfig",
        );
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(
            "p4.v1.P4Runtime",
            "SetForwardingPipelineConfig",
        ));
        self.inner.unary(req, path, codec).await
    }

    pub async fn get_forwarding_pipeline_config(
        &mut self,
        request: impl tonic::IntoRequest<p4runtime::GetForwardingPipelineConfigRequest>,
    ) -> std::result::Result<
        tonic::Response<p4runtime::GetForwardingPipelineConfigResponse>,
        tonic::Status,
    > {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static(
            "/p4.v1.P4Runtime/GetForwardingPipelineConfig",
        );
        let mut req = request.into_request();
        req.extensions_mut().insert(GrpcMethod::new(
            "p4.v1.P4Runtime",
            "GetForwardingPipelineConfig",
        ));
        self.inner.unary(req, path, codec).await
    }

    /// The bidirectional session stream carrying arbitration updates,
    /// packet-in/out, and stream errors. A client's stream must stay open
    /// for its mastership claim to remain valid.
    pub async fn stream_channel(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = p4runtime::StreamMessageRequest>,
    ) -> std::result::Result<
        tonic::Response<tonic::codec::Streaming<p4runtime::StreamMessageResponse>>,
        tonic::Status,
    > {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/p4.v1.P4Runtime/StreamChannel");
        let mut req = request.into_streaming_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("p4.v1.P4Runtime", "StreamChannel"));
        self.inner.streaming(req, path, codec).await
    }

    pub async fn capabilities(
        &mut self,
        request: impl tonic::IntoRequest<p4runtime::CapabilitiesRequest>,
    ) -> std::result::Result<tonic::Response<p4runtime::CapabilitiesResponse>, tonic::Status>
    {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::new(
                tonic::Code::Unknown,
                format!("Service was not ready: {}", e.into()),
            )
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/p4.v1.P4Runtime/Capabilities");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("p4.v1.P4Runtime", "Capabilities"));
        self.inner.unary(req, path, codec).await
    }
}
