#![allow(dead_code)]

//! Shared fixtures: a small fixed pipeline schema and an in-process fake
//! device implementing `DeviceRpc` with real arbitration, pipeline, and
//! write semantics.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use prost::Message;

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

use proto::p4info::{self, P4Info};
use proto::p4runtime::{
    entity, forwarding_pipeline_config, stream_message_request, stream_message_response, update,
    ForwardingPipelineConfig, GetForwardingPipelineConfigRequest,
    GetForwardingPipelineConfigResponse, MasterArbitrationUpdate, PacketIn,
    SetForwardingPipelineConfigRequest, StreamMessageRequest, StreamMessageResponse, TableEntry,
    Uint128, Update, WriteRequest,
};
use proto::status::Code;

use p4rt::client::{DeviceRpc, NotificationStream};
use p4rt::{Mastership, Phase, PipelineConfig, Role, Switch};

pub const IPV4_LPM: &str = "MyIngress.ipv4_lpm";
pub const ACL: &str = "MyIngress.acl";
pub const SMAC: &str = "MyIngress.smac";
pub const DROP: &str = "MyIngress.drop";
pub const FORWARD: &str = "MyIngress.ipv4_forward";
pub const NO_ACTION: &str = "NoAction";

pub const API_VERSION: &str = "1.3.0";

fn preamble(id: u32, name: &str, alias: &str) -> p4info::Preamble {
    p4info::Preamble {
        id,
        name: name.to_string(),
        alias: alias.to_string(),
    }
}

fn match_field(
    id: u32,
    name: &str,
    bitwidth: i32,
    match_type: p4info::match_field::MatchType,
) -> p4info::MatchField {
    p4info::MatchField {
        id,
        name: name.to_string(),
        bitwidth,
        r#match: Some(p4info::match_field::Match::MatchType(match_type as i32)),
    }
}

fn action_ref(id: u32, scope: p4info::action_ref::Scope) -> p4info::ActionRef {
    p4info::ActionRef {
        id,
        scope: scope as i32,
    }
}

/// A three-table slice of the classic basic-forwarding tutorial pipeline.
pub fn test_p4info() -> P4Info {
    use p4info::action_ref::Scope;
    use p4info::match_field::MatchType;

    let drop = p4info::Action {
        preamble: Some(preamble(16_800_567, DROP, "drop")),
        params: vec![],
    };
    let forward = p4info::Action {
        preamble: Some(preamble(16_799_317, FORWARD, "ipv4_forward")),
        params: vec![
            p4info::action::Param {
                id: 1,
                name: "dstAddr".to_string(),
                bitwidth: 48,
            },
            p4info::action::Param {
                id: 2,
                name: "port".to_string(),
                bitwidth: 9,
            },
        ],
    };
    let no_action = p4info::Action {
        preamble: Some(preamble(21_257_015, NO_ACTION, NO_ACTION)),
        params: vec![],
    };

    let ipv4_lpm = p4info::Table {
        preamble: Some(preamble(33_574_068, IPV4_LPM, "ipv4_lpm")),
        match_fields: vec![match_field(1, "hdr.ipv4.dstAddr", 32, MatchType::Lpm)],
        action_refs: vec![
            action_ref(16_799_317, Scope::TableAndDefault),
            action_ref(16_800_567, Scope::TableAndDefault),
            action_ref(21_257_015, Scope::DefaultOnly),
        ],
        size: 1024,
        ..Default::default()
    };
    let acl = p4info::Table {
        preamble: Some(preamble(33_581_894, ACL, "acl")),
        match_fields: vec![
            match_field(1, "hdr.ethernet.dstAddr", 48, MatchType::Ternary),
            match_field(2, "standard_metadata.ingress_port", 9, MatchType::Range),
        ],
        action_refs: vec![action_ref(16_800_567, Scope::TableAndDefault)],
        size: 128,
        ..Default::default()
    };
    let smac = p4info::Table {
        preamble: Some(preamble(33_562_826, SMAC, "smac")),
        match_fields: vec![match_field(1, "hdr.ethernet.srcAddr", 48, MatchType::Exact)],
        action_refs: vec![action_ref(16_800_567, Scope::TableAndDefault)],
        size: 256,
        ..Default::default()
    };

    P4Info {
        pkg_info: Some(p4info::PkgInfo {
            name: "basic".to_string(),
            version: "1".to_string(),
            arch: "v1model".to_string(),
        }),
        tables: vec![ipv4_lpm, acl, smac],
        actions: vec![drop, forward, no_action],
    }
}

pub fn test_switch() -> Switch {
    Switch::from(&test_p4info())
}

pub fn test_pipeline(cookie: u64) -> PipelineConfig {
    PipelineConfig::new(test_p4info(), br#"{"program":"basic"}"#.to_vec(), cookie)
}

/// Waits until the watch reports `role`, or fails the test.
pub async fn wait_for_role(rx: &mut watch::Receiver<Mastership>, role: Role) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if rx.borrow_and_update().role == role {
                return;
            }
            rx.changed().await.expect("mastership watch closed");
        }
    })
    .await
    .expect("role change did not arrive in time");
}

/// Waits until the session reaches `phase`, or fails the test.
pub async fn wait_for_phase(rx: &mut watch::Receiver<Phase>, phase: Phase) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow_and_update() == phase {
                return;
            }
            rx.changed().await.expect("phase watch closed");
        }
    })
    .await
    .expect("session phase did not arrive in time");
}

struct StreamPeer {
    device_id: u64,
    election_id: u128,
    tx: mpsc::Sender<Result<StreamMessageResponse, Status>>,
}

type EntryKey = (u32, i32, Vec<Vec<u8>>);

fn entry_key(entry: &TableEntry) -> EntryKey {
    let mut fields: Vec<Vec<u8>> = entry.r#match.iter().map(|m| m.encode_to_vec()).collect();
    fields.sort();
    (entry.table_id, entry.priority, fields)
}

fn election(election_id: &Option<Uint128>) -> u128 {
    election_id
        .as_ref()
        .map(|e| ((e.high as u128) << 64) | e.low as u128)
        .unwrap_or(0)
}

fn entry_error(code: Code, message: &str) -> proto::p4runtime::Error {
    proto::p4runtime::Error {
        canonical_code: code as i32,
        message: message.to_string(),
        space: "targets/fake".to_string(),
        code: code as i32,
        details: None,
    }
}

#[derive(Default)]
struct DeviceState {
    streams: Vec<StreamPeer>,
    entries: HashSet<EntryKey>,
    installed_cookie: Option<u64>,
    installed_p4info: Vec<u8>,
    fail_next_write: Option<Status>,
    set_pipeline_calls: usize,
    get_pipeline_calls: usize,
    write_calls: usize,
}

impl DeviceState {
    fn winner(&self) -> Option<u128> {
        self.streams.iter().map(|peer| peer.election_id).max()
    }

    fn is_primary(&self, election_id: &Option<Uint128>) -> bool {
        election_id.is_some() && self.winner() == Some(election(election_id))
    }

    /// Notifies every open stream of the current arbitration outcome, the
    /// way a device does after any bid or disconnect.
    fn arbitrate(&mut self) {
        let Some(winner) = self.winner() else { return };
        for peer in &self.streams {
            let code = if peer.election_id == winner {
                Code::Ok
            } else {
                Code::AlreadyExists
            };
            let response = StreamMessageResponse {
                update: Some(stream_message_response::Update::Arbitration(
                    MasterArbitrationUpdate {
                        device_id: peer.device_id,
                        election_id: Some(Uint128 {
                            high: (winner >> 64) as u64,
                            low: winner as u64,
                        }),
                        status: Some(proto::status::Status {
                            code: code as i32,
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                )),
            };
            let _ = peer.tx.try_send(Ok(response));
        }
    }

    fn apply(&mut self, update: &Update) -> proto::p4runtime::Error {
        let ok = proto::p4runtime::Error {
            canonical_code: Code::Ok as i32,
            ..Default::default()
        };
        let entry = match update.entity.as_ref().and_then(|e| e.entity.as_ref()) {
            Some(entity::Entity::TableEntry(entry)) => entry,
            _ => return entry_error(Code::Unimplemented, "only table entries are supported"),
        };
        let key = entry_key(entry);
        match update::Type::try_from(update.r#type) {
            Ok(update::Type::Insert) => {
                if self.entries.insert(key) {
                    ok
                } else {
                    entry_error(Code::AlreadyExists, "entry already exists")
                }
            }
            Ok(update::Type::Modify) => {
                if self.entries.contains(&key) {
                    ok
                } else {
                    entry_error(Code::NotFound, "entry does not exist")
                }
            }
            Ok(update::Type::Delete) => {
                if self.entries.remove(&key) {
                    ok
                } else {
                    entry_error(Code::NotFound, "entry does not exist")
                }
            }
            _ => entry_error(Code::InvalidArgument, "unspecified update type"),
        }
    }
}

/// An in-process device. Clones share state, so a test can hold one handle
/// for assertions while clients own others.
#[derive(Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        FakeDevice::default()
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn installed_cookie(&self) -> Option<u64> {
        self.state.lock().unwrap().installed_cookie
    }

    /// The schema document bytes received with the last accepted push.
    pub fn installed_p4info(&self) -> Vec<u8> {
        self.state.lock().unwrap().installed_p4info.clone()
    }

    pub fn set_pipeline_calls(&self) -> usize {
        self.state.lock().unwrap().set_pipeline_calls
    }

    pub fn get_pipeline_calls(&self) -> usize {
        self.state.lock().unwrap().get_pipeline_calls
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }

    pub fn open_streams(&self) -> usize {
        self.state.lock().unwrap().streams.len()
    }

    /// The next write fails as a whole with `status`, no per-entry details.
    pub fn fail_next_write(&self, status: Status) {
        self.state.lock().unwrap().fail_next_write = Some(status);
    }

    /// Emits a packet-in on every open stream.
    pub fn send_packet(&self, payload: Vec<u8>) {
        let state = self.state.lock().unwrap();
        for peer in &state.streams {
            let _ = peer.tx.try_send(Ok(StreamMessageResponse {
                update: Some(stream_message_response::Update::Packet(PacketIn {
                    payload: payload.clone(),
                    metadata: vec![],
                })),
            }));
        }
    }
}

fn register_bid(
    state: &Arc<Mutex<DeviceState>>,
    tx: &mpsc::Sender<Result<StreamMessageResponse, Status>>,
    bid: MasterArbitrationUpdate,
) {
    let mut state = state.lock().unwrap();
    let election_id = election(&bid.election_id);
    match state.streams.iter_mut().find(|peer| tx.same_channel(&peer.tx)) {
        Some(peer) => peer.election_id = election_id,
        None => state.streams.push(StreamPeer {
            device_id: bid.device_id,
            election_id,
            tx: tx.clone(),
        }),
    }
    state.arbitrate();
}

#[async_trait]
impl DeviceRpc for FakeDevice {
    async fn capabilities(&mut self) -> Result<String, Status> {
        Ok(API_VERSION.to_string())
    }

    async fn open_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<StreamMessageRequest>, NotificationStream), Status> {
        let (request_tx, mut request_rx) = mpsc::channel::<StreamMessageRequest>(16);
        let (response_tx, response_rx) = mpsc::channel::<Result<StreamMessageResponse, Status>>(16);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                if let Some(stream_message_request::Update::Arbitration(bid)) = request.update {
                    register_bid(&state, &response_tx, bid);
                }
            }
            // The client hung up: drop the peer and re-arbitrate.
            let mut state = state.lock().unwrap();
            state.streams.retain(|peer| !response_tx.same_channel(&peer.tx));
            state.arbitrate();
        });
        Ok((request_tx, ReceiverStream::new(response_rx).boxed()))
    }

    async fn set_forwarding_pipeline_config(
        &mut self,
        request: SetForwardingPipelineConfigRequest,
    ) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        state.set_pipeline_calls += 1;
        if !state.is_primary(&request.election_id) {
            return Err(Status::permission_denied("not primary"));
        }
        let config = request.config.unwrap_or_default();
        state.installed_cookie = Some(config.cookie.as_ref().map(|c| c.cookie).unwrap_or(0));
        state.installed_p4info = config.p4info;
        Ok(())
    }

    async fn get_forwarding_pipeline_config(
        &mut self,
        _request: GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.get_pipeline_calls += 1;
        match state.installed_cookie {
            Some(cookie) => Ok(GetForwardingPipelineConfigResponse {
                config: Some(ForwardingPipelineConfig {
                    p4info: vec![],
                    p4_device_config: vec![],
                    cookie: (cookie != 0)
                        .then(|| forwarding_pipeline_config::Cookie { cookie }),
                }),
            }),
            None => Err(Status::failed_precondition("no forwarding pipeline config")),
        }
    }

    async fn write(&mut self, request: WriteRequest) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        state.write_calls += 1;
        if let Some(status) = state.fail_next_write.take() {
            return Err(status);
        }
        if !state.is_primary(&request.election_id) {
            return Err(Status::permission_denied("not primary"));
        }
        let outcomes: Vec<proto::p4runtime::Error> = request
            .updates
            .iter()
            .map(|update| state.apply(update))
            .collect();
        if outcomes.iter().all(|e| e.canonical_code == Code::Ok as i32) {
            return Ok(());
        }
        let grpc_status = proto::status::Status {
            code: Code::Unknown as i32,
            message: "one or more write operations failed".to_string(),
            details: outcomes
                .iter()
                .map(|e| prost_types::Any {
                    type_url: "type.googleapis.com/p4.v1.Error".to_string(),
                    value: e.encode_to_vec(),
                })
                .collect(),
        };
        Err(Status::with_details(
            tonic::Code::Unknown,
            "one or more write operations failed",
            grpc_status.encode_to_vec().into(),
        ))
    }
}
