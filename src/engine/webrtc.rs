// author: kodeholic (powered by Claude)
// webrtc-rs 기반 엔진 어댑터
//
// RTCPeerConnection 하나 = MediaSession 하나.
// 기본 코덱 + 기본 인터셉터(NACK/RTCP report 등) 등록, ICE 서버는 옵션 그대로
// (기본값: 없음 — 후보는 SDP에 포함).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine as RtcMediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

use crate::engine::{
    IceState, IceStateHandler, MediaEngine, MediaSession, PeerState, PeerStateHandler,
    RemoteTrack, SdpType, SessionDescription, SessionOptions, TrackHandler, TrackInfo, TrackRead,
};
use crate::error::{BridgeError, BridgeResult};

// ----------------------------------------------------------------------------
// [WebRtcEngine]
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct WebRtcEngine;

impl WebRtcEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn create_session(&self, options: SessionOptions) -> BridgeResult<Arc<dyn MediaSession>> {
        let mut media_engine = RtcMediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| BridgeError::Engine(format!("register codecs: {}", e)))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| BridgeError::Engine(format!("register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = options
            .ice_servers
            .iter()
            .map(|url| RTCIceServer { urls: vec![url.clone()], ..Default::default() })
            .collect();
        debug!("[engine] creating peer connection (ice_servers={})", ice_servers.len());

        let pc = api
            .new_peer_connection(RTCConfiguration { ice_servers, ..Default::default() })
            .await
            .map_err(|e| BridgeError::Engine(format!("new peer connection: {}", e)))?;

        Ok(Arc::new(WebRtcSession { pc: Arc::new(pc) }))
    }
}

// ----------------------------------------------------------------------------
// [WebRtcSession]
// ----------------------------------------------------------------------------

pub struct WebRtcSession {
    pc: Arc<RTCPeerConnection>,
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, webrtc::Error> {
    match desc.sdp_type {
        SdpType::Offer  => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    }
}

#[async_trait]
impl MediaSession for WebRtcSession {
    fn on_track(&self, handler: TrackHandler) {
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                handler(Arc::new(WebRtcTrack { track }));
            })
        }));
    }

    fn on_ice_connection_state_change(&self, handler: IceStateHandler) {
        self.pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            handler(ice_state(state));
            Box::pin(async {})
        }));
    }

    fn on_connection_state_change(&self, handler: PeerStateHandler) {
        self.pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            handler(peer_state(state));
            Box::pin(async {})
        }));
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> BridgeResult<()> {
        let rtc = to_rtc_description(desc).map_err(|e| BridgeError::Engine(e.to_string()))?;
        self.pc
            .set_remote_description(rtc)
            .await
            .map_err(|e| BridgeError::Engine(e.to_string()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> BridgeResult<()> {
        let rtc = to_rtc_description(desc).map_err(|e| BridgeError::Engine(e.to_string()))?;
        self.pc
            .set_local_description(rtc)
            .await
            .map_err(|e| BridgeError::Engine(e.to_string()))
    }

    async fn close(&self) -> BridgeResult<()> {
        self.pc.close().await.map_err(|e| BridgeError::Engine(e.to_string()))
    }
}

fn peer_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::New          => PeerState::New,
        RTCPeerConnectionState::Connecting   => PeerState::Connecting,
        RTCPeerConnectionState::Connected    => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed       => PeerState::Failed,
        RTCPeerConnectionState::Closed       => PeerState::Closed,
        RTCPeerConnectionState::Unspecified  => PeerState::Unspecified,
    }
}

fn ice_state(state: RTCIceConnectionState) -> IceState {
    match state {
        RTCIceConnectionState::New          => IceState::New,
        RTCIceConnectionState::Checking     => IceState::Checking,
        RTCIceConnectionState::Connected    => IceState::Connected,
        RTCIceConnectionState::Completed    => IceState::Completed,
        RTCIceConnectionState::Disconnected => IceState::Disconnected,
        RTCIceConnectionState::Failed       => IceState::Failed,
        RTCIceConnectionState::Closed       => IceState::Closed,
        RTCIceConnectionState::Unspecified  => IceState::Unspecified,
    }
}

// ----------------------------------------------------------------------------
// [WebRtcTrack]
// ----------------------------------------------------------------------------

pub struct WebRtcTrack {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl RemoteTrack for WebRtcTrack {
    fn info(&self) -> TrackInfo {
        let codec = self.track.codec();
        TrackInfo {
            ssrc:         self.track.ssrc(),
            kind:         self.track.kind().to_string(),
            mime_type:    codec.capability.mime_type.clone(),
            payload_type: codec.payload_type,
            clock_rate:   codec.capability.clock_rate,
        }
    }

    async fn read_packet(&self) -> TrackRead {
        match self.track.read_rtp().await {
            Ok((packet, _attributes)) => TrackRead::Packet(packet),
            Err(e) if is_end_of_stream(&e) => {
                trace!("[engine] track ssrc={} closed: {}", self.track.ssrc(), e);
                TrackRead::EndOfStream
            }
            Err(e) => TrackRead::Error(e.to_string()),
        }
    }
}

/// 트랙 종료 판별
/// 수신 버퍼가 닫히면 하위 크레이트(util/srtp/interceptor) 에러로 감싸져 올라오므로
/// 직접 variant + 메시지 둘 다 확인
fn is_end_of_stream(err: &webrtc::Error) -> bool {
    if matches!(err, webrtc::Error::ErrClosedPipe | webrtc::Error::ErrConnectionClosed) {
        return true;
    }
    is_end_of_stream_message(&err.to_string())
}

fn is_end_of_stream_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("eof") || msg.contains("closed")
}
