// author: kodeholic (powered by Claude)
// 미디어 전송 엔진 경계
//
// ICE / DTLS-SRTP / RTP 프레이밍은 엔진 책임이고, 브릿지는 아래 능력만 사용합니다.
//
//   MediaEngine::create_session(options)      → MediaSession
//   MediaSession::set_remote_description(..)  → Ok / Err
//   MediaSession::set_local_description(..)   → Ok / Err
//   MediaSession::on_track(handler)           — 트랙 도착 콜백
//   MediaSession::on_*_state_change(handler)  — 상태 변화 콜백
//   RemoteTrack::read_packet()                → Packet / EndOfStream / Error
//
// 콜백은 엔진 내부 태스크에서 호출됨 — 메인 흐름에서 불린다고 가정하지 말 것.
// 실제 구현은 engine/webrtc.rs (webrtc-rs), 테스트는 스크립트 엔진을 끼워 넣음.

pub mod webrtc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BridgeResult;

pub use ::webrtc::rtp::packet::Packet as RtpPacket;
pub use self::webrtc::WebRtcEngine;

// ----------------------------------------------------------------------------
// [Session Description]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer  => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp:      String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Answer, sdp: sdp.into() }
    }
}

/// 세션 생성 옵션
/// ICE 서버는 기본적으로 비어 있음 — 후보는 SDP에 포함돼 온다고 가정
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub ice_servers: Vec<String>,
}

// ----------------------------------------------------------------------------
// [Connection State]
// ----------------------------------------------------------------------------

/// 전체 세션(peer connection) 상태 — 종료 판단은 이 축만 사용
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
    Unspecified,
}

impl PeerState {
    /// failed / closed 만 브릿지 종료 대상
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeerState::New          => "new",
            PeerState::Connecting   => "connecting",
            PeerState::Connected    => "connected",
            PeerState::Disconnected => "disconnected",
            PeerState::Failed       => "failed",
            PeerState::Closed       => "closed",
            PeerState::Unspecified  => "unspecified",
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE 연결 상태 — 관찰(로그) 전용
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
    Unspecified,
}

impl IceState {
    pub fn as_str(self) -> &'static str {
        match self {
            IceState::New          => "new",
            IceState::Checking     => "checking",
            IceState::Connected    => "connected",
            IceState::Completed    => "completed",
            IceState::Disconnected => "disconnected",
            IceState::Failed       => "failed",
            IceState::Closed       => "closed",
            IceState::Unspecified  => "unspecified",
        }
    }
}

impl fmt::Display for IceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// [Track]
// ----------------------------------------------------------------------------

/// 트랙 식별 정보 (SSRC + 코덱 디스크립터)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub ssrc:         u32,
    pub kind:         String,
    pub mime_type:    String,
    pub payload_type: u8,
    pub clock_rate:   u32,
}

/// 트랙 read 결과
#[derive(Debug)]
pub enum TrackRead {
    Packet(RtpPacket),
    /// 트랙 종료 — 해당 트랙의 루프만 끝냄
    EndOfStream,
    /// 일시적 에러 — 로그 후 계속 read
    Error(String),
}

#[async_trait]
pub trait RemoteTrack: Send + Sync {
    fn info(&self) -> TrackInfo;

    /// 다음 RTP 패킷까지 블로킹
    async fn read_packet(&self) -> TrackRead;
}

// ----------------------------------------------------------------------------
// [Session / Engine]
// ----------------------------------------------------------------------------

pub type TrackHandler     = Arc<dyn Fn(Arc<dyn RemoteTrack>) + Send + Sync>;
pub type PeerStateHandler = Arc<dyn Fn(PeerState) + Send + Sync>;
pub type IceStateHandler  = Arc<dyn Fn(IceState) + Send + Sync>;

#[async_trait]
pub trait MediaSession: Send + Sync {
    fn on_track(&self, handler: TrackHandler);
    fn on_ice_connection_state_change(&self, handler: IceStateHandler);
    fn on_connection_state_change(&self, handler: PeerStateHandler);

    async fn set_remote_description(&self, desc: SessionDescription) -> BridgeResult<()>;
    async fn set_local_description(&self, desc: SessionDescription) -> BridgeResult<()>;

    /// 종료 후 재사용 불가
    async fn close(&self) -> BridgeResult<()>;
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn create_session(&self, options: SessionOptions) -> BridgeResult<Arc<dyn MediaSession>>;
}
