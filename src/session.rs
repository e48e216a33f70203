// author: kodeholic (powered by Claude)
// 세션 수립
//
// 순서 고정 (재배치 불가):
//   1. 엔진 세션 생성 (ICE 서버 없음 — 후보는 SDP에 포함)
//   2. on_track / on_ice / on_peer 콜백 등록  ← description 적용 전에 반드시 먼저
//   3. remote description 적용 (answer)
//   4. local description 적용 (offer)
//
// offer가 프로세스 외부에서 만들어졌더라도 answer를 먼저 알아야 local을 확정할 수 있음.
// 3/4 실패는 fatal — 입력이 프로세스 시작 전에 1회 캡처된 값이라 재시도 의미 없음.
// 실패 시 반쯤 만들어진 세션은 close 후 에러 반환.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::engine::{
    IceStateHandler, MediaEngine, MediaSession, PeerStateHandler, SessionDescription,
    SessionOptions, TrackHandler,
};
use crate::error::{BridgeError, BridgeResult};
use crate::sdp;
use crate::trace::{TraceHub, TraceKind};

/// 세션에 등록할 콜백 묶음
pub struct SessionHooks {
    pub on_track:      TrackHandler,
    pub on_ice_state:  IceStateHandler,
    pub on_peer_state: PeerStateHandler,
}

pub async fn establish(
    engine:    &dyn MediaEngine,
    config:    &SessionConfig,
    hooks:     SessionHooks,
    trace_hub: &TraceHub,
) -> BridgeResult<Arc<dyn MediaSession>> {
    let session = engine.create_session(SessionOptions::default()).await?;
    info!("[session] peer connection created");
    trace_hub.emit(TraceKind::Session, "created", None, "no ice servers");

    // 이벤트 유실 방지 — description 적용 전에 구독 완료
    session.on_track(hooks.on_track);
    session.on_ice_connection_state_change(hooks.on_ice_state);
    session.on_connection_state_change(hooks.on_peer_state);

    if let Err(e) = apply_descriptions(session.as_ref(), config, trace_hub).await {
        if let Err(close_err) = session.close().await {
            warn!("[session] close after failed setup: {}", close_err);
        }
        return Err(e);
    }

    info!("[session] established, waiting for RTP packets...");
    trace_hub.emit(TraceKind::Session, "established", None, "remote + local applied");
    Ok(session)
}

async fn apply_descriptions(
    session:   &dyn MediaSession,
    config:    &SessionConfig,
    trace_hub: &TraceHub,
) -> BridgeResult<()> {
    let remote = sdp::summarize(&config.remote_sdp);
    info!("[sdp] remote answer: {}", remote);
    if remote.candidates == 0 {
        warn!("[sdp] remote answer carries no ICE candidates; connectivity relies on peer-reflexive discovery");
    }
    info!("[sdp] local offer: {}", sdp::summarize(&config.local_sdp));

    info!("[sdp] applying remote description...");
    session
        .set_remote_description(SessionDescription::answer(config.remote_sdp.clone()))
        .await
        .map_err(|e| BridgeError::RemoteDescription(e.to_string()))?;
    trace_hub.emit(TraceKind::Session, "remote_applied", None, "answer");

    info!("[sdp] applying local description...");
    session
        .set_local_description(SessionDescription::offer(config.local_sdp.clone()))
        .await
        .map_err(|e| BridgeError::LocalDescription(e.to_string()))?;
    trace_hub.emit(TraceKind::Session, "local_applied", None, "offer");

    Ok(())
}
