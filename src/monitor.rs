// author: kodeholic (powered by Claude)
// 세션 생명주기 모니터
//
// 두 축의 상태 변화를 엔진 콜백으로 받음:
//   ICE 상태  : 로그만
//   Peer 상태 : 로그 + failed / closed 진입 시 브릿지 종료 트리거
//
// 재연결/재협상은 하지 않음 — 이 세션 하나를 릴레이하는 게 프로세스의 존재 이유이므로
// 세션이 끝나면 프로세스도 끝.
//
// 종료 전파: watch 채널 (None → Some(reason)), 첫 트리거만 유효.
// 릴레이 루프 / 통계 리포터 / 오케스트레이터가 각자 ShutdownSignal로 대기.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::{IceState, PeerState};
use crate::trace::{TraceHub, TraceKind};

/// 브릿지 종료 사유 — 모두 정상 종료(exit 0) 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    PeerFailed,
    PeerClosed,
    /// 운영자 SIGINT
    Interrupted,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::PeerFailed  => write!(f, "peer connection failed"),
            ShutdownReason::PeerClosed  => write!(f, "peer connection closed"),
            ShutdownReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

// ----------------------------------------------------------------------------
// [ShutdownSignal] — 종료 대기 측
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownSignal {
    /// 이미 트리거됐으면 즉시 반환
    /// 송신측(LifecycleMonitor)이 사라지면 영원히 대기 (트리거 불가)
    pub async fn triggered(&mut self) -> ShutdownReason {
        let result = self.rx.wait_for(|r| r.is_some()).await.map(|r| *r);
        match result {
            Ok(Some(reason)) => reason,
            _                => std::future::pending().await,
        }
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.rx.borrow()
    }
}

// ----------------------------------------------------------------------------
// [LifecycleMonitor]
// ----------------------------------------------------------------------------

pub struct LifecycleMonitor {
    tx:        watch::Sender<Option<ShutdownReason>>,
    trace_hub: Arc<TraceHub>,
}

impl LifecycleMonitor {
    pub fn new(trace_hub: Arc<TraceHub>) -> Arc<Self> {
        let (tx, _) = watch::channel(None);
        Arc::new(Self { tx, trace_hub })
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }

    pub fn on_ice_state(&self, state: IceState) {
        info!("[ice] state: {}", state);
        self.trace_hub.emit(TraceKind::State, "ice_state", None, state.as_str());
    }

    /// peer 상태 변화 — 종료 트리거 여부 반환
    pub fn on_peer_state(&self, state: PeerState) -> bool {
        info!("[peer] state: {}", state);
        self.trace_hub.emit(TraceKind::State, "peer_state", None, state.as_str());

        let reason = match state {
            PeerState::Failed => ShutdownReason::PeerFailed,
            PeerState::Closed => ShutdownReason::PeerClosed,
            _ => return false,
        };
        info!("[peer] connection {}, stopping bridge", state);
        self.trigger(reason)
    }

    /// 종료 트리거 — 첫 호출만 반영, 이후 호출은 false
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let fired = self.tx.send_if_modified(|cur| {
            if cur.is_some() {
                return false;
            }
            *cur = Some(reason);
            true
        });
        if fired {
            self.trace_hub.emit(TraceKind::Shutdown, "shutdown_requested", None, reason.to_string());
        } else {
            debug!("[bridge] shutdown already requested, ignoring {}", reason);
        }
        fired
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }
}
