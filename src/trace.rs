// author: kodeholic (powered by Claude)
//
// TraceHub — 브릿지 이벤트 실시간 관찰 버스
//
// 구조:
//   session / relay / monitor / bridge
//       └── TraceHub::publish(event)
//               └── broadcast::Sender  (구독자 수에 무관하게 O(1) publish)
//                       ├── --trace JSON lines (stderr)
//                       └── 테스트 구독자
//
// 구독자가 없을 때 publish는 그냥 drop (릴레이 성능에 무영향)
// 구독자가 느리면 lagged 에러 반환 — 구독자 쪽에서 처리

use std::sync::Arc;
use tokio::sync::broadcast;
use serde::Serialize;

use crate::config::TRACE_BUF;
use crate::utils::current_timestamp;

/// 이벤트 분류
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    /// 세션 수립 단계 (create / remote / local / established)
    Session,
    /// 트랙 시작 / 종료
    Track,
    /// ICE / peer 상태 변화
    State,
    /// 브릿지 종료
    Shutdown,
}

/// 하나의 브릿지 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Unix millis
    pub ts:      u64,
    pub kind:    TraceKind,
    /// 이벤트 이름 (예: "track_started", "peer_state")
    pub name:    String,
    /// 관련 트랙 SSRC (없으면 None)
    pub ssrc:    Option<u32>,
    /// 이벤트 요약 메시지
    pub summary: String,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, name: &str, ssrc: Option<u32>, summary: impl Into<String>) -> Self {
        Self {
            ts: current_timestamp(),
            kind,
            name: name.to_string(),
            ssrc,
            summary: summary.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// [TraceHub]
// ----------------------------------------------------------------------------

pub struct TraceHub {
    tx: broadcast::Sender<TraceEvent>,
}

impl TraceHub {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(TRACE_BUF);
        Arc::new(Self { tx })
    }

    /// 이벤트 publish — 구독자가 없으면 조용히 무시
    pub fn publish(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }

    pub fn emit(&self, kind: TraceKind, name: &str, ssrc: Option<u32>, summary: impl Into<String>) {
        self.publish(TraceEvent::new(kind, name, ssrc, summary));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }
}
