// author: kodeholic (powered by Claude)
// TrackRegistry — 릴레이 중인 트랙 목록 + 트랙별 카운터
//
// 키: SSRC → TrackStats
// 핫패스(패킷 릴레이)는 Arc<TrackStats>의 atomic만 건드림 — 락 없음.
// RwLock은 트랙 시작/종료, 통계 리포트 조회 시에만 사용.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

use crate::engine::TrackInfo;
use crate::utils::current_timestamp;

/// 트랙별 릴레이 카운터
pub struct TrackStats {
    pub info:           TrackInfo,
    pub started_at:     u64,
    pub packets:        AtomicU64,
    pub bytes:          AtomicU64,
    pub read_errors:    AtomicU64,
    pub marshal_errors: AtomicU64,
    pub send_errors:    AtomicU64,
    /// 마지막으로 읽은 RTP sequence number
    pub last_seq:       AtomicU64,
    /// 마지막 패킷 수신 시각 (0 = 아직 없음)
    pub last_packet_at: AtomicU64,
}

/// 로그 / 테스트용 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub ssrc:           u32,
    pub mime_type:      String,
    pub packets:        u64,
    pub bytes:          u64,
    pub read_errors:    u64,
    pub marshal_errors: u64,
    pub send_errors:    u64,
    pub last_seq:       u16,
    pub last_packet_at: u64,
}

impl TrackStats {
    pub fn new(info: TrackInfo) -> Self {
        trace!("TrackStats::new ssrc={} mime={}", info.ssrc, info.mime_type);
        Self {
            info,
            started_at:     current_timestamp(),
            packets:        AtomicU64::new(0),
            bytes:          AtomicU64::new(0),
            read_errors:    AtomicU64::new(0),
            marshal_errors: AtomicU64::new(0),
            send_errors:    AtomicU64::new(0),
            last_seq:       AtomicU64::new(0),
            last_packet_at: AtomicU64::new(0),
        }
    }

    /// 패킷 1개 읽음 — 누적 패킷 수 반환 (진행 로그 주기 판단용)
    pub fn record_packet(&self, seq: u16) -> u64 {
        self.last_seq.store(seq as u64, Ordering::Relaxed);
        self.last_packet_at.store(current_timestamp(), Ordering::Relaxed);
        self.packets.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_sent(&self, len: usize) {
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            ssrc:           self.info.ssrc,
            mime_type:      self.info.mime_type.clone(),
            packets:        self.packets.load(Ordering::Relaxed),
            bytes:          self.bytes.load(Ordering::Relaxed),
            read_errors:    self.read_errors.load(Ordering::Relaxed),
            marshal_errors: self.marshal_errors.load(Ordering::Relaxed),
            send_errors:    self.send_errors.load(Ordering::Relaxed),
            last_seq:       self.last_seq.load(Ordering::Relaxed) as u16,
            last_packet_at: self.last_packet_at.load(Ordering::Relaxed),
        }
    }
}

pub struct TrackRegistry {
    by_ssrc: RwLock<HashMap<u32, Arc<TrackStats>>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        trace!("Initializing TrackRegistry");
        Self { by_ssrc: RwLock::new(HashMap::new()) }
    }

    /// 트랙 시작 시 등록 — 같은 SSRC가 다시 오면 새 카운터로 교체
    pub fn insert(&self, info: TrackInfo) -> Arc<TrackStats> {
        let ssrc  = info.ssrc;
        let stats = Arc::new(TrackStats::new(info));
        let prev  = self.write().insert(ssrc, Arc::clone(&stats));
        if prev.is_some() {
            debug!("[track] ssrc={} re-registered, counters reset", ssrc);
        }
        stats
    }

    /// 트랙 종료 시 제거 — 다른 인스턴스가 같은 SSRC로 교체했으면 건드리지 않음
    pub fn remove(&self, stats: &Arc<TrackStats>) {
        let mut map = self.write();
        let ssrc = stats.info.ssrc;
        if map.get(&ssrc).is_some_and(|cur| Arc::ptr_eq(cur, stats)) {
            map.remove(&ssrc);
            trace!("[track] ssrc={} removed from registry", ssrc);
        }
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// SSRC 오름차순 스냅샷
    pub fn snapshots(&self) -> Vec<TrackSnapshot> {
        let mut all: Vec<TrackSnapshot> = self.read().values().map(|s| s.snapshot()).collect();
        all.sort_by_key(|s| s.ssrc);
        all
    }

    // 릴레이 태스크가 패닉해도 레지스트리는 계속 써야 하므로 poison 무시
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, Arc<TrackStats>>> {
        self.by_ssrc.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, Arc<TrackStats>>> {
        self.by_ssrc.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
