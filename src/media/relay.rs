// author: kodeholic (powered by Claude)
// 트랙별 RTP 릴레이 루프
//
// 흐름 (트랙 1개 = 태스크 1개):
//   read_packet()
//     → Packet      : marshal → sink.send() (실패는 로그 + 카운트)
//     → Error       : 로그 + 카운트 후 계속 read (엔진이 회복할 수 있음)
//     → EndOfStream : 이 트랙 루프만 종료
//   종료 시그널     : 진행 중인 read를 버리고 즉시 종료 (in-flight drain 없음)
//
// 트랙 내부 순서는 엔진 전달 순서 그대로 (재정렬/버퍼링 없음).
// 트랙 간 순서 보장 없음.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};
use webrtc::util::Marshal;

use crate::config::PACKET_LOG_INTERVAL;
use crate::engine::{RemoteTrack, TrackRead};
use crate::media::sink::PacketSink;
use crate::media::track::{TrackRegistry, TrackSnapshot};
use crate::monitor::ShutdownSignal;
use crate::trace::{TraceHub, TraceKind};

/// 루프 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    EndOfStream,
    Shutdown,
}

/// 루프 종료 보고 (테스트 / 로그)
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub exit:  RelayExit,
    pub stats: TrackSnapshot,
}

pub async fn run_track_relay(
    track:     Arc<dyn RemoteTrack>,
    sink:      Arc<dyn PacketSink>,
    registry:  Arc<TrackRegistry>,
    trace_hub: Arc<TraceHub>,
    mut shutdown: ShutdownSignal,
) -> RelayReport {
    let info  = track.info();
    let ssrc  = info.ssrc;
    let stats = registry.insert(info.clone());

    info!("[track] received: {} (SSRC: {}, PT: {}, Clock: {})",
        info.mime_type, ssrc, info.payload_type, info.clock_rate);
    trace_hub.emit(TraceKind::Track, "track_started", Some(ssrc),
        format!("{} pt={} clock={}", info.mime_type, info.payload_type, info.clock_rate));

    let exit = loop {
        // biased: 종료 시그널을 먼저 확인 — 트리거 이후에는 read 결과를 더 보내지 않음
        let read = tokio::select! {
            biased;
            _ = shutdown.triggered() => break RelayExit::Shutdown,
            r = track.read_packet()  => r,
        };

        let packet = match read {
            TrackRead::Packet(p) => p,
            TrackRead::EndOfStream => {
                info!("[track] EOF (SSRC: {})", ssrc);
                break RelayExit::EndOfStream;
            }
            TrackRead::Error(e) => {
                stats.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[track] read error (SSRC: {}): {}", ssrc, e);
                continue;
            }
        };

        let count = stats.record_packet(packet.header.sequence_number);
        if count % PACKET_LOG_INTERVAL == 0 {
            info!("[rtp] {} packets received (SSRC: {}, PT: {}, Seq: {})",
                count, packet.header.ssrc, packet.header.payload_type, packet.header.sequence_number);
        }

        let datagram = match packet.marshal() {
            Ok(b)  => b,
            Err(e) => {
                stats.marshal_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[rtp] marshal failed (SSRC: {}, Seq: {}): {}", ssrc, packet.header.sequence_number, e);
                continue;
            }
        };

        match sink.send(&datagram).await {
            Ok(n)  => stats.record_sent(n),
            Err(e) => {
                stats.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[rtp] UDP write failed (SSRC: {}): {}", ssrc, e);
            }
        }
    };

    let snapshot = stats.snapshot();
    registry.remove(&stats);

    debug!("[track] relay stopped (SSRC: {}, exit: {:?}, packets: {}, read_errors: {}, send_errors: {})",
        ssrc, exit, snapshot.packets, snapshot.read_errors, snapshot.send_errors);
    trace_hub.emit(TraceKind::Track, "track_stopped", Some(ssrc),
        format!("{:?} after {} packets", exit, snapshot.packets));

    RelayReport { exit, stats: snapshot }
}
