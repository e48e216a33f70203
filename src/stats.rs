// author: kodeholic (powered by Claude)
// 주기 통계 리포터
//
// 주기마다 수행:
//   1. 활성 트랙 수 + 트랙별 카운터 (packets / bytes / errors / 마지막 수신 경과)
//   2. 싱크 누적 카운터 (datagrams / bytes / failures)
// 종료 시그널 수신 시 마지막 요약 1회 출력 후 종료.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::media::{TrackRegistry, TransportSink};
use crate::monitor::ShutdownSignal;
use crate::utils::elapsed_since;

pub async fn run_stats_reporter(
    registry: Arc<TrackRegistry>,
    sink:     Arc<TransportSink>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut timer = tokio::time::interval(interval);
    timer.tick().await; // 첫 틱 skip (startup 시 즉시 실행 방지)

    info!("[stats] Started (interval={}ms)", interval.as_millis());

    loop {
        tokio::select! {
            _ = timer.tick() => report(&registry, &sink),
            _ = shutdown.triggered() => break,
        }
    }

    report(&registry, &sink);
}

fn report(registry: &TrackRegistry, sink: &TransportSink) {
    let tracks = registry.snapshots();
    let totals = sink.counters();

    info!("[stats] tracks={} sent={} datagrams ({} bytes) failures={}",
        tracks.len(), totals.datagrams, totals.bytes, totals.failures);

    for t in &tracks {
        let idle = elapsed_since(t.last_packet_at)
            .map(|ms| format!("{}ms ago", ms))
            .unwrap_or_else(|| "never".to_string());
        info!("[stats]   SSRC {} {}: packets={} bytes={} read_err={} marshal_err={} send_err={} last_seq={} last_rx={}",
            t.ssrc, t.mime_type, t.packets, t.bytes,
            t.read_errors, t.marshal_errors, t.send_errors, t.last_seq, idle);
    }
}
