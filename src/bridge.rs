// author: kodeholic (powered by Claude)
// 브릿지 오케스트레이터
//
// 기동 순서:
//   1. 출력 UDP 싱크 open (실패 시 엔진은 건드리지도 않고 fatal)
//   2. 세션 수립 — 콜백 등록이 description 적용보다 먼저 (session.rs)
//   3. 통계 리포터 기동 (옵션)
//   4. 종료 시그널 대기 — peer failed / closed 또는 SIGINT
//
// 종료 순서:
//   릴레이 태스크 정리 (SHUTDOWN_GRACE_MS 안에 안 끝나면 abort)
//   → 엔진 세션 close → 싱크 drop (소켓 close)
//
// 엔진 콜백은 엔진 내부 태스크에서 불림 — 릴레이는 JoinSet에 spawn해서 추적.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{self, SessionConfig};
use crate::engine::{IceState, MediaEngine, PeerState, RemoteTrack, TrackHandler};
use crate::error::BridgeResult;
use crate::media::{run_track_relay, PacketSink, RelayReport, TrackRegistry, TransportSink};
use crate::monitor::{LifecycleMonitor, ShutdownReason};
use crate::session::{self, SessionHooks};
use crate::stats::run_stats_reporter;
use crate::trace::{TraceHub, TraceKind};

type RelaySet = Arc<Mutex<JoinSet<RelayReport>>>;

pub struct Bridge {
    config:         SessionConfig,
    engine:         Arc<dyn MediaEngine>,
    monitor:        Arc<LifecycleMonitor>,
    trace_hub:      Arc<TraceHub>,
    registry:       Arc<TrackRegistry>,
    stats_interval: Option<Duration>,
    shutdown_grace: Duration,
}

impl Bridge {
    pub fn new(config: SessionConfig, engine: Arc<dyn MediaEngine>) -> Self {
        let trace_hub = TraceHub::new();
        Self {
            config,
            engine,
            monitor:        LifecycleMonitor::new(Arc::clone(&trace_hub)),
            trace_hub,
            registry:       Arc::new(TrackRegistry::new()),
            stats_interval: Some(Duration::from_millis(config::STATS_INTERVAL_MS)),
            shutdown_grace: Duration::from_millis(config::SHUTDOWN_GRACE_MS),
        }
    }

    /// None 또는 0이면 통계 리포터 비활성
    pub fn with_stats_interval(mut self, interval: Option<Duration>) -> Self {
        self.stats_interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// 외부 종료 트리거(SIGINT 등) / 테스트용
    pub fn monitor(&self) -> Arc<LifecycleMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn trace_hub(&self) -> Arc<TraceHub> {
        Arc::clone(&self.trace_hub)
    }

    pub fn tracks(&self) -> Arc<TrackRegistry> {
        Arc::clone(&self.registry)
    }

    /// 종료 사유와 함께 정상 반환, 기동 실패 시 Err (fatal)
    pub async fn run(self) -> BridgeResult<ShutdownReason> {
        info!("[config] Output: {}", self.config.output_target());

        // 1. 싱크 먼저 — 실패하면 엔진과 아무 상호작용 없이 종료
        let sink = Arc::new(TransportSink::connect(&self.config.output_host, self.config.output_port).await?);
        info!("[sink] connection established");

        let mut shutdown = self.monitor.signal();
        let relays: RelaySet = Arc::new(Mutex::new(JoinSet::new()));

        // 2. 세션 수립
        let hooks = self.hooks(&sink, &relays);
        let session = match session::establish(self.engine.as_ref(), &self.config, hooks, &self.trace_hub).await {
            Ok(s)  => s,
            Err(e) => {
                error!("[session] setup failed: {}", e);
                lock(&relays).abort_all();
                return Err(e);
            }
        };

        // 3. 통계 리포터
        let stats_task = self.stats_interval.map(|interval| {
            tokio::spawn(run_stats_reporter(
                Arc::clone(&self.registry),
                Arc::clone(&sink),
                interval,
                self.monitor.signal(),
            ))
        });

        // 4. 종료 시그널까지 대기
        let reason = shutdown.triggered().await;
        info!("[bridge] stopping: {}", reason);

        let mut pending = std::mem::take(&mut *lock(&relays));
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = pending.join_next().await {
                match joined {
                    Ok(report) => debug!("[bridge] relay SSRC {} finished: {:?}", report.stats.ssrc, report.exit),
                    Err(e)     => warn!("[bridge] relay task failed: {}", e),
                }
            }
        }).await;
        if drained.is_err() {
            warn!("[bridge] {} relay task(s) still running after {}ms, aborting",
                pending.len(), self.shutdown_grace.as_millis());
            pending.abort_all();
        }

        if let Some(task) = stats_task {
            if tokio::time::timeout(self.shutdown_grace, task).await.is_err() {
                warn!("[stats] reporter did not stop in time");
            }
        }

        if let Err(e) = session.close().await {
            warn!("[session] close failed: {}", e);
        }

        let totals = sink.counters();
        info!("[bridge] stopped ({} datagrams, {} bytes, {} send failures)",
            totals.datagrams, totals.bytes, totals.failures);
        self.trace_hub.emit(TraceKind::Shutdown, "stopped", None, reason.to_string());

        Ok(reason)
    }

    fn hooks(&self, sink: &Arc<TransportSink>, relays: &RelaySet) -> SessionHooks {
        let on_track: TrackHandler = {
            let sink: Arc<dyn PacketSink> = sink.clone();
            let registry  = Arc::clone(&self.registry);
            let trace_hub = Arc::clone(&self.trace_hub);
            let monitor   = Arc::clone(&self.monitor);
            let relays    = Arc::clone(relays);
            Arc::new(move |track: Arc<dyn RemoteTrack>| {
                let relay = run_track_relay(
                    track,
                    Arc::clone(&sink),
                    Arc::clone(&registry),
                    Arc::clone(&trace_hub),
                    monitor.signal(),
                );
                lock(&relays).spawn(relay);
            })
        };

        let ice_monitor  = Arc::clone(&self.monitor);
        let peer_monitor = Arc::clone(&self.monitor);

        SessionHooks {
            on_track,
            on_ice_state:  Arc::new(move |state: IceState| ice_monitor.on_ice_state(state)),
            on_peer_state: Arc::new(move |state: PeerState| {
                peer_monitor.on_peer_state(state);
            }),
        }
    }
}

// 릴레이 태스크가 패닉해도 JoinSet은 계속 써야 하므로 poison 무시
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
