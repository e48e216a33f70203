// author: kodeholic (powered by Claude)

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod monitor;
pub mod sdp;
pub mod session;
pub mod stats;
pub mod trace;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

pub use crate::bridge::Bridge;
pub use crate::config::SessionConfig;
pub use crate::error::{BridgeError, BridgeResult};
pub use crate::monitor::ShutdownReason;

use crate::engine::{MediaEngine, WebRtcEngine};
use crate::monitor::LifecycleMonitor;
use crate::trace::TraceHub;

/// CLI에서 주입되는 런타임 설정
pub struct BridgeArgs {
    /// None이면 stdin에서 JSON 1건
    pub config_path:    Option<PathBuf>,
    /// None이면 통계 리포터 비활성
    pub stats_interval: Option<Duration>,
    /// 브릿지 이벤트를 JSON lines로 stderr에 출력
    pub trace:          bool,
}

/// 설정 로드 — 파일 또는 stdin
/// 디코드/검증 실패는 fatal (싱크/엔진 접근 전)
pub async fn load_config(path: Option<&PathBuf>) -> BridgeResult<SessionConfig> {
    match path {
        Some(p) => SessionConfig::from_json(&tokio::fs::read(p).await?),
        None    => read_stdin_record().await,
    }
}

/// stdin에서 첫 레코드 1건만 읽음 — 호출자는 stdin을 닫지 않음 (EOF 대기 금지)
///
/// 블로킹 read는 전용 OS 스레드 — runtime 종료가 이 read를 기다리면 안 됨
async fn read_stdin_record() -> BridgeResult<SessionConfig> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-config".into())
        .spawn(move || {
            let _ = tx.send(SessionConfig::from_reader(std::io::stdin().lock()));
        })?;
    rx.await
        .map_err(|_| BridgeError::Config("stdin reader exited without a record".into()))?
}

/// 프로세스 진입점 — main.rs는 종료 코드 변환만 담당
pub async fn run_proxy(args: BridgeArgs) -> BridgeResult<ShutdownReason> {
    info!("[webrtc-proxy] starting...");

    // 설정 대기 중 인터럽트 — 아무것도 만들지 않고 정상 종료
    let loaded = tokio::select! {
        loaded = load_config(args.config_path.as_ref()) => loaded,
        _ = interrupted() => {
            info!("[webrtc-proxy] interrupted before a session record arrived");
            return Ok(ShutdownReason::Interrupted);
        }
    };
    let config = match loaded {
        Ok(c)  => c,
        Err(e) => {
            error!("[config] cannot read config: {}", e);
            return Err(e);
        }
    };

    let engine: Arc<dyn MediaEngine> = Arc::new(WebRtcEngine::new());
    let bridge = Bridge::new(config, engine).with_stats_interval(args.stats_interval);

    if args.trace {
        spawn_trace_printer(bridge.trace_hub());
    }
    spawn_interrupt_handler(bridge.monitor());

    bridge.run().await
}

fn spawn_trace_printer(hub: Arc<TraceHub>) {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("{}", event.to_json()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("[trace] {} event(s) dropped (slow consumer)", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// SIGINT / SIGTERM → 세션·소켓 정리 후 정상 종료 (exit 0)
fn spawn_interrupt_handler(monitor: Arc<LifecycleMonitor>) {
    tokio::spawn(async move {
        interrupted().await;
        info!("[webrtc-proxy] interrupt received");
        monitor.trigger(ShutdownReason::Interrupted);
    });
}

// 핸들러 등록 실패 시 해당 시그널은 기본 동작(프로세스 종료)에 맡김
async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("[webrtc-proxy] cannot install SIGTERM handler: {}", e);
                ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[webrtc-proxy] cannot install SIGINT handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// 종료 결과 → 프로세스 exit status
/// 0: terminal 상태(failed / closed) 또는 인터럽트, 1: 기동 단계 fatal 에러
pub fn exit_status(result: &BridgeResult<ShutdownReason>) -> u8 {
    match result {
        Ok(_)  => 0,
        Err(_) => 1,
    }
}
