// author: kodeholic (powered by Claude)
//
// wrproxy — WebRTC 세션 → 로컬 UDP RTP 브릿지
//
// 사용법:
//   echo '{"localSdp":"...","remoteSdp":"...","outputHost":"127.0.0.1","outputPort":5004}' | wrproxy
//   wrproxy --config session.json --stats-interval-ms 0 --trace
//
// 종료 코드:
//   0 : peer failed / closed 또는 SIGINT / SIGTERM (정상 종료)
//   1 : 설정 오류, 출력 소켓 오류, description 적용 실패 (fatal)

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use webrtc_proxy::{config, exit_status, run_proxy, BridgeArgs};

#[derive(Parser)]
#[command(
    name    = "wrproxy",
    about   = "WebRTC 세션 수립 후 수신 RTP를 UDP로 그대로 전달",
    version,
)]
struct Cli {
    /// 세션 설정 JSON 파일 (생략 시 stdin)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 필터 (RUST_LOG보다 우선, 예: debug, webrtc_proxy=trace)
    #[arg(long)]
    log_level: Option<String>,

    /// 통계 리포트 주기 (0이면 비활성)
    #[arg(long, default_value_t = config::STATS_INTERVAL_MS)]
    stats_interval_ms: u64,

    /// 브릿지 이벤트를 JSON lines로 stderr 출력
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 로그는 stderr — stdout은 비워 둠
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None        => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = BridgeArgs {
        config_path:    cli.config,
        stats_interval: Some(Duration::from_millis(cli.stats_interval_ms)),
        trace:          cli.trace,
    };

    let result = run_proxy(args).await;
    match &result {
        Ok(reason) => info!("[webrtc-proxy] exit: {}", reason),
        Err(e)     => error!("[webrtc-proxy] fatal: {}", e),
    }
    ExitCode::from(exit_status(&result))
}
