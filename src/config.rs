// author: kodeholic (powered by Claude)
// 매직 넘버를 배제한 튜닝 상수 + 기동 시 1회 읽는 세션 설정입니다.

use std::io::Read;

use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// 트랙별 진행 로그 주기 (패킷 수)
pub const PACKET_LOG_INTERVAL: u64 = 100;

/// 주기 통계 리포트 기본 간격 (10초). 0이면 비활성
pub const STATS_INTERVAL_MS: u64 = 10_000;

/// 종료 시그널 이후 릴레이 태스크 정리 대기 시간 (1초)
/// 초과 시 남은 태스크는 abort — in-flight 패킷 drain은 보장하지 않음
pub const SHUTDOWN_GRACE_MS: u64 = 1_000;

/// 트레이스 브로드캐스트 버퍼 크기
pub const TRACE_BUF: usize = 512;

/// 기본 로그 필터 (RUST_LOG / --log-level 미지정 시)
pub const DEFAULT_LOG_FILTER: &str = "info";

// ----------------------------------------------------------------------------
// [SessionConfig] — stdin JSON 레코드
//
// { "localSdp": "...", "remoteSdp": "...", "outputHost": "127.0.0.1", "outputPort": 5004 }
//
// 필드 누락 / 타입 불일치 / 범위 밖 포트는 전부 fatal.
// 싱크·엔진 접근 전에 검증이 끝나야 함.
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// 우리 쪽 SDP offer (프로세스 외부에서 생성됨)
    pub local_sdp:   String,
    /// 원격 SDP answer
    pub remote_sdp:  String,
    /// RTP 전달 대상 호스트
    pub output_host: String,
    /// RTP 전달 대상 UDP 포트
    pub output_port: u16,
}

impl SessionConfig {
    pub fn from_json(input: &[u8]) -> BridgeResult<Self> {
        let config: SessionConfig = serde_json::from_slice(input)?;
        config.validate()?;
        Ok(config)
    }

    /// 스트림에서 첫 번째 JSON 값 1건만 디코드
    /// 호출자가 stdin을 열어 둔 채로 이후 레코드를 더 써도 여기서는 읽지 않음
    pub fn from_reader<R: Read>(reader: R) -> BridgeResult<Self> {
        let mut records = serde_json::Deserializer::from_reader(reader).into_iter::<SessionConfig>();
        let config = match records.next() {
            Some(record) => record?,
            None         => return Err(BridgeError::Config("no session record on input".into())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.local_sdp.trim().is_empty() {
            return Err(BridgeError::Config("localSdp is empty".into()));
        }
        if self.remote_sdp.trim().is_empty() {
            return Err(BridgeError::Config("remoteSdp is empty".into()));
        }
        if self.output_host.trim().is_empty() {
            return Err(BridgeError::Config("outputHost is empty".into()));
        }
        if self.output_port == 0 {
            return Err(BridgeError::Config("outputPort must be in 1..=65535".into()));
        }
        Ok(())
    }

    /// 로그용 "host:port"
    pub fn output_target(&self) -> String {
        format!("{}:{}", self.output_host, self.output_port)
    }
}
