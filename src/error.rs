// author: kodeholic (powered by Claude)
// 브릿지 에러 정의
//
// 모두 기동 단계(fatal) 에러입니다. 정상 운영 중의 패킷 단위 에러
// (read / marshal / send)는 에러 타입으로 올라오지 않고 릴레이 루프에서
// 로그 + 카운터로만 처리됩니다.

use std::fmt;

#[derive(Debug)]
pub enum BridgeError {
    /// stdin / 파일 설정 디코드 또는 검증 실패
    Config(String),
    /// 출력 대상 host:port 해석 실패
    SinkResolve(String),
    /// 출력 UDP 소켓 bind / connect 실패
    SinkOpen(std::io::Error),
    /// 엔진 세션 생성 / 종료 실패
    Engine(String),
    /// remote description(answer) 적용 실패
    RemoteDescription(String),
    /// local description(offer) 적용 실패
    LocalDescription(String),
    IoError(std::io::Error),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Config(msg)            => write!(f, "Invalid configuration: {}", msg),
            BridgeError::SinkResolve(msg)       => write!(f, "Cannot resolve output address: {}", msg),
            BridgeError::SinkOpen(err)          => write!(f, "Cannot open output socket: {}", err),
            BridgeError::Engine(msg)            => write!(f, "Media engine error: {}", msg),
            BridgeError::RemoteDescription(msg) => write!(f, "SetRemoteDescription failed: {}", msg),
            BridgeError::LocalDescription(msg)  => write!(f, "SetLocalDescription failed: {}", msg),
            BridgeError::IoError(err)           => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::SinkOpen(err) | BridgeError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::IoError(err)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
