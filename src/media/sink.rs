// author: kodeholic (powered by Claude)
// 출력 UDP 싱크
//
// 기동 시 1회: host:port 해석 → 같은 주소 패밀리의 임시 포트 bind → connect
// 이후 send()만 사용. connected UdpSocket은 &self send가 가능하므로
// 여러 트랙 릴레이 태스크가 락 없이 동시에 호출함 (데이터그램 단위 독립).
//
// send 실패(수신자 미기동 → ICMP port unreachable 등)는 호출자에게 그대로 반환.
// 릴레이 루프가 로그만 남기고 계속 진행함.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{info, trace};

use crate::error::{BridgeError, BridgeResult};

/// 릴레이 루프가 바라보는 송신 능력
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize>;
}

/// 싱크 누적 카운터 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCounters {
    pub datagrams: u64,
    pub bytes:     u64,
    pub failures:  u64,
}

pub struct TransportSink {
    socket:    UdpSocket,
    target:    SocketAddr,
    datagrams: AtomicU64,
    bytes:     AtomicU64,
    failures:  AtomicU64,
}

impl TransportSink {
    /// 해석 / bind / connect 중 하나라도 실패하면 fatal
    pub async fn connect(host: &str, port: u16) -> BridgeResult<Self> {
        let target = lookup_host((host, port))
            .await
            .map_err(|e| BridgeError::SinkResolve(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| BridgeError::SinkResolve(format!("{}:{}: no address", host, port)))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await.map_err(BridgeError::SinkOpen)?;
        socket.connect(target).await.map_err(BridgeError::SinkOpen)?;

        info!("[sink] UDP {} → {}", socket.local_addr().map_err(BridgeError::SinkOpen)?, target);

        Ok(Self {
            socket,
            target,
            datagrams: AtomicU64::new(0),
            bytes:     AtomicU64::new(0),
            failures:  AtomicU64::new(0),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn counters(&self) -> SinkCounters {
        SinkCounters {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes:     self.bytes.load(Ordering::Relaxed),
            failures:  self.failures.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl PacketSink for TransportSink {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        match self.socket.send(datagram).await {
            Ok(n) => {
                self.datagrams.fetch_add(1, Ordering::Relaxed);
                self.bytes.fetch_add(n as u64, Ordering::Relaxed);
                trace!("[sink] {} bytes → {}", n, self.target);
                Ok(n)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}
