// author: kodeholic (powered by Claude)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::util::Marshal;

use webrtc_proxy::engine::{
    IceState, IceStateHandler, MediaEngine, MediaSession, PeerState, PeerStateHandler,
    RemoteTrack, SdpType, SessionDescription, SessionOptions, TrackHandler, TrackInfo, TrackRead,
};
use webrtc_proxy::trace::TraceEvent;
use webrtc_proxy::{Bridge, BridgeError, BridgeResult, SessionConfig, ShutdownReason};

// ----------------------------------------------------------------------------
// [테스트 헬퍼] — 스크립트 엔진
// ----------------------------------------------------------------------------

/// 테스트가 packet을 밀어 넣는 트랙. sender drop → EndOfStream
struct ChannelTrack {
    ssrc: u32,
    rx:   tokio::sync::Mutex<mpsc::UnboundedReceiver<TrackRead>>,
}

fn channel_track(ssrc: u32) -> (Arc<ChannelTrack>, mpsc::UnboundedSender<TrackRead>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelTrack { ssrc, rx: tokio::sync::Mutex::new(rx) }), tx)
}

#[async_trait]
impl RemoteTrack for ChannelTrack {
    fn info(&self) -> TrackInfo {
        TrackInfo {
            ssrc:         self.ssrc,
            kind:         "audio".into(),
            mime_type:    "audio/opus".into(),
            payload_type: 111,
            clock_rate:   48_000,
        }
    }

    async fn read_packet(&self) -> TrackRead {
        self.rx.lock().await.recv().await.unwrap_or(TrackRead::EndOfStream)
    }
}

#[derive(Default)]
struct ScriptedSession {
    calls:         Mutex<Vec<String>>,
    track_handler: Mutex<Option<TrackHandler>>,
    ice_handler:   Mutex<Option<IceStateHandler>>,
    peer_handler:  Mutex<Option<PeerStateHandler>>,
    /// set_remote_description 도중 발생시킬 트랙 (구독 선등록 검증용)
    early_tracks:  Mutex<Vec<Arc<dyn RemoteTrack>>>,
    fail_remote:   bool,
    fail_local:    bool,
}

impl ScriptedSession {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn announce_track(&self, track: Arc<dyn RemoteTrack>) {
        let handler = self.track_handler.lock().unwrap().clone().expect("on_track 미등록");
        handler(track);
    }

    fn set_peer_state(&self, state: PeerState) {
        let handler = self.peer_handler.lock().unwrap().clone().expect("on_peer 미등록");
        handler(state);
    }

    fn set_ice_state(&self, state: IceState) {
        let handler = self.ice_handler.lock().unwrap().clone().expect("on_ice 미등록");
        handler(state);
    }
}

#[async_trait]
impl MediaSession for ScriptedSession {
    fn on_track(&self, handler: TrackHandler) {
        self.record("on_track");
        *self.track_handler.lock().unwrap() = Some(handler);
    }

    fn on_ice_connection_state_change(&self, handler: IceStateHandler) {
        self.record("on_ice");
        *self.ice_handler.lock().unwrap() = Some(handler);
    }

    fn on_connection_state_change(&self, handler: PeerStateHandler) {
        self.record("on_peer");
        *self.peer_handler.lock().unwrap() = Some(handler);
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> BridgeResult<()> {
        assert_eq!(desc.sdp_type, SdpType::Answer);
        self.record(&format!("remote:{}", desc.sdp));
        let early: Vec<_> = self.early_tracks.lock().unwrap().drain(..).collect();
        for track in early {
            self.announce_track(track);
        }
        if self.fail_remote {
            return Err(BridgeError::Engine("incompatible media".into()));
        }
        Ok(())
    }

    async fn set_local_description(&self, desc: SessionDescription) -> BridgeResult<()> {
        assert_eq!(desc.sdp_type, SdpType::Offer);
        self.record(&format!("local:{}", desc.sdp));
        if self.fail_local {
            return Err(BridgeError::Engine("invalid offer".into()));
        }
        Ok(())
    }

    async fn close(&self) -> BridgeResult<()> {
        self.record("close");
        Ok(())
    }
}

struct ScriptedEngine {
    created: AtomicUsize,
    session: Arc<ScriptedSession>,
}

impl ScriptedEngine {
    fn new(session: ScriptedSession) -> Arc<Self> {
        Arc::new(Self { created: AtomicUsize::new(0), session: Arc::new(session) })
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn create_session(&self, options: SessionOptions) -> BridgeResult<Arc<dyn MediaSession>> {
        assert!(options.ice_servers.is_empty(), "ICE 서버는 미리 넣지 않음");
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.session) as Arc<dyn MediaSession>)
    }
}

fn rtp(ssrc: u32, seq: u16) -> Packet {
    Packet {
        header: Header {
            version: 2,
            payload_type: 111,
            sequence_number: seq,
            timestamp: seq as u32 * 960,
            ssrc,
            ..Default::default()
        },
        payload: Bytes::from(vec![seq as u8; 32]),
    }
}

fn wire(ssrc: u32, seq: u16) -> Vec<u8> {
    rtp(ssrc, seq).marshal().unwrap().to_vec()
}

fn session_config(host: &str, port: u16) -> SessionConfig {
    SessionConfig {
        local_sdp:   "<offer-A>".into(),
        remote_sdp:  "<answer-A>".into(),
        output_host: host.into(),
        output_port: port,
    }
}

async fn receiver() -> (UdpSocket, u16) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    (sock, port)
}

async fn recv_datagram(sock: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 1500];
    let n = tokio::time::timeout(Duration::from_secs(2), sock.recv(&mut buf))
        .await
        .expect("데이터그램 수신 타임아웃")
        .unwrap();
    buf[..n].to_vec()
}

async fn wait_event(rx: &mut broadcast::Receiver<TraceEvent>, name: &str) -> TraceEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("trace 수신 실패");
            if event.name == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("trace 이벤트 대기 타임아웃: {}", name))
}

type RunHandle = tokio::task::JoinHandle<BridgeResult<ShutdownReason>>;

/// 브릿지 기동 후 established 이벤트까지 대기
async fn start(engine: Arc<ScriptedEngine>, config: SessionConfig) -> (RunHandle, broadcast::Receiver<TraceEvent>) {
    let bridge = Bridge::new(config, engine).with_stats_interval(None);
    let mut events = bridge.trace_hub().subscribe();
    let handle = tokio::spawn(bridge.run());
    wait_event(&mut events, "established").await;
    (handle, events)
}

async fn finish(handle: RunHandle) -> BridgeResult<ShutdownReason> {
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("브릿지 종료 타임아웃")
        .unwrap()
}

// ----------------------------------------------------------------------------
// [시나리오 1] 트랙 1개, 패킷 3개 → 데이터그램 3개 순서대로
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_single_track_three_packets_in_order() {
    let (sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let (handle, _events) = start(Arc::clone(&engine), session_config("127.0.0.1", port)).await;

    let (track, tx) = channel_track(12345);
    engine.session.announce_track(track);
    for seq in 1..=3 {
        tx.send(TrackRead::Packet(rtp(12345, seq))).unwrap();
    }

    for seq in 1..=3 {
        assert_eq!(recv_datagram(&sock).await, wire(12345, seq), "seq {} 순서/내용 불일치", seq);
    }

    engine.session.set_peer_state(PeerState::Closed);
    assert_eq!(finish(handle).await.unwrap(), ShutdownReason::PeerClosed);

    // 정확히 3개 — 추가 데이터그램 없음
    let mut buf = [0u8; 64];
    assert!(tokio::time::timeout(Duration::from_millis(100), sock.recv(&mut buf)).await.is_err());

    assert_eq!(
        engine.session.calls(),
        vec!["on_track", "on_ice", "on_peer", "remote:<answer-A>", "local:<offer-A>", "close"],
    );
}

// ----------------------------------------------------------------------------
// [시나리오 2] description 적용 중 도착한 트랙도 놓치지 않음
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_track_during_establishment_is_relayed() {
    let (sock, port) = receiver().await;
    let (track, tx) = channel_track(777);
    tx.send(TrackRead::Packet(rtp(777, 40))).unwrap();
    tx.send(TrackRead::Packet(rtp(777, 41))).unwrap();

    let session = ScriptedSession::default();
    session.early_tracks.lock().unwrap().push(track);
    let engine = ScriptedEngine::new(session);
    let (handle, _events) = start(Arc::clone(&engine), session_config("127.0.0.1", port)).await;

    assert_eq!(recv_datagram(&sock).await, wire(777, 40));
    assert_eq!(recv_datagram(&sock).await, wire(777, 41));

    engine.session.set_peer_state(PeerState::Failed);
    assert_eq!(finish(handle).await.unwrap(), ShutdownReason::PeerFailed);
}

// ----------------------------------------------------------------------------
// [시나리오 3] 한 트랙의 read 에러가 다른 트랙을 멈추지 않음
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_read_errors_isolated_per_track() {
    let (sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let (handle, _events) = start(Arc::clone(&engine), session_config("127.0.0.1", port)).await;

    let (bad, bad_tx)   = channel_track(1);
    let (good, good_tx) = channel_track(2);
    engine.session.announce_track(bad);
    engine.session.announce_track(good);

    for _ in 0..10 {
        bad_tx.send(TrackRead::Error("srtp: auth tag mismatch".into())).unwrap();
    }
    for seq in 1..=5 {
        good_tx.send(TrackRead::Packet(rtp(2, seq))).unwrap();
    }

    for seq in 1..=5 {
        assert_eq!(recv_datagram(&sock).await, wire(2, seq));
    }

    // 에러를 낸 트랙도 루프는 살아 있어야 함
    bad_tx.send(TrackRead::Packet(rtp(1, 99))).unwrap();
    assert_eq!(recv_datagram(&sock).await, wire(1, 99));

    engine.session.set_peer_state(PeerState::Closed);
    finish(handle).await.unwrap();
}

// ----------------------------------------------------------------------------
// [시나리오 4] 수신자 없는 포트 — send 실패해도 read는 계속
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unreachable_sink_keeps_reading() {
    let port = portpicker::pick_unused_port().expect("사용 가능한 포트를 찾을 수 없습니다.");
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let bridge = Bridge::new(session_config("127.0.0.1", port), Arc::clone(&engine) as Arc<dyn MediaEngine>)
        .with_stats_interval(None);
    let tracks = bridge.tracks();
    let mut events = bridge.trace_hub().subscribe();
    let handle = tokio::spawn(bridge.run());
    wait_event(&mut events, "established").await;

    let (track, tx) = channel_track(42);
    engine.session.announce_track(track);
    // ICMP port unreachable이 돌아올 틈을 두고 전송 → 이후 send가 ECONNREFUSED
    for seq in 1..=20 {
        tx.send(TrackRead::Packet(rtp(42, seq))).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let snap = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(s) = tracks.snapshots().into_iter().find(|s| s.ssrc == 42 && s.packets == 20) {
                return s;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("20개 패킷 수신 대기 타임아웃");
    assert!(snap.send_errors > 0, "닫힌 포트로의 send 실패가 집계되어야 함");
    assert_eq!(snap.read_errors, 0);

    drop(tx); // 20개 후 EOF
    let stopped = wait_event(&mut events, "track_stopped").await;
    assert_eq!(stopped.ssrc, Some(42));
    assert_eq!(stopped.summary, "EndOfStream after 20 packets");

    engine.session.set_peer_state(PeerState::Closed);
    finish(handle).await.unwrap();
}

// ----------------------------------------------------------------------------
// [시나리오 5] terminal 상태 → in-flight read가 있어도 제한 시간 내 종료
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_terminal_state_stops_bridge_with_blocked_tracks() {
    let (_sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let bridge = Bridge::new(session_config("127.0.0.1", port), Arc::clone(&engine) as Arc<dyn MediaEngine>)
        .with_stats_interval(Some(Duration::from_millis(20)));
    let tracks = bridge.tracks();
    let mut events = bridge.trace_hub().subscribe();
    let handle = tokio::spawn(bridge.run());
    wait_event(&mut events, "established").await;

    // read에서 영원히 블록되는 트랙 2개 (sender 유지)
    let (a, _a_tx) = channel_track(10);
    let (b, _b_tx) = channel_track(11);
    engine.session.announce_track(a);
    engine.session.announce_track(b);
    wait_event(&mut events, "track_started").await;
    wait_event(&mut events, "track_started").await;
    assert_eq!(tracks.count(), 2);

    engine.session.set_ice_state(IceState::Disconnected);
    engine.session.set_peer_state(PeerState::Disconnected);
    engine.session.set_peer_state(PeerState::Failed);

    assert_eq!(finish(handle).await.unwrap(), ShutdownReason::PeerFailed);
    assert_eq!(tracks.count(), 0, "종료 후 릴레이 루프가 남아 있으면 안 됨");
    assert_eq!(engine.session.calls().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_non_terminal_states_keep_bridge_running() {
    let (_sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let (handle, _events) = start(Arc::clone(&engine), session_config("127.0.0.1", port)).await;

    engine.session.set_peer_state(PeerState::Connecting);
    engine.session.set_peer_state(PeerState::Connected);
    engine.session.set_peer_state(PeerState::Disconnected);
    engine.session.set_ice_state(IceState::Failed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished(), "terminal 상태 전에는 종료되면 안 됨");

    engine.session.set_peer_state(PeerState::Closed);
    assert_eq!(finish(handle).await.unwrap(), ShutdownReason::PeerClosed);
}

// ----------------------------------------------------------------------------
// [시나리오 6] fatal 기동 에러
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unresolvable_sink_fails_before_engine() {
    let engine = ScriptedEngine::new(ScriptedSession::default());
    let bridge = Bridge::new(session_config("no-such-host.invalid", 5004), Arc::clone(&engine) as Arc<dyn MediaEngine>)
        .with_stats_interval(None);

    let result = bridge.run().await;

    assert!(matches!(result, Err(BridgeError::SinkResolve(_))));
    assert_eq!(engine.created.load(Ordering::SeqCst), 0, "싱크 실패 시 엔진은 건드리지 않아야 함");
}

#[tokio::test]
async fn test_remote_description_failure_is_fatal() {
    let (_sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession { fail_remote: true, ..Default::default() });
    let bridge = Bridge::new(session_config("127.0.0.1", port), Arc::clone(&engine) as Arc<dyn MediaEngine>)
        .with_stats_interval(None);

    let result = bridge.run().await;

    match result {
        Err(BridgeError::RemoteDescription(msg)) => assert!(msg.contains("incompatible media")),
        other => panic!("RemoteDescription 에러를 기대했으나: {:?}", other),
    }
    let calls = engine.session.calls();
    assert!(!calls.iter().any(|c| c.starts_with("local:")), "remote 실패 후 local 적용 금지");
    assert_eq!(calls.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_local_description_failure_is_fatal() {
    let (_sock, port) = receiver().await;
    let engine = ScriptedEngine::new(ScriptedSession { fail_local: true, ..Default::default() });
    let bridge = Bridge::new(session_config("127.0.0.1", port), Arc::clone(&engine) as Arc<dyn MediaEngine>)
        .with_stats_interval(None);

    let result = bridge.run().await;

    assert!(matches!(result, Err(BridgeError::LocalDescription(_))));
    assert_eq!(
        engine.session.calls(),
        vec!["on_track", "on_ice", "on_peer", "remote:<answer-A>", "local:<offer-A>", "close"],
    );
}

// ----------------------------------------------------------------------------
// [시나리오 7] 설정 로드
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_load_config_from_file() {
    let dir  = std::env::temp_dir();
    let good = dir.join(format!("wrproxy-good-{}.json", std::process::id()));
    let bad  = dir.join(format!("wrproxy-bad-{}.json", std::process::id()));
    tokio::fs::write(&good, r#"{"localSdp":"<offer-A>","remoteSdp":"<answer-A>","outputHost":"127.0.0.1","outputPort":5004}"#).await.unwrap();
    tokio::fs::write(&bad, r#"{"localSdp":"<offer-A>","remoteSdp":"<answer-A>","outputHost":"127.0.0.1"}"#).await.unwrap();

    let cfg = webrtc_proxy::load_config(Some(&good)).await.unwrap();
    assert_eq!(cfg, session_config("127.0.0.1", 5004));

    let err = webrtc_proxy::load_config(Some(&bad)).await.unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));

    let missing = webrtc_proxy::load_config(Some(&dir.join("wrproxy-does-not-exist.json"))).await;
    assert!(missing.is_err());

    let _ = tokio::fs::remove_file(&good).await;
    let _ = tokio::fs::remove_file(&bad).await;
}
