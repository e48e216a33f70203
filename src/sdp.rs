// author: kodeholic (powered by Claude)
// SDP 요약 모듈
//
// 엔진에 넘기기 전에 offer/answer를 훑어서 진단 로그용 요약만 만듭니다.
// 유효성 판단은 엔진 몫 — 여기서는 절대 거부하지 않음.
//
// 추출 항목:
//   - m= 섹션별 kind / port / proto / payload type 목록
//   - a=mid, 방향(sendrecv/sendonly/recvonly/inactive), a=rtpmap 코덱명
//   - a=ice-ufrag, a=fingerprint 존재 여부, a=candidate 개수 (세션 + 미디어 전체)

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaSection {
    pub kind:      String,
    pub port:      u16,
    pub protocol:  String,
    pub formats:   Vec<u8>,
    pub mid:       Option<String>,
    pub direction: Option<String>,
    /// rtpmap 코덱 (예: "opus/48000/2", "H264/90000")
    pub codecs:    Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdpSummary {
    pub media:           Vec<MediaSection>,
    pub ice_ufrag:       Option<String>,
    pub has_fingerprint: bool,
    pub candidates:      usize,
}

const DIRECTIONS: [&str; 4] = ["sendrecv", "sendonly", "recvonly", "inactive"];

pub fn summarize(sdp: &str) -> SdpSummary {
    let mut summary = SdpSummary::default();
    let mut current: Option<MediaSection> = None;

    for line in sdp.lines().map(str::trim_end) {
        if let Some(rest) = line.strip_prefix("m=") {
            if let Some(sec) = current.take() {
                summary.media.push(sec);
            }
            current = Some(parse_m_line(rest));
            continue;
        }

        // ICE / DTLS 속성은 세션 레벨이든 미디어 레벨이든 동일하게 집계
        if let Some(ufrag) = line.strip_prefix("a=ice-ufrag:") {
            summary.ice_ufrag.get_or_insert_with(|| ufrag.trim().to_string());
            continue;
        }
        if line.starts_with("a=fingerprint:") {
            summary.has_fingerprint = true;
            continue;
        }
        if line.starts_with("a=candidate:") {
            summary.candidates += 1;
            continue;
        }

        let sec = match current.as_mut() {
            Some(s) => s,
            None    => continue,  // 세션 헤더 영역
        };

        if let Some(mid) = line.strip_prefix("a=mid:") {
            sec.mid = Some(mid.trim().to_string());
        } else if let Some(rtpmap) = line.strip_prefix("a=rtpmap:") {
            // "111 opus/48000/2" → "opus/48000/2"
            if let Some((_, codec)) = rtpmap.split_once(' ') {
                sec.codecs.push(codec.trim().to_string());
            }
        } else if let Some(dir) = line.strip_prefix("a=") {
            if DIRECTIONS.contains(&dir) {
                sec.direction = Some(dir.to_string());
            }
        }
    }
    if let Some(sec) = current.take() {
        summary.media.push(sec);
    }

    summary
}

/// "audio 9 UDP/TLS/RTP/SAVPF 111 0" 파싱 — 형식이 깨진 필드는 기본값
fn parse_m_line(rest: &str) -> MediaSection {
    let mut parts = rest.split_whitespace();
    let kind     = parts.next().unwrap_or_default().to_string();
    let port     = parts.next().and_then(|p| p.split('/').next()?.parse().ok()).unwrap_or(0);
    let protocol = parts.next().unwrap_or_default().to_string();
    let formats  = parts.filter_map(|f| f.parse().ok()).collect();
    MediaSection { kind, port, protocol, formats, ..Default::default() }
}

impl fmt::Display for SdpSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} media [", self.media.len())?;
        for (i, m) in self.media.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            let codec = m.codecs.first().map(String::as_str).unwrap_or("?");
            write!(f, "{}/{}", m.kind, codec)?;
            if let Some(dir) = &m.direction {
                write!(f, " {}", dir)?;
            }
        }
        write!(
            f,
            "] ufrag={} fingerprint={} candidates={}",
            self.ice_ufrag.as_deref().unwrap_or("-"),
            self.has_fingerprint,
            self.candidates,
        )
    }
}
