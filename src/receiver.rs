//! 수신자 (클라이언트측)
//!
//! - 기대 시퀀스와 정확히 일치하는 청크만 수락하고 ACK
//! - 순서가 어긋난 청크는 버림 (ACK 없음, 재시도 카운트 없음)
//! - 타임아웃 시 마지막으로 수락한 청크의 ACK 재전송
//!
//! 소켓을 직접 다루지 않는 순수 상태 머신. 구동은 [`crate::client::Client`].

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::packet::{Packet, StreamKind};
use crate::stats::TransferStats;

/// 수신 이벤트 처리 결과 (드라이버가 수행할 동작)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// 수락한 청크의 ACK 전송
    Ack(i32),

    /// 타임아웃 후 마지막 수락 청크의 ACK 재전송
    Reack(i32),

    /// 아무것도 보내지 않고 계속 대기
    Wait,

    /// 스트림 종료 마커 수신: 전송 성공
    Complete,

    /// 요청한 파일 없음
    NotFound,

    /// 서버 인덱스가 비어 있음
    EmptyIndex,

    /// 재시도 한도 초과
    Exhausted,
}

/// 수신자 상태
#[derive(Debug)]
pub struct Receiver {
    kind: StreamKind,
    expected_sequence: i32,
    retries: u32,
    max_retries: u32,
    sink: BytesMut,
    stats: TransferStats,
}

impl Receiver {
    pub fn new(kind: StreamKind, max_retries: u32) -> Self {
        Self {
            kind,
            expected_sequence: 0,
            retries: 0,
            max_retries,
            sink: BytesMut::new(),
            stats: TransferStats::new(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn expected_sequence(&self) -> i32 {
        self.expected_sequence
    }

    /// 연속 타임아웃 횟수
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn received(&self) -> &[u8] {
        &self.sink
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 패킷 수신 처리
    pub fn on_packet(&mut self, packet: Packet) -> Step {
        match packet {
            Packet::Data {
                kind,
                sequence,
                payload,
            } if kind == self.kind => self.on_chunk(sequence, payload),

            Packet::NonExist if self.kind == StreamKind::File => Step::NotFound,

            Packet::EmptyIndex if self.kind == StreamKind::Index => Step::EmptyIndex,

            other => {
                debug!("예상하지 않은 패킷 무시: {:?}", other.packet_type());
                self.stats.ignored_packets += 1;
                Step::Wait
            }
        }
    }

    fn on_chunk(&mut self, sequence: i32, payload: Bytes) -> Step {
        if sequence == crate::packet::END_OF_STREAM {
            return Step::Complete;
        }

        if sequence != self.expected_sequence {
            debug!(
                "순서가 맞지 않는 청크 버림: {} (기대 {})",
                sequence, self.expected_sequence
            );
            self.stats.out_of_order += 1;
            return Step::Wait;
        }

        let Some(next) = self.expected_sequence.checked_add(1) else {
            warn!("시퀀스 번호 오버플로우: {}", sequence);
            self.stats.ignored_packets += 1;
            return Step::Wait;
        };

        self.stats.record_chunk(payload.len());
        self.sink.extend_from_slice(&payload);
        self.expected_sequence = next;
        self.retries = 0;
        Step::Ack(sequence)
    }

    /// 수신 타임아웃 처리
    pub fn on_timeout(&mut self) -> Step {
        self.retries += 1;
        self.stats.timeouts += 1;

        if self.retries >= self.max_retries {
            return Step::Exhausted;
        }

        // 아직 수락한 청크가 없으면 다시 알릴 것도 없음
        if self.expected_sequence == 0 {
            return Step::Wait;
        }

        self.stats.reacks_sent += 1;
        Step::Reack(self.expected_sequence - 1)
    }

    /// 수신 데이터와 통계
    pub fn finish(self) -> (Bytes, TransferStats) {
        (self.sink.freeze(), self.stats)
    }
}
