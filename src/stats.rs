//! 전송 통계

use std::time::{Duration, Instant};

/// 단일 전송 통계 (클라이언트측)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 수락한 청크 수
    pub chunks_received: u64,

    /// 수락한 페이로드 바이트
    pub bytes_received: u64,

    /// 순서가 맞지 않아 버린 청크 수
    pub out_of_order: u64,

    /// 예상하지 않은 타입이라 무시한 패킷 수
    pub ignored_packets: u64,

    /// 수신 타임아웃 횟수
    pub timeouts: u64,

    /// 타임아웃 후 다시 보낸 ACK 수
    pub reacks_sent: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            chunks_received: 0,
            bytes_received: 0,
            out_of_order: 0,
            ignored_packets: 0,
            timeouts: 0,
            reacks_sent: 0,
        }
    }

    /// 청크 수락 기록
    pub fn record_chunk(&mut self, size: usize) {
        self.chunks_received += 1;
        self.bytes_received += size as u64;
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Chunks: {} | Bytes: {} | Throughput: {:.2} KB/s | Out-of-order: {} | Timeouts: {} | Re-ACKs: {}",
            self.elapsed().as_secs_f64(),
            self.chunks_received,
            self.bytes_received,
            self.throughput() / 1_000.0,
            self.out_of_order,
            self.timeouts,
            self.reacks_sent,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 서버 전체 카운터
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// 생성된 세션 수
    pub sessions_started: u64,

    /// 스트림 종료까지 완료된 세션 수
    pub sessions_completed: u64,

    /// I/O 실패로 중단된 세션 수
    pub sessions_aborted: u64,

    /// 같은 클라이언트의 새 요청으로 교체된 세션 수
    pub sessions_replaced: u64,

    /// 전송한 데이터 청크 수 (종료 마커 제외)
    pub chunks_sent: u64,

    /// 전송한 페이로드 바이트
    pub bytes_sent: u64,

    /// 시퀀스 불일치 또는 세션 없음으로 무시한 ACK 수
    pub acks_ignored: u64,

    /// NONEXIST 응답 수
    pub not_found: u64,

    /// 빈 인덱스 응답 수
    pub empty_index: u64,

    /// 프로토콜 에러로 버린 패킷 수
    pub dropped_packets: u64,
}

impl ServerStats {
    pub fn summary(&self) -> String {
        format!(
            "Sessions: {} started / {} completed / {} aborted / {} replaced | Chunks: {} | Bytes: {} | Ignored ACKs: {} | NONEXIST: {} | Empty index: {} | Dropped: {}",
            self.sessions_started,
            self.sessions_completed,
            self.sessions_aborted,
            self.sessions_replaced,
            self.chunks_sent,
            self.bytes_sent,
            self.acks_ignored,
            self.not_found,
            self.empty_index,
            self.dropped_packets,
        )
    }
}
