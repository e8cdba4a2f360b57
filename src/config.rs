//! 프로토콜 설정

use std::time::Duration;

use crate::MAX_PACKET_SIZE;

/// SWFT 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 클라이언트 수신 타임아웃 (밀리초)
    /// 만료되면 재시도 카운터 증가
    pub recv_timeout_ms: u64,

    /// 연속 타임아웃 허용 횟수
    pub max_retries: u32,

    /// 서버 수신 루프 폴링 주기 (밀리초)
    /// 재전송 타이머가 아니라 종료 신호 확인용
    pub poll_interval_ms: u64,

    /// 수신 버퍼 크기 (서버/클라이언트 공통)
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recv_timeout_ms: 5000,          // 5초
            max_retries: 5,
            poll_interval_ms: 1000,         // 1초
            recv_buffer_size: MAX_PACKET_SIZE,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 로컬/루프백용 설정 (짧은 타임아웃)
    pub fn fast() -> Self {
        Self {
            recv_timeout_ms: 200,
            max_retries: 5,
            poll_interval_ms: 50,
            recv_buffer_size: MAX_PACKET_SIZE,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            recv_timeout_ms: 10000,
            max_retries: 10,
            poll_interval_ms: 1000,
            recv_buffer_size: MAX_PACKET_SIZE,
        }
    }
}
