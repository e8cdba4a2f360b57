//! 에러 타입 정의

use thiserror::Error;

use crate::packet::PacketType;

/// SWFT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("빈 패킷")]
    EmptyPacket,

    #[error("알 수 없는 패킷 타입: {0}")]
    UnknownPacketType(u8),

    #[error("잘린 패킷: {packet_type:?} 최소 {needed} 바이트 필요, {got} 바이트 수신")]
    Truncated {
        packet_type: PacketType,
        needed: usize,
        got: usize,
    },

    #[error("페이로드 길이 불일치: 선언 {declared} 바이트, 실제 {available} 바이트")]
    PayloadLength { declared: u32, available: usize },

    #[error("파일 없음: {filename}")]
    NotFound { filename: String },

    #[error("인덱스가 비어 있음")]
    EmptyIndex,

    #[error("재시도 {retries}회 초과: {received_chunks}개 청크 수신 후 중단")]
    RetriesExhausted { retries: u32, received_chunks: i32 },

    #[error("시퀀스 번호 오버플로우")]
    SequenceOverflow,
}

impl Error {
    /// 프로토콜 위반 (수신 측에서 기록 후 버리는 에러)
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyPacket
                | Error::UnknownPacketType(_)
                | Error::Truncated { .. }
                | Error::PayloadLength { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
