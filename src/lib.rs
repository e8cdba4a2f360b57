//! # SWFT (Stop-and-Wait File Transfer)
//!
//! UDP 기반 확인 응답형 텍스트 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **stop-and-wait**: 세션당 확인 대기 청크는 하나 (윈도우 크기 1)
//! - **순차 번호 청크**: 정확히 기대한 번호만 수락, 나머지는 버림
//! - **클라이언트 주도 복구**: 서버는 재전송 타이머가 없고 클라이언트가
//!   타임아웃 후 마지막 ACK 를 다시 보냄
//! - **인덱스**: 서버 디렉터리의 `.txt` 파일 목록을 같은 방식으로 전송
//! - **클라이언트별 세션**: 주소 + 포트 기준, 새 요청이 기존 세션을 대체

pub mod chunk;
pub mod client;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod session;
pub mod stats;

pub use chunk::ChunkSource;
pub use client::{Client, Transfer};
pub use config::Config;
pub use directory::Directory;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use packet::{Packet, PacketType, StreamKind};
pub use receiver::Receiver;
pub use sender::Sender;
pub use server::Server;
pub use session::{ClientId, SessionStore, TransferSession};
pub use stats::{ServerStats, TransferStats};

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 12345;

/// 최대 패킷 크기 (송수신 공통)
pub const MAX_PACKET_SIZE: usize = 508;

/// 데이터 패킷 헤더 크기: type(1) + sequence(4) + length(4)
pub const HEADER_SIZE: usize = 9;

/// 청크당 최대 페이로드
pub const CHUNK_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;
