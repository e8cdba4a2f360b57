//! 패킷 코덱
//!
//! 모든 메시지가 공유하는 고정 바이너리 프레이밍. 정수는 모두 big-endian.
//!
//! ```text
//! REQUEST     [type:1][filename: 나머지 전부, 길이 접두사 없음]
//! INDEX       [type:1]
//! DATA        [type:1][sequence:4][length:4][payload:length]
//! INDEX_DATA  [type:1][sequence:4][length:4][payload:length]
//! ACK         [type:1][sequence:4]
//! NONEXIST    [type:1][0xFF:1]
//! EMPTY INDEX [DATA:1][0xFF:1]
//! ```
//!
//! 스트림 종료는 `sequence == -1`, `length == 0` 인 DATA/INDEX_DATA 패킷.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result, HEADER_SIZE};

/// 스트림 종료 마커의 시퀀스 번호
pub const END_OF_STREAM: i32 = -1;

/// 2바이트 에러 프레임의 두 번째 바이트 (의미 없음, 디코더는 무시)
const DEGENERATE_TRAILER: u8 = 0xFF;

/// ACK 프레임 크기: type(1) + sequence(4)
const ACK_SIZE: usize = 5;

/// 에러 프레임 크기
const DEGENERATE_SIZE: usize = 2;

/// 패킷 타입 (와이어 값)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// 파일 데이터 청크
    Data = 1,

    /// 청크 수신 확인
    Ack = 2,

    /// 파일 요청
    Request = 3,

    /// 인덱스(파일 목록) 요청
    Index = 4,

    /// 인덱스 데이터 청크
    IndexData = 5,

    /// 요청한 파일 없음
    NonExist = 6,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PacketType::Data),
            2 => Ok(PacketType::Ack),
            3 => Ok(PacketType::Request),
            4 => Ok(PacketType::Index),
            5 => Ok(PacketType::IndexData),
            6 => Ok(PacketType::NonExist),
            other => Err(Error::UnknownPacketType(other)),
        }
    }
}

/// 청크 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// 파일 전송 (DATA)
    File,

    /// 인덱스 전송 (INDEX_DATA)
    Index,
}

impl StreamKind {
    /// 이 스트림의 청크가 사용하는 타입 바이트
    pub fn packet_type(self) -> PacketType {
        match self {
            StreamKind::File => PacketType::Data,
            StreamKind::Index => PacketType::IndexData,
        }
    }
}

/// 와이어를 오가는 유일한 엔티티
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// 파일 요청 (파일 이름은 앞뒤 공백 제거됨)
    Request { filename: String },

    /// 인덱스 요청
    Index,

    /// 데이터 청크 또는 스트림 종료 마커
    Data {
        kind: StreamKind,
        sequence: i32,
        payload: Bytes,
    },

    /// 수신 확인
    Ack { sequence: i32 },

    /// 파일 없음
    NonExist,

    /// 빈 인덱스 에러 프레임
    EmptyIndex,
}

impl Packet {
    pub fn request(filename: impl Into<String>) -> Self {
        Packet::Request {
            filename: filename.into(),
        }
    }

    pub fn data(kind: StreamKind, sequence: i32, payload: Bytes) -> Self {
        Packet::Data {
            kind,
            sequence,
            payload,
        }
    }

    /// 스트림 종료 마커
    pub fn end_of_stream(kind: StreamKind) -> Self {
        Packet::Data {
            kind,
            sequence: END_OF_STREAM,
            payload: Bytes::new(),
        }
    }

    pub fn ack(sequence: i32) -> Self {
        Packet::Ack { sequence }
    }

    /// 와이어 타입
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Request { .. } => PacketType::Request,
            Packet::Index => PacketType::Index,
            Packet::Data { kind, .. } => kind.packet_type(),
            Packet::Ack { .. } => PacketType::Ack,
            Packet::NonExist => PacketType::NonExist,
            Packet::EmptyIndex => PacketType::Data,
        }
    }

    /// 스트림 종료 마커 여부
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Packet::Data { sequence, .. } if *sequence == END_OF_STREAM)
    }

    /// 바이트로 직렬화
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.packet_type() as u8);

        match self {
            Packet::Request { filename } => buf.put_slice(filename.as_bytes()),
            Packet::Index => {}
            Packet::Data {
                sequence, payload, ..
            } => {
                buf.put_i32(*sequence);
                buf.put_u32(payload.len() as u32);
                buf.put_slice(payload);
            }
            Packet::Ack { sequence } => buf.put_i32(*sequence),
            Packet::NonExist | Packet::EmptyIndex => buf.put_u8(DEGENERATE_TRAILER),
        }

        buf.freeze()
    }

    /// 직렬화된 크기
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Request { filename } => 1 + filename.len(),
            Packet::Index => 1,
            Packet::Data { payload, .. } => HEADER_SIZE + payload.len(),
            Packet::Ack { .. } => ACK_SIZE,
            Packet::NonExist | Packet::EmptyIndex => DEGENERATE_SIZE,
        }
    }

    /// 바이트에서 역직렬화
    ///
    /// 수신한 바이트 범위를 넘어서 읽지 않는다. 선언된 페이로드 길이가
    /// 실제 수신 바이트보다 크면 [`Error::PayloadLength`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        if !buf.has_remaining() {
            return Err(Error::EmptyPacket);
        }

        let packet_type = PacketType::try_from(buf.get_u8())?;

        match packet_type {
            PacketType::Request => {
                let filename = trim_filename(&String::from_utf8_lossy(buf)).to_string();
                Ok(Packet::Request { filename })
            }

            PacketType::Index => Ok(Packet::Index),

            PacketType::NonExist => Ok(Packet::NonExist),

            PacketType::Ack => {
                if bytes.len() < ACK_SIZE {
                    return Err(Error::Truncated {
                        packet_type,
                        needed: ACK_SIZE,
                        got: bytes.len(),
                    });
                }
                Ok(Packet::Ack {
                    sequence: buf.get_i32(),
                })
            }

            PacketType::Data | PacketType::IndexData => {
                // 빈 인덱스 에러는 DATA 타입의 2바이트 프레임
                if packet_type == PacketType::Data && bytes.len() == DEGENERATE_SIZE {
                    return Ok(Packet::EmptyIndex);
                }

                if bytes.len() < HEADER_SIZE {
                    return Err(Error::Truncated {
                        packet_type,
                        needed: HEADER_SIZE,
                        got: bytes.len(),
                    });
                }

                let sequence = buf.get_i32();
                let declared = buf.get_u32();
                if declared as usize > buf.remaining() {
                    return Err(Error::PayloadLength {
                        declared,
                        available: buf.remaining(),
                    });
                }

                let kind = if packet_type == PacketType::Data {
                    StreamKind::File
                } else {
                    StreamKind::Index
                };

                Ok(Packet::Data {
                    kind,
                    sequence,
                    payload: Bytes::copy_from_slice(&buf[..declared as usize]),
                })
            }
        }
    }
}

/// 파일 이름 앞뒤의 공백과 제어 문자(U+0020 이하) 제거
pub(crate) fn trim_filename(name: &str) -> &str {
    name.trim_matches(|c: char| c <= ' ')
}
