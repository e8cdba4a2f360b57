//! 청크 소스 정의
//!
//! - 파일 세션: 열린 파일 핸들에서 순차적으로 읽음
//! - 인덱스 세션: 미리 만든 인덱스 버퍼 + 커서

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::packet::StreamKind;

/// 세션의 바이트 소스
#[derive(Debug)]
pub enum ChunkSource {
    /// 파일 전송
    File(File),

    /// 인덱스 전송
    Index {
        /// 인덱스 버퍼 전체
        data: Bytes,

        /// 다음에 보낼 위치
        position: usize,
    },

    /// 해제됨 (완료, 실패 또는 교체)
    Released,
}

impl ChunkSource {
    pub fn file(file: File) -> Self {
        ChunkSource::File(file)
    }

    pub fn index(data: Bytes) -> Self {
        ChunkSource::Index { data, position: 0 }
    }

    /// 스트림 종류 (해제된 소스는 None)
    pub fn kind(&self) -> Option<StreamKind> {
        match self {
            ChunkSource::File(_) => Some(StreamKind::File),
            ChunkSource::Index { .. } => Some(StreamKind::Index),
            ChunkSource::Released => None,
        }
    }

    /// 인덱스 전체 길이 (파일 소스는 0)
    pub fn total_length(&self) -> usize {
        match self {
            ChunkSource::Index { data, .. } => data.len(),
            _ => 0,
        }
    }

    /// 인덱스 커서 위치 (파일 소스는 0)
    pub fn position(&self) -> usize {
        match self {
            ChunkSource::Index { position, .. } => *position,
            _ => 0,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self, ChunkSource::Released)
    }

    /// 다음 청크 읽기
    ///
    /// 최대 `max_len` 바이트. 파일은 EOF 전까지 버퍼를 채우므로 마지막
    /// 청크만 짧다. 더 보낼 데이터가 없으면 `None`.
    ///
    /// 인덱스 커서는 여기서 움직이지 않는다. 수신 확인 후 [`advance`]로 이동.
    ///
    /// [`advance`]: ChunkSource::advance
    pub async fn read_chunk(&mut self, max_len: usize) -> std::io::Result<Option<Bytes>> {
        match self {
            ChunkSource::File(file) => {
                let mut buf = BytesMut::zeroed(max_len);
                let mut filled = 0;
                while filled < max_len {
                    let n = file.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }

                if filled == 0 {
                    return Ok(None);
                }
                buf.truncate(filled);
                Ok(Some(buf.freeze()))
            }

            ChunkSource::Index { data, position } => {
                let remaining = data.len().saturating_sub(*position);
                if remaining == 0 {
                    return Ok(None);
                }
                let len = remaining.min(max_len);
                Ok(Some(data.slice(*position..*position + len)))
            }

            ChunkSource::Released => Ok(None),
        }
    }

    /// 수신 확인된 바이트만큼 인덱스 커서 이동
    pub fn advance(&mut self, sent: usize) {
        if let ChunkSource::Index { data, position } = self {
            *position = (*position + sent).min(data.len());
        }
    }

    /// 소스 해제 (파일 핸들 닫힘). 여러 번 호출해도 안전
    pub fn release(&mut self) {
        *self = ChunkSource::Released;
    }
}
