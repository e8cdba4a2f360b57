//! 서버가 공개하는 텍스트 파일 디렉터리

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::fs::{self, File};
use tracing::debug;

use crate::{Error, Result};

/// 인덱스에 포함되는 확장자
pub const TEXT_EXTENSION: &str = ".txt";

/// 공개 디렉터리
#[derive(Debug, Clone)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.txt` 로 끝나는 일반 파일 목록 (이름순)
    ///
    /// UTF-8 이 아닌 이름은 건너뛴다.
    pub async fn list_text_files(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(TEXT_EXTENSION) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// 읽기용으로 파일 열기
    ///
    /// 경로 구성요소가 아닌 이름, 없는 파일, 일반 파일이 아닌 경우 모두
    /// [`Error::NotFound`].
    pub async fn open_for_read(&self, filename: &str) -> Result<File> {
        let not_found = || Error::NotFound {
            filename: filename.to_string(),
        };

        if !is_plain_name(filename) {
            debug!("경로 구성요소가 아닌 요청 거부: {:?}", filename);
            return Err(not_found());
        }

        let path = self.root.join(filename);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(not_found());
        }

        match File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 단일 경로 구성요소인지 확인 (디렉터리 탈출 방지)
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}

/// 인덱스 페이로드 생성: 이름마다 개행으로 끝나는 연결 문자열
pub fn build_index(names: &[String]) -> Bytes {
    let total: usize = names.iter().map(|n| n.len() + 1).sum();
    let mut buf = BytesMut::with_capacity(total);
    for name in names {
        buf.put_slice(name.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.freeze()
}

/// 인덱스 페이로드를 파일 이름 목록으로 분해
pub fn parse_index(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
