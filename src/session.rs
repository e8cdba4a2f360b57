//! 서버측 전송 세션과 세션 저장소
//!
//! 클라이언트 식별자(주소 + 포트)당 활성 세션은 최대 하나.
//! 세션마다 비동기 뮤텍스를 두어 시퀀스 비교-증가와 다음 청크 전송이
//! 하나의 단계로 실행되도록 한다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::fs::File;
use tokio::sync::Mutex;

use crate::chunk::ChunkSource;
use crate::packet::StreamKind;
use crate::{Error, Result, CHUNK_SIZE};

/// 클라이언트 식별자
pub type ClientId = SocketAddr;

/// 저장소가 공유하는 세션 핸들
pub type SessionHandle = Arc<Mutex<TransferSession>>;

/// 한 클라이언트로의 진행 중인 전송
#[derive(Debug)]
pub struct TransferSession {
    client: ClientId,
    kind: StreamKind,

    /// 다음에 확인받을(= 현재 전송 중인) 청크 번호
    current_sequence: i32,

    source: ChunkSource,

    /// 전송 후 확인 대기 중인 청크 크기
    in_flight_len: usize,

    last_activity: Instant,
}

impl TransferSession {
    /// 파일 전송 세션
    pub fn for_file(client: ClientId, file: File) -> Self {
        Self::new(client, StreamKind::File, ChunkSource::file(file))
    }

    /// 인덱스 전송 세션
    pub fn for_index(client: ClientId, index: Bytes) -> Self {
        Self::new(client, StreamKind::Index, ChunkSource::index(index))
    }

    fn new(client: ClientId, kind: StreamKind, source: ChunkSource) -> Self {
        Self {
            client,
            kind,
            current_sequence: 0,
            source,
            in_flight_len: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn current_sequence(&self) -> i32 {
        self.current_sequence
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn source(&self) -> &ChunkSource {
        &self.source
    }

    pub fn is_released(&self) -> bool {
        self.source.is_released()
    }

    /// ACK 처리: 시퀀스가 정확히 일치할 때만 다음 청크로 진행
    ///
    /// 진행했으면 `true`. 불일치 또는 해제된 세션은 `false` (아무 변화 없음).
    pub fn acknowledge(&mut self, sequence: i32) -> Result<bool> {
        self.last_activity = Instant::now();

        if self.is_released() || sequence != self.current_sequence {
            return Ok(false);
        }

        let next = self
            .current_sequence
            .checked_add(1)
            .ok_or(Error::SequenceOverflow)?;

        self.source.advance(self.in_flight_len);
        self.in_flight_len = 0;
        self.current_sequence = next;
        Ok(true)
    }

    /// 현재 시퀀스로 보낼 청크 (소진되면 None)
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        let chunk = self.source.read_chunk(CHUNK_SIZE).await?;
        self.in_flight_len = chunk.as_ref().map_or(0, Bytes::len);
        Ok(chunk)
    }

    /// 바이트 소스 해제 (파일 핸들 닫힘)
    pub fn release(&mut self) {
        self.source.release();
        self.in_flight_len = 0;
    }

    #[cfg(test)]
    pub(crate) fn set_current_sequence(&mut self, sequence: i32) {
        self.current_sequence = sequence;
    }
}

/// 클라이언트 식별자 → 세션
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ClientId, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록
    ///
    /// 기존 세션이 있으면 교체하고 반환한다. 반환된 세션의 자원 해제는
    /// 호출자 책임.
    pub fn create(&self, client: ClientId, session: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(client, session)
    }

    pub fn lookup(&self, client: &ClientId) -> Option<SessionHandle> {
        self.sessions.get(client).map(|entry| entry.value().clone())
    }

    /// 조회와 삭제를 한 번에
    pub fn remove(&self, client: &ClientId) -> Option<SessionHandle> {
        self.sessions.remove(client).map(|(_, session)| session)
    }

    /// 저장된 세션이 `session` 과 같을 때만 삭제
    pub fn remove_if_current(&self, client: &ClientId, session: &SessionHandle) -> bool {
        self.sessions
            .remove_if(client, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    pub fn contains(&self, client: &ClientId) -> bool {
        self.sessions.contains_key(client)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(port: u16) -> ClientId {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn handle(session: TransferSession) -> SessionHandle {
        Arc::new(Mutex::new(session))
    }

    #[tokio::test]
    async fn test_acknowledge_requires_exact_sequence() {
        let mut session = TransferSession::for_index(client(1), Bytes::from_static(b"a.txt\n"));
        assert!(session.next_chunk().await.unwrap().is_some());

        assert!(!session.acknowledge(1).unwrap());
        assert!(!session.acknowledge(-1).unwrap());
        assert_eq!(session.current_sequence(), 0);
        assert_eq!(session.source().position(), 0);

        assert!(session.acknowledge(0).unwrap());
        assert_eq!(session.current_sequence(), 1);
        assert_eq!(session.source().position(), 6);

        // 중복 ACK
        assert!(!session.acknowledge(0).unwrap());
        assert_eq!(session.current_sequence(), 1);
        assert!(session.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_advances_by_chunk_size() {
        let index = Bytes::from(vec![b'x'; CHUNK_SIZE * 2 + 10]);
        let mut session = TransferSession::for_index(client(1), index);

        let mut sizes = Vec::new();
        while let Some(chunk) = session.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
            let seq = session.current_sequence();
            assert!(session.acknowledge(seq).unwrap());
        }

        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
        assert_eq!(session.current_sequence(), 3);
        assert_eq!(session.source().total_length(), CHUNK_SIZE * 2 + 10);
    }

    #[tokio::test]
    async fn test_acknowledge_sequence_overflow() {
        let mut session = TransferSession::for_index(client(1), Bytes::from_static(b"a.txt\n"));
        session.current_sequence = i32::MAX;
        session.next_chunk().await.unwrap();

        assert!(matches!(
            session.acknowledge(i32::MAX),
            Err(Error::SequenceOverflow)
        ));
        // 실패한 ACK 은 아무것도 바꾸지 않음
        assert_eq!(session.current_sequence(), i32::MAX);
        assert_eq!(session.source().position(), 0);
    }

    #[tokio::test]
    async fn test_released_session_ignores_acks() {
        let mut session = TransferSession::for_index(client(1), Bytes::from_static(b"a.txt\n"));
        session.release();

        assert!(session.is_released());
        assert!(!session.acknowledge(0).unwrap());
        assert!(session.next_chunk().await.unwrap().is_none());
    }

    #[test]
    fn test_store_replace_and_remove() {
        let store = SessionStore::new();
        let first = handle(TransferSession::for_index(client(1), Bytes::from_static(b"a\n")));
        let second = handle(TransferSession::for_index(client(1), Bytes::from_static(b"b\n")));

        assert!(store.create(client(1), first.clone()).is_none());
        let replaced = store.create(client(1), second.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(store.len(), 1);

        // 교체된 세션은 후속 세션을 지우지 못함
        assert!(!store.remove_if_current(&client(1), &first));
        assert!(store.contains(&client(1)));

        let found = store.lookup(&client(1)).unwrap();
        assert!(Arc::ptr_eq(&found, &second));

        assert!(store.remove_if_current(&client(1), &second));
        assert!(store.is_empty());
        assert!(store.remove(&client(1)).is_none());
    }

    #[test]
    fn test_store_keys_by_address_and_port() {
        let store = SessionStore::new();
        store.create(client(1), handle(TransferSession::for_index(client(1), Bytes::new())));
        store.create(client(2), handle(TransferSession::for_index(client(2), Bytes::new())));

        assert_eq!(store.len(), 2);
        assert!(store.remove(&client(1)).is_some());
        assert!(store.contains(&client(2)));
    }

    #[tokio::test]
    async fn test_concurrent_acks_advance_once() {
        let store = Arc::new(SessionStore::new());
        let session = handle(TransferSession::for_index(
            client(1),
            Bytes::from(vec![b'y'; 2000]),
        ));
        session.lock().await.next_chunk().await.unwrap();
        store.create(client(1), session);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let session = store.lookup(&client(1)).unwrap();
                let mut session = session.lock().await;
                session.acknowledge(0).unwrap()
            }));
        }

        let mut advanced = 0;
        for task in tasks {
            if task.await.unwrap() {
                advanced += 1;
            }
        }

        assert_eq!(advanced, 1);
        let session = store.lookup(&client(1)).unwrap();
        assert_eq!(session.lock().await.current_sequence(), 1);
    }
}
