//! 송신자 (서버측)
//!
//! - stop-and-wait: 세션당 확인 대기 청크는 하나
//! - 정확히 일치하는 ACK 에만 다음 청크 전송
//! - 재전송 타이머 없음. 중복 ACK 은 무시

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::packet::Packet;
use crate::session::{ClientId, SessionHandle, SessionStore, TransferSession};
use crate::stats::ServerStats;
use crate::{Error, Result};

/// 송신자
pub struct Sender {
    /// 서버 소켓
    socket: Arc<UdpSocket>,

    /// 활성 세션
    sessions: SessionStore,

    /// 서버 통계
    stats: RwLock<ServerStats>,
}

impl Sender {
    /// 새 송신자 생성
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            socket,
            sessions: SessionStore::new(),
            stats: RwLock::new(ServerStats::default()),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// 통계 반환
    pub fn get_stats(&self) -> ServerStats {
        self.stats.read().clone()
    }

    pub(crate) fn record_dropped_packet(&self) {
        self.stats.write().dropped_packets += 1;
    }

    /// 세션 시작: 등록 후 즉시 청크 0 전송
    ///
    /// 같은 클라이언트의 기존 세션은 교체되고 바이트 소스가 해제된다.
    pub async fn start_session(&self, session: TransferSession) -> Result<()> {
        let client = session.client();
        let kind = session.kind();
        let handle: SessionHandle = Arc::new(Mutex::new(session));

        // 공개 전에 잠가서 이전 전송의 늦은 ACK 가 청크 0 보다 먼저 진행시키지 못하게 함
        let mut guard = handle.clone().lock_owned().await;

        if let Some(replaced) = self.sessions.create(client, handle.clone()) {
            replaced.lock().await.release();
            self.stats.write().sessions_replaced += 1;
            debug!("기존 세션 교체: {}", client);
        }
        self.stats.write().sessions_started += 1;
        info!("{:?} 세션 시작: {}", kind, client);

        self.send_next_chunk(&handle, &mut guard).await
    }

    /// ACK 처리
    pub async fn handle_ack(&self, client: ClientId, sequence: i32) -> Result<()> {
        let Some(handle) = self.sessions.lookup(&client) else {
            debug!("세션 없는 ACK 무시: {} seq={}", client, sequence);
            self.stats.write().acks_ignored += 1;
            return Ok(());
        };

        let mut session = handle.lock().await;

        let advanced = match session.acknowledge(sequence) {
            Ok(advanced) => advanced,
            Err(e) => {
                self.abort(&handle, &mut session, &e);
                return Err(e);
            }
        };

        if !advanced {
            debug!(
                "ACK 무시: {} seq={} (현재 {})",
                client,
                sequence,
                session.current_sequence()
            );
            self.stats.write().acks_ignored += 1;
            return Ok(());
        }

        self.send_next_chunk(&handle, &mut session).await
    }

    /// 현재 시퀀스 청크 전송, 소진되었으면 종료 마커 전송 후 세션 삭제
    async fn send_next_chunk(
        &self,
        handle: &SessionHandle,
        session: &mut TransferSession,
    ) -> Result<()> {
        if session.is_released() {
            return Ok(());
        }

        let client = session.client();
        let kind = session.kind();

        let chunk = match session.next_chunk().await {
            Ok(chunk) => chunk,
            Err(e) => {
                let e = Error::from(e);
                self.abort(handle, session, &e);
                return Err(e);
            }
        };

        let Some(payload) = chunk else {
            let sent = self
                .socket
                .send_to(&Packet::end_of_stream(kind).encode(), client)
                .await;
            self.finish(handle, session);

            return match sent {
                Ok(_) => {
                    self.stats.write().sessions_completed += 1;
                    info!(
                        "{:?} 전송 완료: {} ({} 청크)",
                        kind,
                        client,
                        session.current_sequence()
                    );
                    Ok(())
                }
                Err(e) => {
                    self.stats.write().sessions_aborted += 1;
                    warn!("종료 마커 전송 실패: {}: {}", client, e);
                    Err(e.into())
                }
            };
        };

        let sequence = session.current_sequence();
        let len = payload.len();
        let packet = Packet::data(kind, sequence, payload);

        if let Err(e) = self.socket.send_to(&packet.encode(), client).await {
            let e = Error::from(e);
            self.abort(handle, session, &e);
            return Err(e);
        }

        {
            let mut stats = self.stats.write();
            stats.chunks_sent += 1;
            stats.bytes_sent += len as u64;
        }
        debug!("{:?} 청크 {} 전송: {} ({} bytes)", kind, sequence, client, len);

        Ok(())
    }

    /// NONEXIST 응답 (세션 없음)
    pub async fn send_not_found(&self, client: ClientId) -> Result<()> {
        self.socket
            .send_to(&Packet::NonExist.encode(), client)
            .await?;
        self.stats.write().not_found += 1;
        info!("NONEXIST 응답: {}", client);
        Ok(())
    }

    /// 빈 인덱스 에러 응답 (세션 없음)
    pub async fn send_empty_index(&self, client: ClientId) -> Result<()> {
        self.socket
            .send_to(&Packet::EmptyIndex.encode(), client)
            .await?;
        self.stats.write().empty_index += 1;
        info!("빈 인덱스 응답: {}", client);
        Ok(())
    }

    /// 세션 삭제 및 소스 해제
    fn finish(&self, handle: &SessionHandle, session: &mut TransferSession) {
        self.sessions.remove_if_current(&session.client(), handle);
        session.release();
    }

    /// 전송 중 실패: 클라이언트에 알리지 않고 세션 폐기
    fn abort(&self, handle: &SessionHandle, session: &mut TransferSession, error: &Error) {
        warn!(
            "세션 중단: {} seq={}: {}",
            session.client(),
            session.current_sequence(),
            error
        );
        self.finish(handle, session);
        self.stats.write().sessions_aborted += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::SocketAddr;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::fs::File;

    use super::*;
    use crate::packet::StreamKind;
    use crate::CHUNK_SIZE;

    async fn setup() -> (Arc<Sender>, UdpSocket, SocketAddr) {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();
        (Arc::new(Sender::new(server)), client, client_addr)
    }

    async fn recv(socket: &UdpSocket) -> Option<Packet> {
        let mut buf = vec![0u8; 2048];
        match tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(Packet::decode(&buf[..len]).unwrap()),
            _ => None,
        }
    }

    fn index_of(len: usize) -> Bytes {
        Bytes::from(vec![b'i'; len])
    }

    #[tokio::test]
    async fn test_index_stream_and_cleanup() {
        let (sender, client, addr) = setup().await;
        let index = index_of(CHUNK_SIZE + 1);

        sender
            .start_session(TransferSession::for_index(addr, index.clone()))
            .await
            .unwrap();

        let mut received = Vec::new();
        let mut sequence = 0;
        loop {
            match recv(&client).await.unwrap() {
                Packet::Data {
                    kind,
                    sequence: seq,
                    payload,
                } => {
                    assert_eq!(kind, StreamKind::Index);
                    if seq == -1 {
                        break;
                    }
                    assert_eq!(seq, sequence);
                    received.extend_from_slice(&payload);
                    sender.handle_ack(addr, seq).await.unwrap();
                    sequence += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(sequence, 2);
        assert_eq!(received, index.to_vec());
        assert!(sender.sessions().is_empty());
        assert!(recv(&client).await.is_none());

        let stats = sender.get_stats();
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.sessions_completed, 1);
        assert_eq!(stats.chunks_sent, 2);
    }

    #[tokio::test]
    async fn test_duplicate_ack_is_noop() {
        let (sender, client, addr) = setup().await;
        sender
            .start_session(TransferSession::for_index(addr, index_of(CHUNK_SIZE * 3)))
            .await
            .unwrap();

        assert!(matches!(recv(&client).await, Some(Packet::Data { sequence: 0, .. })));
        sender.handle_ack(addr, 0).await.unwrap();
        assert!(matches!(recv(&client).await, Some(Packet::Data { sequence: 1, .. })));

        // 청크 1 이 유실되었다고 가정하고 ACK(0) 재전송: 재전송 없음
        sender.handle_ack(addr, 0).await.unwrap();
        sender.handle_ack(addr, 5).await.unwrap();
        assert!(recv(&client).await.is_none());

        let session = sender.sessions().lookup(&addr).unwrap();
        assert_eq!(session.lock().await.current_sequence(), 1);
        assert_eq!(sender.get_stats().acks_ignored, 2);
    }

    #[tokio::test]
    async fn test_concurrent_acks_send_one_chunk() {
        let (sender, client, addr) = setup().await;
        sender
            .start_session(TransferSession::for_index(addr, index_of(CHUNK_SIZE * 3)))
            .await
            .unwrap();
        assert!(matches!(recv(&client).await, Some(Packet::Data { sequence: 0, .. })));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let sender = sender.clone();
            tasks.push(tokio::spawn(async move { sender.handle_ack(addr, 0).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(matches!(recv(&client).await, Some(Packet::Data { sequence: 1, .. })));
        assert!(recv(&client).await.is_none());
        assert_eq!(sender.get_stats().chunks_sent, 2);
    }

    #[tokio::test]
    async fn test_empty_file_sends_end_of_stream_directly() {
        let (sender, client, addr) = setup().await;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = File::open(tmp.path()).await.unwrap();

        sender
            .start_session(TransferSession::for_file(addr, file))
            .await
            .unwrap();

        assert_eq!(
            recv(&client).await.unwrap(),
            Packet::end_of_stream(StreamKind::File)
        );
        assert!(sender.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_new_request_replaces_session() {
        let (sender, client, addr) = setup().await;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![b'f'; CHUNK_SIZE * 2]).unwrap();
        let file = File::open(tmp.path()).await.unwrap();

        sender
            .start_session(TransferSession::for_file(addr, file))
            .await
            .unwrap();
        let old = sender.sessions().lookup(&addr).unwrap();
        assert!(matches!(
            recv(&client).await,
            Some(Packet::Data { kind: StreamKind::File, sequence: 0, .. })
        ));

        sender
            .start_session(TransferSession::for_index(addr, Bytes::from_static(b"a.txt\n")))
            .await
            .unwrap();
        assert!(old.lock().await.is_released());
        assert!(matches!(
            recv(&client).await,
            Some(Packet::Data { kind: StreamKind::Index, sequence: 0, .. })
        ));

        // ACK 은 새 세션으로
        sender.handle_ack(addr, 0).await.unwrap();
        assert_eq!(
            recv(&client).await.unwrap(),
            Packet::end_of_stream(StreamKind::Index)
        );
        assert!(sender.sessions().is_empty());
        assert_eq!(sender.get_stats().sessions_replaced, 1);
    }

    #[tokio::test]
    async fn test_error_responses() {
        let (sender, client, addr) = setup().await;

        sender.send_not_found(addr).await.unwrap();
        assert_eq!(recv(&client).await.unwrap(), Packet::NonExist);

        sender.send_empty_index(addr).await.unwrap();
        assert_eq!(recv(&client).await.unwrap(), Packet::EmptyIndex);

        assert!(sender.sessions().is_empty());
        let stats = sender.get_stats();
        assert_eq!((stats.not_found, stats.empty_index), (1, 1));
    }

    #[tokio::test]
    async fn test_read_failure_aborts_silently() {
        let (sender, client, addr) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        // 디렉터리는 열리지만 읽기는 실패 (EISDIR)
        let file = File::open(dir.path()).await.unwrap();

        let result = sender
            .start_session(TransferSession::for_file(addr, file))
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(recv(&client).await.is_none());
        assert!(sender.sessions().is_empty());

        let stats = sender.get_stats();
        assert_eq!(stats.sessions_aborted, 1);
        assert_eq!(stats.sessions_completed, 0);
        assert_eq!(stats.chunks_sent, 0);
    }

    #[tokio::test]
    async fn test_sequence_overflow_aborts_silently() {
        let (sender, client, addr) = setup().await;
        sender
            .start_session(TransferSession::for_index(addr, index_of(CHUNK_SIZE * 2)))
            .await
            .unwrap();
        assert!(matches!(recv(&client).await, Some(Packet::Data { sequence: 0, .. })));

        let session = sender.sessions().lookup(&addr).unwrap();
        session.lock().await.set_current_sequence(i32::MAX);

        let result = sender.handle_ack(addr, i32::MAX).await;

        assert!(matches!(result, Err(Error::SequenceOverflow)));
        assert!(recv(&client).await.is_none());
        assert!(sender.sessions().is_empty());
        assert!(session.lock().await.is_released());
        assert_eq!(sender.get_stats().sessions_aborted, 1);
    }

    #[tokio::test]
    async fn test_ack_without_session() {
        let (sender, client, addr) = setup().await;
        sender.handle_ack(addr, 0).await.unwrap();

        assert!(recv(&client).await.is_none());
        assert_eq!(sender.get_stats().acks_ignored, 1);
    }
}
