//! 요청 분배기
//!
//! 들어온 데이터그램의 타입 바이트로 처리기 선택:
//! REQUEST → 파일 세션, INDEX → 인덱스 세션, ACK → 송신자 진행.
//! 그 외는 기록 후 버림 (응답 없음).

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::directory::{build_index, Directory};
use crate::packet::Packet;
use crate::sender::Sender;
use crate::session::TransferSession;
use crate::{Error, Result};

/// 분배기 (작업 태스크마다 복제)
#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<Sender>,
    directory: Directory,
}

impl Dispatcher {
    pub fn new(sender: Arc<Sender>, directory: Directory) -> Self {
        Self { sender, directory }
    }

    pub fn sender(&self) -> &Arc<Sender> {
        &self.sender
    }

    /// 데이터그램 하나 처리. 에러는 기록만 하고 삼킴
    pub async fn dispatch(&self, datagram: Bytes, client: SocketAddr) {
        if let Err(e) = self.handle(&datagram, client).await {
            warn!("요청 처리 에러 ({}): {}", client, e);
        }
    }

    async fn handle(&self, datagram: &[u8], client: SocketAddr) -> Result<()> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("패킷 버림 ({}): {}", client, e);
                self.sender.record_dropped_packet();
                return Ok(());
            }
        };

        match packet {
            Packet::Request { filename } => self.handle_file_request(client, filename).await,
            Packet::Index => self.handle_index_request(client).await,
            Packet::Ack { sequence } => self.sender.handle_ack(client, sequence).await,
            other => {
                warn!(
                    "처리할 수 없는 패킷 타입 버림 ({}): {:?}",
                    client,
                    other.packet_type()
                );
                self.sender.record_dropped_packet();
                Ok(())
            }
        }
    }

    async fn handle_file_request(&self, client: SocketAddr, filename: String) -> Result<()> {
        info!("Received request for file: {} from {}", filename, client);

        match self.directory.open_for_read(&filename).await {
            Ok(file) => {
                self.sender
                    .start_session(TransferSession::for_file(client, file))
                    .await
            }
            Err(Error::NotFound { .. }) => {
                info!("File not found: {}", filename);
                self.sender.send_not_found(client).await
            }
            Err(e) => {
                // 열기 실패도 클라이언트에게는 NONEXIST
                warn!("파일 열기 실패 {}: {}", filename, e);
                self.sender.send_not_found(client).await
            }
        }
    }

    async fn handle_index_request(&self, client: SocketAddr) -> Result<()> {
        info!("Received index request from {}", client);

        let names = match self.directory.list_text_files().await {
            Ok(names) => names,
            Err(e) => {
                warn!("디렉터리 목록 실패 {:?}: {}", self.directory.root(), e);
                Vec::new()
            }
        };

        if names.is_empty() {
            return self.sender.send_empty_index(client).await;
        }

        debug!("인덱스: {}개 파일", names.len());
        self.sender
            .start_session(TransferSession::for_index(client, build_index(&names)))
            .await
    }
}
