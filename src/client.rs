//! 클라이언트 전송 드라이버
//!
//! 요청 전송 → 수신 타임아웃을 건 대기 → [`Receiver`] 에 이벤트 전달 →
//! 결과 동작 수행. 단일 태스크에서 순차 실행되며 동시에 하나의 요청만 처리.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::directory::parse_index;
use crate::packet::{trim_filename, Packet, StreamKind};
use crate::receiver::{Receiver, Step};
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 완료된 전송
#[derive(Debug)]
pub struct Transfer {
    /// 수신 데이터 (청크를 시퀀스 순서로 이어 붙인 것)
    pub data: Bytes,

    /// 전송 통계
    pub stats: TransferStats,
}

impl Transfer {
    /// 인덱스 전송 결과를 파일 이름 목록으로
    pub fn file_names(&self) -> Vec<String> {
        parse_index(&self.data)
    }
}

/// 클라이언트
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: Config,
}

impl Client {
    /// 임시 포트에 바인딩하고 서버 주소에 연결
    pub async fn connect(server_addr: SocketAddr, config: Config) -> Result<Self> {
        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;
        info!(
            "SWFT Client bound to {}, server: {}",
            socket.local_addr()?,
            server_addr
        );

        Ok(Self {
            socket,
            server_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 인덱스 요청
    pub async fn fetch_index(&self) -> Result<Transfer> {
        self.run(Packet::Index, StreamKind::Index).await
    }

    /// 파일 요청 (메모리로 수신)
    pub async fn fetch_file(&self, filename: &str) -> Result<Transfer> {
        self.run(Packet::request(trim_filename(filename)), StreamKind::File)
            .await
    }

    /// 파일 요청 후 `output` 에 저장
    ///
    /// 전송이 완료된 경우에만 파일을 만든다.
    pub async fn download(&self, filename: &str, output: impl AsRef<Path>) -> Result<Transfer> {
        let transfer = self.fetch_file(filename).await?;
        tokio::fs::write(output.as_ref(), &transfer.data).await?;
        info!(
            "File transfer complete: {} -> {:?} ({} bytes)",
            filename,
            output.as_ref(),
            transfer.data.len()
        );
        Ok(transfer)
    }

    /// 요청 하나를 끝까지 구동
    async fn run(&self, request: Packet, kind: StreamKind) -> Result<Transfer> {
        self.drain_stale();
        self.socket.send(&request.encode()).await?;
        debug!("요청 전송: {:?}", request);

        let mut receiver = Receiver::new(kind, self.config.max_retries);
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        loop {
            let received =
                tokio::time::timeout(self.config.recv_timeout(), self.socket.recv(&mut buf)).await;

            let step = match received {
                Ok(Ok(len)) => match Packet::decode(&buf[..len]) {
                    Ok(packet) => receiver.on_packet(packet),
                    Err(e) => {
                        debug!("디코딩 실패 패킷 무시: {}", e);
                        Step::Wait
                    }
                },
                Ok(Err(e)) => {
                    // 서버가 없으면 ICMP 로 인한 에러가 올 수 있음. 타임아웃과 같이 취급
                    warn!("수신 에러: {}", e);
                    receiver.on_timeout()
                }
                Err(_) => {
                    let step = receiver.on_timeout();
                    info!(
                        "Timeout waiting for {:?} data. Retry {} of {}",
                        kind,
                        receiver.retries(),
                        self.config.max_retries
                    );
                    step
                }
            };

            match step {
                Step::Ack(sequence) | Step::Reack(sequence) => {
                    self.socket.send(&Packet::ack(sequence).encode()).await?;
                }
                Step::Wait => {}
                Step::Complete => {
                    let (data, stats) = receiver.finish();
                    debug!("{:?} 전송 완료: {}", kind, stats.summary());
                    return Ok(Transfer { data, stats });
                }
                Step::NotFound => {
                    let filename = match request {
                        Packet::Request { filename } => filename,
                        _ => String::new(),
                    };
                    return Err(Error::NotFound { filename });
                }
                Step::EmptyIndex => return Err(Error::EmptyIndex),
                Step::Exhausted => {
                    warn!(
                        "Failed to receive complete {:?} after {} retries",
                        kind, self.config.max_retries
                    );
                    return Err(Error::RetriesExhausted {
                        retries: self.config.max_retries,
                        received_chunks: receiver.expected_sequence(),
                    });
                }
            }
        }
    }

    /// 이전에 포기한 전송에서 늦게 도착한 데이터그램 버림
    fn drain_stale(&self) {
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let mut drained = 0;
        while self.socket.try_recv(&mut buf).is_ok() {
            drained += 1;
        }
        if drained > 0 {
            debug!("이전 전송의 데이터그램 {}개 버림", drained);
        }
    }
}
