//! 서버
//!
//! 단일 수신 루프가 소켓에서 데이터그램을 순차적으로 꺼내 데이터그램마다
//! 태스크를 하나씩 띄운다. 세션 간 동기화는 세션 저장소로만 이루어진다.
//! 수신 루프의 타임아웃은 종료 확인용이며 재전송 타이머가 아니다.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::directory::Directory;
use crate::sender::Sender;
use crate::stats::ServerStats;
use crate::{Config, Result};

/// 서버
pub struct Server {
    config: Config,
    socket: Arc<UdpSocket>,
    dispatcher: Dispatcher,
    running: AtomicBool,
}

impl Server {
    /// 소켓 바인딩. 실패하면 서버를 시작할 수 없음
    pub async fn bind(bind_addr: SocketAddr, directory: Directory, config: Config) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let sender = Arc::new(Sender::new(socket.clone()));

        info!(
            "SWFT Server bound to {}, serving {:?}",
            socket.local_addr()?,
            directory.root()
        );

        Ok(Self {
            config,
            socket,
            dispatcher: Dispatcher::new(sender, directory),
            running: AtomicBool::new(true),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 수신 루프. [`stop`] 이 호출될 때까지 실행 (먼저 호출되었으면 즉시 반환)
    ///
    /// [`stop`]: Server::stop
    pub async fn run(&self) -> Result<()> {
        info!("UDP Server running on {}", self.local_addr()?);

        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let poll_interval = self.config.poll_interval();

        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(poll_interval, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    let datagram = Bytes::copy_from_slice(&buf[..len]);
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.dispatch(datagram, addr).await;
                    });
                }
                Ok(Err(e)) => {
                    warn!("수신 에러: {}", e);
                }
                Err(_) => {
                    // 타임아웃, 종료 플래그 확인
                }
            }
        }

        info!("UDP Server stopped");
        Ok(())
    }

    /// 정지 (폴링 주기 안에 수신 루프 종료)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 활성 세션 수
    pub fn active_sessions(&self) -> usize {
        self.dispatcher.sender().sessions().len()
    }

    /// 통계 반환
    pub fn stats(&self) -> ServerStats {
        self.dispatcher.sender().get_stats()
    }
}
