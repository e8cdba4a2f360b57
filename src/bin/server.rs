//! SWFT 서버 - Stop-and-Wait File Transfer
//!
//! 디렉터리의 텍스트 파일을 UDP 로 청크 단위 전송
//! - 인덱스(파일 목록) 요청과 파일 요청 처리
//! - 청크마다 ACK 를 받아야 다음 청크 전송
//!
//! 사용법:
//!   cargo run --release --bin swft-server -- [OPTIONS]
//!
//! 예시:
//!   # 현재 디렉터리 공개
//!   cargo run --release --bin swft-server
//!
//!   # 다른 포트, 다른 디렉터리
//!   cargo run --release --bin swft-server -- --bind 0.0.0.0:9000 --dir ./shared

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swft::{Config, Directory, Server, DEFAULT_PORT};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    directory: PathBuf,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            directory: PathBuf::from("."),
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    let port: u16 = args[i + 1].parse().expect("유효한 포트 필요");
                    config.bind_addr.set_port(port);
                    i += 1;
                }
            }
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    config.directory = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--poll-ms" => {
                if i + 1 < args.len() {
                    config.config.poll_interval_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"SWFT Server - Stop-and-Wait File Transfer 서버

디렉터리의 .txt 파일을 UDP 로 전송
- 청크마다 ACK 확인 (stop-and-wait)
- 인덱스 요청 시 파일 목록 전송

사용법:
  cargo run --release --bin swft-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:{port})
  -p, --port <PORT>       바인드 포트만 변경
  -d, --dir <PATH>        공개 디렉터리 (기본: .)
  --poll-ms <MS>          수신 루프 폴링 주기 (기본: 1000)
  -h, --help              이 도움말 출력

환경 변수:
  RUST_LOG                로그 필터 (예: RUST_LOG=swft=debug)
"#,
                    port = DEFAULT_PORT
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args();

    info!("SWFT Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("Directory: {:?}", server_config.directory);
    info!("Chunk size: {} bytes", swft::CHUNK_SIZE);

    // 바인딩 실패만 치명적
    let server = match Server::bind(
        server_config.bind_addr,
        Directory::new(server_config.directory),
        server_config.config,
    )
    .await
    {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    };

    // Ctrl-C 로 종료
    let shutdown = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.stop();
        }
    });

    server.run().await?;

    info!("Active sessions at shutdown: {}", server.active_sessions());
    info!("{}", server.stats().summary());
    Ok(())
}
