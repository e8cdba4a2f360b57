//! SWFT 클라이언트 - Stop-and-Wait File Transfer
//!
//! 대화형 명령으로 서버의 텍스트 파일을 수신
//! - `index`: 서버의 파일 목록 출력
//! - `get <filename>`: 파일을 `<ID>_test.txt` 로 저장
//! - `exit`: 종료
//!
//! 사용법:
//!   cargo run --release --bin swft-client -- [OPTIONS]
//!
//! 예시:
//!   # 로컬 서버, 클라이언트 ID 1
//!   cargo run --release --bin swft-client
//!
//!   # 원격 서버, 클라이언트 ID 7
//!   cargo run --release --bin swft-client -- -s 192.168.1.100:12345 -n 7

use std::io::Write;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swft::{Client, Config, Error, DEFAULT_PORT};

/// 클라이언트 설정
struct ClientConfig {
    /// `host:port` (호스트 이름은 시작할 때 해석)
    server_addr: String,
    client_id: String,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            client_id: "1".to_string(),
            config: Config::default(),
        }
    }
}

impl ClientConfig {
    fn output_path(&self) -> String {
        format!("{}_test.txt", self.client_id)
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--id" | "-n" => {
                if i + 1 < args.len() {
                    config.client_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    config.config.recv_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    config.config.max_retries = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--unstable" => {
                config.config = Config::unstable_network();
            }
            "--help" | "-h" => {
                println!(
                    r#"SWFT Client - Stop-and-Wait File Transfer 클라이언트

서버의 .txt 파일을 UDP 로 수신
- 청크마다 ACK 전송, 타임아웃 시 마지막 ACK 재전송

사용법:
  cargo run --release --bin swft-client -- [OPTIONS]

옵션:
  -s, --server <HOST:PORT> 서버 주소, 호스트 이름 허용 (기본: 127.0.0.1:{port})
  -n, --id <ID>           클라이언트 ID, 저장 파일 이름에 사용 (기본: 1)
  --timeout-ms <MS>       수신 타임아웃 (기본: 5000)
  --retries <N>           최대 재시도 횟수 (기본: 5)
  --unstable              불안정 네트워크 프리셋 (10초, 10회)
  -h, --help              이 도움말 출력

명령:
  index                   서버의 파일 목록 출력
  get <filename>          파일을 <ID>_test.txt 로 저장
  exit                    종료
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

/// 대화형 명령
#[derive(Debug, PartialEq)]
enum Command {
    Index,
    Get(String),
    Exit,
    Invalid,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "index" if rest.is_empty() => Command::Index,
            "get" if !rest.is_empty() => Command::Get(rest.to_string()),
            "exit" if rest.is_empty() => Command::Exit,
            _ => Command::Invalid,
        }
    }
}

/// `host:port` 해석, 첫 번째 주소 사용
async fn resolve_server(addr: &str) -> std::io::Result<SocketAddr> {
    tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("주소를 해석할 수 없음: {}", addr),
        )
    })
}

fn prompt() {
    print!("Enter command (index, get <filename>, exit): ");
    let _ = std::io::stdout().flush();
}

async fn run_command(client: &Client, client_config: &ClientConfig, command: Command) {
    match command {
        Command::Index => match client.fetch_index().await {
            Ok(transfer) => {
                println!("Files on server:");
                for name in transfer.file_names() {
                    println!("  {}", name);
                }
            }
            Err(Error::EmptyIndex) => println!("Server has no text files"),
            Err(e) => println!("Index request failed: {}", e),
        },
        Command::Get(filename) => {
            let output = client_config.output_path();
            match client.download(&filename, &output).await {
                Ok(transfer) => {
                    println!("Saved {} to {}", filename, output);
                    info!("{}", transfer.stats.summary());
                }
                Err(Error::NotFound { .. }) => println!("File not found: {}", filename),
                Err(e) => println!("Download failed: {}", e),
            }
        }
        Command::Exit | Command::Invalid => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args();

    info!("SWFT Client starting...");
    info!("Server address: {}", client_config.server_addr);
    info!("Client ID: {}", client_config.client_id);

    let server_addr = resolve_server(&client_config.server_addr).await?;
    info!("Resolved server: {}", server_addr);

    let client = Client::connect(server_addr, client_config.config.clone()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Exit => break,
            Command::Invalid => println!("Invalid command"),
            command => run_command(&client, &client_config, command).await,
        }
    }

    info!("SWFT Client exiting");
    Ok(())
}
