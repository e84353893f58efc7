//! Full-stack flow: config on disk, live TCP server, wire-format requests.

use ferrous_policyd::bootstrap::config::load_engine;
use ferrous_policyd::server::PolicyServer;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

async fn start_server(config_dir: &Path) -> SocketAddr {
    let engine = load_engine(&config_dir.join("policyd.conf")).unwrap();
    let server = PolicyServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(Arc::new(engine)));
    addr
}

fn write_fixtures(dir: &Path) {
    std::fs::write(dir.join("blocked.txt"), "192.0.2.7\n198.51.100.66\n").unwrap();
    std::fs::write(
        dir.join("policyd.conf"),
        format!(
            r#"
            blocklist {{
                type = "iplist";
                file = "nolock:1:{list}";
                on_hard_match = "postfix:REJECT your host is blocked";
                on_fail = "postfix:OK";
                on_error = "postfix:450 try again later";
            }}
            entry_point = "blocklist";
            "#,
            list = dir.join("blocked.txt").display()
        ),
    )
    .unwrap();
}

async fn ask(stream: &mut BufReader<TcpStream>, client_address: &str) -> String {
    stream
        .get_mut()
        .write_all(
            format!("request=smtpd_access_policy\nclient_address={client_address}\n\n").as_bytes(),
        )
        .await
        .unwrap();

    let mut action = String::new();
    stream.read_line(&mut action).await.unwrap();
    let mut blank = String::new();
    stream.read_line(&mut blank).await.unwrap();
    assert_eq!(blank, "\n");
    action.trim_end().to_string()
}

#[tokio::test]
async fn listed_and_unlisted_clients_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let addr = start_server(dir.path()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    // Several requests over one connection.
    assert_eq!(
        ask(&mut stream, "192.0.2.7").await,
        "action=REJECT your host is blocked"
    );
    assert_eq!(ask(&mut stream, "192.0.2.8").await, "action=OK");
    assert_eq!(
        ask(&mut stream, "198.51.100.66").await,
        "action=REJECT your host is blocked"
    );
}

#[tokio::test]
async fn broken_requests_close_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let addr = start_server(dir.path()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"no separator here\n\n").await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    let n = reader.read_line(&mut reply).await.unwrap();
    assert_eq!(n, 0, "expected EOF, got {reply:?}");
}

#[tokio::test]
async fn unloadable_configs_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("policyd.conf"),
        r#"broken { type = "no_such_kind"; } entry_point = "broken";"#,
    )
    .unwrap();
    assert!(load_engine(&dir.path().join("policyd.conf")).is_err());
}
