//! End-to-end: config on disk, mailbox import, token minting and the HTTP
//! server on a real socket.

use chrono::{Duration, TimeZone, Utc};
use hrmail::config::{Config, load_config, save_config};
use hrmail::gateway::{self, GatewayState};
use hrmail::session::{Role, SessionKey};
use hrmail_mailbox::{DeliveryStatus, Direction, MailboxDB, NewMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

const SECRET: &str = "integration-secret-abcdef";

fn message(direction: Direction, minutes: i64, thread: &str, email_type: &str) -> NewMessage {
    NewMessage {
        direction,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
            + Duration::minutes(minutes),
        sender_email: "hr@acme.test".into(),
        recipient_email: format!("{thread}@acme.test"),
        subject: format!("{email_type} for {thread}"),
        body: "<p>Hello</p>".into(),
        status: Some(DeliveryStatus::Sent),
        email_type: Some(email_type.into()),
        thread_id: Some(thread.into()),
        in_reply_to: None,
    }
}

/// Write a config into `dir`, reload it from disk and open its mailbox.
fn setup(dir: &TempDir) -> (Config, Arc<MailboxDB>) {
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.session.secret = SECRET.into();
    config.mailbox.database_path = dir.path().join("mailbox.db").to_string_lossy().to_string();
    save_config(&config, Some(path.as_path())).unwrap();

    let config = load_config(Some(path.as_path())).unwrap();
    let db = MailboxDB::new(config.database_path()).unwrap();
    db.insert_messages(&[
        message(Direction::Sent, 0, "dana", "offer_letter"),
        message(Direction::Received, 30, "dana", "offer_letter"),
        message(Direction::Sent, 60, "lee", "leave_approval"),
        message(Direction::Sent, 90, "kim", "offer_letter"),
    ])
    .unwrap();
    (config, Arc::new(db))
}

async fn http_get(addr: SocketAddr, path: &str, cookie: Option<&str>) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let cookie_line = cookie
        .map(|c| format!("Cookie: {c}\r\n"))
        .unwrap_or_default();
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\n{cookie_line}Connection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, head.to_string(), body.to_string())
}

#[tokio::test]
async fn test_dashboard_over_http() {
    let dir = TempDir::new().unwrap();
    let (config, mailbox) = setup(&dir);
    let key = SessionKey::new(&config.session.secret).unwrap();
    let hr_token = key
        .issue(1, "pat", Role::Hr, Duration::hours(1), Utc::now())
        .unwrap();
    let staff_token = key
        .issue(2, "sam", Role::Employee, Duration::hours(1), Utc::now())
        .unwrap();

    let state = GatewayState::new(
        mailbox,
        key,
        &config.session.cookie_name,
        config.mailbox.list_limit,
    );
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (handle, addr) = gateway::start("127.0.0.1", 0, state, async move {
        let _ = stop_rx.await;
    })
    .await
    .unwrap();

    let hr = format!("{}={}", config.session.cookie_name, hr_token);
    let staff = format!("{}={}", config.session.cookie_name, staff_token);

    let (status, _, body) = http_get(addr, "/api/health", None).await;
    assert_eq!(status, 200);
    assert!(body.contains("\"ok\""));

    let (status, head, _) = http_get(addr, "/email/stats", Some(&staff)).await;
    assert_eq!(status, 303);
    assert!(head.to_ascii_lowercase().contains("location: /auth/login"));

    let (status, _, body) = http_get(addr, "/email/stats", Some(&hr)).await;
    assert_eq!(status, 200);
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["total_emails"], 4);
    assert_eq!(stats["sent_emails"], 3);
    assert_eq!(stats["total_threads"], 3);
    assert_eq!(stats["top_email_types"][0]["type"], "offer_letter");
    assert_eq!(stats["top_email_types"][0]["count"], 3);

    let (status, _, body) = http_get(addr, "/email/inbox", Some(&hr)).await;
    assert_eq!(status, 200);
    let inbox: serde_json::Value = serde_json::from_str(&body).unwrap();
    let ids: Vec<&str> = inbox["threads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["thread_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["kim", "lee", "dana"]);

    let (status, _, body) = http_get(addr, "/email/thread/dana", Some(&hr)).await;
    assert_eq!(status, 200);
    let thread: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(thread["messages"].as_array().unwrap().len(), 2);
    assert_eq!(thread["subject"], "offer_letter for dana");

    stop_tx.send(()).unwrap();
    handle.await.unwrap();
}
