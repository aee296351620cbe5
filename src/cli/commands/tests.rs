use super::*;
use chrono::TimeZone;
use clap::CommandFactory;
use hrmail_mailbox::Direction;

const SECRET: &str = "cli-test-secret-0123456";

fn config_with_secret(secret: &str) -> Config {
    let mut config = Config::default();
    config.session.secret = secret.into();
    config
}

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_parse_session_issue() {
    let cli = Cli::try_parse_from([
        "hrmail", "session", "issue", "--username", "pat", "--role", "HR", "--ttl", "90m",
    ])
    .unwrap();
    match cli.command {
        Commands::Session {
            cmd:
                SessionCommands::Issue {
                    username,
                    role,
                    user_id,
                    ttl,
                },
        } => {
            assert_eq!(username, "pat");
            assert_eq!(role, Role::Hr);
            assert_eq!(user_id, 0);
            assert_eq!(ttl, Some(std::time::Duration::from_secs(90 * 60)));
        }
        _ => panic!("expected session issue"),
    }
}

#[test]
fn test_parse_rejects_unknown_role() {
    let res = Cli::try_parse_from([
        "hrmail", "session", "issue", "--username", "pat", "--role", "admin",
    ]);
    assert!(res.is_err());
}

#[test]
fn test_parse_global_config_flag() {
    let cli = Cli::try_parse_from(["hrmail", "stats", "--config", "/tmp/hr.json"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/hr.json")));
    assert!(matches!(cli.command, Commands::Stats));
}

#[test]
fn test_issue_session_verifies() {
    let config = config_with_secret(SECRET);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let (token, cookie) = issue_session(&config, 42, "pat", Role::Hr, Some(120), now).unwrap();
    assert_eq!(cookie, format!("hrmail_session={}", token));

    let claims = SessionKey::new(SECRET).unwrap().verify(&token, now).unwrap();
    assert_eq!(claims.uid, 42);
    assert_eq!(claims.username, "pat");
    assert_eq!(claims.exp, now.timestamp() + 120);
}

#[test]
fn test_issue_session_uses_configured_ttl() {
    let mut config = config_with_secret(SECRET);
    config.session.ttl_secs = 300;
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let (token, _) = issue_session(&config, 1, "pat", Role::Employee, None, now).unwrap();
    let claims = SessionKey::new(SECRET).unwrap().verify(&token, now).unwrap();
    assert_eq!(claims.exp, now.timestamp() + 300);
    assert!(!claims.is_hr());
}

#[test]
fn test_issue_session_rejects_oversized_ttl() {
    let config = config_with_secret(SECRET);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    for secs in [MAX_TTL_SECS + 1, 10_000_000_000_000, u64::MAX] {
        let err = issue_session(&config, 1, "pat", Role::Hr, Some(secs), now).unwrap_err();
        assert!(err.to_string().contains("ttl"), "{secs}: {err}");
    }
    assert!(issue_session(&config, 1, "pat", Role::Hr, Some(0), now).is_err());
    assert!(issue_session(&config, 1, "pat", Role::Hr, Some(MAX_TTL_SECS), now).is_ok());
}

#[test]
fn test_issue_session_requires_secret() {
    let config = Config::default();
    let err = issue_session(&config, 1, "pat", Role::Hr, None, Utc::now()).unwrap_err();
    assert!(err.to_string().contains("session.secret"));
}

#[tokio::test]
async fn test_failed_signal_listener_never_resolves() {
    let failed = until_signal("test", async { Err(std::io::Error::other("unsupported")) });
    let res = tokio::time::timeout(std::time::Duration::from_millis(50), failed).await;
    assert!(res.is_err());

    let delivered = until_signal("test", async { Ok(()) });
    tokio::time::timeout(std::time::Duration::from_millis(50), delivered)
        .await
        .unwrap();
}

#[test]
fn test_generated_secret_passes_validation() {
    let a = generate_secret();
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, generate_secret());

    let config = config_with_secret(&a);
    assert!(config.validate().is_ok());
    assert!(SessionKey::new(&a).is_ok());
}

#[test]
fn test_read_import_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mail.json");
    std::fs::write(
        &path,
        r#"[
            {"direction": "sent", "timestamp": "2024-06-01T09:00:00Z",
             "sender_email": "hr@acme.test", "recipient_email": "sam@acme.test",
             "subject": "Offer", "email_type": "offer_letter", "thread_id": "t1"},
            {"direction": "received", "timestamp": "2024-06-01T10:00:00Z",
             "thread_id": "t1"}
        ]"#,
    )
    .unwrap();

    let messages = read_import_file(&path).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].direction, Direction::Sent);
    assert_eq!(messages[0].email_type.as_deref(), Some("offer_letter"));
    assert_eq!(messages[1].direction, Direction::Received);
    assert!(messages[1].subject.is_empty());

    let db = MailboxDB::new(dir.path().join("mailbox.db")).unwrap();
    assert_eq!(db.insert_messages(&messages).unwrap(), 2);
    assert_eq!(db.get_email_stats().unwrap().total_threads, 1);
}

#[test]
fn test_read_import_file_rejects_bad_direction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mail.json");
    std::fs::write(
        &path,
        r#"[{"direction": "inbound", "timestamp": "2024-06-01T09:00:00Z"}]"#,
    )
    .unwrap();
    let err = read_import_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("mail.json"));
}

#[test]
fn test_onboard_existing_config_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let db_path = dir.path().join("data").join("mailbox.db");

    let mut config = config_with_secret(SECRET);
    config.mailbox.database_path = db_path.to_string_lossy().to_string();
    save_config(&config, Some(config_path.as_path())).unwrap();

    onboard(Some(config_path.as_path())).unwrap();
    assert!(db_path.exists());
}
