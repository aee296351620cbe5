use super::*;
use axum::http::HeaderValue;
use chrono::TimeZone;

const SECRET: &str = "test-secret-0123456789";

fn key() -> SessionKey {
    SessionKey::new(SECRET).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_short_secret_rejected() {
    assert!(SessionKey::new("short").is_err());
}

#[test]
fn test_issue_then_verify() {
    let token = key()
        .issue(7, "alice", Role::Hr, Duration::hours(1), now())
        .unwrap();
    let claims = key().verify(&token, now()).unwrap();
    assert_eq!(claims.uid, 7);
    assert_eq!(claims.username, "alice");
    assert!(claims.is_hr());
}

#[test]
fn test_expired_token_rejected() {
    let token = key()
        .issue(1, "alice", Role::Hr, Duration::minutes(5), now())
        .unwrap();
    let later = now() + Duration::minutes(5);
    let err = key().verify(&token, later).unwrap_err();
    assert!(err.is_auth());
    assert!(err.to_string().contains("expired"));
}

#[test]
fn test_issue_rejects_ttl_past_calendar_range() {
    let err = key()
        .issue(1, "alice", Role::Hr, Duration::MAX, now())
        .unwrap_err();
    assert!(!err.is_auth());
    assert!(err.to_string().contains("ttl"));
}

#[test]
fn test_wrong_key_rejected() {
    let token = key()
        .issue(1, "alice", Role::Hr, Duration::hours(1), now())
        .unwrap();
    let other = SessionKey::new("another-secret-abcdefgh").unwrap();
    assert!(other.verify(&token, now()).is_err());
}

#[test]
fn test_tampered_payload_rejected() {
    let k = key();
    let token = k
        .issue(1, "bob", Role::Employee, Duration::hours(1), now())
        .unwrap();
    let (_, sig) = token.rsplit_once('.').unwrap();
    let forged_claims = SessionClaims {
        uid: 1,
        username: "bob".into(),
        role: Role::Hr,
        exp: (now() + Duration::hours(1)).timestamp(),
    };
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
    let forged = format!("{}.{}", forged_payload, sig);
    assert!(k.verify(&forged, now()).is_err());
}

#[test]
fn test_malformed_tokens_rejected() {
    let k = key();
    let long = "x".repeat(MAX_TOKEN_LEN + 1);
    for bad in ["", "no-dot", ".", "abc.def", long.as_str()] {
        assert!(k.verify(bad, now()).is_err(), "accepted {bad:?}");
    }
}

#[test]
fn test_role_parse() {
    assert_eq!("hr".parse::<Role>().unwrap(), Role::Hr);
    assert_eq!("HR".parse::<Role>().unwrap(), Role::Hr);
    assert_eq!("employee".parse::<Role>().unwrap(), Role::Employee);
    assert!("admin".parse::<Role>().is_err());
}

#[test]
fn test_key_debug_redacted() {
    let debug = format!("{:?}", key());
    assert!(!debug.contains(SECRET));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_cookie_value_found_among_others() {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_static("theme=dark; hrmail_session=abc.def; lang=en"),
    );
    assert_eq!(cookie_value(&headers, "hrmail_session"), Some("abc.def"));
    assert_eq!(cookie_value(&headers, "lang"), Some("en"));
    assert_eq!(cookie_value(&headers, "missing"), None);
}

#[test]
fn test_cookie_value_multiple_headers() {
    let mut headers = HeaderMap::new();
    headers.append(COOKIE, HeaderValue::from_static("a=1"));
    headers.append(COOKIE, HeaderValue::from_static("hrmail_session=tok"));
    assert_eq!(cookie_value(&headers, "hrmail_session"), Some("tok"));
}

#[test]
fn test_cookie_value_no_prefix_match() {
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("xhrmail_session=tok"));
    assert_eq!(cookie_value(&headers, "hrmail_session"), None);
}

#[test]
fn test_cookie_headers() {
    let set = session_cookie("hrmail_session", "tok", 60);
    assert!(set.starts_with("hrmail_session=tok;"));
    assert!(set.contains("HttpOnly"));
    assert!(set.contains("Max-Age=60"));
    let clear = clear_session_cookie("hrmail_session");
    assert!(clear.starts_with("hrmail_session=;"));
    assert!(clear.contains("Max-Age=0"));
}
