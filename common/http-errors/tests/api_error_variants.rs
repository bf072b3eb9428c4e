use common_http_errors::{classify_status, ApiError, ErrorBody, ErrorKind};
use http::StatusCode;

#[test]
fn success_statuses_are_not_errors() {
    assert_eq!(classify_status(StatusCode::OK), None);
    assert_eq!(classify_status(StatusCode::NO_CONTENT), None);
    assert!(ApiError::from_response(StatusCode::CREATED, b"{}").is_none());
}

#[test]
fn unauthorized_maps_to_auth_required() {
    assert_eq!(
        classify_status(StatusCode::UNAUTHORIZED),
        Some(ErrorKind::AuthRequired)
    );
}

#[test]
fn forbidden_variant() {
    let err = ApiError::from_response(
        StatusCode::FORBIDDEN,
        br#"{"code":"missing_role","message":"admin required"}"#,
    )
    .expect("error");
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(err.code(), Some("missing_role"));
    assert!(err.to_string().contains("admin required"));
}

#[test]
fn not_found_and_gone_variant() {
    assert_eq!(classify_status(StatusCode::NOT_FOUND), Some(ErrorKind::NotFound));
    assert_eq!(classify_status(StatusCode::GONE), Some(ErrorKind::NotFound));
}

#[test]
fn server_errors_are_transient() {
    let kind = classify_status(StatusCode::BAD_GATEWAY).expect("kind");
    assert_eq!(kind, ErrorKind::Server);
    assert!(kind.is_transient());
    assert!(!ErrorKind::Forbidden.is_transient());
}

#[test]
fn other_client_errors_are_malformed() {
    assert_eq!(
        classify_status(StatusCode::UNPROCESSABLE_ENTITY),
        Some(ErrorKind::Malformed)
    );
}

#[test]
fn plain_text_body_becomes_message() {
    let body = ErrorBody::parse(b"upstream timed out\n");
    assert_eq!(body.message.as_deref(), Some("upstream timed out"));
    assert!(body.code.is_none());
    assert!(ErrorBody::parse(b"").message.is_none());
}

#[test]
fn kind_serializes_snake_case() {
    let encoded = serde_json::to_string(&ErrorKind::AuthRequired).expect("encode");
    assert_eq!(encoded, "\"auth_required\"");
}
