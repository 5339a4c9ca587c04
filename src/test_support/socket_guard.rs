use wiremock::MockServer;

/// Starts a mock server, or returns `None` when localhost cannot be bound.
///
/// Unit tests only skip; `tests/support/socket_guard.rs` owns the fail-fast
/// switch for CI.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if std::net::TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("[socket-bound-test] cannot bind localhost socket; skipping");
        return None;
    }
    Some(MockServer::start().await)
}
