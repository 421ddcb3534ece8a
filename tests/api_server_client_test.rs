use std::io::Read;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use sa_kubeconfig::ambient::kubeconfig::Kubeconfig;
use sa_kubeconfig::token::http::ClientAuth;
use sa_kubeconfig::{
    ApiServerClient, ConnectionFacts, ContractViolationError, Error, IssuanceError,
    KubeconfigResolver, MintConfig, Minter, TokenRequestCaller, TokenRequestSpec,
    TransportConfig,
};
use tiny_http::{Header, Response, Server};
use zeroize::Zeroizing;

#[derive(Debug)]
struct Captured {
    method: String,
    url: String,
    authorization: Option<String>,
    body: serde_json::Value,
}

/// Serves exactly one request with `status` and `body`, after waiting `delay`.
fn serve_once(
    status: u16,
    body: &'static str,
    delay: Duration,
) -> (SocketAddr, thread::JoinHandle<Option<Captured>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr().to_ip().expect("ip listener");

    let handle = thread::spawn(move || {
        let mut request = server.recv().ok()?;

        let mut raw = String::new();
        request.as_reader().read_to_string(&mut raw).ok()?;
        let captured = Captured {
            method: request.method().to_string(),
            url: request.url().to_owned(),
            authorization: request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_owned()),
            body: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
        };

        thread::sleep(delay);
        let response = Response::from_string(body)
            .with_status_code(status)
            .with_header(Header::from_bytes("Content-Type", "application/json").unwrap());
        let _ = request.respond(response);
        Some(captured)
    });

    (addr, handle)
}

fn client(addr: SocketAddr, transport: TransportConfig) -> ApiServerClient {
    let facts = ConnectionFacts::new(format!("http://{addr}"), Vec::new(), "local").unwrap();
    ApiServerClient::builder(&facts)
        .auth(ClientAuth::Bearer(Zeroizing::new("admin-token".to_owned())))
        .transport_config(transport)
        .build()
        .unwrap()
}

fn spec() -> TokenRequestSpec {
    TokenRequestSpec::new("build-bot", "ci", ["vault"], 600)
}

#[tokio::test]
async fn test_create_token_posts_token_request() {
    let (addr, server) = serve_once(
        201,
        r#"{"kind":"TokenRequest","status":{"token":"tok-123","expirationTimestamp":"2026-10-15T13:00:00Z"}}"#,
        Duration::ZERO,
    );

    let status = client(addr, TransportConfig::default())
        .create_token(&spec())
        .await
        .unwrap();

    assert_eq!(status.token, "tok-123");
    assert_eq!(
        status.expiration_timestamp.as_deref(),
        Some("2026-10-15T13:00:00Z")
    );

    let captured = server.join().unwrap().unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(
        captured.url,
        "/api/v1/namespaces/ci/serviceaccounts/build-bot/token"
    );
    assert_eq!(captured.authorization.as_deref(), Some("Bearer admin-token"));
    assert_eq!(
        captured.body,
        serde_json::json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenRequest",
            "metadata": {"name": "build-bot", "namespace": "ci"},
            "spec": {"audiences": ["vault"], "expirationSeconds": 600}
        })
    );
}

#[tokio::test]
async fn test_create_token_reports_rejection() {
    let (addr, server) = serve_once(
        403,
        r#"{"kind":"Status","status":"Failure","message":"serviceaccounts \"build-bot\" is forbidden","reason":"Forbidden","code":403}"#,
        Duration::ZERO,
    );

    let err = client(addr, TransportConfig::default())
        .create_token(&spec())
        .await
        .unwrap_err();

    match err {
        IssuanceError::Rejected {
            status,
            reason,
            message,
        } => {
            assert_eq!(status, 403);
            assert_eq!(reason.as_deref(), Some("Forbidden"));
            assert_eq!(message, "serviceaccounts \"build-bot\" is forbidden");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    server.join().unwrap();
}

#[tokio::test]
async fn test_create_token_rejection_without_status_body() {
    let (addr, server) = serve_once(500, "upstream exploded", Duration::ZERO);

    let err = client(addr, TransportConfig::default())
        .create_token(&spec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IssuanceError::Rejected { status: 500, reason: None, ref message } if message == "upstream exploded"
    ));
    server.join().unwrap();
}

#[tokio::test]
async fn test_create_token_times_out() {
    let (addr, server) = serve_once(201, r#"{"status":{"token":"late"}}"#, Duration::from_secs(2));
    let transport = TransportConfig {
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_millis(200),
    };

    let err = client(addr, transport)
        .create_token(&spec())
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{err:?}");
    server.join().unwrap();
}

#[tokio::test]
async fn test_create_token_malformed_body() {
    let (addr, server) = serve_once(201, "not json", Duration::ZERO);

    let err = client(addr, TransportConfig::default())
        .create_token(&spec())
        .await
        .unwrap_err();

    assert!(matches!(err, IssuanceError::MalformedResponse(_)), "{err:?}");
    server.join().unwrap();
}

#[tokio::test]
async fn test_create_token_connection_refused() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = client(addr, TransportConfig::default())
        .create_token(&spec())
        .await
        .unwrap_err();

    assert!(matches!(err, IssuanceError::Transport(_)), "{err:?}");
    assert!(!err.is_timeout());
}

fn write_kubeconfig(dir: &std::path::Path, addr: SocketAddr) -> std::path::PathBuf {
    let path = dir.join("config");
    std::fs::write(
        &path,
        format!(
            r#"apiVersion: v1
kind: Config
current-context: local
contexts:
- name: local
  context:
    cluster: kind-local
    user: admin
clusters:
- name: kind-local
  cluster:
    server: http://{addr}
users:
- name: admin
  user:
    token: admin-token
"#
        ),
    )
    .unwrap();
    path
}

#[tokio::test]
async fn test_mint_from_kubeconfig() {
    let (addr, server) = serve_once(
        201,
        r#"{"status":{"token":"tok-123","expirationTimestamp":"2026-10-15T13:00:00Z"}}"#,
        Duration::ZERO,
    );
    let dir = tempfile::tempdir().unwrap();
    let path = write_kubeconfig(dir.path(), addr);

    let minter = Minter::new(KubeconfigResolver::new().with_path(&path));
    let profile = minter
        .mint(&MintConfig::new("build-bot", "ci").with_audiences(["vault"]))
        .await
        .unwrap();

    let captured = server.join().unwrap().unwrap();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer admin-token"));

    // The emitted document is itself a kubeconfig that leads back to the same cluster.
    let emitted = Kubeconfig::from_yaml(&profile.to_yaml().unwrap()).unwrap();
    let context_name = emitted.selected_context_name(None).unwrap();
    let context = emitted.context(context_name).unwrap();
    assert_eq!(context_name, "kind-local");
    assert_eq!(
        emitted.cluster(&context.cluster).unwrap().server.as_deref(),
        Some(format!("http://{addr}").as_str())
    );
    assert_eq!(
        emitted.user(&context.user).unwrap().token.as_deref(),
        Some("tok-123")
    );
    assert_eq!(context.user, "build-bot");
}

#[tokio::test]
async fn test_mint_from_kubeconfig_empty_token() {
    let (addr, server) = serve_once(201, r#"{"status":{"token":""}}"#, Duration::ZERO);
    let dir = tempfile::tempdir().unwrap();
    let path = write_kubeconfig(dir.path(), addr);

    let minter = Minter::new(KubeconfigResolver::new().with_path(&path));
    let err = minter
        .mint(&MintConfig::new("build-bot", "ci").with_audiences(["vault"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ContractViolation(ContractViolationError::EmptyToken)
    ));
    server.join().unwrap();
}
