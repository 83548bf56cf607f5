use std::{
    collections::HashMap,
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use oxycheck::{
    CheckConfig, CheckError, Health, HttpCheck, TransportBuilder, TransportPolicy, check,
    config::HeaderValues,
};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

async fn serve(status: u16, body: &str, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> CheckConfig {
    CheckConfig::new("Example", format!("{}/health", server.uri()))
}

#[tokio::test]
async fn healthy_endpoint() {
    let server = serve(200, "OK", ms(50)).await;
    let mut config = config_for(&server);
    config.attempts = Some(3);
    config.threshold_rtt = Some(ms(200));

    let verdict = check(config).await.unwrap();

    assert_eq!(verdict.health(), Health::Healthy);
    assert_eq!(verdict.attempts().len(), 3);
    assert!(verdict.attempts().iter().all(|a| a.error().is_none()));
    assert!(verdict.stats().median >= ms(50));
    assert!(verdict.stats().median < ms(200));
    assert_eq!(verdict.notice(), None);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn slow_endpoint_is_degraded() {
    let server = serve(200, "OK", ms(500)).await;
    let mut config = config_for(&server);
    config.attempts = Some(2);
    config.threshold_rtt = Some(ms(200));

    let verdict = check(config).await.unwrap();

    assert_eq!(verdict.health(), Health::Degraded);
    assert!(verdict.stats().median >= ms(500));
    let notice = verdict.notice().unwrap();
    assert!(notice.contains("200ms"), "{notice}");
    assert!(notice.contains("number of attempts = 2"), "{notice}");
}

#[tokio::test]
async fn unreachable_endpoint_is_down() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = CheckConfig::new("Gone", format!("http://127.0.0.1:{port}/"));
    config.attempts = Some(3);

    let verdict = check(config).await.unwrap();

    assert!(verdict.is_down());
    assert_eq!(verdict.attempts().len(), 3);
    for attempt in verdict.attempts() {
        let error = attempt.error().unwrap();
        assert!(error.contains(&format!("connecting to 127.0.0.1:{port}")), "{error}");
    }
}

#[tokio::test]
async fn unexpected_status_is_down() {
    let server = serve(503, "", Duration::ZERO).await;
    let verdict = check(config_for(&server)).await.unwrap();

    assert!(verdict.is_down());
    assert_eq!(
        verdict.attempts()[0].error(),
        Some("response status 503 Service Unavailable")
    );
}

#[tokio::test]
async fn content_rules() {
    let server = serve(200, "Hello World", Duration::ZERO).await;

    let mut config = config_for(&server);
    config.must_contain = Some("World".to_string());
    config.must_not_contain = Some("ERROR".to_string());
    assert!(check(config).await.unwrap().is_healthy());

    let mut config = config_for(&server);
    config.must_contain = Some("Goodbye".to_string());
    let verdict = check(config).await.unwrap();
    assert!(verdict.is_down());
    assert!(verdict.attempts()[0].error().unwrap().contains("Goodbye"));

    let mut config = config_for(&server);
    config.must_not_contain = Some("Hello".to_string());
    assert!(check(config).await.unwrap().is_down());
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/moved"))
        .mount(&server)
        .await;

    let verdict = check(config_for(&server)).await.unwrap();
    assert!(verdict.is_down());
    assert_eq!(verdict.attempts()[0].error(), Some("response status 302 Found"));

    let mut config = config_for(&server);
    config.up_status = Some(302);
    assert!(check(config).await.unwrap().is_healthy());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn host_header_overrides_request_host() {
    let server = serve(200, "OK", Duration::ZERO).await;
    let mut config = config_for(&server);
    config.headers = HashMap::from([
        ("host".to_string(), HeaderValues::from("status.example.test")),
        (
            "X-Probe".to_string(),
            HeaderValues::Many(vec!["a".to_string(), "b".to_string()]),
        ),
    ]);

    assert!(check(config).await.unwrap().is_healthy());

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    assert_eq!(headers.get_all("host").iter().count(), 1);
    assert_eq!(headers.get("host").unwrap(), "status.example.test");
    assert_eq!(headers.get("x-probe").unwrap(), "a, b");
    assert_eq!(headers.get("connection").unwrap(), "close");
}

#[tokio::test]
async fn caller_supplied_client_is_used() {
    let server = serve(200, "Hello World", Duration::ZERO).await;
    let mut config = config_for(&server);
    config.attempts = Some(2);
    config.must_contain = Some("World".to_string());
    config.headers = HashMap::from([("Host".to_string(), HeaderValues::from("a.example.test"))]);

    let client = TransportPolicy::default().reqwest_client().unwrap();
    let verdict = HttpCheck::new(config).unwrap().run_with(&client).await;

    assert!(verdict.is_healthy());
    assert_eq!(verdict.attempts().len(), 2);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("host").unwrap(), "a.example.test");
}

/// Plain HTTP server that keeps connections open between requests and
/// counts how many it accepted.
async fn spawn_keep_alive_server() -> (u16, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    head.clear();
                    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
                    if stream.write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (port, accepted)
}

#[tokio::test]
async fn policy_client_opens_a_connection_per_attempt() {
    let (port, accepted) = spawn_keep_alive_server().await;
    let mut config = CheckConfig::new("Keep-alive", format!("http://127.0.0.1:{port}/"));
    config.attempts = Some(3);

    let client = TransportPolicy::default().reqwest_client().unwrap();
    let verdict = HttpCheck::new(config).unwrap().run_with(&client).await;

    assert!(verdict.is_healthy(), "{:?}", verdict.attempts());
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn default_transport_opens_a_connection_per_attempt() {
    let (port, accepted) = spawn_keep_alive_server().await;
    let mut config = CheckConfig::new("Keep-alive", format!("http://127.0.0.1:{port}/"));
    config.attempts = Some(3);

    assert!(check(config).await.unwrap().is_healthy());
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn attempts_are_spaced() {
    let server = serve(200, "OK", Duration::ZERO).await;
    let mut config = config_for(&server);
    config.attempts = Some(3);
    config.attempt_spacing = Some(ms(100));

    let start = std::time::Instant::now();
    let verdict = check(config).await.unwrap();
    assert!(verdict.is_healthy());
    assert!(start.elapsed() >= ms(200));
}

#[tokio::test]
async fn malformed_url_with_ca_aborts() {
    let mut config = CheckConfig::new("Broken", "status.example.test/health");
    config.tls_ca_file = Some("/nonexistent/ca.pem".into());

    let err = check(config).await.unwrap_err();
    assert!(matches!(err, CheckError::InvalidUrl { .. }));
}

// HTTPS

struct Pem {
    cert: String,
    key: String,
}

fn named(cn: &str, sans: Vec<String>) -> CertificateParams {
    let mut params = CertificateParams::new(sans).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params
}

fn self_signed_localhost() -> Pem {
    let key = KeyPair::generate().unwrap();
    let cert = named("localhost", vec!["localhost".to_string()])
        .self_signed(&key)
        .unwrap();
    Pem {
        cert: cert.pem(),
        key: key.serialize_pem(),
    }
}

/// A CA certificate and a localhost certificate signed by it.
fn ca_and_localhost() -> (String, Pem) {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = named("oxycheck test CA", vec![]);
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = named("localhost", vec!["localhost".to_string()])
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .unwrap();

    (
        ca_cert.pem(),
        Pem {
            cert: leaf.pem(),
            key: leaf_key.serialize_pem(),
        },
    )
}

/// Serve `200 OK` with body "OK" over TLS on a random local port.
async fn spawn_tls_server(pem: &Pem) -> u16 {
    let identity = native_tls::Identity::from_pkcs8(pem.cert.as_bytes(), pem.key.as_bytes()).unwrap();
    let acceptor = tokio_native_tls::TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                let _ = tls
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK")
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });

    port
}

#[tokio::test]
async fn skip_verify_accepts_self_signed() {
    let port = spawn_tls_server(&self_signed_localhost()).await;
    let mut config = CheckConfig::new("Self-signed", format!("https://localhost:{port}/"));
    config.tls_skip_verify = true;
    config.must_contain = Some("OK".to_string());

    let verdict = check(config).await.unwrap();
    assert!(verdict.is_healthy(), "{:?}", verdict.attempts());
}

#[tokio::test]
async fn untrusted_certificate_is_down() {
    let port = spawn_tls_server(&self_signed_localhost()).await;
    let config = CheckConfig::new("Self-signed", format!("https://localhost:{port}/"));

    let verdict = check(config).await.unwrap();
    assert!(verdict.is_down());
    let error = verdict.attempts()[0].error().unwrap();
    assert!(error.starts_with("TLS handshake with localhost"), "{error}");
}

#[tokio::test]
async fn custom_ca_is_trusted() {
    let (ca, leaf) = ca_and_localhost();
    let port = spawn_tls_server(&leaf).await;

    let mut ca_file = tempfile::NamedTempFile::new().unwrap();
    ca_file.write_all(ca.as_bytes()).unwrap();

    let mut config = CheckConfig::new("Private CA", format!("https://localhost:{port}/"));
    config.tls_ca_file = Some(ca_file.path().to_path_buf());
    config.attempts = Some(2);

    let verdict = check(config).await.unwrap();
    assert!(verdict.is_healthy(), "{:?}", verdict.attempts());
    assert_eq!(verdict.attempts().len(), 2);
}

#[tokio::test]
async fn built_transport_can_be_reused() {
    let port = spawn_tls_server(&self_signed_localhost()).await;
    let url = format!("https://localhost:{port}/");
    let transport = TransportBuilder::new().skip_verify(true).build(&url).unwrap();

    let check = HttpCheck::new(CheckConfig::new("Reused", url)).unwrap();
    assert!(check.run_with(&transport).await.is_healthy());
    assert!(check.run_with(&transport).await.is_healthy());
}
