//! Sends requests through a live proxy to an in-process upstream.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use spicetify_config::Config;
use spicetifyd::proxy::UreqTransport;
use spicetifyd::{DaemonState, HttpListener, ServerError, SettingsCell};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(10);

/// Answers one connection per scripted response, in order, and reports the
/// lowercased header lines of each request it read.
struct Upstream {
    base: String,
    requests: mpsc::Receiver<Vec<String>>,
}

impl Upstream {
    fn start(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream");
        let base = format!("http://{}", listener.local_addr().expect("upstream addr"));
        let (sender, requests) = mpsc::channel();
        thread::spawn(move || {
            for response in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    headers.push(line.trim_end().to_ascii_lowercase());
                }
                let mut stream = stream;
                stream
                    .write_all(response.as_bytes())
                    .expect("write upstream response");
                if sender.send(headers).is_err() {
                    return;
                }
            }
        });
        Self { base, requests }
    }

    fn next_request(&self) -> Vec<String> {
        self.requests.recv_timeout(WAIT).expect("upstream saw a request")
    }
}

fn response(status: &str, headers: &[&str]) -> String {
    let mut head = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n");
    for header in headers {
        head.push_str(header);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head
}

fn client() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .max_redirects(0)
        .max_redirects_will_error(false)
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

/// Serves the proxy on an ephemeral port; returns its address.
async fn serve_proxy() -> (String, JoinHandle<Result<(), ServerError>>) {
    let listener = HttpListener::bind("127.0.0.1:0").await.expect("bind proxy");
    let daemon_addr = listener.local_addr().to_string();
    let settings = Arc::new(SettingsCell::new(&Config {
        daemon_addr: daemon_addr.clone(),
        ..Config::default()
    }));
    let server = listener.serve(DaemonState::new(settings, Arc::new(UreqTransport::new())));
    (daemon_addr, server)
}

fn proxy_url(daemon_addr: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("http://{daemon_addr}/proxy/{encoded}")
}

fn header_value(headers: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}:");
    headers
        .iter()
        .find_map(|line| line.strip_prefix(&prefix).map(|value| value.trim().to_owned()))
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_rewrites_headers_in_both_directions() {
    let upstream = Upstream::start(vec![response(
        "302 Found",
        &["Location: /next?step=2", "Content-Type: text/plain"],
    )]);
    let (daemon_addr, server) = serve_proxy().await;

    let url = proxy_url(&daemon_addr, &format!("{}/start", upstream.base));
    let (status, location, origin) = tokio::task::spawn_blocking(move || {
        let response = client()
            .get(&url)
            .header("X-Drop", "1")
            .header(
                "X-Set-Headers",
                r#"{"X-Foo":"bar","X-Drop":"undefined"}"#,
            )
            .call()
            .expect("proxy reachable");
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        (
            response.status().as_u16(),
            header("location"),
            header("access-control-allow-origin"),
        )
    })
    .await
    .expect("client task");
    let seen = upstream.next_request();
    server.abort();

    assert_eq!(status, 302);
    let expected_location = format!(
        "http://{daemon_addr}/proxy/{}",
        format!("{}/next?step=2", upstream.base)
            .replace(':', "%3A")
            .replace('/', "%2F")
            .replace('?', "%3F")
            .replace('=', "%3D")
    );
    assert_eq!(location.as_deref(), Some(expected_location.as_str()));
    assert_eq!(origin.as_deref(), Some(spicetify_config::DEFAULT_ALLOWED_ORIGIN));
    assert_eq!(header_value(&seen, "x-foo").as_deref(), Some("bar"));
    assert_eq!(header_value(&seen, "x-drop"), None);
    assert_eq!(header_value(&seen, "x-set-headers"), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_cookies_are_replayed_on_the_next_request() {
    let upstream = Upstream::start(vec![
        response("200 OK", &["Set-Cookie: sid=abc123; Path=/"]),
        response("200 OK", &[]),
    ]);
    let (daemon_addr, server) = serve_proxy().await;

    let login = proxy_url(&daemon_addr, &format!("{}/login", upstream.base));
    let profile = proxy_url(&daemon_addr, &format!("{}/profile", upstream.base));
    let statuses = tokio::task::spawn_blocking(move || {
        // Separate clients, so any cookie upstream sees comes from the proxy.
        let first = client().get(&login).call().expect("first request");
        let second = client().get(&profile).call().expect("second request");
        (first.status().as_u16(), second.status().as_u16())
    })
    .await
    .expect("client task");
    let first = upstream.next_request();
    let second = upstream.next_request();
    server.abort();

    assert_eq!(statuses, (200, 200));
    assert_eq!(header_value(&first, "cookie"), None);
    assert_eq!(header_value(&second, "cookie").as_deref(), Some("sid=abc123"));
}
