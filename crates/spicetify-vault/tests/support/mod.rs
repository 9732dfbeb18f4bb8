//! In-process HTTP fixture serving archives with optional `Range` support.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use zip::write::SimpleFileOptions;

/// Files packed into every fixture archive.
pub const ARCHIVE_FILES: &[(&str, &str)] = &[
    ("index.js", "export default function start() {}\n"),
    ("css/app.css", "body { color: #eceff4; }\n"),
    ("metadata.json", "{\"name\":\"nord\",\"version\":\"1.0.0\"}\n"),
];

/// Builds a zip archive of [`ARCHIVE_FILES`].
pub fn archive_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in ARCHIVE_FILES {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Files packed into the hooks archive.
pub const HOOK_FILES: &[(&str, &str)] = &[
    ("hooks/index.js", "export default function hook() {}\n"),
    ("hooks/vendor/patch.js", "export const patch = true;\n"),
];

/// Builds a gzip-compressed tar of [`HOOK_FILES`].
pub fn hooks_archive_bytes() -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in HOOK_FILES {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Serves a fixed set of paths on a loopback port.
pub struct HttpFixture {
    base: String,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
}

impl HttpFixture {
    /// Starts serving `routes`; `honour_ranges` controls whether `Range`
    /// headers produce partial responses.
    pub fn start(routes: HashMap<String, Vec<u8>>, honour_ranges: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&ranges);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &routes, honour_ranges, &seen);
            }
        });
        Self { base, ranges }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// `Range` headers received so far, in order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().expect("ranges lock").clone()
    }
}

fn serve(
    stream: TcpStream,
    routes: &HashMap<String, Vec<u8>>,
    honour_ranges: bool,
    seen: &Mutex<Vec<Option<String>>>,
) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_owned();

    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_owned());
            }
        }
    }
    seen.lock().expect("ranges lock").push(range.clone());

    let mut stream = stream;
    let Some(body) = routes.get(&path) else {
        respond(&mut stream, "404 Not Found", &[], b"missing");
        return;
    };
    match range.filter(|_| honour_ranges).and_then(|r| parse_range(&r, body.len())) {
        Some((start, end)) => {
            let content_range = format!("bytes {start}-{end}/{}", body.len());
            respond(
                &mut stream,
                "206 Partial Content",
                &[("Content-Range", &content_range)],
                &body[start..=end],
            );
        }
        None => respond(&mut stream, "200 OK", &[], body),
    }
}

fn parse_range(header: &str, len: usize) -> Option<(usize, usize)> {
    let spec = header.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse::<usize>().ok()?.min(len.checked_sub(1)?);
    (start <= end).then_some((start, end))
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, &str)], body: &[u8]) {
    let mut head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
