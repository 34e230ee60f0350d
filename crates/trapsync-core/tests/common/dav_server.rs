//! Minimal HTTP/1.1 document server for integration tests.
//!
//! Supports HEAD (auth probe), PUT (store body) and GET (return body or 404),
//! all behind one basic-auth credential. One request per connection.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// `fieldtech:secret`, base64.
pub const AUTH: &str = "Basic ZmllbGR0ZWNoOnNlY3JldA==";

pub type Store = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Starts a server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/dav/") and the shared store keyed by request path.
pub fn start() -> (String, Store) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let store: Store = Arc::default();
    let served = Arc::clone(&store);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let store = Arc::clone(&served);
            thread::spawn(move || handle(stream, &store));
        }
    });
    (format!("http://127.0.0.1:{}/dav/", port), store)
}

struct Request {
    method: String,
    path: String,
    authorized: bool,
    content_length: usize,
    expect_continue: bool,
}

fn handle(mut stream: TcpStream, store: &Store) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    // Read until the end of the headers.
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let Ok(head) = std::str::from_utf8(&buf[..header_end]) else {
        return;
    };
    let req = parse_request(head);
    let mut body = buf[header_end + 4..].to_vec();

    if !req.authorized {
        respond(&mut stream, "401 Unauthorized", b"");
        return;
    }
    match req.method.as_str() {
        "HEAD" => respond(&mut stream, "200 OK", b""),
        "GET" => match store.lock().unwrap().get(&req.path).cloned() {
            Some(data) => respond(&mut stream, "200 OK", &data),
            None => respond(&mut stream, "404 Not Found", b""),
        },
        "PUT" => {
            if req.expect_continue && body.len() < req.content_length {
                let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
            }
            while body.len() < req.content_length {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => body.extend_from_slice(&chunk[..n]),
                }
            }
            body.truncate(req.content_length);
            store.lock().unwrap().insert(req.path, body);
            respond(&mut stream, "201 Created", b"");
        }
        _ => respond(&mut stream, "405 Method Not Allowed", b""),
    }
}

fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_request(head: &str) -> Request {
    let mut req = Request {
        method: String::new(),
        path: String::new(),
        authorized: false,
        content_length: 0,
        expect_continue: false,
    };
    for (i, line) in head.lines().enumerate() {
        let line = line.trim();
        if i == 0 {
            let mut parts = line.split_whitespace();
            req.method = parts.next().unwrap_or("").to_string();
            req.path = parts.next().unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => req.authorized = value == AUTH,
                "content-length" => req.content_length = value.parse().unwrap_or(0),
                "expect" => req.expect_continue = value.eq_ignore_ascii_case("100-continue"),
                _ => {}
            }
        }
    }
    req
}
