use buffer::Buffer;
use server_proxy::http::{HttpRequest, HttpResponse, Method, ParseOutcome, ParsingState};

fn parsed(raw: &[u8]) -> (HttpRequest, ParseOutcome) {
    let mut buf = Buffer::new();
    buf.append(raw);
    let mut req = HttpRequest::new();
    let outcome = req.parse(&mut buf);
    (req, outcome)
}

#[test]
fn test_simple_get_request() {
    let (req, outcome) = parsed(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(outcome, ParseOutcome::GetRequest);
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.path, "/index.html");
    assert_eq!(req.state, ParsingState::Finish);
    assert_eq!(req.headers.get("host").unwrap(), "localhost");
}

#[test]
fn test_fragmented_headers() {
    let mut buf = Buffer::new();
    let mut req = HttpRequest::new();

    buf.append(b"GET /path HT");
    assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
    assert_eq!(req.state, ParsingState::RequestLine);

    buf.append(b"TP/1.1\r\n");
    assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
    assert_eq!(req.state, ParsingState::Header);

    buf.append(b"User-Agent: test\r\n\r\n");
    assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
    assert_eq!(req.state, ParsingState::Finish);
}

#[test]
fn test_post_request_with_body() {
    let (req, outcome) = parsed(b"POST /api HTTP/1.1\r\nContent-Length: 13\r\n\r\nHello, World!");
    assert_eq!(outcome, ParseOutcome::GetRequest);
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.body, b"Hello, World!");
    assert_eq!(req.state, ParsingState::Finish);
}

#[test]
fn test_post_fragmented_body() {
    let mut buf = Buffer::new();
    let mut req = HttpRequest::new();

    buf.append(b"POST /data HTTP/1.1\r\nContent-Length: 10\r\n\r\n");
    assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
    assert_eq!(req.state, ParsingState::Body);

    buf.append(b"12345");
    assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
    assert_eq!(req.body, b"12345");

    buf.append(b"67890");
    assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
    assert_eq!(req.body, b"1234567890");
    assert_eq!(req.state, ParsingState::Finish);
}

#[test]
fn test_invalid_method_is_bad_request() {
    let (_req, outcome) = parsed(b"PATCH /invalid HTTP/1.1\r\n\r\n");
    assert_eq!(outcome, ParseOutcome::BadRequest);
}

#[test]
fn test_partial_request_parsing_resumes_across_reads() {
    let mut buf = Buffer::new();
    let mut req = HttpRequest::new();

    buf.append(b"GET /index.html HTTP/1.1\r\n");
    let _ = req.parse(&mut buf);
    assert_eq!(req.state, ParsingState::Header);
    assert_eq!(req.path, "/index.html");

    buf.append(b"Host: localhost\r\n\r\n");
    assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
    assert_eq!(req.headers.get("host").unwrap(), "localhost");
}

#[test]
fn test_body_parsing_stops_at_content_length() {
    let (req, outcome) = parsed(b"POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nHelloWorld");
    assert_eq!(outcome, ParseOutcome::GetRequest);
    assert_eq!(req.body, b"Hello");
}

#[test]
fn test_response_generation() {
    let mut res = HttpResponse::new();
    res.set_status(200);
    res.set_inline_body(b"Hello Rust".to_vec(), "text/plain");

    let mut buf = Buffer::new();
    res.make_response(&mut buf);
    let head = String::from_utf8(buf.begin_read().to_vec()).unwrap();

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-type: text/plain\r\n"));
    assert!(head.contains("Content-length: 10\r\n"));
    assert_eq!(res.body_bytes(), b"Hello Rust");
}
