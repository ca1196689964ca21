//! Minimal HTTP/1.x request parsing and response writing
//!
//! One request per connection. Headers are scanned for `Content-Length` and
//! then dropped; the body is only kept for `POST`.

use crate::config;
use core::fmt::Write as _;
use embedded_io_async::{Read, Write};
use heapless::String;
use log::{debug, error};
use serde::Serialize;

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    /// Any other token; routed to 404
    Other,
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

/// A parsed request borrowing from the connection buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'b> {
    pub method: Method,
    /// Target path without any query string
    pub path: &'b str,
    pub body: &'b [u8],
}

/// Why a request could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Peer closed before sending a byte
    ConnectionClosed,
    /// Request line is not exactly `METHOD PATH VERSION`
    MalformedRequestLine,
    /// No blank line within the header limit
    HeadersTooLarge,
    /// `Content-Length` is not a number
    InvalidContentLength,
    /// Declared body exceeds the body limit
    BodyTooLarge,
    /// Peer closed before the declared body arrived
    TruncatedBody,
    /// Transport error while reading
    Io,
}

impl ParseError {
    /// Status to answer with, or `None` when nothing should be written
    pub fn response_status(&self) -> Option<Status> {
        match self {
            ParseError::ConnectionClosed | ParseError::Io => None,
            _ => Some(Status::BadRequest),
        }
    }
}

/// Response status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl Status {
    const ALL: [Status; 4] = [
        Status::Ok,
        Status::BadRequest,
        Status::NotFound,
        Status::InternalServerError,
    ];

    pub const fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub const fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

const MAX_REASON_LEN: usize = {
    let mut max = 0;
    let mut i = 0;
    while i < Status::ALL.len() {
        let len = Status::ALL[i].reason().len();
        if len > max {
            max = len;
        }
        i += 1;
    }
    max
};

/// Response head text around the status code, reason and body length
const HEAD_TEMPLATE_LEN: usize = "HTTP/1.0  \r\n\
    Content-Type: application/json\r\n\
    Content-Length: \r\n\
    Connection: close\r\n\
    \r\n"
    .len();

/// Room for the template, a 3-digit code, the longest reason and any `usize`
const HEAD_CAPACITY: usize = HEAD_TEMPLATE_LEN + 3 + MAX_REASON_LEN + 20;

/// Status plus JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: Status,
    pub body: String<{ config::RESPONSE_BODY_SIZE }>,
}

impl HttpResponse {
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// Serialize `value` as the body; a value that does not fit becomes a 500
    pub fn json<T: Serialize>(status: Status, value: &T) -> Self {
        match serde_json_core::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!("[HTTP] Failed to serialize response body: {:?}", e);
                Self::empty(Status::InternalServerError)
            }
        }
    }

    /// Write status line, headers and body
    pub async fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), W::Error> {
        let mut head: String<HEAD_CAPACITY> = String::new();
        if core::write!(
            &mut head,
            "HTTP/1.0 {} {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.status.code(),
            self.status.reason(),
            self.body.len()
        )
        .is_err()
        {
            error!("[HTTP] Response head truncated for status {}", self.status.code());
        }
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(self.body.as_bytes()).await?;
        Ok(())
    }
}

/// Read one request from `reader` into `buf`.
///
/// Reading stops at the blank line ending the headers, or at end of stream.
/// For `POST` the body is then read up to `Content-Length`, or taken as
/// whatever arrived with the headers when no length is given.
pub async fn read_request<'b, R: Read>(
    reader: &mut R,
    buf: &'b mut [u8],
) -> Result<HttpRequest<'b>, ParseError> {
    let header_limit = config::MAX_HEADER_SIZE.min(buf.len());
    let mut total = 0usize;

    let head_len = loop {
        if let Some(end) = find_header_end(&buf[..total]) {
            break end;
        }
        if total >= header_limit {
            return Err(ParseError::HeadersTooLarge);
        }
        let n = reader
            .read(&mut buf[total..header_limit])
            .await
            .map_err(|_| ParseError::Io)?;
        if n == 0 {
            if total == 0 {
                return Err(ParseError::ConnectionClosed);
            }
            // Peer half-closed after the request line
            break total;
        }
        total += n;
    };

    let (method, content_length) = {
        let head = core::str::from_utf8(&buf[..head_len])
            .map_err(|_| ParseError::MalformedRequestLine)?;
        let (method, _, content_length) = parse_head(head)?;
        (method, content_length)
    };

    let body_end = if method == Method::Post {
        let expected = content_length.unwrap_or(total - head_len);
        if expected > config::MAX_BODY_SIZE || head_len + expected > buf.len() {
            return Err(ParseError::BodyTooLarge);
        }
        let body_end = head_len + expected;
        while total < body_end {
            let n = reader
                .read(&mut buf[total..body_end])
                .await
                .map_err(|_| ParseError::Io)?;
            if n == 0 {
                return Err(ParseError::TruncatedBody);
            }
            total += n;
        }
        body_end
    } else {
        head_len
    };

    let buf: &'b [u8] = buf;
    let head =
        core::str::from_utf8(&buf[..head_len]).map_err(|_| ParseError::MalformedRequestLine)?;
    let (_, path, _) = parse_head(head)?;

    debug!("[HTTP] {:?} {} ({} byte body)", method, path, body_end - head_len);

    Ok(HttpRequest {
        method,
        path,
        body: &buf[head_len..body_end],
    })
}

/// Offset just past the `\r\n\r\n` that ends the headers
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

/// Request line tokens plus the declared body length
fn parse_head(head: &str) -> Result<(Method, &str, Option<usize>), ParseError> {
    let mut lines = head.lines();
    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;

    let mut tokens = request_line.split_whitespace();
    let (Some(method), Some(target), Some(_version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::MalformedRequestLine);
    };
    let path = target.split('?').next().unwrap_or(target);

    let mut content_length = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)?;
            content_length = Some(len);
        }
    }

    Ok((Method::parse(method), path, content_length))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorType;
    use std::vec::Vec;

    /// In-memory connection: serves `input` in `chunk`-sized reads and
    /// records everything written
    pub(crate) struct MockConnection {
        input: Vec<u8>,
        position: usize,
        chunk: usize,
        pub output: Vec<u8>,
        pub flushed: bool,
    }

    impl MockConnection {
        pub fn new(input: &[u8]) -> Self {
            Self::chunked(input, usize::MAX)
        }

        pub fn chunked(input: &[u8], chunk: usize) -> Self {
            Self {
                input: input.to_vec(),
                position: 0,
                chunk,
                output: Vec::new(),
                flushed: false,
            }
        }

        pub fn output_str(&self) -> &str {
            core::str::from_utf8(&self.output).unwrap()
        }
    }

    impl ErrorType for MockConnection {
        type Error = Infallible;
    }

    impl Read for MockConnection {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let remaining = &self.input[self.position..];
            let n = remaining.len().min(buf.len()).min(self.chunk);
            buf[..n].copy_from_slice(&remaining[..n]);
            self.position += n;
            Ok(n)
        }
    }

    impl Write for MockConnection {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushed = true;
            Ok(())
        }
    }

    fn parse(
        input: &[u8],
        chunk: usize,
    ) -> Result<(Method, std::string::String, Vec<u8>), ParseError> {
        let mut conn = MockConnection::chunked(input, chunk);
        let mut buf = [0u8; config::REQUEST_BUFFER_SIZE];
        let request = block_on(read_request(&mut conn, &mut buf))?;
        Ok((request.method, request.path.into(), request.body.to_vec()))
    }

    #[test]
    fn parses_get() {
        let (method, path, body) =
            parse(b"GET /health HTTP/1.1\r\nHost: node\r\nAccept: */*\r\n\r\n", 1024).unwrap();
        assert_eq!(method, Method::Get);
        assert_eq!(path, "/health");
        assert!(body.is_empty());
    }

    #[test]
    fn parses_post_body_across_reads() {
        let request = b"POST /melody HTTP/1.1\r\ncontent-length: 33\r\n\r\n\
            {\"notes\":[262,0,294],\"entries\":3}";
        let (method, path, body) = parse(request, 7).unwrap();
        assert_eq!(method, Method::Post);
        assert_eq!(path, "/melody");
        assert_eq!(body, br#"{"notes":[262,0,294],"entries":3}"#);
    }

    #[test]
    fn post_without_length_takes_buffered_bytes() {
        let (_, _, body) = parse(b"POST /stop HTTP/1.0\r\n\r\n{}", 1024).unwrap();
        assert_eq!(body, b"{}");
    }

    #[test]
    fn get_body_is_dropped_and_query_stripped() {
        let (_, path, body) = parse(b"GET /sensor?x=1 HTTP/1.1\r\n\r\nignored", 1024).unwrap();
        assert_eq!(path, "/sensor");
        assert!(body.is_empty());
    }

    #[test]
    fn unknown_method_is_not_an_error() {
        let (method, _, _) = parse(b"DELETE /stop HTTP/1.1\r\n\r\n", 1024).unwrap();
        assert_eq!(method, Method::Other);
    }

    #[test]
    fn request_line_without_blank_line_at_eof() {
        let (method, path, _) = parse(b"GET /health HTTP/1.0\r\n", 1024).unwrap();
        assert_eq!((method, path.as_str()), (Method::Get, "/health"));
    }

    #[test]
    fn malformed_request_lines() {
        for input in [
            &b"GET /health\r\n\r\n"[..],
            b"GET /health HTTP/1.1 extra\r\n\r\n",
            b"\r\n\r\n",
            b"\xff\xfe /x HTTP/1.1\r\n\r\n",
        ] {
            assert_eq!(parse(input, 1024), Err(ParseError::MalformedRequestLine));
        }
    }

    #[test]
    fn any_third_token_is_a_version() {
        let (method, path, _) = parse(b"GET /health FTP/1.0\r\n\r\n", 1024).unwrap();
        assert_eq!((method, path.as_str()), (Method::Get, "/health"));
    }

    #[test]
    fn closed_connection() {
        assert_eq!(parse(b"", 1024), Err(ParseError::ConnectionClosed));
        assert_eq!(ParseError::ConnectionClosed.response_status(), None);
    }

    #[test]
    fn bounded_headers_and_body() {
        let mut huge = Vec::from(&b"GET / HTTP/1.1\r\n"[..]);
        huge.extend(core::iter::repeat_n(b'a', config::MAX_HEADER_SIZE));
        assert_eq!(parse(&huge, 1024), Err(ParseError::HeadersTooLarge));

        let big = b"POST /melody HTTP/1.1\r\nContent-Length: 99999\r\n\r\n";
        assert_eq!(parse(big, 1024), Err(ParseError::BodyTooLarge));
        assert_eq!(
            ParseError::BodyTooLarge.response_status(),
            Some(Status::BadRequest)
        );
    }

    #[test]
    fn truncated_and_invalid_lengths() {
        let short = b"POST /melody HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}";
        assert_eq!(parse(short, 1024), Err(ParseError::TruncatedBody));

        let bad = b"POST /melody HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
        assert_eq!(parse(bad, 1024), Err(ParseError::InvalidContentLength));
    }

    #[test]
    fn writes_response_head() {
        #[derive(Serialize)]
        struct Body {
            status: &'static str,
        }

        let response = HttpResponse::json(Status::Ok, &Body { status: "ok" });
        let mut conn = MockConnection::new(b"");
        block_on(response.write_to(&mut conn)).unwrap();
        assert_eq!(
            conn.output_str(),
            "HTTP/1.0 200 OK\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 15\r\n\
             Connection: close\r\n\
             \r\n\
             {\"status\":\"ok\"}"
        );
    }

    #[test]
    fn empty_response_has_zero_length() {
        let mut conn = MockConnection::new(b"");
        block_on(HttpResponse::empty(Status::NotFound).write_to(&mut conn)).unwrap();
        assert!(conn.output_str().starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(conn.output_str().ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[test]
    fn full_body_head_fits_for_every_status() {
        let body: String<{ config::RESPONSE_BODY_SIZE }> =
            core::iter::repeat_n('x', config::RESPONSE_BODY_SIZE).collect();

        for status in Status::ALL {
            let response = HttpResponse {
                status,
                body: body.clone(),
            };
            let mut conn = MockConnection::new(b"");
            block_on(response.write_to(&mut conn)).unwrap();

            let out = conn.output_str();
            let head = format!(
                "HTTP/1.0 {} {}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n",
                status.code(),
                status.reason(),
                config::RESPONSE_BODY_SIZE
            );
            assert_eq!(&out[..head.len()], head);
            assert_eq!(&out[head.len()..], body.as_str());
        }
    }
}
