//! HTTP request parsing (C5) and the engine-side `Request` object builder
//! (§4.4). Parsing is delegated to `httparse`; everything past the raw
//! tokenizer (lowercasing, first-wins header dedup, body truncation) is this
//! crate's own contract per §4.8.

use rquickjs::{Ctx, Object, Value};

const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub raw_url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parses a single HTTP/1.x request out of `buf`. Returns `None` on any
/// malformed input (the 400 path in §4.4 step 2): an incomplete
/// request-line/header block, an unparseable request line, or a header line
/// with no `:`.
pub fn parse(buf: &[u8]) -> Option<HttpRequest> {
    let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut header_slots);

    let status = req.parse(buf).ok()?;
    let header_end = match status {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return None,
    };

    let method = req.method?.to_ascii_uppercase();
    let raw_url = req.path?.to_string();
    let path = raw_url.split('?').next().unwrap_or("").to_string();

    let mut headers: Vec<(String, String)> = Vec::new();
    for header in req.headers.iter() {
        let name = header.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(header.value).into_owned();
        if !headers.iter().any(|(k, _)| *k == name) {
            headers.push((name, value));
        }
    }

    let rest = &buf[header_end..];
    let body = match headers.iter().find(|(k, _)| k == "content-length") {
        Some((_, v)) => match v.trim().parse::<usize>() {
            Ok(len) => rest[..rest.len().min(len)].to_vec(),
            Err(_) => rest.to_vec(),
        },
        None => rest.to_vec(),
    };

    Some(HttpRequest {
        method,
        path,
        raw_url,
        headers,
        body,
    })
}

/// Builds the engine-side Request value described in §4.4: `method`, `url`,
/// `headers` (nested object), and `body` (only present when non-empty).
pub fn build_engine_request<'js>(ctx: &Ctx<'js>, request: &HttpRequest) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;
    obj.set("method", request.method.as_str())?;
    obj.set("url", request.raw_url.as_str())?;

    let headers = Object::new(ctx.clone())?;
    for (name, value) in &request.headers {
        headers.set(name.as_str(), value.as_str())?;
    }
    obj.set("headers", headers)?;

    if !request.body.is_empty() {
        let body = String::from_utf8_lossy(&request.body).into_owned();
        obj.set("body", body)?;
    }

    Ok(obj)
}

pub fn into_value(obj: Object<'_>) -> Value<'_> {
    obj.into_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_path_and_query() {
        let req = parse(b"GET /api/x?y=1 HTTP/1.1\r\nHost: h\r\n\r\n").expect("parse");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/api/x");
        assert_eq!(req.raw_url, "/api/x?y=1");
    }

    #[test]
    fn lowercases_headers_and_first_wins_on_duplicate() {
        let req = parse(b"GET / HTTP/1.1\r\nX-Foo: first\r\nX-Foo: second\r\n\r\n").expect("parse");
        assert_eq!(req.header("x-foo"), Some("first"));
    }

    #[test]
    fn body_truncated_to_content_length() {
        let req = parse(b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcdef").expect("parse");
        assert_eq!(req.body, b"abc");
    }

    #[test]
    fn body_without_content_length_is_remainder() {
        let req = parse(b"POST / HTTP/1.1\r\n\r\nabcdef").expect("parse");
        assert_eq!(req.body, b"abcdef");
    }

    #[test]
    fn missing_blank_line_is_a_parse_failure() {
        assert!(parse(b"GET / HTTP/1.1\r\nHost: h\r\n").is_none());
    }

    #[test]
    fn header_line_without_colon_is_a_parse_failure() {
        assert!(parse(b"GET / HTTP/1.1\r\nnotaheader\r\n\r\n").is_none());
    }
}
