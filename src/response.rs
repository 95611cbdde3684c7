//! The response serializer (C7). The engine value returned by a worker's
//! `fetch` is either a bare string or an object in one of two shapes (plain
//! object vs. a framework-style `Response` class using `_body`/`_headers`
//! private slots). Per the design note in §9, that duality is collapsed into
//! one tagged enum immediately after extraction, so the serializer itself
//! never branches on shape.

use rquickjs::Value;

pub enum RespondWith {
    Bare(String),
    Shaped {
        status: u16,
        content_type: Option<String>,
        body: String,
    },
}

/// Looks up the standard reason phrase for `status`; anything not in the
/// table serializes as `"Unknown"` per §4.4.
fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Extracts a `RespondWith` from whatever the worker's `fetch` returned.
/// Anything that is neither a string nor an object falls back to an empty
/// `text/plain` 200, per §4.4's catch-all.
pub fn extract(value: &Value<'_>) -> RespondWith {
    if let Some(s) = value.as_string() {
        return RespondWith::Bare(s.to_string().unwrap_or_default());
    }

    let Some(obj) = value.as_object() else {
        return RespondWith::Bare(String::new());
    };

    let status = obj
        .get::<_, f64>("status")
        .ok()
        .map(|n| n as u16)
        .unwrap_or(200);

    let body = obj
        .get::<_, String>("_body")
        .or_else(|_| obj.get::<_, String>("body"))
        .unwrap_or_default();

    let headers = obj
        .get::<_, rquickjs::Object>("_headers")
        .or_else(|_| obj.get::<_, rquickjs::Object>("headers"))
        .ok();

    let content_type = headers.and_then(|h| {
        h.get::<_, String>("content-type")
            .or_else(|_| h.get::<_, String>("Content-Type"))
            .ok()
    });

    RespondWith::Shaped {
        status,
        content_type,
        body,
    }
}

/// Serializes a `RespondWith` to the wire form from §4.4: status line,
/// `Content-Type`, `Content-Length`, an (untruthful) `Connection:
/// keep-alive`, then the body. The server closes the socket regardless.
pub fn serialize(respond: &RespondWith) -> Vec<u8> {
    let (status, content_type, body) = match respond {
        RespondWith::Bare(body) => (200, "text/plain".to_string(), body.as_str()),
        RespondWith::Shaped {
            status,
            content_type,
            body,
        } => (
            *status,
            content_type.clone().unwrap_or_else(|| "text/plain".to_string()),
            body.as_str(),
        ),
    };

    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n",
        status_text(status),
        body.len(),
    );

    let mut out = head.into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

/// The literal 400/404/500 replies written directly by the dispatch loop for
/// failures that never reach a worker (§4.4 steps 2, 3, and the invocation
/// failure path).
pub fn bad_request() -> &'static [u8] {
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request"
}

pub fn not_found() -> &'static [u8] {
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nNot Found"
}

pub fn internal_server_error() -> &'static [u8] {
    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 21\r\n\r\nInternal Server Error"
}
