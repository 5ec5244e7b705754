//! Line Protocol
//!
//! Every connection carries exactly one request and one reply, then closes.
//!
//! Inter-tier requests are an opcode line optionally followed by payload lines:
//!
//! ```text
//! STATUS            READ              WRITE             UPDATE
//!                   <short>           <short>           host/port,host/port
//!                                     <long>
//! ```
//!
//! Replies are two lines: the tier tag of the responder and a body (`DBALIVE`, `Stored`, a long URL, ...).
//!
//! Client-facing tiers also accept an HTTP request line (`GET /<short>`,
//! `PUT /?short=<s>&long=<l>`) and answer with a minimal HTTP response.

use super::types::Tier;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const OP_STATUS: &str = "STATUS";
pub const OP_READ: &str = "READ";
pub const OP_WRITE: &str = "WRITE";
pub const OP_UPDATE: &str = "UPDATE";

/// Body of the WRITE acknowledgement.
pub const ACK_STORED: &str = "Stored";
/// Body of the UPDATE acknowledgement.
pub const ACK_UPDATED: &str = "Updated";

/// A parsed request, one variant per thing a server can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Status,
    Read { short: String },
    Write { short: String, long: String },
    /// Replacement membership list, still encoded; the receiver knows which tier it names.
    Update { payload: String },
    HttpGet { path: String },
    HttpPut { short: String, long: String },
    Malformed(String),
}

impl Request {
    /// Parses a complete request held in memory (opcode line plus payload lines).
    pub fn parse(text: &str) -> Request {
        let mut lines = text.lines();
        let head = lines.next().unwrap_or("").trim_end_matches('\r');
        let payload: Vec<&str> = lines
            .take(payload_lines(head))
            .map(|l| l.trim_end_matches('\r'))
            .collect();
        Self::from_parts(head, &payload)
    }

    fn from_parts(head: &str, payload: &[&str]) -> Request {
        let field = |i: usize| payload.get(i).map(|s| s.to_string());

        match head {
            OP_STATUS => Request::Status,
            OP_READ => match field(0) {
                Some(short) => Request::Read { short },
                None => Request::Malformed(head.to_string()),
            },
            OP_WRITE => match (field(0), field(1)) {
                (Some(short), Some(long)) => Request::Write { short, long },
                _ => Request::Malformed(head.to_string()),
            },
            OP_UPDATE => Request::Update {
                payload: field(0).unwrap_or_default(),
            },
            _ => parse_http_line(head),
        }
    }

    /// Wire form of an inter-tier request. HTTP-shaped variants encode as a request line.
    pub fn encode(&self) -> String {
        match self {
            Request::Status => format!("{OP_STATUS}\n"),
            Request::Read { short } => format!("{OP_READ}\n{short}\n"),
            Request::Write { short, long } => format!("{OP_WRITE}\n{short}\n{long}\n"),
            Request::Update { payload } => format!("{OP_UPDATE}\n{payload}\n"),
            Request::HttpGet { path } => format!("GET /{path} HTTP/1.1\r\n\r\n"),
            Request::HttpPut { short, long } => {
                format!("PUT /?short={short}&long={long} HTTP/1.1\r\n\r\n")
            }
            Request::Malformed(line) => format!("{line}\n"),
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Request::HttpGet { .. } | Request::HttpPut { .. })
    }
}

/// Number of payload lines following an opcode line.
fn payload_lines(head: &str) -> usize {
    match head {
        OP_READ | OP_UPDATE => 1,
        OP_WRITE => 2,
        _ => 0,
    }
}

/// Reads one request from a connection.
///
/// For HTTP requests the header block is consumed (and ignored) so the peer's
/// bytes are fully drained before the reply is written. Returns `Ok(None)` if the
/// peer closed without sending anything.
pub async fn read_request<R>(reader: &mut R) -> std::io::Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    Ok(read_request_raw(reader).await?.map(|(request, _)| request))
}

/// Like [`read_request`], but also returns every byte consumed, so the request can
/// be forwarded verbatim.
///
/// Reading is line by line up to the end of the request (payload lines, or the blank
/// line closing the HTTP headers), however the peer splits its writes.
pub async fn read_request_raw<R>(reader: &mut R) -> std::io::Result<Option<(Request, String)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = String::new();
    if reader.read_line(&mut raw).await? == 0 {
        return Ok(None);
    }
    let head = raw.trim_end_matches(['\r', '\n']).to_string();

    let mut payload = Vec::new();
    for _ in 0..payload_lines(&head) {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        raw.push_str(&line);
        payload.push(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let payload_refs: Vec<&str> = payload.iter().map(String::as_str).collect();
    let request = Request::from_parts(&head, &payload_refs);

    if request.is_http() {
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            raw.push_str(&line);
            if n == 0 || line.trim_end_matches(['\r', '\n']).is_empty() {
                break;
            }
        }
    }

    Ok(Some((request, raw)))
}

/// Parses `METHOD <target> [HTTP/x.y]`.
///
/// The target is everything between the method and the version token, so an
/// unencoded space inside a query value still reaches validation.
fn parse_http_line(line: &str) -> Request {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Request::Malformed(line.to_string());
    }

    let method = tokens[0];
    let end = if tokens.len() > 2 && tokens[tokens.len() - 1].starts_with("HTTP/") {
        tokens.len() - 1
    } else {
        tokens.len()
    };
    let target = tokens[1..end].join(" ");

    match method {
        "GET" => match target.strip_prefix('/') {
            Some(path) => Request::HttpGet {
                path: percent_decode(path),
            },
            None => Request::Malformed(line.to_string()),
        },
        "PUT" => match target.strip_prefix("/?") {
            Some(query) => {
                let short = query_param(query, "short");
                let long = query_param(query, "long");
                match (short, long) {
                    (Some(short), Some(long)) => Request::HttpPut { short, long },
                    _ => Request::Malformed(line.to_string()),
                }
            }
            None => Request::Malformed(line.to_string()),
        },
        _ => Request::Malformed(line.to_string()),
    }
}

/// Looks up `key` in an `a=1&b=2` query string, percent-decoding the value.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| percent_decode(v))
    })
}

/// Decodes `%XX` escapes; malformed escapes are kept verbatim and invalid UTF-8 is replaced.
pub fn percent_decode(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned(),
    }
}

/// An inter-tier reply: responder's tier tag plus one body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub tag: String,
    pub body: String,
}

impl Reply {
    pub fn new(tier: Tier, body: impl Into<String>) -> Self {
        Self {
            tag: tier.tag().to_string(),
            body: body.into(),
        }
    }

    pub fn alive(tier: Tier) -> Self {
        Self::new(tier, tier.alive_marker())
    }

    pub fn encode(&self) -> String {
        format!("{}\n{}\n", self.tag, self.body)
    }
}

/// Minimal HTTP/1.1 response written by client-facing tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    fn new(status: u16, reason: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            location: None,
            body: body.into(),
        }
    }

    pub fn redirect(long_url: &str) -> Self {
        Self {
            location: Some(long_url.to_string()),
            ..Self::new(307, "Temporary Redirect", format!("Redirecting to {long_url}\n"))
        }
    }

    pub fn created() -> Self {
        Self::new(201, "Created", "Short URL recorded\n")
    }

    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request", "Invalid short or long URL\n")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found", "Short URL not found\n")
    }

    pub fn server_error() -> Self {
        Self::new(500, "Internal Server Error", "Failed to store URL\n")
    }

    pub fn unavailable() -> Self {
        Self::new(503, "Service Unavailable", "Service unavailable\n")
    }

    pub fn no_node_reachable() -> Self {
        Self::new(503, "Service Unavailable", "No node reachable\n")
    }

    pub fn encode(&self) -> String {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        if let Some(location) = &self.location {
            out.push_str(&format!("Location: {location}\r\n"));
        }
        out.push_str("Content-Type: text/plain\r\n");
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n\r\n");
        out.push_str(&self.body);
        out
    }

    /// Status code of a raw HTTP response, if its first line is a status line.
    pub fn status_of(raw: &str) -> Option<u16> {
        let status_line = raw.lines().next()?;
        let mut parts = status_line.split_whitespace();
        if !parts.next()?.starts_with("HTTP/") {
            return None;
        }
        parts.next()?.parse().ok()
    }

    /// Value of the `Location:` header of a raw HTTP response.
    pub fn location_of(raw: &str) -> Option<String> {
        raw.lines()
            .take_while(|line| !line.trim().is_empty())
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("location")
                    .then(|| value.trim().to_string())
            })
            .filter(|value| !value.is_empty())
    }
}
