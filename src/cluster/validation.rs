use lazy_static::lazy_static;
use regex::Regex;

/// Maximum length of either half of a URL pair.
pub const MAX_URL_LEN: usize = 100;

lazy_static! {
    static ref SHORT_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
    // Not a full URL grammar: scheme, a domain-like label, a dot, then anything non-blank.
    static ref LONG_RE: Regex = Regex::new(r"^https?://[A-Za-z0-9-]+\.\S{2,}$").unwrap();
    static ref IPV4_RE: Regex = Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").unwrap();
}

pub fn is_valid_short(short: &str) -> bool {
    short.len() <= MAX_URL_LEN && SHORT_RE.is_match(short)
}

pub fn is_valid_long(long: &str) -> bool {
    long.len() <= MAX_URL_LEN && LONG_RE.is_match(long.trim())
}

/// Dotted-quad shape or `localhost`. Octet ranges are not checked.
pub fn is_valid_ip(ip: &str) -> bool {
    ip == "localhost" || IPV4_RE.is_match(ip)
}
