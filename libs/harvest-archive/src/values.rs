//! Field value parsers
//!
//! Small `&str -> Option<T>` parsers used by the ARC and WARC header validators.
//! A `None` result means "present but unparsable", the caller decides which diagnostic
//! it turns into. They are intentionally strict on syntax but make no attempt at full
//! RFC coverage (no IRI support, no IDN, no date range checks beyond what `chrono` does).

use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Length of an ARC `YYYYMMDDhhmmss` timestamp.
pub const ARC_DATE_LENGTH: usize = 14;

/// Syntactically checked URI reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    raw: String,
    scheme_len: Option<usize>,
}

impl Uri {
    /// Parses a URI reference.
    ///
    /// Only characters allowed by RFC 3986 are accepted, and every `%` must start a
    /// valid `%HH` escape. The scheme is extracted when the reference is absolute.
    pub fn parse(value: &str) -> Option<Uri> {
        if value.is_empty() {
            return None;
        }
        let bytes = value.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'%' {
                if i + 2 >= bytes.len() {
                    return None;
                }
                if !bytes[i + 1].is_ascii_hexdigit() || !bytes[i + 2].is_ascii_hexdigit() {
                    return None;
                }
                i += 3;
                continue;
            }
            if !is_uri_char(b) {
                return None;
            }
            i += 1;
        }
        Some(Uri {
            raw: value.to_string(),
            scheme_len: scheme_length(value),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Scheme of an absolute URI, as written (not lowercased).
    pub fn scheme(&self) -> Option<&str> {
        self.scheme_len.map(|len| &self.raw[..len])
    }

    /// Whether the scheme is `http` or `https` (ASCII case-insensitive).
    pub fn is_http(&self) -> bool {
        self.scheme().is_some_and(|s| {
            s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https")
        })
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            // unreserved
            b'-' | b'.' | b'_' | b'~'
            // gen-delims
            | b':' | b'/' | b'?' | b'#' | b'[' | b']' | b'@'
            // sub-delims
            | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
        )
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`
fn scheme_length(value: &str) -> Option<usize> {
    let colon = value.find(':')?;
    let scheme = &value[..colon];
    let mut chars = scheme.bytes();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return None,
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.')) {
        Some(colon)
    } else {
        None
    }
}

/// Parses an IPv4 or IPv6 address literal.
pub fn parse_ip(value: &str) -> Option<IpAddr> {
    value.parse().ok()
}

/// Parses an ARC timestamp (`YYYYMMDDhhmmss`, UTC).
pub fn parse_arc_date(value: &str) -> Option<DateTime<Utc>> {
    if value.len() != ARC_DATE_LENGTH || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a WARC timestamp (RFC 3339, normalized to UTC).
pub fn parse_warc_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Parsed `type/subtype; name=value` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Top-level type, lowercased
    pub media_type: String,
    /// Subtype, lowercased
    pub subtype: String,
    /// Parameters in order of appearance, names lowercased, quotes removed from values
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Parses a media type with optional parameters.
    pub fn parse(value: &str) -> Option<ContentType> {
        let (essence, mut rest) = match value.find(';') {
            Some(idx) => (&value[..idx], &value[idx..]),
            None => (value, ""),
        };
        let (media_type, subtype) = essence.trim().split_once('/')?;
        if !is_token(media_type) || !is_token(subtype) {
            return None;
        }

        let mut parameters = Vec::new();
        while let Some(tail) = rest.strip_prefix(';') {
            let tail = tail.trim_start();
            if tail.is_empty() {
                break;
            }
            let eq = tail.find('=')?;
            let name = &tail[..eq];
            if !is_token(name) {
                return None;
            }
            let after = &tail[eq + 1..];
            let (param_value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
                let (unquoted, consumed) = read_quoted(quoted)?;
                (unquoted, &quoted[consumed..])
            } else {
                let end = after.find(';').unwrap_or(after.len());
                let token = after[..end].trim_end();
                if !is_token(token) {
                    return None;
                }
                (token.to_string(), &after[end..])
            };
            parameters.push((name.to_ascii_lowercase(), param_value));
            rest = remainder.trim_start();
            if !rest.is_empty() && !rest.starts_with(';') {
                return None;
            }
        }

        Some(ContentType {
            media_type: media_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters,
        })
    }

    /// First value of a parameter, by case-insensitive name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Checks the `type/subtype` pair, ASCII case-insensitive.
    pub fn is(&self, media_type: &str, subtype: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type) && self.subtype.eq_ignore_ascii_case(subtype)
    }
}

/// Reads a quoted string body (after the opening quote).
///
/// Returns the unescaped value and the number of bytes consumed, closing quote included.
fn read_quoted(input: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((value, idx + 1));
        } else {
            value.push(c);
        }
    }
    None
}

/// RFC 7230 `token`.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}
