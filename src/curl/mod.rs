//! Captured curl command parsing.
//!
//! Parses a browser-captured cURL invocation ("Copy as cURL") into the URL,
//! method, headers, and body needed to replay the session. This is a pure
//! bootstrap step: operational header sourcing always goes through the
//! credential store, never through a cached parse of the capture string.

use std::collections::HashMap;

use crate::error_handling::CollectError;

/// The parsed contents of a captured curl command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSession {
    /// Request URL.
    pub url: String,
    /// HTTP method. Explicit `-X` wins; a data flag implies POST; else GET.
    pub method: String,
    /// Header map, `Cookie` included. Later duplicates overwrite earlier.
    pub headers: HashMap<String, String>,
    /// Request body from a data flag, if present.
    pub body: Option<String>,
}

/// One shell token plus whether any part of it was quoted.
struct Token {
    text: String,
    quoted: bool,
}

/// Parses a captured curl command.
///
/// Line-continuation backslashes and embedded newlines are collapsed to
/// spaces first, so multi-line captures parse identically to single-line
/// ones.
///
/// # Errors
///
/// Returns [`CollectError::MalformedSession`] when no quoted URL token can
/// be found. Callers must not proceed to network calls in that case.
pub fn parse_curl_command(raw: &str) -> Result<ParsedSession, CollectError> {
    let flattened = raw
        .replace("\\\r\n", " ")
        .replace("\\\n", " ")
        .replace(['\r', '\n'], " ");

    let tokens = tokenize(&flattened);
    if tokens.is_empty() {
        return Err(CollectError::MalformedSession(
            "empty capture".to_string(),
        ));
    }

    let mut url: Option<String> = None;
    let mut method: Option<String> = None;
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut cookie: Option<String> = None;
    let mut body: Option<String> = None;

    // Skip the command name itself ("curl", possibly a path to it).
    let mut iter = tokens.iter().skip(1).peekable();
    while let Some(token) = iter.next() {
        match token.text.as_str() {
            "-H" | "--header" => {
                if let Some(value) = iter.next() {
                    if let Some((key, val)) = value.text.split_once(':') {
                        headers.insert(key.trim().to_string(), val.trim().to_string());
                    }
                }
            }
            "-b" | "--cookie" => {
                if let Some(value) = iter.next() {
                    cookie = Some(value.text.clone());
                }
            }
            "-X" | "--request" => {
                if let Some(value) = iter.next() {
                    method = Some(value.text.to_uppercase());
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-urlencode" => {
                if let Some(value) = iter.next() {
                    body = Some(value.text.clone());
                }
            }
            "-o" | "--output" | "-c" | "--cookie-jar" | "-m" | "--max-time"
            | "--connect-timeout" | "--retry" | "-u" | "--user" | "-x" | "--proxy" => {
                // Value-taking flags whose argument is not part of the
                // session; consume it so a quoted argument is never
                // mistaken for the URL.
                iter.next();
            }
            text if text.starts_with('-') => {
                // Boolean flag such as --compressed; nothing to consume.
                // Unrecognized value-taking flags are treated as boolean,
                // so their argument may be misread as the URL.
            }
            _ => {
                if url.is_none() && token.quoted {
                    url = Some(token.text.clone());
                }
            }
        }
    }

    // The dedicated cookie flag wins over any Cookie set via -H.
    if let Some(cookie) = cookie {
        headers.insert("Cookie".to_string(), cookie);
    }

    let url = url.ok_or_else(|| {
        CollectError::MalformedSession("no quoted URL token found".to_string())
    })?;

    let method = match method {
        Some(m) => m,
        None if body.is_some() => "POST".to_string(),
        None => "GET".to_string(),
    };

    Ok(ParsedSession {
        url,
        method,
        headers,
        body,
    })
}

/// Splits a flattened command line into shell-style tokens.
///
/// Supports single quotes (literal), double quotes (with backslash escapes),
/// and backslash escapes outside quotes, which covers the `'\''` idiom
/// browsers emit for embedded single quotes.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_token = true;
                quoted = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_token = true;
                quoted = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        _ => current.push(inner),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                    quoted = false;
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(Token {
            text: current,
            quoted,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_get() {
        let session = parse_curl_command("curl 'https://example.com/api'").unwrap();
        assert_eq!(session.url, "https://example.com/api");
        assert_eq!(session.method, "GET");
        assert!(session.headers.is_empty());
        assert!(session.body.is_none());
    }

    #[test]
    fn test_parses_headers_and_cookie_flag() {
        let session = parse_curl_command(
            "curl 'https://example.com' -H 'accept: application/json' \
             -H 'referer: https://example.com/home' -b 'SID=abc; AUT=def'",
        )
        .unwrap();
        assert_eq!(session.headers.len(), 3);
        assert_eq!(
            session.headers.get("accept").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(
            session.headers.get("Cookie").map(String::as_str),
            Some("SID=abc; AUT=def")
        );
    }

    #[test]
    fn test_cookie_flag_overrides_cookie_header() {
        // Flag order must not matter: -b always wins over -H 'Cookie: ...'.
        let session = parse_curl_command(
            "curl 'https://example.com' -b 'SID=from_flag' -H 'Cookie: SID=from_header'",
        )
        .unwrap();
        assert_eq!(
            session.headers.get("Cookie").map(String::as_str),
            Some("SID=from_flag")
        );
    }

    #[test]
    fn test_later_header_overwrites_earlier() {
        let session = parse_curl_command(
            "curl 'https://example.com' -H 'accept: text/html' -H 'accept: application/json'",
        )
        .unwrap();
        assert_eq!(
            session.headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_data_flag_implies_post() {
        let session =
            parse_curl_command("curl 'https://example.com' --data-raw '{\"a\":1}'").unwrap();
        assert_eq!(session.method, "POST");
        assert_eq!(session.body.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_explicit_method_wins_over_data_flag() {
        let session =
            parse_curl_command("curl 'https://example.com' -X PUT --data-raw 'x=1'").unwrap();
        assert_eq!(session.method, "PUT");
    }

    #[test]
    fn test_multiline_capture_parses_like_single_line() {
        let multi = "curl 'https://example.com/api' \\\n  -H 'accept: application/json' \\\n  -b 'SID=abc'";
        let single = "curl 'https://example.com/api' -H 'accept: application/json' -b 'SID=abc'";
        assert_eq!(
            parse_curl_command(multi).unwrap(),
            parse_curl_command(single).unwrap()
        );
    }

    #[test]
    fn test_embedded_escaped_single_quote() {
        let session =
            parse_curl_command("curl 'https://example.com' -H 'x-note: it'\\''s fine'").unwrap();
        assert_eq!(
            session.headers.get("x-note").map(String::as_str),
            Some("it's fine")
        );
    }

    #[test]
    fn test_url_after_flags_is_found() {
        let session =
            parse_curl_command("curl -H 'accept: */*' 'https://example.com/late-url'").unwrap();
        assert_eq!(session.url, "https://example.com/late-url");
    }

    #[test]
    fn test_value_flag_argument_is_not_mistaken_for_url() {
        let session = parse_curl_command(
            "curl -o 'out.json' --cookie-jar 'jar.txt' 'https://example.com/api'",
        )
        .unwrap();
        assert_eq!(session.url, "https://example.com/api");
    }

    #[test]
    fn test_missing_url_is_malformed_session() {
        let err = parse_curl_command("curl -H 'accept: */*' --compressed").unwrap_err();
        assert!(matches!(err, CollectError::MalformedSession(_)));
    }

    #[test]
    fn test_empty_capture_is_malformed_session() {
        let err = parse_curl_command("   ").unwrap_err();
        assert!(matches!(err, CollectError::MalformedSession(_)));
    }

    #[test]
    fn test_header_count_property() {
        // N header flags plus one cookie flag yields exactly N non-cookie
        // headers plus one Cookie header.
        let session = parse_curl_command(
            "curl 'https://example.com' -H 'a: 1' -H 'b: 2' -H 'c: 3' -b 'SID=1'",
        )
        .unwrap();
        let non_cookie = session.headers.iter().filter(|(k, _)| *k != "Cookie").count();
        assert_eq!(non_cookie, 3);
        assert_eq!(session.headers.get("Cookie").map(String::as_str), Some("SID=1"));
    }
}
