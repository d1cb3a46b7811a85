//! HTTP cookies.

use std::fmt;

use crate::http::message::HttpError;

/// An immutable cookie. Build with [`Cookie::builder`] or [`Cookie::new`]; both
/// reject text that would break out of its `Set-Cookie` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    max_age: Option<i64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, HttpError> {
        Self::builder(name, value).build()
    }

    pub fn builder(name: impl Into<String>, value: impl Into<String>) -> CookieBuilder {
        CookieBuilder {
            cookie: Self::unchecked(name.into(), value.into()),
        }
    }

    fn unchecked(name: String, value: String) -> Self {
        Cookie {
            name,
            value,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            max_age: None,
        }
    }

    pub fn to_builder(&self) -> CookieBuilder {
        CookieBuilder {
            cookie: self.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Lifetime in seconds; `None` is a session cookie.
    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    /// Parse a request `Cookie` header (`a=1; b=2`). Malformed pairs are skipped.
    pub fn parse_header(header: &str) -> impl Iterator<Item = Cookie> + '_ {
        header.split(';').filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some(Cookie::unchecked(name.to_string(), value.to_string()))
        })
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CookieBuilder {
    cookie: Cookie,
}

impl CookieBuilder {
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.cookie.value = value.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = Some(path.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.cookie.max_age = Some(seconds);
        self
    }

    pub fn build(self) -> Result<Cookie, HttpError> {
        let cookie = self.cookie;
        let invalid = |reason| HttpError::InvalidCookie {
            name: cookie.name.clone(),
            reason,
        };
        if cookie.name.is_empty() || !cookie.name.bytes().all(is_token_byte) {
            return Err(invalid("name is not a token"));
        }
        let value = cookie.value.as_bytes();
        let unquoted = match value {
            [b'"', inner @ .., b'"'] => inner,
            _ => value,
        };
        if !unquoted.iter().copied().all(is_cookie_octet) {
            return Err(invalid("value contains separators or control characters"));
        }
        if !cookie.domain.as_deref().map_or(true, is_attribute_value) {
            return Err(invalid("domain contains `;`, whitespace or control characters"));
        }
        if !cookie.path.as_deref().map_or(true, is_attribute_value) {
            return Err(invalid("path contains `;`, whitespace or control characters"));
        }
        Ok(cookie)
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

/// RFC 6265 `cookie-octet`.
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2b | 0x2d..=0x3a | 0x3c..=0x5b | 0x5d..=0x7e)
}

fn is_attribute_value(text: &str) -> bool {
    text.bytes()
        .all(|b| !b.is_ascii_control() && !b.is_ascii_whitespace() && b != b';')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_header() {
        let cookies: Vec<_> = Cookie::parse_header("id=abc; theme=\"dark\"; junk; =x").collect();
        assert_eq!(
            cookies,
            vec![Cookie::new("id", "abc").unwrap(), Cookie::new("theme", "dark").unwrap()]
        );
    }

    #[test]
    fn test_set_cookie_rendering() {
        let cookie = Cookie::builder("uid", "42")
            .domain("example.com")
            .path("/")
            .max_age(3600)
            .secure(true)
            .http_only(true)
            .build()
            .unwrap();
        assert_eq!(
            cookie.to_set_cookie(),
            "uid=42; Domain=example.com; Path=/; Max-Age=3600; Secure; HttpOnly"
        );
        assert_eq!(Cookie::new("a", "b").unwrap().to_set_cookie(), "a=b");
        assert_eq!(Cookie::new("q", "\"quoted\"").unwrap().to_set_cookie(), "q=\"quoted\"");
    }

    #[test]
    fn test_attribute_injection_is_rejected() {
        for value in ["x; Domain=evil.example", "a,b", "two words", "tab\tbed", "line\nbreak"] {
            let err = Cookie::new("uid", value).unwrap_err();
            assert!(matches!(err, HttpError::InvalidCookie { .. }), "accepted {value:?}");
        }
        assert!(Cookie::new("bad name", "1").is_err());
        assert!(Cookie::new("", "1").is_err());
        assert!(Cookie::new("a=b", "1").is_err());
        assert!(Cookie::builder("uid", "1").path("/; Secure").build().is_err());
        assert!(Cookie::builder("uid", "1").domain("ex\r\nample").build().is_err());
        assert!(Cookie::builder("uid", "1").domain("evil.example Secure").build().is_err());
        assert!(Cookie::builder("uid", "1").domain("example.com").path("/sync").build().is_ok());
    }
}
