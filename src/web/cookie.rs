use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::CookieSettings;
use crate::error::{AccessError, AccessResult};

/// Look up a named cookie in the request's `Cookie` headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

/// Build a `Set-Cookie` header value with the configured attributes.
pub fn set_cookie(name: &str, value: &str, settings: &CookieSettings) -> AccessResult<HeaderValue> {
    let mut s = format!("{}={}; Path={}", name, value, settings.path);
    if settings.http_only { s.push_str("; HttpOnly"); }
    if settings.secure { s.push_str("; Secure"); }
    s.push_str("; SameSite=");
    s.push_str(settings.same_site.as_str());
    if let Some(max_age) = settings.max_age_secs {
        s.push_str(&format!("; Max-Age={}", max_age));
    }
    HeaderValue::from_str(&s).map_err(|e| AccessError::Config(format!("cookie header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSite;

    #[test]
    fn finds_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sid=abc.def=; lang=en"));
        assert_eq!(parse_cookie(&headers, "sid").as_deref(), Some("abc.def="));
        assert_eq!(parse_cookie(&headers, "lang").as_deref(), Some("en"));
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn reads_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(parse_cookie(&headers, "b").as_deref(), Some("2"));
    }

    #[test]
    fn default_attributes() {
        let v = set_cookie("sid", "tok", &CookieSettings::default()).unwrap();
        assert_eq!(v.to_str().unwrap(), "sid=tok; Path=/; HttpOnly; Secure; SameSite=Strict");
    }

    #[test]
    fn custom_attributes() {
        let settings = CookieSettings {
            path: "/app".into(),
            http_only: false,
            secure: false,
            same_site: SameSite::Lax,
            max_age_secs: Some(3600),
        };
        let v = set_cookie("sid", "tok", &settings).unwrap();
        assert_eq!(v.to_str().unwrap(), "sid=tok; Path=/app; SameSite=Lax; Max-Age=3600");
    }
}
