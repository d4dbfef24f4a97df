//! Per-connection credentials.
//!
//! A [`Session`] is created for each configured connection and handed to the
//! client that uses it; cookie state is never shared between sessions.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One cookie from a Netscape-format cookie file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// Domain match per the cookie-file convention (leading dot = subdomains too).
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_lowercase();
        let host = host.to_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }

    /// Path prefix match on segment boundaries; `/api` covers `/api/v4` but not `/apis`.
    pub fn matches_path(&self, path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) => prefix.is_empty() || rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Whether the cookie may be sent with a request to `url`.
    pub fn applies_to(&self, url: &reqwest::Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        (!self.secure || url.scheme() == "https")
            && self.matches_host(host)
            && self.matches_path(url.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Cookies(Vec<Cookie>),
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct Session {
    credentials: Credentials,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Token auth wins over the cookie file; neither means anonymous.
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Some(token) = &config.token {
            return Ok(Self::new(Credentials::Token(token.clone())));
        }
        if let Some(path) = &config.cookie_path {
            let cookies = load_cookie_file(path)?;
            debug!(path = %path.display(), count = cookies.len(), "loaded auth cookies");
            return Ok(Self::new(Credentials::Cookies(cookies)));
        }
        Ok(Self::new(Credentials::Anonymous))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `Cookie` header value for a request URL, if any cookie applies.
    pub fn cookie_header(&self, url: &reqwest::Url) -> Option<String> {
        let Credentials::Cookies(cookies) = &self.credentials else {
            return None;
        };
        let header = cookies
            .iter()
            .filter(|c| c.applies_to(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    pub fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        url: &reqwest::Url,
    ) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::Cookies(_) => match self.cookie_header(url) {
                Some(header) => request.header(reqwest::header::COOKIE, header),
                None => request,
            },
            Credentials::Anonymous => request,
        }
    }
}

pub fn load_cookie_file(path: &Path) -> Result<Vec<Cookie>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_cookie_file(&contents))
}

/// Parses Netscape cookie-file lines: `domain  flag  path  secure  expiry  name  value`.
pub fn parse_cookie_file(contents: &str) -> Vec<Cookie> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                Some(rest) => rest,
                None if line.starts_with('#') => return None,
                None => line,
            };
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(Cookie {
                domain: fields[0].to_string(),
                path: fields[2].to_string(),
                secure: fields[3].eq_ignore_ascii_case("TRUE"),
                name: fields[5].to_string(),
                value: fields[6..].join("\t"),
            })
        })
        .collect()
}
