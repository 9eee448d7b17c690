//! Blocking HTTP client for the Birddog service.
//!
//! One [`ApiClient`] is shared by the CLI and the TUI runtime workers.
//! The service uses a cookie session, so the underlying reqwest client
//! keeps a cookie store and a single `login` call authenticates every
//! later request in the process.
//!
//! Failure handling is deliberately uniform: transport failures,
//! non-success statuses, and undecodable payloads each map to one
//! [`BdError`] variant and are surfaced at the call site: no retries,
//! no propagation of typed sub-errors.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::api::types::{
    ApiAck, PageData, PathEntry, TranslateResponse, TranslationTask, UnresolvedResponse,
    WatchlistEntry,
};
use crate::core::config::Config;
use crate::core::errors::{BdError, Result};
use crate::core::record::{Branch, RecordPath};

/// Parameters of a `GET /page` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub archive: String,
    pub subarchive: String,
    pub fond: Option<String>,
    pub opus: Option<String>,
    pub case: Option<String>,
    /// Request machine translation of the page.
    pub translate: bool,
    /// Compare against this historical version's modification date.
    pub compare: Option<String>,
}

impl PageRequest {
    /// Request for a branch landing page.
    #[must_use]
    pub fn branch(archive: impl Into<String>, subarchive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            subarchive: subarchive.into(),
            ..Self::default()
        }
    }

    /// Request for the record a tree node points at, comparing against
    /// its last-resolved version when one exists.
    pub fn for_record(path: &RecordPath, compare: Option<String>) -> Self {
        Self {
            archive: path.branch.archive.clone(),
            subarchive: path.branch.subarchive.clone(),
            fond: path.fond.clone(),
            opus: path.opus.clone(),
            case: path.case.clone(),
            translate: false,
            compare,
        }
    }
}

/// Shared blocking client for all service endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    base: Arc<Url>,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.service.base_url, config.timeout())
    }

    /// Build a client against an explicit base URL.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| BdError::InvalidConfig {
            details: format!("invalid service base URL {base_url:?}: {e}"),
        })?;
        let http = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| BdError::Runtime {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base: Arc::new(base),
        })
    }

    // ── session ──

    /// Log in and establish the session cookie.
    pub fn login(&self, email: &str, password: &str) -> Result<ApiAck> {
        self.post_json("/login", &json!({ "email": email, "password": password }))
    }

    /// Create an account; the service also logs the new user in.
    pub fn signup(&self, name: &str, email: &str, password: &str) -> Result<ApiAck> {
        self.post_json(
            "/signup",
            &json!({ "name": name, "email": email, "password": password }),
        )
    }

    /// Change the logged-in user's password.
    pub fn change_password(&self, current: &str, new: &str) -> Result<ApiAck> {
        self.post_json("/change_password", &json!({ "current": current, "new": new }))
    }

    /// Request a password-reset email.
    pub fn reset_password(&self, email: &str) -> Result<ApiAck> {
        self.post_json("/reset_password", &json!({ "email": email }))
    }

    /// End the session; the service invalidates the cookie.
    pub fn logout(&self) -> Result<()> {
        let url = join(&self.base, &["logout"]);
        let endpoint = url.path().to_owned();
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| transport(&endpoint, &e))?;
        check_status(&endpoint, &response)?;
        Ok(())
    }

    // ── archives and pages ──

    /// All known archive/subarchive pairs.
    pub fn archives(&self) -> Result<Vec<(String, String)>> {
        self.get_json(&archives_url(&self.base))
    }

    /// Fetch a record page.
    pub fn page(&self, request: &PageRequest) -> Result<PageData> {
        self.get_json(&page_url(&self.base, request))
    }

    /// Export a record page as a spreadsheet; returns the raw xlsx bytes.
    pub fn download(&self, request: &PageRequest) -> Result<Vec<u8>> {
        let url = download_url(&self.base, request);
        let endpoint = url.path().to_owned();
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| transport(&endpoint, &e))?;
        check_status(&endpoint, &response)?;
        let bytes = response.bytes().map_err(|e| transport(&endpoint, &e))?;
        Ok(bytes.to_vec())
    }

    // ── watchlist ──

    /// The user's watched branches.
    pub fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        self.get_json(&join(&self.base, &["watchlist"]))
    }

    /// Start watching a branch from `cutoff_date` onward.
    pub fn add_watch(&self, branch: &Branch, cutoff_date: &str) -> Result<ApiAck> {
        self.post_json(
            "/watchlist",
            &json!({
                "archive": branch.archive,
                "subarchive": branch.subarchive,
                "cutoff_date": cutoff_date,
            }),
        )
    }

    /// Stop watching a branch.
    pub fn remove_watch(&self, branch: &Branch) -> Result<()> {
        let url = join(&self.base, &["watchlist", &branch.archive, &branch.subarchive]);
        let endpoint = url.path().to_owned();
        let response = self
            .http
            .delete(url)
            .send()
            .map_err(|e| transport(&endpoint, &e))?;
        check_status(&endpoint, &response)?;
        Ok(())
    }

    /// Re-check one branch for updates; returns the flat unresolved set.
    pub fn check(&self, branch: &Branch) -> Result<Vec<PathEntry>> {
        let mut url = join(
            &self.base,
            &["watchlist", &branch.archive, &branch.subarchive, "check"],
        );
        url.query_pairs_mut().append_key_only("tree");
        let resp: UnresolvedResponse = self.get_json(&url)?;
        Ok(resp.unresolved)
    }

    /// Resolve the record at `path`, cascading to the whole subtree when
    /// `deep`. Returns the branch's remaining unresolved set.
    pub fn resolve(&self, path: &RecordPath, deep: bool) -> Result<Vec<PathEntry>> {
        let resp: UnresolvedResponse = self.get_json(&resolve_url(&self.base, path, deep))?;
        Ok(resp.unresolved)
    }

    // ── translation ──

    /// Start translating the record at `path`; returns active tasks.
    pub fn translate(&self, path: &RecordPath) -> Result<Vec<TranslationTask>> {
        let mut segments = vec!["translate", &path.branch.archive, &path.branch.subarchive];
        segments.extend(path.descent());
        let resp: TranslateResponse = self.get_json(&join(&self.base, &segments))?;
        Ok(resp.translations)
    }

    /// Poll progress of the user's active translations.
    pub fn translate_poll(&self) -> Result<Vec<TranslationTask>> {
        let resp: TranslateResponse = self.get_json(&join(&self.base, &["translate"]))?;
        Ok(resp.translations)
    }

    // ── plumbing ──

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let endpoint = url.path().to_owned();
        let response = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| transport(&endpoint, &e))?;
        decode(&endpoint, response)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let url = self.base.join(path.trim_start_matches('/')).map_err(|e| {
            BdError::Runtime {
                details: format!("bad endpoint path {path:?}: {e}"),
            }
        })?;
        let endpoint = url.path().to_owned();
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .map_err(|e| transport(&endpoint, &e))?;
        decode(&endpoint, response)
    }
}

fn transport(endpoint: &str, err: &reqwest::Error) -> BdError {
    BdError::Transport {
        endpoint: endpoint.to_owned(),
        details: err.to_string(),
    }
}

fn check_status(endpoint: &str, response: &reqwest::blocking::Response) -> Result<()> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(BdError::NotLoggedIn);
    }
    if !status.is_success() {
        return Err(BdError::Status {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(endpoint: &str, response: reqwest::blocking::Response) -> Result<T> {
    check_status(endpoint, &response)?;
    response.json().map_err(|e| BdError::MalformedResponse {
        endpoint: endpoint.to_owned(),
        details: e.to_string(),
    })
}

fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Config validation guarantees an http(s) base, for which
    // path_segments_mut always succeeds.
    if let Ok(mut parts) = url.path_segments_mut() {
        parts.pop_if_empty();
        for segment in segments {
            parts.push(segment);
        }
    }
    url
}

fn archives_url(base: &Url) -> Url {
    join(base, &["archives"])
}

fn page_url(base: &Url, request: &PageRequest) -> Url {
    record_url(base, "page", request)
}

// The export endpoint resolves the page from the same query keys.
fn download_url(base: &Url, request: &PageRequest) -> Url {
    record_url(base, "download", request)
}

fn record_url(base: &Url, endpoint: &str, request: &PageRequest) -> Url {
    let mut url = join(base, &[endpoint]);
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("archive", &request.archive);
        q.append_pair("subarchive", &request.subarchive);
        q.append_pair("fond", request.fond.as_deref().unwrap_or_default());
        q.append_pair("opus", request.opus.as_deref().unwrap_or_default());
        q.append_pair("case", request.case.as_deref().unwrap_or_default());
        if request.translate {
            q.append_key_only("translate");
        }
        if let Some(compare) = &request.compare {
            q.append_pair("compare", compare);
        }
    }
    url
}

fn resolve_url(base: &Url, path: &RecordPath, deep: bool) -> Url {
    let mut segments = vec!["resolve", &path.branch.archive, &path.branch.subarchive];
    segments.extend(path.descent());
    let mut url = join(base, &segments);
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("tree", "1");
        if deep {
            q.append_pair("deep", "1");
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:2002").unwrap()
    }

    #[test]
    fn join_builds_nested_segments() {
        let url = join(&base(), &["watchlist", "DAZHO", "R", "check"]);
        assert_eq!(url.as_str(), "http://localhost:2002/watchlist/DAZHO/R/check");
    }

    #[test]
    fn join_percent_encodes_segments() {
        let url = join(&base(), &["resolve", "DAZHO", "R", "фонд 1"]);
        assert_eq!(
            url.path(),
            "/resolve/DAZHO/R/%D1%84%D0%BE%D0%BD%D0%B4%201"
        );
    }

    #[test]
    fn page_url_includes_all_levels() {
        let request = PageRequest {
            archive: "DAZHO".to_owned(),
            subarchive: "R".to_owned(),
            fond: Some("177".to_owned()),
            opus: Some("1".to_owned()),
            case: None,
            translate: false,
            compare: None,
        };
        let url = page_url(&base(), &request);
        assert_eq!(
            url.as_str(),
            "http://localhost:2002/page?archive=DAZHO&subarchive=R&fond=177&opus=1&case="
        );
    }

    #[test]
    fn page_url_carries_translate_and_compare() {
        let request = PageRequest {
            translate: true,
            compare: Some("2024-05-01".to_owned()),
            ..PageRequest::branch("DAZHO", "R")
        };
        let url = page_url(&base(), &request);
        let query = url.query().unwrap();
        assert!(query.contains("translate"));
        assert!(query.contains("compare=2024-05-01"));
    }

    #[test]
    fn download_url_mirrors_page_query() {
        let request = PageRequest {
            fond: Some("177".to_owned()),
            ..PageRequest::branch("DAZHO", "R")
        };
        let url = download_url(&base(), &request);
        assert_eq!(url.path(), "/download");
        assert_eq!(url.query(), page_url(&base(), &request).query());
    }

    #[test]
    fn resolve_url_descends_record_path() {
        let path = RecordPath::parse("DAZHO-R/177/1/203").unwrap();
        let url = resolve_url(&base(), &path, false);
        assert_eq!(
            url.as_str(),
            "http://localhost:2002/resolve/DAZHO/R/177/1/203?tree=1"
        );
    }

    #[test]
    fn resolve_url_sets_deep_flag() {
        let path = RecordPath::parse("DAZHO-R/177").unwrap();
        let url = resolve_url(&base(), &path, true);
        assert_eq!(
            url.as_str(),
            "http://localhost:2002/resolve/DAZHO/R/177?tree=1&deep=1"
        );
    }

    #[test]
    fn base_url_with_path_prefix_is_preserved() {
        let prefixed = Url::parse("http://example.org/birddog/").unwrap();
        let url = join(&prefixed, &["watchlist"]);
        assert_eq!(url.as_str(), "http://example.org/birddog/watchlist");
    }

    #[test]
    fn page_request_for_record_carries_compare() {
        let path = RecordPath::parse("DAZHO-R/177/1").unwrap();
        let request = PageRequest::for_record(&path, Some("2024-04-30".to_owned()));
        assert_eq!(request.archive, "DAZHO");
        assert_eq!(request.subarchive, "R");
        assert_eq!(request.fond.as_deref(), Some("177"));
        assert_eq!(request.opus.as_deref(), Some("1"));
        assert_eq!(request.case, None);
        assert_eq!(request.compare.as_deref(), Some("2024-04-30"));
    }
}
