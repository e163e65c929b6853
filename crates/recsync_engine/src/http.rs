//! HTTP adapters for the remote collaborators.
//!
//! The actual HTTP client is abstracted via a trait so any library (ureq,
//! reqwest, hyper) or an in-process loopback can carry the requests. Bodies
//! are JSON documents from `recsync_protocol`.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Purpose                 |
//! |--------|---------------------------------------|-------------------------|
//! | POST   | `/api/records`                        | upload a new record     |
//! | PUT    | `/api/records/{id}`                   | upload a changed record |
//! | GET    | `/api/records/ids`                    | remote id/revision index|
//! | GET    | `/api/records/{id}`                   | fetch one record        |
//! | GET    | `/api/records/{id}/media/{media_id}`  | fetch one attachment    |
//! | GET    | `/api/is_blacklisted/{device_id}`     | revocation status       |
//! | GET    | `/api/form_sections`                  | published form schema   |

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::ports::{FormMetadataSource, LocalWipe, RecordStore, RemoteSyncClient, RevocationService};
use parking_lot::RwLock;
use recsync_protocol::{
    ids_to_download, BlacklistStatus, FormSection, Media, ProtocolError, Record, RecordId,
    RemoteIndex, SyncUser,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Header carrying the uploading user's name.
pub const USER_HEADER: &str = "X-Sync-User";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Bearer token for the session, if signed in.
    pub auth_token: Option<String>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
    /// Time the client may spend on the request.
    pub timeout: Duration,
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 response with a body.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// An empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// `Err` means the request never produced a response, for example on a
/// refused connection or when `HttpRequest::timeout` elapsed.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Maps a non-2xx status to the error taxonomy.
///
/// `record` is the record the request was about, if any; a 404 for it
/// becomes `NotFound`.
fn status_error(status: u16, url: &str, record: Option<&RecordId>) -> SyncError {
    match (status, record) {
        (401 | 403, _) => SyncError::AuthExpired(format!("{status} from {url}")),
        (404, Some(id)) => SyncError::NotFound(id.clone()),
        (408 | 429 | 500..=599, _) => {
            SyncError::transport_retryable(format!("{status} from {url}"))
        }
        _ => SyncError::transport_fatal(format!("{status} from {url}")),
    }
}

/// Base URL, session token and client shared by the adapters.
struct Endpoint<C: HttpClient> {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
    client: C,
}

impl<C: HttpClient> Endpoint<C> {
    fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            timeout: config.timeout,
            client,
        }
    }

    fn call(
        &self,
        method: HttpMethod,
        path: &str,
        headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        record: Option<&RecordId>,
    ) -> SyncResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(?method, %url, "http request");

        let response = self
            .client
            .send(HttpRequest {
                method,
                url: url.clone(),
                headers,
                auth_token: self.auth_token.clone(),
                body,
                timeout: self.timeout,
            })
            .map_err(SyncError::transport_retryable)?;

        if !response.is_success() {
            return Err(status_error(response.status, &url, record));
        }
        Ok(response.body)
    }

    fn get(&self, path: &str, record: Option<&RecordId>) -> SyncResult<Vec<u8>> {
        self.call(HttpMethod::Get, path, Vec::new(), None, record)
    }
}

/// `RemoteSyncClient` over HTTP.
///
/// Holds the local store to write confirmed uploads back and to diff the
/// remote index against local revisions.
pub struct HttpSyncClient<C: HttpClient, S: RecordStore> {
    endpoint: Endpoint<C>,
    store: Arc<S>,
}

impl<C: HttpClient, S: RecordStore> HttpSyncClient<C, S> {
    /// Creates a client for the configured server.
    pub fn new(config: &SyncConfig, client: C, store: Arc<S>) -> Self {
        Self {
            endpoint: Endpoint::new(config, client),
            store,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }
}

impl<C: HttpClient, S: RecordStore> RemoteSyncClient for HttpSyncClient<C, S> {
    /// New records are POSTed, known ones PUT. The confirmed copy the server
    /// returns replaces the local one, which clears its pending state.
    fn upload(&self, record: &Record, user: &SyncUser) -> SyncResult<()> {
        let (method, path) = if record.is_new() {
            (HttpMethod::Post, "/api/records".to_string())
        } else {
            (
                HttpMethod::Put,
                format!("/api/records/{}", urlencoding::encode(record.id.as_str())),
            )
        };
        let headers = vec![(USER_HEADER.to_string(), user.user_name.clone())];

        let body = self
            .endpoint
            .call(method, &path, headers, Some(record.encode()?), None)?;
        let confirmed = Record::decode(&body)?;

        if confirmed.id != record.id {
            return Err(ProtocolError::invalid_structure(format!(
                "server confirmed {} as {}",
                record.id, confirmed.id
            ))
            .into());
        }
        self.store.update(confirmed)
    }

    fn remote_identifiers_to_download(&self) -> SyncResult<Vec<RecordId>> {
        let body = self.endpoint.get("/api/records/ids", None)?;
        let remote = RemoteIndex::decode(&body)?.into_map()?;
        let local = self.store.local_identifiers_and_revisions()?;
        let ids = ids_to_download(&remote, &local);
        debug!(remote = remote.len(), local = local.len(), selected = ids.len(), "remote index diffed");
        Ok(ids)
    }

    fn fetch_record(&self, id: &RecordId) -> SyncResult<Record> {
        let path = format!("/api/records/{}", urlencoding::encode(id.as_str()));
        let body = self.endpoint.get(&path, Some(id))?;
        Ok(Record::decode(&body)?)
    }

    fn fetch_media(&self, record: &Record) -> SyncResult<Vec<Media>> {
        record
            .media
            .iter()
            .map(|reference| {
                let path = format!(
                    "/api/records/{}/media/{}",
                    urlencoding::encode(record.id.as_str()),
                    urlencoding::encode(reference.id.as_str())
                );
                let data = self.endpoint.get(&path, Some(&record.id))?;
                Ok(Media::new(reference.clone(), data))
            })
            .collect()
    }
}

/// `RevocationService` that asks the server and wipes locally.
pub struct HttpRevocationService<C: HttpClient, W: LocalWipe> {
    endpoint: Endpoint<C>,
    device_id: String,
    target: Arc<W>,
}

impl<C: HttpClient, W: LocalWipe> HttpRevocationService<C, W> {
    /// Creates a service for the configured device.
    pub fn new(config: &SyncConfig, client: C, target: Arc<W>) -> Self {
        Self {
            endpoint: Endpoint::new(config, client),
            device_id: config.device_id.clone(),
            target,
        }
    }
}

impl<C: HttpClient, W: LocalWipe> RevocationService for HttpRevocationService<C, W> {
    fn is_revoked(&self) -> SyncResult<bool> {
        let path = format!("/api/is_blacklisted/{}", urlencoding::encode(&self.device_id));
        let body = self.endpoint.get(&path, None)?;
        Ok(BlacklistStatus::decode(&body)?.blacklisted)
    }

    fn wipe(&self) -> SyncResult<()> {
        self.target.wipe_local_data()
    }
}

/// `FormMetadataSource` over HTTP, caching the last fetched sections.
pub struct HttpFormSource<C: HttpClient> {
    endpoint: Endpoint<C>,
    sections: RwLock<Vec<FormSection>>,
}

impl<C: HttpClient> HttpFormSource<C> {
    /// Creates a source for the configured server.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            endpoint: Endpoint::new(config, client),
            sections: RwLock::new(Vec::new()),
        }
    }

    /// Sections installed by the last fetch, in display order.
    pub fn sections(&self) -> Vec<FormSection> {
        self.sections.read().clone()
    }
}

impl<C: HttpClient> FormMetadataSource for HttpFormSource<C> {
    fn fetch_published_forms(&self) -> SyncResult<usize> {
        let body = self.endpoint.get("/api/form_sections", None)?;
        let sections = FormSection::decode_list(&body)?;
        let count = sections.len();
        *self.sections.write() = sections;
        Ok(count)
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request for `path` (everything after the host).
    fn handle(&self, method: HttpMethod, path: &str, request: &HttpRequest) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer> Clone for LoopbackClient<S> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let path = request
            .url
            .find("/api/")
            .map(|i| request.url[i..].to_string())
            .ok_or_else(|| format!("no route for {}", request.url))?;
        Ok(self.server.handle(request.method, &path, &request))
    }
}
