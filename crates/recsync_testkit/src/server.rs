//! In-memory record server for loopback HTTP tests.
//!
//! Serves the same routes as a production server over
//! [`LoopbackClient`](recsync_engine::LoopbackClient), with hooks for
//! injecting failures and expiring the session.

use parking_lot::RwLock;
use recsync_engine::{HttpMethod, HttpRequest, HttpResponse, LoopbackServer};
use recsync_protocol::{
    BlacklistStatus, FormSection, IdRevisionMap, Record, RecordId, RemoteIndex, Revision,
};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Default)]
struct ServerState {
    records: BTreeMap<RecordId, Record>,
    media: BTreeMap<(RecordId, String), Vec<u8>>,
    blacklisted: bool,
    form_sections: Vec<FormSection>,
    token: Option<String>,
    failures: Vec<(String, u16)>,
    requests: Vec<(HttpMethod, String)>,
    next_hash: u32,
}

impl ServerState {
    /// Issues the revision following `previous`.
    fn next_revision(&mut self, previous: Option<&Revision>) -> Revision {
        let generation = previous
            .and_then(|rev| rev.as_str().split_once('-'))
            .and_then(|(generation, _)| generation.parse::<u32>().ok())
            .unwrap_or(0);
        self.next_hash += 1;
        Revision::new(format!("{}-{:06x}", generation + 1, self.next_hash))
    }
}

/// An in-memory record server.
#[derive(Default)]
pub struct MemoryServer {
    state: RwLock<ServerState>,
}

impl MemoryServer {
    /// Creates an empty server accepting any token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects requests not carrying `token` with 401.
    pub fn requiring_token(self, token: &str) -> Self {
        self.state.write().token = Some(token.to_string());
        self
    }

    /// Invalidates the session; every later request gets 401.
    pub fn expire_session(&self) {
        self.state.write().token = Some(String::new());
    }

    /// Stores a record as-is.
    pub fn insert(&self, record: Record) {
        self.state.write().records.insert(record.id.clone(), record);
    }

    /// Stores attachment bytes for a record.
    pub fn put_media(&self, record_id: &str, media_id: &str, data: Vec<u8>) {
        self.state
            .write()
            .media
            .insert((RecordId::new(record_id), media_id.to_string()), data);
    }

    /// Sets the revocation status for every device.
    pub fn set_blacklisted(&self, blacklisted: bool) {
        self.state.write().blacklisted = blacklisted;
    }

    /// Sets the published form sections.
    pub fn set_form_sections(&self, sections: Vec<FormSection>) {
        self.state.write().form_sections = sections;
    }

    /// Answers every request whose path starts with `prefix` with `status`.
    pub fn fail_path(&self, prefix: &str, status: u16) {
        self.state.write().failures.push((prefix.to_string(), status));
    }

    /// Removes injected failures.
    pub fn clear_failures(&self) {
        self.state.write().failures.clear();
    }

    /// Returns a stored record.
    pub fn record(&self, id: &str) -> Option<Record> {
        self.state.read().records.get(&RecordId::new(id)).cloned()
    }

    /// Returns the id → revision index served at `/api/records/ids`.
    pub fn index(&self) -> IdRevisionMap {
        self.state
            .read()
            .records
            .values()
            .filter_map(|r| r.revision.clone().map(|rev| (r.id.clone(), rev)))
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Requests received so far, as method and path.
    pub fn requests(&self) -> Vec<(HttpMethod, String)> {
        self.state.read().requests.clone()
    }

    fn json(result: recsync_protocol::ProtocolResult<Vec<u8>>) -> HttpResponse {
        match result {
            Ok(body) => HttpResponse::ok(body),
            Err(_) => HttpResponse::status(500),
        }
    }

    fn save(&self, body: Option<&[u8]>, path_id: Option<RecordId>) -> HttpResponse {
        let Some(mut record) = body.and_then(|b| Record::decode(b).ok()) else {
            return HttpResponse::status(400);
        };
        if path_id.is_some_and(|id| id != record.id) {
            return HttpResponse::status(400);
        }

        let mut state = self.state.write();
        let previous = state.records.get(&record.id).and_then(|r| r.revision.clone());
        if record.revision != previous {
            return HttpResponse::status(409);
        }
        record.revision = Some(state.next_revision(previous.as_ref()));
        state.records.insert(record.id.clone(), record.clone());
        Self::json(record.encode())
    }
}

impl LoopbackServer for MemoryServer {
    fn handle(&self, method: HttpMethod, path: &str, request: &HttpRequest) -> HttpResponse {
        {
            let mut state = self.state.write();
            state.requests.push((method, path.to_string()));

            if let Some(token) = &state.token {
                if request.auth_token.as_deref() != Some(token.as_str()) || token.is_empty() {
                    return HttpResponse::status(401);
                }
            }
            if let Some((_, status)) = state.failures.iter().find(|(p, _)| path.starts_with(p)) {
                return HttpResponse::status(*status);
            }
        }

        let Ok(segments) = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::decode(segment).map(Cow::into_owned))
            .collect::<Result<Vec<String>, _>>()
        else {
            return HttpResponse::status(400);
        };
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let body = request.body.as_deref();

        match (method, segments.as_slice()) {
            (HttpMethod::Post, ["api", "records"]) => self.save(body, None),
            (HttpMethod::Put, ["api", "records", id]) => self.save(body, Some(RecordId::new(*id))),
            (HttpMethod::Get, ["api", "records", "ids"]) => {
                Self::json(RemoteIndex::from_map(&self.index()).encode())
            }
            (HttpMethod::Get, ["api", "records", id]) => match self.record(id) {
                Some(record) => Self::json(record.encode()),
                None => HttpResponse::status(404),
            },
            (HttpMethod::Get, ["api", "records", id, "media", media_id]) => {
                let key = (RecordId::new(*id), media_id.to_string());
                match self.state.read().media.get(&key) {
                    Some(data) => HttpResponse::ok(data.clone()),
                    None => HttpResponse::status(404),
                }
            }
            (HttpMethod::Get, ["api", "is_blacklisted", _device]) => {
                let blacklisted = self.state.read().blacklisted;
                Self::json(BlacklistStatus { blacklisted }.encode())
            }
            (HttpMethod::Get, ["api", "form_sections"]) => {
                Self::json(FormSection::encode_list(&self.state.read().form_sections))
            }
            _ => HttpResponse::status(404),
        }
    }
}
