//! The user a sync runs on behalf of.

use serde::{Deserialize, Serialize};

/// The signed-in user whose pending records are uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUser {
    /// Login name, sent with every upload.
    pub user_name: String,
    /// Organisation the user belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
}

impl SyncUser {
    /// Creates a user without an organisation.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            organisation: None,
        }
    }

    /// Sets the organisation.
    pub fn with_organisation(mut self, organisation: impl Into<String>) -> Self {
        self.organisation = Some(organisation.into());
        self
    }
}
