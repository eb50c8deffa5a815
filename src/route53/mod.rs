//! Route 53 management API: record types, the transport trait and its HTTP client.

mod client;
mod signer;


pub use client::{Route53Client, Route53Endpoint};
pub use signer::{Credentials, SigningRequest};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// TTL applied to every record this crate writes.
pub const RECORD_TTL: u32 = 300;

/// A hosted zone as listed by Route 53.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// Zone id, either bare (`Z1`) or prefixed (`/hostedzone/Z1`).
    pub id: String,
    /// Zone name with its trailing dot (`example.com.`).
    pub name: String,
}

impl HostedZone {
    /// The id without the `/hostedzone/` prefix.
    pub fn bare_id(&self) -> &str {
        self.id.trim_start_matches("/hostedzone/")
    }
}

/// A resource record set inside a hosted zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl: Option<u32>,
    pub values: Vec<String>,
}

impl ResourceRecordSet {
    /// A single-value A record with the fixed TTL.
    pub fn a_record(name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: "A".to_string(),
            ttl: Some(RECORD_TTL),
            values: vec![ip.into()],
        }
    }
}

/// Change batch action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Upsert,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Upsert => "UPSERT",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub action: ChangeAction,
    pub record: ResourceRecordSet,
}

/// What Route 53 answered to a change batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeResponse {
    /// HTTP status code of the submission.
    pub http_status: u16,
    /// Change id (`/change/C...`) when the batch was accepted.
    pub change_id: Option<String>,
    /// `PENDING` or `INSYNC` when the batch was accepted.
    pub status: Option<String>,
    /// Error message extracted from a rejected batch.
    pub message: Option<String>,
}

impl ChangeResponse {
    pub fn is_success(&self) -> bool {
        self.http_status == 200
    }
}

/// The three Route 53 operations reconciliation needs.
///
/// Listing operations return every page. Transport failures and error
/// responses on listings surface as `DdnsError::ProviderApi`; a change batch
/// that reaches Route 53 always comes back as a [`ChangeResponse`] so the
/// caller decides how to treat a non-success status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Route53Api: Send + Sync {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>>;

    async fn list_resource_record_sets(&self, zone_id: &str) -> Result<Vec<ResourceRecordSet>>;

    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        changes: Vec<Change>,
    ) -> Result<ChangeResponse>;
}
