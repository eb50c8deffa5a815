//! HTTP client for the Route 53 REST API.

use super::signer::{amz_date, canonical_query, uri_encode, Credentials, SigningRequest};
use super::{Change, ChangeResponse, HostedZone, ResourceRecordSet, Route53Api};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://route53.amazonaws.com";
const API_VERSION: &str = "2013-04-01";
const XMLNS: &str = "https://route53.amazonaws.com/doc/2013-04-01/";
const SERVICE: &str = "route53";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where requests go and which region they are signed for.
///
/// Route 53 is a global service, so the configured region only selects the
/// partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route53Endpoint {
    pub base_url: String,
    pub signing_region: String,
}

impl Route53Endpoint {
    /// Resolve the endpoint for a configured region.
    pub fn for_region(region: &str) -> Self {
        let (base_url, signing_region) = if region.starts_with("cn-") {
            ("https://route53.amazonaws.com.cn", "cn-northwest-1")
        } else if region.starts_with("us-gov-") {
            ("https://route53.us-gov.amazonaws.com", "us-gov-west-1")
        } else {
            (DEFAULT_BASE_URL, "us-east-1")
        };

        Self {
            base_url: base_url.to_string(),
            signing_region: signing_region.to_string(),
        }
    }

    /// An explicit endpoint, signed for the region's partition.
    pub fn custom(base_url: impl Into<String>, region: &str) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::for_region(region)
        }
    }
}

/// Route 53 client.
pub struct Route53Client {
    client: reqwest::Client,
    credentials: Credentials,
    endpoint: Route53Endpoint,
}

// Wire format: ListHostedZones

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListHostedZonesResponse {
    #[serde(default)]
    hosted_zones: HostedZones,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HostedZones {
    #[serde(rename = "HostedZone", default)]
    items: Vec<WireHostedZone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireHostedZone {
    id: String,
    name: String,
}

// Wire format: ListResourceRecordSets

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListResourceRecordSetsResponse {
    #[serde(default)]
    resource_record_sets: ResourceRecordSets,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_record_name: Option<String>,
    #[serde(default)]
    next_record_type: Option<String>,
    #[serde(default)]
    next_record_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceRecordSets {
    #[serde(rename = "ResourceRecordSet", default)]
    items: Vec<WireRecordSet>,
}

#[derive(Debug, Deserialize)]
struct WireRecordSet {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "TTL", default)]
    ttl: Option<u32>,
    #[serde(rename = "ResourceRecords", default)]
    resource_records: WireRecords,
}

#[derive(Debug, Default, Deserialize)]
struct WireRecords {
    #[serde(rename = "ResourceRecord", default)]
    items: Vec<WireRecordValue>,
}

#[derive(Debug, Deserialize)]
struct WireRecordValue {
    #[serde(rename = "Value")]
    value: String,
}

// Wire format: ChangeResourceRecordSets

#[derive(Debug, Serialize)]
#[serde(rename = "ChangeResourceRecordSetsRequest")]
struct ChangeRequest<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "ChangeBatch")]
    change_batch: ChangeBatchOut<'a>,
}

#[derive(Debug, Serialize)]
struct ChangeBatchOut<'a> {
    #[serde(rename = "Changes")]
    changes: ChangesOut<'a>,
}

#[derive(Debug, Serialize)]
struct ChangesOut<'a> {
    #[serde(rename = "Change")]
    items: Vec<ChangeOut<'a>>,
}

#[derive(Debug, Serialize)]
struct ChangeOut<'a> {
    #[serde(rename = "Action")]
    action: &'static str,
    #[serde(rename = "ResourceRecordSet")]
    record: RecordSetOut<'a>,
}

#[derive(Debug, Serialize)]
struct RecordSetOut<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Type")]
    record_type: &'a str,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(rename = "ResourceRecords")]
    resource_records: RecordsOut<'a>,
}

#[derive(Debug, Serialize)]
struct RecordsOut<'a> {
    #[serde(rename = "ResourceRecord")]
    items: Vec<RecordValueOut<'a>>,
}

#[derive(Debug, Serialize)]
struct RecordValueOut<'a> {
    #[serde(rename = "Value")]
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChangeResourceRecordSetsResponse {
    #[serde(rename = "ChangeInfo")]
    change_info: ChangeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeInfo {
    id: String,
    status: String,
}

// Wire format: errors

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Error")]
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvalidChangeBatch {
    #[serde(rename = "Messages")]
    messages: ErrorMessages,
}

#[derive(Debug, Deserialize)]
struct ErrorMessages {
    #[serde(rename = "Message", default)]
    items: Vec<String>,
}

impl Route53Client {
    /// Create a client for the partition of `region`.
    pub fn new(credentials: Credentials, region: &str) -> Self {
        Self::with_endpoint(credentials, Route53Endpoint::for_region(region))
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Self {
        Self::with_endpoint(credentials, Route53Endpoint::custom(base_url, "us-east-1"))
    }

    pub fn with_endpoint(credentials: Credentials, endpoint: Route53Endpoint) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            credentials,
            endpoint,
        }
    }

    /// Sign and send one request, returning the status and raw body.
    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<String>,
    ) -> Result<(StatusCode, String)> {
        let base = format!("{}{}", self.endpoint.base_url.trim_end_matches('/'), path);
        let url = reqwest::Url::parse(&base)
            .map_err(|e| DdnsError::api(operation, format!("invalid endpoint {}: {}", base, e)))?;

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(DdnsError::api(operation, format!("endpoint {} has no host", base)))
            }
        };

        let now = Utc::now();
        let date = amz_date(now);
        let payload = body.as_deref().unwrap_or_default();

        let mut headers = vec![("host", host), ("x-amz-date", date.clone())];
        if body.is_some() {
            headers.push(("content-type", "application/xml".to_string()));
        }

        let authorization = self.credentials.authorization(
            &SigningRequest {
                method: method.as_str(),
                path: url.path(),
                query,
                headers: &headers,
                payload: payload.as_bytes(),
            },
            &self.endpoint.signing_region,
            SERVICE,
            now,
        );

        let query_string = canonical_query(query);
        let target = if query_string.is_empty() {
            base
        } else {
            format!("{}?{}", base, query_string)
        };

        let mut request = self
            .client
            .request(method, &target)
            .header("x-amz-date", date)
            .header("Authorization", authorization);
        if let Some(body) = body {
            request = request.header("Content-Type", "application/xml").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DdnsError::api(operation, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DdnsError::api(operation, e.to_string()))?;

        Ok((status, text))
    }

    /// GET a listing page and decode it, turning error responses into errors.
    async fn get_xml<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let (status, text) = self.send(operation, Method::GET, path, query, None).await?;

        if !status.is_success() {
            return Err(DdnsError::api(
                operation,
                format!("HTTP {}: {}", status.as_u16(), error_message(&text)),
            ));
        }

        quick_xml::de::from_str(&text)
            .map_err(|e| DdnsError::api(operation, format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl Route53Api for Route53Client {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>> {
        let path = format!("/{}/hostedzone", API_VERSION);
        let mut zones = Vec::new();
        let mut query = Vec::new();

        loop {
            let page: ListHostedZonesResponse =
                self.get_xml("ListHostedZones", &path, &query).await?;
            zones.extend(page.hosted_zones.items.into_iter().map(|z| HostedZone {
                id: z.id,
                name: z.name,
            }));

            match (page.is_truncated, page.next_marker) {
                (true, Some(marker)) => {
                    tracing::debug!("Hosted zone listing continues at {}", marker);
                    query = vec![("marker".to_string(), marker)];
                }
                _ => break,
            }
        }

        Ok(zones)
    }

    async fn list_resource_record_sets(&self, zone_id: &str) -> Result<Vec<ResourceRecordSet>> {
        let path = format!(
            "/{}/hostedzone/{}/rrset",
            API_VERSION,
            uri_encode(zone_id.trim_start_matches("/hostedzone/"), true)
        );
        let mut records = Vec::new();
        let mut query = Vec::new();

        loop {
            let page: ListResourceRecordSetsResponse =
                self.get_xml("ListResourceRecordSets", &path, &query).await?;
            records.extend(page.resource_record_sets.items.into_iter().map(|r| {
                ResourceRecordSet {
                    name: r.name,
                    record_type: r.record_type,
                    ttl: r.ttl,
                    values: r.resource_records.items.into_iter().map(|v| v.value).collect(),
                }
            }));

            if !page.is_truncated {
                break;
            }
            let Some(name) = page.next_record_name else {
                break;
            };

            query = vec![("name".to_string(), name)];
            if let Some(record_type) = page.next_record_type {
                query.push(("type".to_string(), record_type));
            }
            if let Some(identifier) = page.next_record_identifier {
                query.push(("identifier".to_string(), identifier));
            }
        }

        Ok(records)
    }

    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        changes: Vec<Change>,
    ) -> Result<ChangeResponse> {
        let path = format!(
            "/{}/hostedzone/{}/rrset/",
            API_VERSION,
            uri_encode(zone_id.trim_start_matches("/hostedzone/"), true)
        );
        let body = change_batch_xml(&changes)?;

        let (status, text) = self
            .send("ChangeResourceRecordSets", Method::POST, &path, &[], Some(body))
            .await?;

        if !status.is_success() {
            return Ok(ChangeResponse {
                http_status: status.as_u16(),
                change_id: None,
                status: None,
                message: Some(error_message(&text)),
            });
        }

        let info = quick_xml::de::from_str::<ChangeResourceRecordSetsResponse>(&text)
            .map(|r| r.change_info)
            .map_err(|e| {
                DdnsError::api("ChangeResourceRecordSets", format!("malformed response: {}", e))
            })?;

        Ok(ChangeResponse {
            http_status: status.as_u16(),
            change_id: Some(info.id),
            status: Some(info.status),
            message: None,
        })
    }
}

/// Render a change batch as a `ChangeResourceRecordSetsRequest` document.
fn change_batch_xml(changes: &[Change]) -> Result<String> {
    let request = ChangeRequest {
        xmlns: XMLNS,
        change_batch: ChangeBatchOut {
            changes: ChangesOut {
                items: changes
                    .iter()
                    .map(|change| ChangeOut {
                        action: change.action.as_str(),
                        record: RecordSetOut {
                            name: &change.record.name,
                            record_type: &change.record.record_type,
                            ttl: change.record.ttl,
                            resource_records: RecordsOut {
                                items: change
                                    .record
                                    .values
                                    .iter()
                                    .map(|value| RecordValueOut { value })
                                    .collect(),
                            },
                        },
                    })
                    .collect(),
            },
        },
    };

    let xml = quick_xml::se::to_string(&request)?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
}

/// Best-effort extraction of the message from a Route 53 error body.
fn error_message(body: &str) -> String {
    if let Ok(response) = quick_xml::de::from_str::<ErrorResponse>(body) {
        let code = response.error.code.unwrap_or_default();
        let message = response.error.message.unwrap_or_default();
        return match (code.is_empty(), message.is_empty()) {
            (false, false) => format!("{}: {}", code, message),
            (false, true) => code,
            _ => message,
        };
    }

    if let Ok(batch) = quick_xml::de::from_str::<InvalidChangeBatch>(body) {
        if !batch.messages.items.is_empty() {
            return batch.messages.items.join("; ");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}
