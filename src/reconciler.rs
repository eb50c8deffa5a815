//! Keeps one A record per domain pointed at a given address.

use crate::error::{DdnsError, Result};
use crate::route53::{Change, ChangeAction, HostedZone, ResourceRecordSet, Route53Api};
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

/// What a reconciliation did to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileOutcome::Created => "created",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Ensures a domain's A record resolves to an address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsReconciler: Send + Sync {
    async fn create_or_update(&self, ip: Ipv4Addr, domain: &str) -> Result<ReconcileOutcome>;
}

/// Reconciler that talks to Route 53.
pub struct Route53Reconciler<A> {
    api: A,
}

/// First zone that can hold `domain`.
///
/// A zone matches when its name contains the domain, or when the domain is
/// the zone apex or a name below it (`a.example.com` in `example.com.`).
/// Matching is case-sensitive, so when several zones qualify
/// (`example.com.` and `sub.example.com.`) the first listed wins even if it
/// is not the closest suffix.
pub fn select_zone<'a>(zones: &'a [HostedZone], domain: &str) -> Option<&'a HostedZone> {
    zones.iter().find(|zone| {
        let bare = zone.name.trim_end_matches('.');
        zone.name.contains(domain) || (!bare.is_empty() && is_within(domain, bare))
    })
}

fn is_within(domain: &str, zone: &str) -> bool {
    domain == zone
        || domain
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// The record the reconciler owns: the first A record named `domain.`.
pub fn find_a_record<'a>(
    records: &'a [ResourceRecordSet],
    domain: &str,
) -> Option<&'a ResourceRecordSet> {
    let fqdn = format!("{}.", domain);
    records
        .iter()
        .find(|record| record.name == fqdn && record.record_type == "A")
}

impl<A: Route53Api> Route53Reconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    async fn zone_for(&self, domain: &str) -> Result<HostedZone> {
        let zones = self.api.list_hosted_zones().await?;

        let zone = select_zone(&zones, domain).ok_or_else(|| DdnsError::ZoneNotFound {
            domain: domain.to_string(),
        })?;

        tracing::debug!("Using hosted zone {} ({}) for {}", zone.name, zone.id, domain);
        Ok(zone.clone())
    }

    /// Current values of the domain's A record, if there is one.
    pub async fn lookup(&self, domain: &str) -> Result<Option<Vec<String>>> {
        let zone = self.zone_for(domain).await?;
        let records = self.api.list_resource_record_sets(zone.bare_id()).await?;

        Ok(find_a_record(&records, domain).map(|record| record.values.clone()))
    }

    async fn submit(
        &self,
        zone: &HostedZone,
        action: ChangeAction,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<()> {
        let change = Change {
            action,
            record: ResourceRecordSet::a_record(domain, ip.to_string()),
        };

        let response = self
            .api
            .change_resource_record_sets(zone.bare_id(), vec![change])
            .await?;

        if !response.is_success() {
            return Err(DdnsError::ProviderChange {
                action,
                domain: domain.to_string(),
                status: response.http_status,
                message: response
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        tracing::info!(
            "{} {} -> {} ({})",
            action,
            domain,
            ip,
            response.change_id.as_deref().unwrap_or("no change id")
        );
        Ok(())
    }
}

#[async_trait]
impl<A: Route53Api> DnsReconciler for Route53Reconciler<A> {
    async fn create_or_update(&self, ip: Ipv4Addr, domain: &str) -> Result<ReconcileOutcome> {
        let zone = self.zone_for(domain).await?;
        let records = self.api.list_resource_record_sets(zone.bare_id()).await?;
        let target = ip.to_string();

        match find_a_record(&records, domain) {
            Some(record) if record.values.iter().any(|value| *value != target) => {
                self.submit(&zone, ChangeAction::Upsert, domain, ip).await?;
                Ok(ReconcileOutcome::Updated)
            }
            Some(_) => {
                tracing::debug!("{} already points at {}", domain, ip);
                Ok(ReconcileOutcome::Unchanged)
            }
            None => {
                self.submit(&zone, ChangeAction::Create, domain, ip).await?;
                Ok(ReconcileOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route53::{ChangeResponse, MockRoute53Api};

    fn zones() -> Vec<HostedZone> {
        vec![HostedZone {
            id: "/hostedzone/Z1".to_string(),
            name: "example.com.".to_string(),
        }]
    }

    fn a_record(name: &str, values: &[&str]) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.to_string(),
            record_type: "A".to_string(),
            ttl: Some(300),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn accepted() -> ChangeResponse {
        ChangeResponse {
            http_status: 200,
            change_id: Some("/change/C1".to_string()),
            status: Some("PENDING".to_string()),
            message: None,
        }
    }

    fn api_with_records(records: Vec<ResourceRecordSet>) -> MockRoute53Api {
        let mut api = MockRoute53Api::new();
        api.expect_list_hosted_zones()
            .times(1)
            .returning(|| Ok(zones()));
        api.expect_list_resource_record_sets()
            .withf(|zone_id| zone_id == "Z1")
            .times(1)
            .returning(move |_| Ok(records.clone()));
        api
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_select_zone_parent_of_domain() {
        let zones = zones();
        let zone = select_zone(&zones, "a.example.com").unwrap();
        assert_eq!(zone.bare_id(), "Z1");
    }

    #[test]
    fn test_select_zone_apex() {
        let zones = zones();
        assert!(select_zone(&zones, "example.com").is_some());
    }

    #[test]
    fn test_select_zone_first_match_wins() {
        let zones = vec![
            HostedZone {
                id: "Z1".to_string(),
                name: "example.com.".to_string(),
            },
            HostedZone {
                id: "Z2".to_string(),
                name: "sub.example.com.".to_string(),
            },
        ];
        assert_eq!(select_zone(&zones, "a.sub.example.com").unwrap().id, "Z1");
    }

    #[test]
    fn test_select_zone_respects_label_boundary() {
        let zones = vec![
            HostedZone {
                id: "Z1".to_string(),
                name: "example.com.".to_string(),
            },
            HostedZone {
                id: "Z2".to_string(),
                name: "notexample.com.".to_string(),
            },
        ];
        assert_eq!(select_zone(&zones, "notexample.com").unwrap().id, "Z2");
        assert_eq!(select_zone(&zones, "www.notexample.com").unwrap().id, "Z2");
        assert_eq!(select_zone(&zones, "www.example.com").unwrap().id, "Z1");
    }

    #[test]
    fn test_select_zone_case_sensitive() {
        let zones = zones();
        assert!(select_zone(&zones, "A.EXAMPLE.COM").is_none());
    }

    #[test]
    fn test_select_zone_none() {
        let zones = zones();
        assert!(select_zone(&zones, "a.example.org").is_none());
    }

    #[test]
    fn test_find_a_record_ignores_other_types_and_names() {
        let records = vec![
            ResourceRecordSet {
                name: "a.example.com.".to_string(),
                record_type: "TXT".to_string(),
                ttl: Some(300),
                values: vec!["\"hello\"".to_string()],
            },
            a_record("b.example.com.", &["1.1.1.1"]),
            a_record("a.example.com", &["2.2.2.2"]),
        ];
        assert!(find_a_record(&records, "a.example.com").is_none());
    }

    #[tokio::test]
    async fn test_creates_missing_record() {
        let mut api = api_with_records(vec![a_record("b.example.com.", &["1.1.1.1"])]);
        api.expect_change_resource_record_sets()
            .withf(|zone_id, changes| {
                zone_id == "Z1"
                    && changes.len() == 1
                    && changes[0].action == ChangeAction::Create
                    && changes[0].record.name == "a.example.com"
                    && changes[0].record.record_type == "A"
                    && changes[0].record.ttl == Some(300)
                    && changes[0].record.values == vec!["5.6.7.8".to_string()]
            })
            .times(1)
            .returning(|_, _| Ok(accepted()));

        let reconciler = Route53Reconciler::new(api);
        let outcome = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
    }

    #[tokio::test]
    async fn test_upserts_changed_record() {
        let mut api = api_with_records(vec![a_record("a.example.com.", &["1.2.3.4"])]);
        api.expect_change_resource_record_sets()
            .withf(|_, changes| {
                changes.len() == 1
                    && changes[0].action == ChangeAction::Upsert
                    && changes[0].record.values == vec!["5.6.7.8".to_string()]
            })
            .times(1)
            .returning(|_, _| Ok(accepted()));

        let reconciler = Route53Reconciler::new(api);
        let outcome = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated);
    }

    #[tokio::test]
    async fn test_upserts_when_any_value_differs() {
        let mut api = api_with_records(vec![a_record("a.example.com.", &["5.6.7.8", "9.9.9.9"])]);
        api.expect_change_resource_record_sets()
            .times(1)
            .returning(|_, _| Ok(accepted()));

        let reconciler = Route53Reconciler::new(api);
        let outcome = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated);
    }

    #[tokio::test]
    async fn test_matching_record_is_left_alone() {
        let mut api = api_with_records(vec![a_record("a.example.com.", &["5.6.7.8"])]);
        api.expect_change_resource_record_sets().never();

        let reconciler = Route53Reconciler::new(api);
        let outcome = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_only_first_matching_record_is_considered() {
        // A later duplicate with a stale value is never looked at.
        let mut api = api_with_records(vec![
            a_record("a.example.com.", &["5.6.7.8"]),
            a_record("a.example.com.", &["1.2.3.4"]),
        ]);
        api.expect_change_resource_record_sets().never();

        let reconciler = Route53Reconciler::new(api);
        let outcome = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_zone_not_found() {
        let mut api = MockRoute53Api::new();
        api.expect_list_hosted_zones()
            .returning(|| Ok(zones()));
        api.expect_list_resource_record_sets().never();
        api.expect_change_resource_record_sets().never();

        let reconciler = Route53Reconciler::new(api);
        let result = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.org")
            .await;

        match result {
            Err(DdnsError::ZoneNotFound { domain }) => assert_eq!(domain, "a.example.org"),
            other => panic!("expected ZoneNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_change() {
        let mut api = api_with_records(vec![]);
        api.expect_change_resource_record_sets()
            .times(1)
            .returning(|_, _| {
                Ok(ChangeResponse {
                    http_status: 400,
                    change_id: None,
                    status: None,
                    message: Some("InvalidChangeBatch".to_string()),
                })
            });

        let reconciler = Route53Reconciler::new(api);
        let result = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await;

        match result {
            Err(DdnsError::ProviderChange {
                action,
                status,
                message,
                ..
            }) => {
                assert_eq!(action, ChangeAction::Create);
                assert_eq!(status, 400);
                assert_eq!(message, "InvalidChangeBatch");
            }
            other => panic!("expected ProviderChange, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let mut api = MockRoute53Api::new();
        api.expect_list_hosted_zones()
            .returning(|| Err(DdnsError::api("ListHostedZones", "connection reset")));
        api.expect_change_resource_record_sets().never();

        let reconciler = Route53Reconciler::new(api);
        let result = reconciler
            .create_or_update(ip("5.6.7.8"), "a.example.com")
            .await;

        assert!(matches!(
            result,
            Err(DdnsError::ProviderApi {
                operation: "ListHostedZones",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_lookup() {
        let api = api_with_records(vec![a_record("a.example.com.", &["1.2.3.4"])]);
        let reconciler = Route53Reconciler::new(api);

        let values = reconciler.lookup("a.example.com").await.unwrap();
        assert_eq!(values, Some(vec!["1.2.3.4".to_string()]));
    }

    #[tokio::test]
    async fn test_lookup_missing_record() {
        let api = api_with_records(vec![]);
        let reconciler = Route53Reconciler::new(api);

        assert_eq!(reconciler.lookup("a.example.com").await.unwrap(), None);
    }
}
