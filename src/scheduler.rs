//! The poll loop: resolve, compare with the last published address, reconcile.
//!
//! The scheduler owns the only mutable state in the program, the address it
//! last published. It is `None` until the first tick completes, so the first
//! tick always reconciles every domain. Afterwards a tick only touches the
//! provider when the resolved address differs.
//!
//! The cached address is replaced only once every domain of a tick has been
//! reconciled. A failure leaves it as it was and the next tick starts over
//! with all domains.

use crate::error::Result;
use crate::reconciler::{DnsReconciler, ReconcileOutcome};
use crate::resolver::IpResolver;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::watch;

/// Default time between ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The address was new, every domain was reconciled in order.
    Reconciled {
        ip: Ipv4Addr,
        previous: Option<Ipv4Addr>,
        results: Vec<(String, ReconcileOutcome)>,
    },
    /// The address matched the cache, nothing was sent to the provider.
    Unchanged { ip: Ipv4Addr },
}

/// Drives reconciliation on a fixed cadence.
pub struct Scheduler<R, D> {
    resolver: R,
    reconciler: D,
    domains: Vec<String>,
    interval: Duration,
    last_ip: Option<Ipv4Addr>,
}

impl<R: IpResolver, D: DnsReconciler> Scheduler<R, D> {
    pub fn new(resolver: R, reconciler: D, domains: Vec<String>, interval: Duration) -> Self {
        Self {
            resolver,
            reconciler,
            domains,
            interval,
            last_ip: None,
        }
    }

    /// The address published by the last successful tick.
    pub fn last_ip(&self) -> Option<Ipv4Addr> {
        self.last_ip
    }

    /// Run one resolve-compare-reconcile cycle.
    ///
    /// Domains are reconciled one after another in configured order; the
    /// first failure ends the tick and is returned as is.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let ip = self.resolver.resolve().await?;

        if self.last_ip == Some(ip) {
            tracing::debug!("Public IP unchanged ({})", ip);
            return Ok(TickOutcome::Unchanged { ip });
        }

        match self.last_ip {
            Some(previous) => tracing::info!("Public IP changed: {} -> {}", previous, ip),
            None => tracing::info!("Public IP is {}", ip),
        }

        let mut results = Vec::with_capacity(self.domains.len());
        for domain in &self.domains {
            let outcome = self.reconciler.create_or_update(ip, domain).await?;
            tracing::info!("{}: {}", domain, outcome);
            results.push((domain.clone(), outcome));
        }

        let previous = self.last_ip.replace(ip);
        Ok(TickOutcome::Reconciled {
            ip,
            previous,
            results,
        })
    }

    /// Tick until `shutdown` turns true or its sender goes away.
    ///
    /// Cancellation is observed before each tick and during the sleep
    /// between ticks; a tick already in flight is allowed to finish.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Watching {} domain(s) every {}s",
            self.domains.len(),
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.tick().await {
                tracing::error!("Update failed: {}", e);
            }

            tracing::debug!("Sleeping for {}s", self.interval.as_secs());
            if self.wait_interval(&mut shutdown).await {
                break;
            }
        }

        tracing::info!("Poll loop stopped");
    }

    /// Sleep one full interval. Returns true as soon as shutdown is requested.
    ///
    /// A notification that leaves the flag false does not cut the sleep short.
    async fn wait_interval(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return true;
                    }
                }
            }
        }
    }
}
