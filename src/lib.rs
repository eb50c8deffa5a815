//! # route53-ddns
//!
//! Keeps a set of Route 53 A records pointed at this machine's public IPv4
//! address.
//!
//! ## Features
//!
//! - Public IP lookup through a JSON echo service (ipify by default)
//! - Creates missing A records, upserts stale ones, leaves matching ones alone
//! - Polls on a fixed interval and only talks to Route 53 when the IP changes
//! - Graceful shutdown on Ctrl-C / SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! # Show the public IP and what each domain currently points at
//! route53-ddns status
//!
//! # Reconcile every domain once
//! route53-ddns update
//!
//! # Keep reconciling every 5 minutes
//! DOMAINS="home.example.com;vpn.example.com" route53-ddns run
//! ```

pub mod config;
pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod route53;
pub mod scheduler;

pub use config::Config;
pub use error::{DdnsError, Result};
pub use reconciler::{DnsReconciler, ReconcileOutcome, Route53Reconciler};
pub use resolver::{HttpIpResolver, IpResolver};
pub use scheduler::{Scheduler, TickOutcome};
