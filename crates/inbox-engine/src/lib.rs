//! inbox-engine - Webhook reconciliation and outbound messaging
//!
//! Consumes normalized channel events and staff compose requests, and keeps the
//! unified inbox store consistent with what the providers report.

pub mod engine;
pub mod outbound;
pub mod tenancy;

#[cfg(test)]
mod testing;

pub use engine::{ProcessOutcome, ReconciliationEngine};
pub use outbound::{ComposeRequest, OutboundService};
pub use tenancy::{ConfigCredentialsResolver, ConfigTenantResolver};
