//! Wiring for the `opsdeck` console: configuration, service assembly and the
//! interactive loop.

pub mod config;
pub mod console;

use anyhow::Context;
use config::AppConfig;
use opsdeck_audit::{AuditLog, JsonlFileSink};
use opsdeck_catalog::CommandCatalog;
use opsdeck_dispatch::DispatchService;
use std::sync::Arc;
use tracing::info;

pub use console::Console;

pub fn build_catalog(config: &AppConfig) -> anyhow::Result<CommandCatalog> {
    match &config.catalog_extensions {
        Some(path) => CommandCatalog::load_extensions(path)
            .with_context(|| format!("Failed to load catalog extensions from {}", path.display())),
        None => Ok(CommandCatalog::builtin()),
    }
}

/// Audit log backed by the configured file, seeded from what it already holds.
pub fn build_audit_log(config: &AppConfig) -> anyhow::Result<AuditLog> {
    match &config.audit_log {
        Some(path) => {
            let sink = JsonlFileSink::open(path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;
            Ok(AuditLog::restore(config.audit_retention, Arc::new(sink)))
        }
        None => Ok(AuditLog::new(config.audit_retention)),
    }
}

pub fn build_service(config: &AppConfig) -> anyhow::Result<DispatchService> {
    let catalog = build_catalog(config)?;
    let audit = build_audit_log(config)?;
    info!(
        "Catalog has {} commands, audit log restored {} entries",
        catalog.len(),
        audit.len()
    );
    Ok(DispatchService::new(
        Arc::new(catalog),
        Arc::new(audit),
        config.dispatch_settings(),
    ))
}
