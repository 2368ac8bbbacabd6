// crates/delta-ledger-core/src/runtime/alerts.rs
// ============================================================================
// Module: Delta Ledger Alert Sinks
// Description: Built-in alert sink implementations.
// Purpose: Provide drop-in sinks for tests, demos, and quiet deployments.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Two built-in sinks: [`NullAlertSink`] drops everything, and
//! [`MemoryAlertSink`] buffers notifications and summaries in memory for
//! tests and examples. Deployment-grade sinks (files, webhooks) live with
//! the binaries that own their endpoints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::core::audit::Notification;
use crate::core::audit::RunSummary;
use crate::interfaces::AlertError;
use crate::interfaces::AlertSink;

// ============================================================================
// SECTION: Null Sink
// ============================================================================

/// Alert sink that drops every delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn alert(&self, notification: &Notification) -> Result<(), AlertError> {
        let _ = notification;
        Ok(())
    }
}

// ============================================================================
// SECTION: Memory Sink
// ============================================================================

/// In-memory alert sink for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertSink {
    /// Buffered notifications.
    notifications: Arc<Mutex<Vec<Notification>>>,
    /// Buffered run summaries.
    summaries: Arc<Mutex<Vec<RunSummary>>>,
}

impl MemoryAlertSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every buffered notification.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }

    /// Returns a copy of every buffered run summary.
    #[must_use]
    pub fn summaries(&self) -> Vec<RunSummary> {
        self.summaries.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }
}

impl AlertSink for MemoryAlertSink {
    fn alert(&self, notification: &Notification) -> Result<(), AlertError> {
        self.notifications
            .lock()
            .map_err(|_| AlertError::Sink("alert sink mutex poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }

    fn summary(&self, summary: &RunSummary) -> Result<(), AlertError> {
        self.summaries
            .lock()
            .map_err(|_| AlertError::Sink("alert sink mutex poisoned".to_string()))?
            .push(summary.clone());
        Ok(())
    }
}
