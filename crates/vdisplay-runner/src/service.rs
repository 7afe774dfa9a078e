//! Long-running emulator service.
//!
//! Builds an emulator from an [`EngineFile`], creates the configured
//! displays and bridges the file inbox into it.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use vdisplay_engine::{
    Bridge, BridgeHandle, BridgeStats, Emulator, EndpointSnapshot, GlobalStatistics, MessageRecord,
};
use vdisplay_model::EngineFile;

use crate::error::RunnerResult;
use crate::inbox::FileInbox;

/// Messages included in each monitoring report.
pub const RECENT_MESSAGES: usize = 20;

/// Periodic monitoring output.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    /// Per-endpoint views, sorted by port.
    pub displays: Vec<EndpointSnapshot>,
    /// Emulator-wide totals.
    pub totals: GlobalStatistics,
    /// Bridge counters so far.
    pub bridge: BridgeStats,
    /// Newest messages across every display, oldest first.
    pub recent: Vec<MessageRecord>,
}

/// Where the inbox starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboxStart {
    /// Replay whatever the file already holds.
    Beginning,
    /// Only read lines appended after startup.
    #[default]
    End,
}

/// An emulator fed by the file inbox.
pub struct Service {
    emulator: Arc<Emulator>,
    bridge: BridgeHandle,
}

impl Service {
    /// Create the emulator and displays, then start the inbox bridge.
    pub fn start(file: &EngineFile, start: InboxStart) -> RunnerResult<Self> {
        let emulator = Arc::new(Emulator::new(file.emulator_config())?);
        for config in file.endpoint_configs()? {
            emulator.create_endpoint(config)?;
        }

        let inbox = match start {
            InboxStart::Beginning => FileInbox::new(file.inbox.clone()),
            InboxStart::End => FileInbox::from_end(file.inbox.clone())?,
        };
        info!(
            inbox = %file.inbox.display(),
            displays = emulator.ports().len(),
            "service started"
        );
        let bridge = Bridge::spawn(inbox, Arc::clone(&emulator), file.bridge.clone())?;

        Ok(Service { emulator, bridge })
    }

    /// The running emulator.
    pub fn emulator(&self) -> &Arc<Emulator> {
        &self.emulator
    }

    /// Current monitoring view.
    pub fn report(&self) -> MonitorReport {
        MonitorReport {
            displays: self.emulator.snapshots(),
            totals: self.emulator.statistics(),
            bridge: self.bridge.stats(),
            recent: self.emulator.recent_messages(RECENT_MESSAGES),
        }
    }

    /// Stop the bridge after a final poll and return the final report.
    pub fn shutdown(self) -> MonitorReport {
        let bridge = self.bridge.shutdown();
        info!(delivered = bridge.delivered, failed = bridge.failed, "service stopped");
        MonitorReport {
            displays: self.emulator.snapshots(),
            totals: self.emulator.statistics(),
            bridge,
            recent: self.emulator.recent_messages(RECENT_MESSAGES),
        }
    }
}
