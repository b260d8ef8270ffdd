//! Printer records shared between the local spooler and the cloud service.

mod diff;
mod table;

pub use diff::{diff_printers, DiffOperation, FieldMask, PrinterDiff};
pub use table::PrinterTable;

use crate::limit::Limiter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Heartbeat applied to printers that have not negotiated their own.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(300);

/// A printer as seen by the connector.
///
/// One record carries both identities: `local_name` on the spooler and
/// `cloud_id` issued by the cloud service at registration. The descriptive
/// attributes are what the diff engine compares; everything else is carried
/// alongside.
///
/// Records are immutable once published to the [`PrinterTable`] except for
/// the embedded `submit_slots`, whose gauge moves as jobs come and go.
#[derive(Debug, Clone)]
pub struct Printer {
    /// Queue name on the local spooler.
    pub local_name: String,

    /// Identifier issued by the cloud service. Empty until registered.
    pub cloud_id: String,

    /// Name shown to cloud users.
    pub display_name: String,

    /// Free-form description.
    pub description: String,

    /// Physical location, if the spooler reports one.
    pub location: String,

    /// Digest of the printer's capability document. Lets the diff engine
    /// detect capability changes without comparing whole documents.
    pub caps_hash: String,

    /// Descriptive tags attached to the cloud registration.
    pub tags: Vec<String>,

    /// True for raw queues (no capability document).
    pub is_raw: bool,

    /// When the cloud registration was created. `None` for printers that
    /// only exist locally so far.
    pub registered: Option<DateTime<Utc>>,

    /// Push-channel heartbeat requested for this printer.
    pub ping_interval: Duration,

    /// Permits bounding concurrent submissions to this printer. Present on
    /// every record published to the [`PrinterTable`].
    pub submit_slots: Option<Arc<Limiter>>,
}

impl Printer {
    /// Creates a local-only record with the given spooler queue name.
    ///
    /// Descriptive attributes default to empty; callers fill in what the
    /// spooler reports.
    pub fn new(local_name: impl Into<String>) -> Self {
        let local_name = local_name.into();
        Self {
            display_name: local_name.clone(),
            local_name,
            cloud_id: String::new(),
            description: String::new(),
            location: String::new(),
            caps_hash: String::new(),
            tags: Vec::new(),
            is_raw: false,
            registered: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            submit_slots: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_printer_defaults() {
        let printer = Printer::new("laser-2");
        assert_eq!(printer.local_name, "laser-2");
        assert_eq!(printer.display_name, "laser-2");
        assert!(printer.cloud_id.is_empty());
        assert!(!printer.is_raw);
        assert!(printer.registered.is_none());
        assert!(printer.submit_slots.is_none());
        assert_eq!(printer.ping_interval, DEFAULT_PING_INTERVAL);
    }
}
