//! Printer set difference.
//!
//! Each reconcile round compares the printers the spooler reports against
//! the printers the cloud service knows, and emits one operation per
//! printer in the union. Local printers are keyed by queue name; cloud
//! printers carry both the queue name and their cloud id.

use super::Printer;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// What a single diff asks the reconciler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOperation {
    /// The printer exists locally but not in the cloud.
    Register,
    /// The printer exists on both sides and a descriptive attribute differs.
    Update,
    /// The cloud registration no longer has a local counterpart.
    Delete,
    /// The printer exists on both sides and nothing differs.
    NoChange,
}

/// Which descriptive attributes differ between the two sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldMask {
    pub display_name: bool,
    pub description: bool,
    pub location: bool,
    pub caps_hash: bool,
    pub tags: bool,
}

impl FieldMask {
    /// Compares the descriptive attributes of a local record against its
    /// cloud counterpart.
    pub fn between(local: &Printer, cloud: &Printer) -> Self {
        Self {
            display_name: local.display_name != cloud.display_name,
            description: local.description != cloud.description,
            location: local.location != cloud.location,
            caps_hash: local.caps_hash != cloud.caps_hash,
            tags: local.tags != cloud.tags,
        }
    }

    /// True if any attribute differs.
    pub fn any(&self) -> bool {
        self.display_name || self.description || self.location || self.caps_hash || self.tags
    }
}

/// One unit of reconciliation work.
#[derive(Debug, Clone)]
pub struct PrinterDiff {
    pub op: DiffOperation,
    /// For `Register`, the local record. For `Update` and `NoChange`, the
    /// cloud record (with local attributes folded in on `Update`). For
    /// `Delete`, the cloud record being removed.
    pub printer: Printer,
    /// Attributes that changed; meaningful only for `Update`.
    pub changes: FieldMask,
}

impl PrinterDiff {
    fn simple(op: DiffOperation, printer: Printer) -> Self {
        Self {
            op,
            printer,
            changes: FieldMask::default(),
        }
    }
}

/// Computes the operations that bring the cloud set in line with the local
/// set.
///
/// Returns `None` when nothing differs, so callers can skip the round
/// entirely. When two cloud registrations claim the same queue name, the
/// older registration is kept and the newer one is emitted as a `Delete`.
pub fn diff_printers(local: &[Printer], cloud: &[Printer]) -> Option<Vec<PrinterDiff>> {
    let mut diffs = Vec::with_capacity(local.len() + cloud.len());
    let mut dirty = false;

    // Index cloud printers by queue name, keeping the oldest registration
    // for each name and deleting the rest.
    let mut cloud_by_name: HashMap<&str, &Printer> = HashMap::with_capacity(cloud.len());
    for printer in cloud {
        match cloud_by_name.get(printer.local_name.as_str()) {
            Some(existing) => {
                let (keep, evict) = if registration_time(printer) < registration_time(existing) {
                    (printer, *existing)
                } else {
                    (*existing, printer)
                };
                cloud_by_name.insert(keep.local_name.as_str(), keep);
                diffs.push(PrinterDiff::simple(DiffOperation::Delete, evict.clone()));
                dirty = true;
            }
            None => {
                cloud_by_name.insert(printer.local_name.as_str(), printer);
            }
        }
    }

    let mut matched: HashSet<&str> = HashSet::with_capacity(local.len());
    for local_printer in local {
        matched.insert(local_printer.local_name.as_str());
        match cloud_by_name.get(local_printer.local_name.as_str()) {
            None => {
                diffs.push(PrinterDiff::simple(
                    DiffOperation::Register,
                    local_printer.clone(),
                ));
                dirty = true;
            }
            Some(cloud_printer) => {
                let changes = FieldMask::between(local_printer, cloud_printer);
                if changes.any() {
                    diffs.push(PrinterDiff {
                        op: DiffOperation::Update,
                        printer: merge(local_printer, cloud_printer),
                        changes,
                    });
                    dirty = true;
                } else {
                    diffs.push(PrinterDiff::simple(
                        DiffOperation::NoChange,
                        (*cloud_printer).clone(),
                    ));
                }
            }
        }
    }

    for (name, cloud_printer) in &cloud_by_name {
        if !matched.contains(*name) {
            diffs.push(PrinterDiff::simple(
                DiffOperation::Delete,
                (*cloud_printer).clone(),
            ));
            dirty = true;
        }
    }

    if dirty {
        Some(diffs)
    } else {
        None
    }
}

/// Folds the local record's descriptive attributes into the cloud record.
///
/// Identity, registration time, heartbeat, and the submit limiter stay with
/// the cloud record, so in-flight submissions remain counted after the
/// replacement.
fn merge(local: &Printer, cloud: &Printer) -> Printer {
    Printer {
        display_name: local.display_name.clone(),
        description: local.description.clone(),
        location: local.location.clone(),
        caps_hash: local.caps_hash.clone(),
        tags: local.tags.clone(),
        is_raw: local.is_raw,
        ..cloud.clone()
    }
}

fn registration_time(printer: &Printer) -> DateTime<Utc> {
    printer.registered.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(name: &str) -> Printer {
        Printer::new(name)
    }

    fn cloud(name: &str, cloud_id: &str, registered_at: i64) -> Printer {
        Printer {
            cloud_id: cloud_id.to_string(),
            registered: Some(Utc.timestamp_opt(registered_at, 0).unwrap()),
            ..Printer::new(name)
        }
    }

    fn ops(diffs: &[PrinterDiff]) -> Vec<DiffOperation> {
        diffs.iter().map(|d| d.op).collect()
    }

    #[test]
    fn local_only_printer_registers() {
        let diffs = diff_printers(&[local("a")], &[]).unwrap();
        assert_eq!(ops(&diffs), vec![DiffOperation::Register]);
        assert_eq!(diffs[0].printer.local_name, "a");
    }

    #[test]
    fn cloud_only_printer_deletes() {
        let diffs = diff_printers(&[], &[cloud("a", "c1", 100)]).unwrap();
        assert_eq!(ops(&diffs), vec![DiffOperation::Delete]);
        assert_eq!(diffs[0].printer.cloud_id, "c1");
    }

    #[test]
    fn identical_sets_are_in_sync() {
        assert!(diff_printers(&[local("a")], &[cloud("a", "c1", 100)]).is_none());
        assert!(diff_printers(&[], &[]).is_none());
    }

    #[test]
    fn changed_description_updates() {
        let mut changed = local("a");
        changed.description = "moved to the second floor".to_string();

        let diffs = diff_printers(&[changed], &[cloud("a", "c1", 100)]).unwrap();
        assert_eq!(ops(&diffs), vec![DiffOperation::Update]);
        assert!(diffs[0].changes.description);
        assert!(!diffs[0].changes.display_name);
        // The emitted printer keeps the cloud identity with the new
        // attributes folded in.
        assert_eq!(diffs[0].printer.cloud_id, "c1");
        assert_eq!(diffs[0].printer.description, "moved to the second floor");
    }

    #[test]
    fn update_preserves_submit_slots() {
        use crate::limit::Limiter;
        use std::sync::Arc;

        let mut registered = cloud("a", "c1", 100);
        registered.submit_slots = Some(Arc::new(Limiter::new(3)));
        let mut changed = local("a");
        changed.caps_hash = "fresh".to_string();

        let diffs = diff_printers(&[changed], &[registered]).unwrap();
        assert_eq!(diffs[0].op, DiffOperation::Update);
        assert!(diffs[0].printer.submit_slots.is_some());
    }

    #[test]
    fn duplicate_cloud_names_keep_older_registration() {
        let older = cloud("a", "c-old", 100);
        let newer = cloud("a", "c-new", 200);

        let diffs = diff_printers(&[local("a")], &[newer, older]).unwrap();
        let deletes: Vec<_> = diffs
            .iter()
            .filter(|d| d.op == DiffOperation::Delete)
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].printer.cloud_id, "c-new");

        let kept: Vec<_> = diffs
            .iter()
            .filter(|d| d.op == DiffOperation::NoChange)
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].printer.cloud_id, "c-old");
    }

    #[test]
    fn mixed_round_covers_the_union() {
        let diffs = diff_printers(
            &[local("keep"), local("new")],
            &[cloud("keep", "c1", 100), cloud("gone", "c2", 100)],
        )
        .unwrap();

        let mut operations = ops(&diffs);
        operations.sort_by_key(|op| format!("{op:?}"));
        assert_eq!(
            operations,
            vec![
                DiffOperation::Delete,
                DiffOperation::NoChange,
                DiffOperation::Register,
            ]
        );
    }
}
