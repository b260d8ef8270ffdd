//! Snapshot-replaced printer table.
//!
//! Many tasks read the table concurrently; only reconciliation replaces its
//! contents. Readers clone an `Arc` to the current snapshot, so a `get_all`
//! followed by `get` calls always observes one consistent generation even
//! while a refresh is publishing the next one.

use super::Printer;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Concurrent mapping from cloud id to printer record.
///
/// `refresh` is the sole mutator; it swaps the whole snapshot at once.
/// Readers never observe a partially applied refresh.
pub struct PrinterTable {
    snapshot: RwLock<Arc<HashMap<String, Printer>>>,
}

impl PrinterTable {
    /// Creates a table holding the given printers, keyed by cloud id.
    pub fn new(printers: Vec<Printer>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Self::index(printers))),
        }
    }

    /// Returns the printer with the given cloud id, if present.
    pub fn get(&self, cloud_id: &str) -> Option<Printer> {
        self.current().get(cloud_id).cloned()
    }

    /// Returns every printer in the current snapshot.
    pub fn get_all(&self) -> Vec<Printer> {
        self.current().values().cloned().collect()
    }

    /// Atomically replaces the entire table with the given printers.
    pub fn refresh(&self, printers: Vec<Printer>) {
        let next = Arc::new(Self::index(printers));
        *self
            .snapshot
            .write()
            .expect("printer table lock poisoned") = next;
    }

    fn current(&self) -> Arc<HashMap<String, Printer>> {
        Arc::clone(&self.snapshot.read().expect("printer table lock poisoned"))
    }

    fn index(printers: Vec<Printer>) -> HashMap<String, Printer> {
        printers
            .into_iter()
            .map(|p| (p.cloud_id.clone(), p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_printer(local_name: &str, cloud_id: &str) -> Printer {
        Printer {
            cloud_id: cloud_id.to_string(),
            ..Printer::new(local_name)
        }
    }

    #[test]
    fn get_finds_by_cloud_id() {
        let table = PrinterTable::new(vec![
            cloud_printer("front-desk", "c1"),
            cloud_printer("warehouse", "c2"),
        ]);

        assert_eq!(table.get("c1").unwrap().local_name, "front-desk");
        assert_eq!(table.get("c2").unwrap().local_name, "warehouse");
        assert!(table.get("c3").is_none());
    }

    #[test]
    fn refresh_replaces_everything() {
        let table = PrinterTable::new(vec![cloud_printer("front-desk", "c1")]);

        table.refresh(vec![cloud_printer("warehouse", "c2")]);

        assert!(table.get("c1").is_none());
        assert_eq!(table.get("c2").unwrap().local_name, "warehouse");
        assert_eq!(table.get_all().len(), 1);
    }

    #[test]
    fn snapshot_is_consistent_with_lookups() {
        let table = PrinterTable::new(vec![
            cloud_printer("a", "c1"),
            cloud_printer("b", "c2"),
            cloud_printer("c", "c3"),
        ]);

        let all = table.get_all();
        assert_eq!(all.len(), 3);
        for printer in &all {
            let looked_up = table.get(&printer.cloud_id).unwrap();
            assert_eq!(looked_up.local_name, printer.local_name);
        }
    }

    #[test]
    fn readers_hold_the_old_generation_across_refresh() {
        let table = Arc::new(PrinterTable::new(vec![cloud_printer("a", "c1")]));

        let before = table.get_all();
        table.refresh(vec![cloud_printer("b", "c2")]);

        // The snapshot taken before the refresh is unchanged.
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].cloud_id, "c1");
        assert_eq!(table.get_all()[0].cloud_id, "c2");
    }
}
