//! Choosing which discovered peripherals become sessions.
//!
//! The order of the returned records is the dispatch index of each device
//! for the rest of the process lifetime.

use log::{debug, info};

use crate::protocol::PRODUCT_FAMILY_TOKEN;
use crate::types::PeripheralRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCriteria {
    /// Every record whose identifier contains `token`, in discovery order.
    Auto { token: String },
    /// Records matching these addresses / identifiers, in list order.
    AllowList(Vec<String>),
}

impl SelectionCriteria {
    /// An empty list means automatic selection by product family.
    pub fn from_list(entries: &[String], token: &str) -> Self {
        if entries.is_empty() {
            Self::Auto {
                token: token.to_owned(),
            }
        } else {
            Self::AllowList(entries.to_vec())
        }
    }
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self::Auto {
            token: PRODUCT_FAMILY_TOKEN.to_owned(),
        }
    }
}

fn matches_entry(record: &PeripheralRecord, entry: &str) -> bool {
    record.address.eq_ignore_ascii_case(entry) || record.identifier.eq_ignore_ascii_case(entry)
}

/// Filter `discovered` according to `criteria`.
///
/// With an allow-list, each entry picks the first matching record; entries
/// without a match are dropped silently and a record is never selected twice.
pub fn select(discovered: &[PeripheralRecord], criteria: &SelectionCriteria) -> Vec<PeripheralRecord> {
    match criteria {
        SelectionCriteria::Auto { token } => discovered
            .iter()
            .filter(|r| r.identifier.contains(token.as_str()))
            .inspect(|r| info!("Auto found {token}: {}", r.address))
            .cloned()
            .collect(),
        SelectionCriteria::AllowList(entries) => {
            let mut selected: Vec<PeripheralRecord> = Vec::with_capacity(entries.len());
            for entry in entries {
                match discovered.iter().find(|r| matches_entry(r, entry)) {
                    Some(r) if selected.iter().any(|s| s.address == r.address) => {
                        debug!("{entry}: {} already selected", r.address);
                    }
                    Some(r) => {
                        info!("Selected {entry}: {} [{}]", r.identifier, r.address);
                        selected.push(r.clone());
                    }
                    None => debug!("{entry}: not discovered"),
                }
            }
            selected
        }
    }
}
