use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tf_types::base_data::BaseData;
use tf_types::cash::CashBook;
use tf_types::securities::security::Security;
use tf_types::securities::symbols::Symbol;

/// Securities entering and leaving the feed within one emission window.
///
/// Combines as a disjoint union where an add cancels an earlier removal of
/// the same security (the add replaces it); a removal likewise supersedes
/// an earlier add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityChanges {
    added: Vec<Security>,
    removed: Vec<Security>,
}

impl SecurityChanges {
    pub fn none() -> SecurityChanges {
        SecurityChanges::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn add(&mut self, security: Security) {
        self.removed.retain(|s| s.symbol != security.symbol);
        if !self.added.iter().any(|s| s.symbol == security.symbol) {
            self.added.push(security);
        }
    }

    pub fn remove(&mut self, security: Security) {
        self.added.retain(|s| s.symbol != security.symbol);
        if !self.removed.iter().any(|s| s.symbol == security.symbol) {
            self.removed.push(security);
        }
    }

    pub fn added(&self) -> &[Security] {
        &self.added
    }

    pub fn removed(&self) -> &[Security] {
        &self.removed
    }

    pub fn merge(mut self, other: SecurityChanges) -> SecurityChanges {
        for s in other.removed {
            self.remove(s);
        }
        for s in other.added {
            self.add(s);
        }
        self
    }
}

/// One security's contribution to a slice.
#[derive(Debug, Clone)]
pub struct SecuritySliceData {
    pub security: Security,
    pub items: Vec<BaseData>,
}

/// Immutable snapshot of everything the feed produced at one frontier
/// instant. Symbol order is the insertion order of the producing iteration.
#[derive(Debug, Clone)]
pub struct TimeSlice {
    /// Emission instant, UTC.
    pub time: DateTime<Utc>,
    /// Algorithm-local zone for display conversions.
    pub algorithm_time_zone: Tz,
    pub cash: CashBook,
    data: Vec<SecuritySliceData>,
    pub security_changes: SecurityChanges,
}

impl TimeSlice {
    pub fn create(
        time: DateTime<Utc>,
        algorithm_time_zone: Tz,
        cash: CashBook,
        data: Vec<SecuritySliceData>,
        security_changes: SecurityChanges,
    ) -> TimeSlice {
        TimeSlice {
            time,
            algorithm_time_zone,
            cash,
            data,
            security_changes,
        }
    }

    pub fn algorithm_time(&self) -> DateTime<Tz> {
        self.time.with_timezone(&self.algorithm_time_zone)
    }

    pub fn data(&self) -> &[SecuritySliceData] {
        &self.data
    }

    pub fn data_for(&self, symbol: &Symbol) -> Option<&[BaseData]> {
        self.data
            .iter()
            .find(|d| &d.security.symbol == symbol)
            .map(|d| d.items.as_slice())
    }

    /// Total item count across all securities.
    pub fn count(&self) -> usize {
        self.data.iter().map(|d| d.items.len()).sum()
    }

    pub fn has_data(&self) -> bool {
        self.count() > 0
    }
}
