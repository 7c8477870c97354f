//! Record filters and aggregate statistics

use cardsort_core::ScanRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Filter over scan records; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanQuery {
    /// Case-insensitive substring of the normalized code
    pub code_contains: Option<String>,
    /// Sorted onto the success pile (`true`) or not (`false`)
    pub accepted: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub min_confidence: Option<f64>,
    pub limit: Option<usize>,
}

impl ScanQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Newest `limit` records
    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_accepted(mut self, accepted: bool) -> Self {
        self.accepted = Some(accepted);
        self
    }

    pub fn matches(&self, record: &ScanRecord) -> bool {
        if let Some(needle) = &self.code_contains {
            let needle = needle.to_uppercase();
            match &record.normalized_code {
                Some(code) if code.to_uppercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(accepted) = self.accepted {
            if record.is_success() != accepted {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if record.confidence < min {
                return false;
            }
        }
        true
    }

    /// Filter, order newest first and truncate
    pub fn apply<'a>(&self, records: impl DoubleEndedIterator<Item = &'a ScanRecord>) -> Vec<ScanRecord> {
        let mut hits: Vec<ScanRecord> = records.rev().filter(|r| self.matches(r)).cloned().collect();
        // Stable: among equal timestamps the later append stays first
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits
    }
}

/// Aggregate view over all records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total: usize,
    pub accepted: usize,
    /// Everything else, including accepted cards that were dropped or aborted
    pub rejected: usize,
    /// Mean confidence of accepted records
    pub average_confidence: f64,
    /// Accepted share of all records, in percent
    pub acceptance_rate: f64,
    /// Distinct codes among accepted records
    pub unique_codes: usize,
}

impl ScanStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ScanRecord>) -> Self {
        let mut stats = ScanStatistics::default();
        let mut confidence_sum = 0.0;
        let mut codes = HashSet::new();

        for record in records {
            stats.total += 1;
            if record.is_success() {
                stats.accepted += 1;
                confidence_sum += record.confidence;
                if let Some(code) = &record.normalized_code {
                    codes.insert(code.clone());
                }
            }
        }

        stats.rejected = stats.total - stats.accepted;
        stats.unique_codes = codes.len();
        if stats.accepted > 0 {
            stats.average_confidence = confidence_sum / stats.accepted as f64;
        }
        if stats.total > 0 {
            stats.acceptance_rate = stats.accepted as f64 * 100.0 / stats.total as f64;
        }
        stats
    }
}

impl fmt::Display for ScanStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records:       {}", self.total)?;
        writeln!(f, "Accepted:            {}", self.accepted)?;
        writeln!(f, "Rejected:            {}", self.rejected)?;
        writeln!(f, "Acceptance rate:     {:.1}%", self.acceptance_rate)?;
        writeln!(f, "Average confidence:  {:.3}", self.average_confidence)?;
        write!(f, "Unique codes:        {}", self.unique_codes)
    }
}
