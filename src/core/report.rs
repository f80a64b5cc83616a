//! Aggregated analysis report
//!
//! The violation sink consumed by an embedding driver. Wraps the flat
//! violation stream with per-kind counts and serializes to JSON for
//! machine consumers; `Display` renders the classic one-line-per-finding
//! text form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::types::{Violation, ViolationKind};
use crate::core::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub violations: Vec<Violation>,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl Report {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for v in &violations {
            *by_kind.entry(kind_label(v.kind).to_string()).or_insert(0) += 1;
        }
        let summary = ReportSummary {
            total: violations.len(),
            by_kind,
        };
        Self {
            violations,
            summary,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn kind_label(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::BuilderReuse => "builder-reuse",
        ViolationKind::PurityPollutes => "purity-pollutes",
        ViolationKind::PurityLeaks => "purity-leaks",
        ViolationKind::ImmutableReturnBroken => "immutable-return-broken",
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in &self.violations {
            let severity = match v.kind.severity() {
                crate::core::Severity::Info => "info",
                crate::core::Severity::Warning => "warning",
                crate::core::Severity::Error => "error",
            };
            writeln!(f, "{}: {}", severity, v)?;
        }
        write!(f, "{} finding(s)", self.summary.total)
    }
}
