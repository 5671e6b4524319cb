//! # Audit Log Module
//!
//! Records admin actions in a bounded in-memory buffer and appends each one
//! to a plain-text log file.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::reports::{business_now, esc, RULE};

pub const MAX_ENTRIES: usize = 500;
pub const ENTRIES_SHOWN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    Auth,
    Order,
    Export,
    Broadcast,
    Monitor,
    Report,
    Settings,
    System,
}

impl AuditCategory {
    pub fn emoji(self) -> &'static str {
        match self {
            AuditCategory::Auth => "🔐",
            AuditCategory::Order => "📦",
            AuditCategory::Export => "📤",
            AuditCategory::Broadcast => "📢",
            AuditCategory::Monitor => "🌐",
            AuditCategory::Report => "📊",
            AuditCategory::Settings => "⚙️",
            AuditCategory::System => "🖥️",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuditCategory::Auth => "AUTH",
            AuditCategory::Order => "ORDER",
            AuditCategory::Export => "EXPORT",
            AuditCategory::Broadcast => "BROADCAST",
            AuditCategory::Monitor => "MONITOR",
            AuditCategory::Report => "REPORT",
            AuditCategory::Settings => "SETTINGS",
            AuditCategory::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub admin_id: u64,
    pub admin_name: String,
    pub action: String,
    pub category: AuditCategory,
    pub details: String,
    pub success: bool,
}

impl AuditEntry {
    /// `[ts] OK|FAIL | name (id) | CATEGORY: action | details`
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} | {} ({}) | {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            if self.success { "OK" } else { "FAIL" },
            self.admin_name,
            self.admin_id,
            self.category.name(),
            self.action
        );
        if !self.details.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.details);
        }
        line
    }
}

#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    file: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(MAX_ENTRIES)),
            file,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: AuditEntry) {
        if entry.success {
            info!(admin_id = entry.admin_id, category = entry.category.name(), action = %entry.action, "Admin action");
        } else {
            warn!(admin_id = entry.admin_id, category = entry.category.name(), action = %entry.action, "Admin action failed");
        }

        if let Some(path) = &self.file {
            let written = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut f| writeln!(f, "{}", entry.log_line()));
            if let Err(e) = written {
                error!(path = %path.display(), error = %e, "Audit file write error");
            }
        }

        let mut entries = self.lock();
        if entries.len() == MAX_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Convenience wrapper stamping the entry with the current time
    pub fn log(
        &self,
        admin_id: u64,
        admin_name: &str,
        category: AuditCategory,
        action: &str,
        details: &str,
        success: bool,
    ) {
        self.record(AuditEntry {
            at: Utc::now(),
            admin_id,
            admin_name: admin_name.to_string(),
            action: action.to_string(),
            category,
            details: details.to_string(),
            success,
        });
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The `/audit` screen
    pub fn format_recent(&self, utc_offset_hours: i32) -> String {
        let entries = self.recent(ENTRIES_SHOWN);
        if entries.is_empty() {
            return "📋 No audit entries found.".to_string();
        }

        let mut text = format!("📋 <b>Audit Log</b>\n{RULE}\n\n");
        for entry in &entries {
            let ts = business_now(entry.at, utc_offset_hours).format("%m/%d %H:%M");
            let status = if entry.success { "✅" } else { "❌" };
            text.push_str(&format!(
                "{} {status} <code>{ts}</code> <b>{}</b>\n    {}",
                entry.category.emoji(),
                esc(&entry.admin_name),
                esc(&entry.action)
            ));
            if !entry.details.is_empty() {
                let short: String = entry.details.chars().take(40).collect();
                text.push_str(&format!(" ({})", esc(&short)));
            }
            text.push_str("\n\n");
        }
        text.push_str(&format!("📊 Total entries: {}", self.len()));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry(action: &str) -> AuditEntry {
        AuditEntry {
            at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            admin_id: 99,
            admin_name: "Nadia".into(),
            action: action.into(),
            category: AuditCategory::Order,
            details: String::new(),
            success: true,
        }
    }

    #[test]
    fn test_log_line_format() {
        let mut e = entry("Set status");
        assert_eq!(e.log_line(), "[2024-02-01 10:00:00] OK | Nadia (99) | ORDER: Set status");
        e.success = false;
        e.details = "NG-1 -> Shipped".into();
        assert_eq!(
            e.log_line(),
            "[2024-02-01 10:00:00] FAIL | Nadia (99) | ORDER: Set status | NG-1 -> Shipped"
        );
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let log = AuditLog::new(None);
        for i in 0..(MAX_ENTRIES + 5) {
            log.record(entry(&format!("a{i}")));
        }
        assert_eq!(log.len(), MAX_ENTRIES);
        assert_eq!(log.recent(1)[0].action, format!("a{}", MAX_ENTRIES + 4));
    }

    #[test]
    fn test_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::new(Some(path.clone()));
        log.record(entry("one"));
        log.record(entry("two"));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().nth(1).unwrap().ends_with("ORDER: two"));
    }

    #[test]
    fn test_format_recent() {
        let log = AuditLog::new(None);
        assert!(log.format_recent(6).contains("No audit entries"));
        log.record(entry("<export>"));
        let text = log.format_recent(6);
        assert!(text.contains("📦 ✅ <code>02/01 16:00</code>"));
        assert!(text.contains("&lt;export&gt;"));
    }
}
