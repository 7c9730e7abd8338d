//! Export: lead CSV/JSON files and the human-readable run summary.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::filter::FilterStats;
use crate::ledger::LedgerStats;
use crate::models::Lead;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing export: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes the run's output files into one directory.
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    /// Creates the output directory if it does not exist.
    pub fn new(output_dir: &Path) -> Result<Self, ExportError> {
        fs::create_dir_all(output_dir)?;
        Ok(Exporter {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Writes leads as CSV (the sales-facing format). Header row comes from
    /// the `Lead` field order. Returns the file path.
    pub fn export_leads_csv(&self, leads: &[Lead], name: &str) -> Result<PathBuf, ExportError> {
        let path = self.output_dir.join(format!("{name}_leads.csv"));
        let mut writer = csv::Writer::from_path(&path)?;
        for lead in leads {
            writer.serialize(lead)?;
        }
        writer.flush()?;
        log::info!("wrote {} leads to {}", leads.len(), path.display());
        Ok(path)
    }

    /// Writes leads as pretty-printed JSON for downstream tooling.
    pub fn export_leads_json(&self, leads: &[Lead], name: &str) -> Result<PathBuf, ExportError> {
        let path = self.output_dir.join(format!("{name}_leads.json"));
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, leads)?;
        log::info!("wrote {} leads to {}", leads.len(), path.display());
        Ok(path)
    }

    /// Writes the run summary and returns its text.
    pub fn export_summary(
        &self,
        ledger_stats: &LedgerStats,
        filter_stats: &FilterStats,
        name: &str,
    ) -> Result<String, ExportError> {
        let text = render_summary(ledger_stats, filter_stats);
        let path = self.output_dir.join(format!("{name}_summary.txt"));
        fs::write(&path, &text)?;
        log::info!("wrote summary to {}", path.display());
        Ok(text)
    }
}

fn render_summary(ledger_stats: &LedgerStats, filter_stats: &FilterStats) -> String {
    let mut out = String::new();
    // writeln! to a String cannot fail
    let _ = writeln!(out, "Website check summary");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out, "Total businesses:   {}", ledger_stats.total);
    let _ = writeln!(out, "Checked:            {}", ledger_stats.done);
    let _ = writeln!(out, "Still pending:      {}", ledger_stats.pending);
    if ledger_stats.in_progress > 0 {
        let _ = writeln!(out, "Interrupted:        {}", ledger_stats.in_progress);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Status breakdown:");
    for (status, count) in &ledger_stats.by_status {
        let _ = writeln!(out, "  {status:<20} {count}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Leads exported:     {}", filter_stats.leads);
    let _ = writeln!(out, "Rejected:");
    let _ = writeln!(out, "  healthy website    {}", filter_stats.healthy_site);
    let _ = writeln!(out, "  no website         {}", filter_stats.no_website);
    let _ = writeln!(out, "  never checked      {}", filter_stats.unchecked);
    let _ = writeln!(out, "  rating too low     {}", filter_stats.below_rating);
    let _ = writeln!(out, "  too few reviews    {}", filter_stats.below_reviews);
    let _ = writeln!(out, "  no phone number    {}", filter_stats.missing_phone);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Business;
    use crate::status::{CheckResult, WebsiteStatus};

    fn sample_leads() -> Vec<Lead> {
        let business = Business {
            place_id: "p1".into(),
            name: "Somchai, \"The\" Restaurant".into(),
            address: "123 Main St".into(),
            phone: "555-0100".into(),
            website: Some("https://somchai.example".into()),
            rating: 4.2,
            review_count: 31,
            category: "restaurant".into(),
        };
        let result = CheckResult::new(WebsiteStatus::NoDns, "DNS resolution failed: NXDOMAIN");
        vec![Lead::from_business(&business, &result)]
    }

    #[test]
    fn test_csv_export_has_header_and_quoted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        let path = exporter.export_leads_csv(&sample_leads(), "run").unwrap();

        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("business_name,category,phone,website_url,website_status"));
        let row = lines.next().unwrap();
        assert!(row.contains("NO_DNS"));
        assert!(row.contains("\"Somchai, \"\"The\"\" Restaurant\""));
    }

    #[test]
    fn test_json_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        let path = exporter.export_leads_json(&sample_leads(), "run").unwrap();

        let content = fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["website_status"], "NO_DNS");
        assert_eq!(parsed[0]["place_id"], "p1");
    }

    #[test]
    fn test_summary_mentions_counts() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        let ledger_stats = LedgerStats {
            total: 10,
            done: 8,
            pending: 2,
            in_progress: 0,
            by_status: vec![("OK".into(), 5), ("NO_DNS".into(), 3)],
        };
        let filter_stats = FilterStats {
            leads: 3,
            healthy_site: 5,
            ..FilterStats::default()
        };
        let text = exporter
            .export_summary(&ledger_stats, &filter_stats, "run")
            .unwrap();
        assert!(text.contains("Total businesses:   10"));
        assert!(text.contains("NO_DNS"));
        assert!(text.contains("Leads exported:     3"));
        assert!(dir.path().join("run_summary.txt").exists());
    }
}
