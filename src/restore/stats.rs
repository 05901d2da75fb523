// snapshotrestore/src/restore/stats.rs
use chrono::{DateTime, Utc};

const LISTED_MESSAGES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStatistics {
    pub restored: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl TableStatistics {
    /// Share of rows that made it in, or `None` for an empty table.
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.restored + self.skipped;
        (attempted > 0).then(|| self.restored as f64 * 100.0 / attempted as f64)
    }
}

/// Counters for one restore run. Passed by reference through the orchestrator
/// and each table job.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub tables_processed: u64,
    pub records_restored: u64,
    pub records_skipped: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    tables: Vec<(String, TableStatistics)>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl RunStatistics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            tables_processed: 0,
            records_restored: 0,
            records_skipped: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn add_restored(&mut self, count: u64) {
        self.records_restored += count;
    }

    pub fn add_skipped(&mut self, count: u64) {
        self.records_skipped += count;
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records a finished table. The first outcome for a table wins.
    pub fn record_table(&mut self, table: &str, outcome: TableStatistics) {
        if self.table(table).is_some() {
            return;
        }
        self.tables.push((table.to_string(), outcome));
        self.add_restored(outcome.restored);
        self.add_skipped(outcome.skipped);
        self.tables_processed += 1;
    }

    pub fn table(&self, table: &str) -> Option<&TableStatistics> {
        self.tables.iter().find(|(name, _)| name == table).map(|(_, s)| s)
    }

    pub fn render(&self, finished_at: DateTime<Utc>) -> String {
        let elapsed = (finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let mut out = String::new();

        out.push_str("\n==================== RESTORE SUMMARY ====================\n");
        out.push_str(&format!("⏱  Duration:          {:.2}s\n", elapsed));
        out.push_str(&format!("📋 Tables processed:  {}\n", self.tables_processed));
        out.push_str(&format!("✅ Records restored:  {}\n", self.records_restored));
        out.push_str(&format!("⏭  Records skipped:   {}\n", self.records_skipped));

        if !self.tables.is_empty() {
            out.push_str("\nPer-table results:\n");
            let width = self.tables.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
            for (name, s) in &self.tables {
                let rate = s
                    .success_rate()
                    .map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r));
                out.push_str(&format!(
                    "  {:<width$}  {:>8} restored  {:>6} skipped  {:>7}",
                    name,
                    s.restored,
                    s.skipped,
                    rate,
                    width = width
                ));
                if s.errors > 0 {
                    out.push_str(&format!("  {} errors", s.errors));
                }
                out.push('\n');
            }
        }

        render_messages(&mut out, "⚠️  Warnings", &self.warnings);
        render_messages(&mut out, "❌ Errors", &self.errors);
        out.push_str("=========================================================\n");
        out
    }
}

fn render_messages(out: &mut String, title: &str, messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    out.push_str(&format!("\n{} ({}):\n", title, messages.len()));
    for message in messages.iter().take(LISTED_MESSAGES) {
        out.push_str(&format!("  - {}\n", message));
    }
    if messages.len() > LISTED_MESSAGES {
        out.push_str(&format!("  ... and {} more\n", messages.len() - LISTED_MESSAGES));
    }
}
