use chrono::NaiveDate;

use crate::history::MessageRecord;

/// Plain-text transcript: `[HH:MM:SS] User: ...` entries separated by blank lines.
pub fn export_text(records: &[MessageRecord]) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                "[{}] {}: {}",
                record.time_label(),
                record.role.label(),
                record.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("chat-export-{}.txt", date.format("%Y-%m-%d"))
}
