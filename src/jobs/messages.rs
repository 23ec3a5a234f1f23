//! Notification message formatting.
//!
//! Pure functions producing Telegram-HTML text; no I/O. The timezone is an
//! explicit argument so two jobs configured differently could never race on
//! ambient state, and so tests render deterministic dates.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use super::records::BackupRecord;

/// Date rendering used in every message.
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

const RECORD_SEPARATOR: &str = "\n<code>-------------------</code>";

fn render_date(instant: DateTime<Utc>, timezone: Tz) -> String {
    instant
        .with_timezone(&timezone)
        .format(DATE_FORMAT)
        .to_string()
}

/// Renders the backup-started notification.
///
/// The correlation id is echoed by [`backup_finished`] so operators can pair
/// the two messages for one run.
#[must_use]
pub fn backup_started(
    namespace: &str,
    command: &str,
    started_at: DateTime<Utc>,
    timezone: Tz,
    run_id: Uuid,
) -> String {
    let mut msg = format!("<b>{}</b>: start backup", namespace.to_uppercase());
    msg.push_str(&format!("\n\nUuid: <b>{run_id}</b>"));
    msg.push_str(&format!("\nCommand: <code>{command}</code>"));
    msg.push_str(&format!("\nDate: <b>{}</b>\n", render_date(started_at, timezone)));
    msg
}

/// Renders the backup-finished notification for the same run id.
#[must_use]
pub fn backup_finished(
    namespace: &str,
    finished_at: DateTime<Utc>,
    timezone: Tz,
    run_id: Uuid,
) -> String {
    let mut msg = format!("<b>{}</b>: end backup", namespace.to_uppercase());
    msg.push_str(&format!("\n\nUuid: <b>{run_id}</b>"));
    msg.push_str(&format!("\nDate: <b>{}</b>\n", render_date(finished_at, timezone)));
    msg
}

/// Renders the inventory summary for a full-only record list.
///
/// An empty list yields the explicit empty-inventory message; sizes are
/// whole gigabytes, truncated.
#[must_use]
pub fn inventory(full_backups: &[BackupRecord], timezone: Tz) -> String {
    if full_backups.is_empty() {
        return String::from("<b>Backup list is empty!</b>");
    }

    let mut msg = String::from("<b>Backup list:</b>");
    for record in full_backups {
        msg.push_str(RECORD_SEPARATOR);
        msg.push_str(&format!("\nName: <b>{}</b>", record.backup_name));
        msg.push_str(&format!("\nDate: {}", render_date(record.time, timezone)));
        msg.push_str(&format!("\nSize: <b>{}GB</b>", record.compressed_gigabytes()));
    }
    msg
}
