use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use rstest::{fixture, rstest};
use uuid::Uuid;

use crate::kube::KubeError;
use crate::notify::NotificationTargets;
use crate::test_support::{RecordingNotifier, RecordingStorage, ScriptedExecutor};

use super::messages;
use super::records::BackupRecord;
use super::{BackupJob, InfoJob, Job, full_only, parse_inventory};

const INVENTORY_JSON: &str = r#"[
    {
        "backup_name": "base_000000010000000000000002",
        "time": "2024-03-01T02:00:00Z",
        "uncompressed_size": 7516192768,
        "compressed_size": 3221225472
    },
    {
        "backup_name": "base_000000010000000000000004_D_000000010000000000000002",
        "time": "2024-03-02T02:00:00Z",
        "uncompressed_size": 1073741824,
        "compressed_size": 536870912
    }
]"#;

#[fixture]
fn timezone() -> Tz {
    chrono_tz::UTC
}

#[fixture]
fn full_record() -> BackupRecord {
    BackupRecord {
        backup_name: String::from("base_000000010000000000000002"),
        time: Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).single().map_or_else(
            || panic!("fixture timestamp should be unambiguous"),
            |time| time,
        ),
        uncompressed_size: 7_516_192_768,
        compressed_size: 3_221_225_472,
    }
}

async fn settle() {
    // Notification fan-out is detached; give the spawned sends a beat.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

mod record_classification {
    use super::*;

    #[rstest]
    #[case("base_000000010000000000000002", true)]
    #[case("base_000000010000000000000004_D_000000010000000000000002", false)]
    #[case("base_aaaa_D_bbbb_I_cccc", false)]
    #[case("full-backup-no-underscores", true)]
    fn delta_markers_make_a_backup_incremental(
        #[case] backup_name: &str,
        #[case] expected_full: bool,
        full_record: BackupRecord,
    ) {
        let record = BackupRecord {
            backup_name: backup_name.to_owned(),
            ..full_record
        };
        assert_eq!(record.is_full(), expected_full);
    }

    #[rstest]
    fn compressed_size_truncates_to_whole_gigabytes(full_record: BackupRecord) {
        assert_eq!(full_record.compressed_gigabytes(), 3);
        let small = BackupRecord {
            compressed_size: (1 << 30) - 1,
            ..full_record
        };
        assert_eq!(small.compressed_gigabytes(), 0);
    }

    #[rstest]
    fn inventory_parses_and_filters_to_full_backups() {
        let Ok(records) = parse_inventory(INVENTORY_JSON) else {
            panic!("inventory fixture should parse");
        };
        assert_eq!(records.len(), 2);
        let full = full_only(&records);
        let [only] = full.as_slice() else {
            panic!("exactly one full backup expected, got {}", full.len());
        };
        assert_eq!(only.backup_name, "base_000000010000000000000002");
    }

    #[rstest]
    fn serialized_records_parse_back_unchanged(full_record: BackupRecord) {
        let original = vec![
            full_record.clone(),
            BackupRecord {
                backup_name: String::from("base_0000_D_0001"),
                ..full_record
            },
        ];
        let json = match serde_json::to_string(&original) {
            Ok(json) => json,
            Err(err) => panic!("records should serialize: {err}"),
        };
        let Ok(parsed) = parse_inventory(&json) else {
            panic!("serialized records should parse back");
        };
        assert_eq!(parsed, original);
    }

    #[rstest]
    fn malformed_inventory_is_an_error() {
        assert!(parse_inventory("wal-g: command not found").is_err());
        assert!(parse_inventory("{\"not\": \"a list\"}").is_err());
    }
}

mod message_rendering {
    use super::*;

    #[rstest]
    fn start_and_end_messages_share_the_run_id(timezone: Tz) {
        let run_id = Uuid::new_v4();
        let Some(instant) = Utc.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).single() else {
            panic!("timestamp should be unambiguous");
        };
        let start = messages::backup_started("prod", "wal-g backup-push /data", instant, timezone, run_id);
        let end = messages::backup_finished("prod", instant, timezone, run_id);

        assert!(start.starts_with("<b>PROD</b>: start backup"));
        assert!(start.contains(&format!("Uuid: <b>{run_id}</b>")));
        assert!(start.contains("Command: <code>wal-g backup-push /data</code>"));
        assert!(start.contains("Date: <b>01.03.2024 02:30</b>"));

        assert!(end.starts_with("<b>PROD</b>: end backup"));
        assert!(end.contains(&format!("Uuid: <b>{run_id}</b>")));
        assert!(!end.contains("Command:"));
    }

    #[rstest]
    fn timezone_shifts_rendered_dates(full_record: BackupRecord) {
        let kyiv: Tz = chrono_tz::Europe::Kyiv;
        let text = messages::inventory(&[full_record], kyiv);
        // 02:00 UTC is 04:00 in Kyiv during winter time.
        assert!(text.contains("Date: 01.03.2024 04:00"), "got: {text}");
    }

    #[rstest]
    fn empty_inventory_renders_the_empty_message(timezone: Tz) {
        assert_eq!(messages::inventory(&[], timezone), "<b>Backup list is empty!</b>");
    }

    #[rstest]
    fn inventory_lists_each_full_backup(timezone: Tz, full_record: BackupRecord) {
        let second = BackupRecord {
            backup_name: String::from("base_000000010000000000000008"),
            ..full_record.clone()
        };
        let text = messages::inventory(&[full_record, second], timezone);
        assert!(text.starts_with("<b>Backup list:</b>"));
        assert_eq!(text.matches("<code>-------------------</code>").count(), 2);
        assert!(text.contains("Name: <b>base_000000010000000000000002</b>"));
        assert!(text.contains("Name: <b>base_000000010000000000000008</b>"));
        assert!(text.contains("Size: <b>3GB</b>"));
    }
}

mod backup_job {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn notifies_before_and_after_the_command(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from("done"))]));
        let notifier = RecordingNotifier::new();
        let targets = NotificationTargets {
            notifier: Arc::new(notifier.clone()),
            chat_ids: vec![100],
        };
        let job = BackupJob::new(
            executor.clone(),
            Some(targets),
            "prod",
            "wal-g backup-push /data",
            timezone,
        );

        job.run().await;
        settle().await;

        assert_eq!(executor.commands(), vec![String::from("wal-g backup-push /data")]);
        let sent = notifier.sent();
        let [(_, start), (_, end)] = sent.as_slice() else {
            panic!("expected start and end notifications, got {}", sent.len());
        };
        assert!(start.contains("start backup"));
        assert!(end.contains("end backup"));

        let run_id = |text: &str| {
            text.split("Uuid: <b>")
                .nth(1)
                .and_then(|rest| rest.split("</b>").next())
                .map(str::to_owned)
        };
        assert_eq!(run_id(start), run_id(end));
        assert!(run_id(start).is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn still_sends_the_end_notification_when_the_command_fails(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(KubeError::RemoteCommand {
            stderr: String::from("wal-g: out of disk"),
        })]));
        let notifier = RecordingNotifier::new();
        let targets = NotificationTargets {
            notifier: Arc::new(notifier.clone()),
            chat_ids: vec![100],
        };
        let job = BackupJob::new(executor, Some(targets), "prod", "wal-g backup-push /data", timezone);

        job.run().await;
        settle().await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|(_, text)| text.contains("end backup")));
    }

    #[rstest]
    #[tokio::test]
    async fn fans_out_to_every_chat(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::new())]));
        let notifier = RecordingNotifier::new();
        let targets = NotificationTargets {
            notifier: Arc::new(notifier.clone()),
            chat_ids: vec![1, 2, -100_200],
        };
        let job = BackupJob::new(executor, Some(targets), "prod", "true", timezone);

        job.run().await;
        settle().await;

        let mut chats: Vec<i64> = notifier.sent().iter().map(|(chat, _)| *chat).collect();
        chats.sort_unstable();
        // Two notifications per chat: start and end.
        assert_eq!(chats, vec![-100_200, -100_200, 1, 1, 2, 2]);
    }

    #[rstest]
    #[tokio::test]
    async fn rejected_notifications_do_not_stop_the_run(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::new())]));
        let targets = NotificationTargets {
            notifier: Arc::new(crate::test_support::FailingNotifier),
            chat_ids: vec![1],
        };
        let job = BackupJob::new(executor.clone(), Some(targets), "prod", "true", timezone);

        job.run().await;
        settle().await;

        assert_eq!(executor.commands().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn runs_silently_without_notification_targets(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::new())]));
        let job = BackupJob::new(executor.clone(), None, "prod", "true", timezone);

        job.run().await;

        assert_eq!(executor.commands().len(), 1);
    }
}

mod info_job {
    use super::*;

    fn targets(notifier: &RecordingNotifier) -> NotificationTargets {
        NotificationTargets {
            notifier: Arc::new(notifier.clone()),
            chat_ids: vec![7],
        }
    }

    #[rstest]
    #[tokio::test]
    async fn reports_and_stores_full_backups(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from(INVENTORY_JSON))]));
        let notifier = RecordingNotifier::new();
        let storage = Arc::new(RecordingStorage::new());
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            Some(storage.clone()),
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        let sent = notifier.sent();
        let [(7, text)] = sent.as_slice() else {
            panic!("expected one notification, got {sent:?}");
        };
        assert!(text.contains("base_000000010000000000000002"));
        assert!(!text.contains("_D_"), "incremental backup leaked: {text}");

        let uploads = storage.uploads();
        let [upload] = uploads.as_slice() else {
            panic!("expected one upload, got {}", uploads.len());
        };
        assert!(upload.name.starts_with("logs/"));
        assert!(upload.name.ends_with(".json"));
        assert_eq!(upload.content_type, "application/octet-stream");
        assert_eq!(upload.size, u64::try_from(upload.bytes.len()).unwrap_or(u64::MAX));

        let stored: Vec<BackupRecord> = match serde_json::from_slice(&upload.bytes) {
            Ok(stored) => stored,
            Err(err) => panic!("stored artifact should be the full-backup list: {err}"),
        };
        assert_eq!(stored.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn empty_inventory_notifies_but_skips_storage(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from("[]"))]));
        let notifier = RecordingNotifier::new();
        let storage = Arc::new(RecordingStorage::new());
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            Some(storage.clone()),
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent.iter().all(|(_, text)| text == "<b>Backup list is empty!</b>"));
        assert!(storage.uploads().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn incremental_only_inventory_counts_as_empty(timezone: Tz) {
        let incremental_only = r#"[
            {
                "backup_name": "base_000000010000000000000004_D_000000010000000000000002",
                "time": "2024-03-02T02:00:00Z",
                "uncompressed_size": 1073741824,
                "compressed_size": 536870912
            },
            {
                "backup_name": "base_000000010000000000000006_D_000000010000000000000004",
                "time": "2024-03-03T02:00:00Z",
                "uncompressed_size": 1073741824,
                "compressed_size": 536870912
            }
        ]"#;
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from(
            incremental_only,
        ))]));
        let notifier = RecordingNotifier::new();
        let storage = Arc::new(RecordingStorage::new());
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            Some(storage.clone()),
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        let sent = notifier.sent();
        let [(_, text)] = sent.as_slice() else {
            panic!("expected one notification, got {sent:?}");
        };
        assert_eq!(text, "<b>Backup list is empty!</b>");
        assert!(storage.uploads().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn malformed_output_is_swallowed(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from("not json"))]));
        let notifier = RecordingNotifier::new();
        let storage = Arc::new(RecordingStorage::new());
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            Some(storage.clone()),
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        assert!(notifier.sent().is_empty());
        assert!(storage.uploads().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn command_failure_ends_the_run_quietly(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(KubeError::RemoteCommand {
            stderr: String::from("sh: wal-g: not found"),
        })]));
        let notifier = RecordingNotifier::new();
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            None,
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        assert!(notifier.sent().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn storage_rejection_does_not_abort_the_run(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from(INVENTORY_JSON))]));
        let notifier = RecordingNotifier::new();
        let storage = Arc::new(RecordingStorage::rejecting());
        let job = InfoJob::new(
            executor,
            Some(targets(&notifier)),
            Some(storage),
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;
        settle().await;

        // The notification still went out even though the upload failed.
        assert_eq!(notifier.sent().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn runs_without_notifications_or_storage(timezone: Tz) {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(String::from(INVENTORY_JSON))]));
        let job = InfoJob::new(
            executor.clone(),
            None,
            None,
            "wal-g backup-list --json",
            timezone,
        );

        job.run().await;

        assert_eq!(executor.commands(), vec![String::from("wal-g backup-list --json")]);
    }
}
