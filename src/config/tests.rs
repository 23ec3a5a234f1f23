//! Unit tests for configuration validation.

use super::*;
use rstest::{fixture, rstest};

#[fixture]
fn settings() -> Settings {
    Settings {
        app: AppConfig {
            timezone: String::from("UTC"),
            save_logs: false,
        },
        kubernetes: KubernetesConfig {
            host: String::from("https://10.0.0.1:6443"),
            insecure: true,
            bearer_token: String::from("token"),
            namespace: String::from("databases"),
            label_selector: String::from("app=postgres"),
            container_name: String::from("postgres"),
        },
        exec: ExecConfig {
            backup: String::from("wal-g backup-push /data"),
            info: String::from(DEFAULT_INFO_COMMAND),
        },
        cron: CronConfig {
            backup: String::from("0 0 3 * * *"),
            info: None,
        },
        telegram: TelegramConfig {
            api_endpoint: String::from("https://api.telegram.org"),
            http_proxy: None,
            bot_token: None,
            backup_notification_enabled: false,
            backup_notification_chats: String::new(),
            info_notification_enabled: false,
            info_notification_chats: String::new(),
        },
        file_storage: FileStorageConfig {
            endpoint: None,
            bucket: None,
            access_key: None,
            secret_key: None,
            region: String::from("us-east-1"),
            secure: true,
        },
    }
}

#[rstest]
fn minimal_settings_validate(settings: Settings) {
    assert_eq!(settings.validate(), Ok(()));
    assert!(!settings.info_job_required());
}

#[rstest]
fn unknown_timezone_is_rejected(settings: Settings) {
    let cfg = Settings {
        app: AppConfig {
            timezone: String::from("Mars/Olympus_Mons"),
            save_logs: false,
        },
        ..settings
    };
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::InvalidTimezone { .. })
    ));
}

#[rstest]
#[case::host(|k: &mut KubernetesConfig| k.host = String::new())]
#[case::token(|k: &mut KubernetesConfig| k.bearer_token = String::from("  "))]
#[case::namespace(|k: &mut KubernetesConfig| k.namespace = String::new())]
#[case::selector(|k: &mut KubernetesConfig| k.label_selector = String::new())]
#[case::container(|k: &mut KubernetesConfig| k.container_name = String::new())]
fn empty_kubernetes_fields_are_rejected(
    settings: Settings,
    #[case] clear: fn(&mut KubernetesConfig),
) {
    let mut cfg = settings;
    clear(&mut cfg.kubernetes);
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::MissingField { .. })
    ));
}

#[rstest]
fn enabled_notifications_require_a_bot_token(settings: Settings) {
    let mut cfg = settings;
    cfg.telegram.backup_notification_enabled = true;
    let Err(ConfigError::MissingField { env_var, .. }) = cfg.validate() else {
        panic!("expected MissingField");
    };
    assert_eq!(env_var, "TG_BOT_TOKEN");

    cfg.telegram.bot_token = Some(String::from("123:abc"));
    assert_eq!(cfg.validate(), Ok(()));
}

#[rstest]
fn info_job_requires_info_cadence(settings: Settings) {
    let mut cfg = settings;
    cfg.telegram.info_notification_enabled = true;
    cfg.telegram.bot_token = Some(String::from("123:abc"));
    assert!(cfg.info_job_required());

    let Err(ConfigError::MissingField { env_var, .. }) = cfg.validate() else {
        panic!("expected MissingField");
    };
    assert_eq!(env_var, "CRON_INFO");

    cfg.cron.info = Some(String::from("0 0 9 * * *"));
    assert_eq!(cfg.validate(), Ok(()));
}

#[rstest]
fn save_logs_requires_storage_settings(settings: Settings) {
    let mut cfg = settings;
    cfg.app.save_logs = true;
    cfg.cron.info = Some(String::from("0 0 9 * * *"));
    assert!(cfg.info_job_required());

    let Err(ConfigError::MissingField { env_var, .. }) = cfg.validate() else {
        panic!("expected MissingField");
    };
    assert_eq!(env_var, "FS_ENDPOINT");

    cfg.file_storage.endpoint = Some(String::from("minio.internal:9000"));
    cfg.file_storage.bucket = Some(String::from("backups"));
    cfg.file_storage.access_key = Some(String::from("ak"));
    cfg.file_storage.secret_key = Some(String::from("sk"));
    assert_eq!(cfg.validate(), Ok(()));
}

#[rstest]
fn chat_id_lists_parse_with_whitespace_and_negatives(settings: Settings) {
    let mut cfg = settings;
    cfg.telegram.backup_notification_chats = String::from(" 1234, -100987 ,42");
    assert_eq!(cfg.telegram.backup_chat_ids(), Ok(vec![1234, -100_987, 42]));
    assert_eq!(cfg.telegram.info_chat_ids(), Ok(Vec::new()));
}

#[rstest]
fn malformed_chat_id_is_rejected(settings: Settings) {
    let mut cfg = settings;
    cfg.telegram.info_notification_chats = String::from("1234,abc");
    let Err(ConfigError::InvalidChatId { value, env_var }) = cfg.telegram.info_chat_ids() else {
        panic!("expected InvalidChatId");
    };
    assert_eq!(value, "abc");
    assert_eq!(env_var, "TG_INFO_NOTIFICATION_CHATS");
}

#[rstest]
fn timezone_parses_to_explicit_value(settings: Settings) {
    let cfg = Settings {
        app: AppConfig {
            timezone: String::from("Europe/Kyiv"),
            save_logs: false,
        },
        ..settings
    };
    assert_eq!(cfg.timezone(), Ok(chrono_tz::Europe::Kyiv));
}
