use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::proxy::authenticator::CredentialsSnapshot;

const DATA_DIR: &str = "github-proxy";
const CONFIG_FILE: &str = "config.json";
const DATA_DIR_ENV: &str = "GITHUB_PROXY_DATA_DIR";
const LOG_REQUESTS_ENV: &str = "LOG_REQUESTS";

/// Get data directory path, creating it if needed
pub fn get_data_dir() -> AppResult<PathBuf> {
    let data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()
            .ok_or_else(|| AppError::Config("Failed to get user config directory".to_string()))?
            .join(DATA_DIR),
    };

    // Ensure directory exists
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

pub fn get_config_path() -> AppResult<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Load application config, falling back to defaults when the file is absent
pub fn load_app_config() -> AppResult<AppConfig> {
    let mut config = load_app_config_from(&get_config_path()?)?;
    apply_env_overrides(&mut config, std::env::var(LOG_REQUESTS_ENV).ok().as_deref());
    Ok(config)
}

pub fn load_app_config_from(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::new());
    }

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// `LOG_REQUESTS` accepts the usual boolean spellings; anything else is ignored.
fn apply_env_overrides(config: &mut AppConfig, log_requests: Option<&str>) {
    let parsed = match log_requests.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "t" | "true") => Some(true),
        Some(v) if matches!(v.as_str(), "0" | "f" | "false") => Some(false),
        _ => None,
    };
    if let Some(enabled) = parsed {
        config.proxy.log_requests = enabled;
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Poll the config file and push credential snapshots whenever it changes.
///
/// The current contents are pushed once on start. Unparseable files are
/// logged and skipped. The task ends when the receiver is dropped.
pub fn watch_config(
    path: PathBuf,
    poll_interval: Duration,
) -> (mpsc::Receiver<CredentialsSnapshot>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        let mut last_modified: Option<SystemTime> = None;
        let mut first = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tx.closed() => break,
            }

            let mtime = modified_time(&path);
            if !first && (mtime.is_none() || mtime == last_modified) {
                continue;
            }
            first = false;
            last_modified = mtime;

            match load_app_config_from(&path) {
                Ok(config) => {
                    if tx.send(config.credentials()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to reload config {:?}: {}", path, e);
                }
            }
        }
        tracing::debug!("Config watcher for {:?} stopped", path);
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "github-proxy-test-{}-{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join(CONFIG_FILE)
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_app_config_from(Path::new("/nonexistent/github-proxy.json")).unwrap();
        assert_eq!(config.proxy.port, 3180);
        assert!(config.github_client_id.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_path("load");
        fs::write(
            &path,
            r#"{"proxy": {"log_requests": true}, "github_client_id": "abc", "github_client_secret": "def"}"#,
        )
        .unwrap();

        let config = load_app_config_from(&path).unwrap();
        assert!(config.proxy.log_requests);
        assert_eq!(
            config.credentials(),
            CredentialsSnapshot {
                client_id: Some("abc".to_string()),
                client_secret: Some("def".to_string()),
            }
        );
    }

    #[test]
    fn test_invalid_json_is_error() {
        let path = temp_path("invalid");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_app_config_from(&path), Err(AppError::Json(_))));
    }

    #[test]
    fn test_log_requests_override() {
        let mut config = AppConfig::new();
        apply_env_overrides(&mut config, Some("true"));
        assert!(config.proxy.log_requests);
        apply_env_overrides(&mut config, Some("garbage"));
        assert!(config.proxy.log_requests);
        apply_env_overrides(&mut config, Some("0"));
        assert!(!config.proxy.log_requests);
        apply_env_overrides(&mut config, None);
        assert!(!config.proxy.log_requests);
    }

    #[tokio::test]
    async fn test_watch_pushes_initial_snapshot() {
        let path = temp_path("watch");
        fs::write(
            &path,
            r#"{"github_client_id": "abc", "github_client_secret": "def"}"#,
        )
        .unwrap();

        let (mut rx, handle) = watch_config(path, Duration::from_millis(10));
        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.client_id.as_deref(), Some("abc"));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
