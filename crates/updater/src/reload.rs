//! 정책 리로드 감시자
//!
//! [`ReloadWatcher`]는 외부 트리거(데몬에서는 SIGHUP)를 `mpsc` 채널로 받아
//! 정책 파일을 다시 읽고 [`PolicyStore`]를 교체합니다.
//! 스케줄러와 독립적으로 동작하며, 리로드 실패는 로그만 남기고 이전 정책을 유지합니다.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use hikup_core::metrics as m;

use crate::policy::PolicyStore;

/// 정책 리로드 감시자
pub struct ReloadWatcher {
    store: Arc<PolicyStore>,
    path: Option<PathBuf>,
}

impl ReloadWatcher {
    pub fn new(store: Arc<PolicyStore>, path: Option<PathBuf>) -> Self {
        Self { store, path }
    }

    /// 정책 파일을 다시 읽습니다.
    ///
    /// 성공 여부를 반환하며, 에러는 전파하지 않습니다.
    pub async fn reload(&self) -> bool {
        let Some(path) = self.path.clone() else {
            warn!("reload requested but no policy file is configured, ignoring");
            return false;
        };

        let store = Arc::clone(&self.store);
        let load_path = path.clone();
        let result = tokio::task::spawn_blocking(move || store.load(&load_path)).await;

        match result {
            Ok(Ok(loaded)) => {
                metrics::counter!(m::POLICY_RELOADS_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                info!(
                    path = %path.display(),
                    include = loaded.include,
                    exclude = loaded.exclude,
                    "policy reloaded"
                );
                true
            }
            Ok(Err(e)) => {
                metrics::counter!(m::POLICY_RELOADS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                error!(
                    path = %path.display(),
                    error = %e,
                    "policy reload failed, keeping previous policy"
                );
                false
            }
            Err(e) => {
                metrics::counter!(m::POLICY_RELOADS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                error!(error = %e, "policy reload task failed, keeping previous policy");
                false
            }
        }
    }

    /// 트리거를 받을 때마다 리로드합니다.
    ///
    /// 종료 신호를 받거나 트리거 채널이 닫히면 반환합니다.
    pub async fn run(
        &self,
        mut trigger_rx: mpsc::Receiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        debug!(
            path = ?self.path.as_ref().map(|p| p.display().to_string()),
            "reload watcher started"
        );
        loop {
            tokio::select! {
                trigger = trigger_rx.recv() => match trigger {
                    Some(()) => {
                        info!("reload triggered");
                        self.reload().await;
                    }
                    None => {
                        debug!("reload trigger channel closed, watcher stopping");
                        return;
                    }
                },
                _ = shutdown.recv() => {
                    debug!("reload watcher stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::policy::PolicyConfig;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reload_replaces_policy() {
        let file = write_file(".json", r#"{"include_containers":["web"]}"#);
        let store = Arc::new(PolicyStore::new());
        let watcher = ReloadWatcher::new(Arc::clone(&store), Some(file.path().to_path_buf()));

        assert!(watcher.reload().await);
        assert!(store.snapshot().is_included("web"));
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_policy() {
        let file = write_file(".yaml", "include_containers: [web\n");
        let previous = PolicyConfig::new(vec!["db".to_owned()], vec![]);
        let store = Arc::new(PolicyStore::with_policy(previous.clone()));
        let watcher = ReloadWatcher::new(Arc::clone(&store), Some(file.path().to_path_buf()));

        assert!(!watcher.reload().await);
        assert_eq!(*store.snapshot(), previous);
    }

    #[tokio::test]
    async fn reload_without_path_is_ignored() {
        let store = Arc::new(PolicyStore::with_policy(PolicyConfig::new(
            vec!["*".to_owned()],
            vec![],
        )));
        let watcher = ReloadWatcher::new(Arc::clone(&store), None);
        assert!(!watcher.reload().await);
        assert!(store.snapshot().has_wildcard());
    }

    #[tokio::test]
    async fn run_reloads_on_trigger_and_stops_on_shutdown() {
        let file = write_file(".yml", "include_containers: [web]\n");
        let store = Arc::new(PolicyStore::new());
        let watcher = ReloadWatcher::new(Arc::clone(&store), Some(file.path().to_path_buf()));

        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { watcher.run(trigger_rx, shutdown_rx).await });

        trigger_tx.send(()).await.unwrap();
        for _ in 0..100 {
            if store.snapshot().is_included("web") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(store.snapshot().is_included("web"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_exits_when_trigger_channel_closes() {
        let store = Arc::new(PolicyStore::new());
        let watcher = ReloadWatcher::new(store, None);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        drop(trigger_tx);
        watcher.run(trigger_rx, shutdown_rx).await;
    }
}
