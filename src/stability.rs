//! File stability detection.
//!
//! A freshly detected file may still be mid-write. Before acting on it the
//! watchers poll its size until it stops changing for a continuous window,
//! a heuristic that the writer has finished.

use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Size as last observed; `Unknown` covers a file that does not exist yet
/// or disappeared mid-poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observed {
    Size(u64),
    Unknown,
}

async fn observe(path: &Path) -> Observed {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Observed::Size(meta.len()),
        Err(_) => Observed::Unknown,
    }
}

/// Waits until the size of `path` has been unchanged for `stable_time`
/// continuously, sampling every `poll`. Returns `true` on stability and
/// `false` once `timeout` elapses first. Transient stat errors reset the
/// stability window but never abort the wait early.
pub async fn wait_until_stable(
    path: &Path,
    timeout: Duration,
    stable_time: Duration,
    poll: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut last = observe(path).await;
    let mut unchanged_since = Instant::now();

    loop {
        if matches!(last, Observed::Size(_)) && unchanged_since.elapsed() >= stable_time {
            debug!("File settled: {}", path.display());
            return true;
        }
        if Instant::now() >= deadline {
            debug!("Timed out waiting for file to settle: {}", path.display());
            return false;
        }

        tokio::time::sleep(poll).await;

        let current = observe(path).await;
        if current != last || current == Observed::Unknown {
            last = current;
            unchanged_since = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const POLL: Duration = Duration::from_millis(20);
    const STABLE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_settled_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.wav");
        std::fs::write(&path, b"finished recording").unwrap();

        assert!(wait_until_stable(&path, Duration::from_secs(5), STABLE, POLL).await);
    }

    #[tokio::test]
    async fn test_growing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.wav");
        std::fs::write(&path, b"start").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..60 {
                let mut content = std::fs::read(&writer_path).unwrap();
                content.extend_from_slice(b"more audio");
                std::fs::write(&writer_path, content).unwrap();
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        });

        let stable =
            wait_until_stable(&path, Duration::from_millis(400), STABLE, POLL).await;
        writer.abort();
        assert!(!stable);
    }

    #[tokio::test]
    async fn test_missing_file_times_out_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.wav");

        assert!(!wait_until_stable(&path, Duration::from_millis(300), STABLE, POLL).await);
    }

    #[tokio::test]
    async fn test_file_appearing_mid_poll_becomes_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.wav");

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            std::fs::write(&writer_path, b"arrived late").unwrap();
        });

        assert!(wait_until_stable(&path, Duration::from_secs(5), STABLE, POLL).await);
    }
}
