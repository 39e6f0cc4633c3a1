//! Supervisor lifecycle tests.
//!
//! `sh` stands in for the rendering server: it runs the "document" as a
//! script, so the document decides how the child behaves.

#![cfg(target_os = "linux")]

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use easy_slide::config::DEFAULT_LOG_FILTER;
use easy_slide::supervisor::{Supervisor, SupervisorConfig, SupervisorStatus};
use tempfile::TempDir;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter};

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn sh_supervisor(script: &str) -> (Supervisor, TempDir) {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let document = tmp.path().join("slide.md");
    std::fs::write(&document, script).expect("Failed to write script");

    let mut config = SupervisorConfig::new(document);
    config.program = "sh".to_string();
    config.settle = Duration::from_millis(20);
    (Supervisor::new(config), tmp)
}

fn pid_of(status: SupervisorStatus) -> u32 {
    match status {
        SupervisorStatus::Running { pid: Some(pid), .. } => pid,
        other => panic!("expected a running child, got {:?}", other),
    }
}

fn generation_of(status: SupervisorStatus) -> u64 {
    match status {
        SupervisorStatus::Running { generation, .. } => generation,
        other => panic!("expected a running child, got {:?}", other),
    }
}

fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[tokio::test]
async fn start_runs_one_child() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");

    let started = supervisor.start().await.expect("start failed");

    assert_eq!(generation_of(started), 1);
    assert_eq!(supervisor.status().await, started);
    assert!(process_exists(pid_of(started)));

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn restart_replaces_the_previous_child() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");

    let first = pid_of(supervisor.start().await.unwrap());
    let second = pid_of(supervisor.restart().await.unwrap());

    assert_ne!(first, second);
    assert!(!process_exists(first));
    assert!(process_exists(second));

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_restarts_are_serialized() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");
    let initial = pid_of(supervisor.start().await.unwrap());

    let (a, b) = tokio::join!(supervisor.restart(), supervisor.restart());
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut generations = vec![generation_of(a), generation_of(b)];
    generations.sort();
    assert_eq!(generations, vec![2, 3]);

    // Only the last spawned child survives.
    let last = if generation_of(a) == 3 { a } else { b };
    let replaced = if generation_of(a) == 3 { b } else { a };
    assert_eq!(supervisor.status().await, last);
    assert!(!process_exists(initial));
    assert!(!process_exists(pid_of(replaced)));
    assert!(process_exists(pid_of(last)));

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn background_restart_completes() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");

    supervisor.restart_in_background().await.unwrap();

    assert!(supervisor.status().await.is_running());
    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn exited_child_is_reported_stopped() {
    let (supervisor, _tmp) = sh_supervisor("exit 0\n");
    supervisor.start().await.unwrap();

    let mut status = supervisor.status().await;
    for _ in 0..100 {
        if status == SupervisorStatus::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = supervisor.status().await;
    }

    assert_eq!(status, SupervisorStatus::Stopped);
}

#[tokio::test]
async fn shutdown_stops_the_child() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");
    let pid = pid_of(supervisor.start().await.unwrap());

    supervisor.shutdown().await.unwrap();

    assert_eq!(supervisor.status().await, SupervisorStatus::Stopped);
    assert!(!process_exists(pid));
}

#[tokio::test]
async fn shutdown_when_stopped_is_a_no_op() {
    let (supervisor, _tmp) = sh_supervisor("exec sleep 30\n");

    supervisor.shutdown().await.unwrap();

    assert_eq!(supervisor.status().await, SupervisorStatus::Stopped);
}

#[tokio::test]
async fn child_output_reaches_the_default_log_filter() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(DEFAULT_LOG_FILTER))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(logs.clone()),
        );
    let _guard = tracing::subscriber::set_default(subscriber);

    let (supervisor, _tmp) = sh_supervisor("echo hello-from-renderer\nexec sleep 30\n");
    supervisor.start().await.unwrap();

    for _ in 0..100 {
        if logs.contents().contains("hello-from-renderer") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let output = logs.contents();
    assert!(output.contains("hello-from-renderer"), "{}", output);
    assert!(output.contains("easy_slide::renderer"), "{}", output);

    supervisor.shutdown().await.unwrap();
}
