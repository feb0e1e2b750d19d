//! Sync orchestration against a recording device runner.

use async_trait::async_trait;
use mpstudio_config::{ConfigStore, StudioConfig, DEVICE_SECTION};
use mpstudio_device::{
    ChannelConfig, CommandOutput, CommandRunner, DeviceChannel, DeviceError, DeviceInfo,
    DeviceMatch, DevicePrompt, Invocation, PromptAnswer,
};
use mpstudio_sync::{refresh_device, SyncOrchestrator, SyncSession, SyncStats};
use mpstudio_watch::{FileEvent, SettledIntent, SyncKind, SyncQueue};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Records every invocation. Copies of files named `bad*` fail, `list`
/// answers with the configured listing.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    listing: Mutex<String>,
    unreachable: Mutex<bool>,
}

impl RecordingRunner {
    fn with_listing(listing: &str) -> Arc<Self> {
        let runner = Self::default();
        *runner.listing.lock().unwrap() = listing.to_string();
        Arc::new(runner)
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn sync_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.iter().any(|a| a == "fs"))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> mpstudio_device::Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.args.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        if invocation.args == ["connect", "list"] {
            return Ok(CommandOutput {
                stdout: self.listing.lock().unwrap().clone(),
                ..Default::default()
            });
        }
        if *self.unreachable.lock().unwrap() {
            return Err(DeviceError::from_failure(Some(1), "mpremote: no device found", ""));
        }
        if invocation.args.iter().any(|a| a.contains("bad")) {
            return Err(DeviceError::from_failure(
                Some(1),
                "OSError: [Errno 28] ENOSPC",
                "",
            ));
        }
        Ok(CommandOutput::default())
    }
}

struct Project {
    dir: TempDir,
    store: ConfigStore,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::for_project(dir.path());
        Self { dir, store }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("device_code")
    }
}

fn intent(path: PathBuf, kind: SyncKind) -> SettledIntent {
    SettledIntent { path, kind }
}

async fn run_intents(
    runner: &Arc<RecordingRunner>,
    project: &Project,
    intents: Vec<SettledIntent>,
) -> SyncStats {
    let channel = DeviceChannel::spawn(
        runner.clone(),
        ChannelConfig {
            port: Some("COM5".to_string()),
            ..Default::default()
        },
    );
    let orchestrator = SyncOrchestrator::new(channel, project.store.clone(), project.root());
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = orchestrator.spawn(rx);
    for intent in intents {
        tx.send(intent).unwrap();
    }
    drop(tx);
    handle.await.unwrap()
}

#[tokio::test]
async fn test_upsert_copies_and_delete_removes() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    let root = project.root();

    let stats = run_intents(
        &runner,
        &project,
        vec![
            intent(root.join("main.py"), SyncKind::Upserted),
            intent(root.join("lib").join("old.py"), SyncKind::Deleted),
        ],
    )
    .await;

    assert_eq!(stats.copied, 1);
    assert_eq!(stats.removed, 1);
    let local = root.join("main.py").to_string_lossy().into_owned();
    assert_eq!(
        runner.calls(),
        vec![
            vec!["connect", "COM5", "fs", "cp", local.as_str(), ":main.py"],
            vec!["connect", "COM5", "fs", "rm", ":lib/old.py"],
        ]
    );

    let last_sync = project.store.get(DEVICE_SECTION, "last_sync").await.unwrap();
    assert!(last_sync.is_some());
}

#[tokio::test]
async fn test_failure_does_not_stop_processing() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    let root = project.root();

    let stats = run_intents(
        &runner,
        &project,
        vec![
            intent(root.join("bad.py"), SyncKind::Upserted),
            intent(root.join("good.py"), SyncKind::Upserted),
            intent(root.join("bad_too.py"), SyncKind::Deleted),
        ],
    )
    .await;

    assert_eq!(
        stats,
        SyncStats {
            copied: 1,
            removed: 0,
            failed: 2,
            skipped: 0,
        }
    );
    assert_eq!(runner.sync_calls().len(), 3);
}

#[tokio::test]
async fn test_connection_errors_do_not_stop_processing() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    *runner.unreachable.lock().unwrap() = true;
    let root = project.root();

    let stats = run_intents(
        &runner,
        &project,
        (0..5)
            .map(|i| intent(root.join(format!("f{}.py", i)), SyncKind::Upserted))
            .collect(),
    )
    .await;

    assert_eq!(stats.failed, 5);
    assert_eq!(runner.sync_calls().len(), 5);
    assert_eq!(project.store.get(DEVICE_SECTION, "last_sync").await.unwrap(), None);
}

#[tokio::test]
async fn test_outside_root_is_skipped() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());

    let stats = run_intents(
        &runner,
        &project,
        vec![intent(project.dir.path().join("notes.txt"), SyncKind::Upserted)],
    )
    .await;

    assert_eq!(stats.skipped, 1);
    assert!(runner.calls().is_empty());
}

/// Changed, Changed, Deleted 100ms apart inside a 1000ms window: one remove,
/// no copy.
#[tokio::test(start_paused = true)]
async fn test_deleted_last_burst_removes_only() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    let root = project.root();

    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());
    let (queue, intents) = SyncQueue::new(Duration::from_millis(1000));
    let handle = SyncOrchestrator::new(channel, project.store.clone(), root.clone()).spawn(intents);

    queue.push(FileEvent::modified(root.join("a.py")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.push(FileEvent::modified(root.join("a.py")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.push(FileEvent::deleted(root.join("a.py")));

    tokio::time::sleep(Duration::from_secs(3)).await;
    drop(queue);
    let stats = handle.await.unwrap();

    assert_eq!(stats.removed, 1);
    assert_eq!(stats.copied, 0);
    assert_eq!(runner.sync_calls(), vec![vec!["fs", "rm", ":a.py"]]);
}

struct Scripted(Mutex<Vec<PromptAnswer>>);

impl DevicePrompt for Scripted {
    fn confirm(&self, _device: &DeviceInfo) -> PromptAnswer {
        self.0.lock().unwrap().remove(0)
    }
}

const LISTING: &str = "\
/dev/ttyS0 None 0000:0000 None None
/dev/ttyACM1 e6614c311b7e6f35 2e8a:0005 MicroPython Board in FS mode
";

async fn port_used_by_next_command(channel: &DeviceChannel, runner: &RecordingRunner) -> String {
    channel.soft_reset().await.unwrap();
    let calls = runner.calls();
    let last = calls.last().unwrap();
    assert_eq!(last[0], "connect");
    last[1].clone()
}

#[tokio::test]
async fn test_refresh_follows_bound_device_to_new_port() {
    let project = Project::new();
    project.store.record_device("/dev/ttyACM0", "2e8a:0005").await.unwrap();
    let runner = RecordingRunner::with_listing(LISTING);
    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());

    let found = refresh_device(&channel, &project.store, &Scripted(Mutex::new(vec![])))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(found, DeviceMatch::Known(_)));
    assert_eq!(
        project.store.get(DEVICE_SECTION, "port").await.unwrap().as_deref(),
        Some("/dev/ttyACM1")
    );
    assert_eq!(port_used_by_next_command(&channel, &runner).await, "/dev/ttyACM1");
}

#[tokio::test]
async fn test_refresh_binds_confirmed_device() {
    let project = Project::new();
    project.store.set(DEVICE_SECTION, "deviceId", "undefined").await.unwrap();
    let runner = RecordingRunner::with_listing(LISTING);
    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());

    let prompt = Scripted(Mutex::new(vec![PromptAnswer::Yes]));
    let found = refresh_device(&channel, &project.store, &prompt)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(found, DeviceMatch::Confirmed(_)));
    assert_eq!(
        project.store.get(DEVICE_SECTION, "deviceId").await.unwrap().as_deref(),
        Some("2e8a:0005")
    );
    assert_eq!(channel.port().as_deref(), Some("/dev/ttyACM1"));
}

#[tokio::test]
async fn test_refresh_falls_back_to_configured_port() {
    let project = Project::new();
    project.store.record_device("COM7", "dead:beef").await.unwrap();
    let runner = RecordingRunner::with_listing(LISTING);
    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());

    let found = refresh_device(&channel, &project.store, &Scripted(Mutex::new(vec![])))
        .await
        .unwrap();

    assert!(found.is_none());
    assert_eq!(channel.port().as_deref(), Some("COM7"));
    assert_eq!(
        project.store.get(DEVICE_SECTION, "port").await.unwrap().as_deref(),
        Some("COM7")
    );
}

fn session(project: &Project, runner: &Arc<RecordingRunner>, quiet_period_ms: u64) -> SyncSession {
    let settings = StudioConfig {
        quiet_period_ms,
        ..Default::default()
    };
    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());
    SyncSession::with_channel(
        project.dir.path().to_path_buf(),
        project.root(),
        project.store.clone(),
        channel,
        settings,
    )
}

async fn wait_for_sync_calls(runner: &RecordingRunner, count: usize) {
    for _ in 0..200 {
        if runner.sync_calls().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} sync calls, saw {:?}", count, runner.calls());
}

#[tokio::test]
async fn test_session_mirrors_sync_folder() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    let mut session = session(&project, &runner, 100);

    session.start().await.unwrap();
    assert!(session.is_syncing());
    let root = session.sync_root().canonicalize().unwrap();
    tokio::fs::write(root.join("main.py"), "print(1)\n").await.unwrap();

    wait_for_sync_calls(&runner, 1).await;
    let stats = session.disable().await.unwrap();

    assert!(!session.is_syncing());
    assert!(stats.copied >= 1);
    let call = &runner.sync_calls()[0];
    assert_eq!(call[0..2], ["fs", "cp"]);
    assert_eq!(call[3], ":main.py");
}

#[tokio::test]
async fn test_disable_drops_pending_changes() {
    let project = Project::new();
    let runner = Arc::new(RecordingRunner::default());
    let mut session = session(&project, &runner, 60_000);

    session.start().await.unwrap();
    tokio::fs::write(session.sync_root().join("main.py"), "x = 1\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let stats = session.disable().await.unwrap();
    assert_eq!(stats, SyncStats::default());
    assert!(runner.sync_calls().is_empty());
    assert_eq!(session.disable().await, None);
}

#[tokio::test]
async fn test_open_reads_device_cfg() {
    let project = Project::new();
    project.store.record_device("COM9", "2e8a:0005").await.unwrap();
    project.store.set(DEVICE_SECTION, "sync_folder", "src").await.unwrap();
    let runner: Arc<dyn CommandRunner> = Arc::new(RecordingRunner::default());

    let session = SyncSession::open(project.dir.path(), StudioConfig::default(), runner)
        .await
        .unwrap();

    assert_eq!(session.sync_root(), project.dir.path().join("src").as_path());
    assert_eq!(session.channel().port().as_deref(), Some("COM9"));
    assert_eq!(session.project_dir(), Path::new(project.dir.path()));
}

#[tokio::test]
async fn test_device_cfg_inside_sync_folder_is_not_synced() {
    let project = Project::new();
    project.store.set(DEVICE_SECTION, "sync_folder", ".").await.unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let settings = StudioConfig {
        quiet_period_ms: 100,
        ..Default::default()
    };
    let channel = DeviceChannel::spawn(runner.clone(), ChannelConfig::default());
    let mut session = SyncSession::with_channel(
        project.dir.path().to_path_buf(),
        project.dir.path().to_path_buf(),
        project.store.clone(),
        channel,
        settings,
    );

    session.start().await.unwrap();
    tokio::fs::write(session.sync_root().join("main.py"), "print(1)\n")
        .await
        .unwrap();
    wait_for_sync_calls(&runner, 1).await;

    // Long enough for several rounds of last_sync stamping to settle.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let stats = session.disable().await.unwrap();

    let calls = runner.sync_calls();
    assert_eq!(calls.len(), 1, "unexpected sync calls: {:?}", calls);
    assert_eq!(calls[0][3], ":main.py");
    assert_eq!(stats.copied, 1);
    assert!(project.store.get(DEVICE_SECTION, "last_sync").await.unwrap().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_sync_folder_is_resolved() {
    let project = Project::new();
    let real = project.dir.path().join("real_code");
    std::fs::create_dir(&real).unwrap();
    std::os::unix::fs::symlink(&real, project.root()).unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let mut session = session(&project, &runner, 100);

    session.start().await.unwrap();
    assert_eq!(session.sync_root(), real.canonicalize().unwrap().as_path());

    tokio::fs::write(project.root().join("boot.py"), "pass\n")
        .await
        .unwrap();
    wait_for_sync_calls(&runner, 1).await;
    session.disable().await.unwrap();

    let call = &runner.sync_calls()[0];
    assert_eq!(call[0..2], ["fs", "cp"]);
    assert_eq!(call[3], ":boot.py");
}
