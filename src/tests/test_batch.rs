use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::BatchConfig;
use crate::loader::{BatchLoader, LoadOptions};
use crate::notification::MemoryProgressObserver;
use crate::progress::{DefaultProgressReporter, ProgressReporter};
use crate::subtitle::AudioStatus;

struct BatchHarness {
    session: Session,
    loader: Arc<CueAudioLoader>,
    tts: Arc<FakeTts>,
    batch: Arc<BatchLoader>,
    progress: MemoryProgressObserver,
}

fn batch_harness(cue_count: usize, tts: FakeTts, group_delay_ms: u64) -> BatchHarness {
    let session = Session::with_cues(cues(cue_count));
    let tts = Arc::new(tts);
    let loader = Arc::new(CueAudioLoader::new(
        Arc::new(MemoryAudioCache::new()),
        tts.clone(),
        Arc::new(DefaultAudioDecoder::new()),
        TtsConfig::default(),
        PAGE_URL,
    ));
    let reporter = Arc::new(DefaultProgressReporter::new());
    let progress = MemoryProgressObserver::new();
    reporter.add_observer(Box::new(progress.clone()));
    let batch = Arc::new(BatchLoader::new(
        loader.clone(),
        BatchConfig {
            group_size: 5,
            group_delay_ms,
        },
        reporter,
    ));

    BatchHarness {
        session,
        loader,
        tts,
        batch,
        progress,
    }
}

fn statuses(session: &Session) -> Vec<AudioStatus> {
    session
        .lock()
        .cues
        .iter()
        .map(|cue| cue.audio_status)
        .collect()
}

#[tokio::test]
async fn test_batch_loads_all_in_groups() {
    let h = batch_harness(12, FakeTts::new(), 10);

    let report = h
        .batch
        .run_all(&h.session, &LoadOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total, 12);
    assert_eq!(report.loaded, 12);
    assert_eq!(report.failed(), 0);
    assert_eq!(h.tts.calls(), 12);
    assert!(h.tts.max_active() <= 5);
    assert!(statuses(&h.session)
        .iter()
        .all(|status| *status == AudioStatus::Loaded));

    let history = h.progress.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].completed, 5);
    assert_eq!(history[1].completed, 10);
    assert_eq!(history[2].completed, 12);
    assert_eq!(history[2].percent, 100.0);
}

#[tokio::test]
async fn test_cancel_leaves_third_group_unloaded() {
    let (tts, gate) = FakeTts::gated();
    let h = batch_harness(12, tts, 20);
    let cancel = CancellationToken::new();

    let run = {
        let batch = h.batch.clone();
        let session = h.session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            batch
                .run_all(&session, &LoadOptions::default(), &cancel)
                .await
        })
    };

    // Первая группа: пять параллельных запросов
    wait_until(|| h.tts.calls() == 5).await;
    assert_eq!(h.tts.max_active(), 5);
    gate.add_permits(5);

    // Вторая группа запущена, отменяем во время выполнения
    wait_until(|| h.tts.calls() == 10).await;
    cancel.cancel();
    gate.add_permits(5);

    let result = run.await.unwrap();
    assert!(matches!(result, Err(VoiceoverError::Cancelled)));
    assert_eq!(h.tts.calls(), 10);
    assert!(h.tts.max_active() <= 5);

    let statuses = statuses(&h.session);
    assert!(statuses[..10]
        .iter()
        .all(|status| *status == AudioStatus::Loaded));
    assert_eq!(statuses[10], AudioStatus::Unloaded);
    assert_eq!(statuses[11], AudioStatus::Unloaded);
    assert_eq!(h.loader.in_flight_count(), 0);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let h = batch_harness(3, FakeTts::new(), 10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .batch
        .run_all(&h.session, &LoadOptions::default(), &cancel)
        .await;

    tokio_test::assert_err!(result);
    assert_eq!(h.tts.calls(), 0);
    assert!(h.progress.history().is_empty());
}

#[tokio::test]
async fn test_failures_are_collected() {
    let tts = FakeTts::new();
    tts.fail_on("第2句台词");
    let h = batch_harness(4, tts, 10);

    let report = h
        .batch
        .run_all(&h.session, &LoadOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.loaded, 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].0, "2");
    assert_eq!(h.session.status_of("2"), Some(AudioStatus::Failed));
    assert_eq!(h.progress.history()[0].failed, 1);
}

#[tokio::test]
async fn test_only_unloaded_targets_unless_forced() {
    let h = batch_harness(4, FakeTts::new(), 10);
    h.loader
        .ensure_loaded(&h.session, "1", &LoadOptions::default())
        .await;
    assert_eq!(h.tts.calls(), 1);

    let report = h
        .batch
        .run_all(&h.session, &LoadOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(h.tts.calls(), 4);

    let forced = LoadOptions {
        force_regenerate: true,
        ..LoadOptions::default()
    };
    let report = h
        .batch
        .run_all(&h.session, &forced, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.loaded, 4);
    assert_eq!(h.tts.calls(), 8);
}

#[tokio::test]
async fn test_cancel_resets_orphaned_loading_cue() {
    let (tts, gate) = FakeTts::gated();
    let h = batch_harness(12, tts, 20);
    // Субтитр остался в Loading без выполняющейся загрузки
    h.session.lock().cues[11].mark_loading();
    let cancel = CancellationToken::new();
    let forced = LoadOptions {
        force_regenerate: true,
        ..LoadOptions::default()
    };

    let run = {
        let batch = h.batch.clone();
        let session = h.session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { batch.run_all(&session, &forced, &cancel).await })
    };

    wait_until(|| h.tts.calls() == 5).await;
    cancel.cancel();
    gate.add_permits(5);

    let result = run.await.unwrap();
    assert!(matches!(result, Err(VoiceoverError::Cancelled)));
    assert_eq!(h.tts.calls(), 5);

    let statuses = statuses(&h.session);
    assert!(statuses[..5]
        .iter()
        .all(|status| *status == AudioStatus::Loaded));
    assert_eq!(statuses[11], AudioStatus::Unloaded);
    assert_eq!(h.loader.in_flight_count(), 0);
}
