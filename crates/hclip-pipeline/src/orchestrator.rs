//! Pipeline orchestration.
//!
//! ```text
//! store ─┬─ scene detection ─┬─ selection ─ normalization ─ extraction
//!        └─ transcription ───┘
//! ```
//!
//! Any stage error funnels through one path: the input is marked failed,
//! removed, and the original error is returned. On success the caller gets
//! the clip plus a [`CleanupObligation`] for both files.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

use hclip_inference::SharedModel;
use hclip_media::fs_utils::remove_file_best_effort;
use hclip_media::{AssetStore, ByteStream, ClipExtractor, SceneSegmenter, Transcriber};
use hclip_models::{
    AssetState, HighlightCandidate, HighlightRequest, SceneBoundary, TranscriptSegment, VideoAsset,
};

use crate::cleanup::CleanupObligation;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::logging::RunLogger;
use crate::metrics::record_run;
use crate::normalize::DurationNormalizer;
use crate::pool::StagePool;
use crate::selector::ContentSelector;

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineComponents {
    pub store: Arc<dyn AssetStore>,
    pub segmenter: Arc<dyn SceneSegmenter>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn ClipExtractor>,
    pub model: Arc<SharedModel>,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct HighlightOutput {
    /// The extracted clip
    pub clip: VideoAsset,
    /// The normalized window that was cut
    pub candidate: HighlightCandidate,
    /// Removes the input and the clip once the clip has been delivered
    pub cleanup: CleanupObligation,
}

/// Highlight extraction pipeline.
pub struct HighlightPipeline {
    components: PipelineComponents,
    selector: ContentSelector,
    normalizer: DurationNormalizer,
    pool: StagePool,
    config: PipelineConfig,
}

impl HighlightPipeline {
    pub fn new(components: PipelineComponents, config: PipelineConfig, temperature: f32) -> Self {
        Self {
            selector: ContentSelector::new(temperature),
            normalizer: DurationNormalizer::new(config.clamp_to_source),
            pool: StagePool::new(config.max_parallel_stages),
            components,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<SharedModel> {
        &self.components.model
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.components.store
    }

    /// Store an upload and run the pipeline on it.
    pub async fn process_upload(
        &self,
        stream: ByteStream,
        original_name: Option<&str>,
        request: HighlightRequest,
    ) -> PipelineResult<HighlightOutput> {
        validate_request(&request)?;
        let input = self.components.store.store(stream, original_name).await?;
        self.run(input, &request).await
    }

    /// Fetch a remote video and run the pipeline on it.
    pub async fn process_url(
        &self,
        url: &str,
        request: HighlightRequest,
    ) -> PipelineResult<HighlightOutput> {
        validate_request(&request)?;
        let input = self.components.store.fetch(url).await?;
        self.run(input, &request).await
    }

    /// Run every stage on a stored input.
    pub async fn run(
        &self,
        mut input: VideoAsset,
        request: &HighlightRequest,
    ) -> PipelineResult<HighlightOutput> {
        let logger = RunLogger::new(input.id.to_string(), "highlight");
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            logger.log_start(&format!(
                "input={} target={}s intent={}",
                input.file_name(),
                request.target_duration,
                request.intent().is_some()
            ));

            let outcome = match input.transition(AssetState::InUse) {
                Ok(()) => self.execute(&input, request, &logger).await,
                Err(e) => Err(PipelineError::internal(Stage::Intake, e.to_string())),
            };

            match outcome {
                Ok((mut clip, candidate)) => {
                    if let Err(e) = input.transition(AssetState::Completed) {
                        logger.log_warning(&e.to_string());
                    }
                    if let Err(e) = clip.transition(AssetState::Completed) {
                        logger.log_warning(&e.to_string());
                    }

                    record_run("success", started.elapsed().as_secs_f64());
                    logger.log_completion(&format!(
                        "clip={} window={:.2}-{:.2}",
                        clip.file_name(),
                        candidate.start_time,
                        candidate.end_time
                    ));

                    Ok(HighlightOutput {
                        cleanup: CleanupObligation::new(vec![input, clip.clone()]),
                        clip,
                        candidate,
                    })
                }
                Err(err) => {
                    logger.log_failure(err.stage().as_str(), err.code(), &err.to_string());
                    if let Err(e) = input.transition(AssetState::Failed) {
                        logger.log_warning(&e.to_string());
                    }
                    if remove_file_best_effort(input.path()).await {
                        let _ = input.transition(AssetState::Cleaned);
                    } else {
                        logger.log_warning(&format!("input {} left on disk", input.path().display()));
                    }

                    record_run(err.code(), started.elapsed().as_secs_f64());
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        input: &VideoAsset,
        request: &HighlightRequest,
        logger: &RunLogger,
    ) -> PipelineResult<(VideoAsset, HighlightCandidate)> {
        validate_request(request)?;
        let target = request.target_duration;

        let (scenes, transcript) = tokio::try_join!(
            self.pool.run(Stage::SceneDetection, self.detect_scenes(input)),
            self.pool.run(Stage::Transcription, self.transcribe(input)),
        )?;

        if transcript.is_empty() {
            return Err(PipelineError::NoAudioContent);
        }
        logger.log_progress(&format!(
            "{} scenes, {} transcript segments",
            scenes.len(),
            transcript.len()
        ));

        // Model access is serialized by the shared handle, not the pool
        let selection = self
            .pool
            .timed(Stage::Selection, async {
                let model = self
                    .components
                    .model
                    .acquire()
                    .await
                    .map_err(PipelineError::from_inference_error)?;
                self.selector
                    .select(&model, &transcript, &scenes, target, request.intent())
                    .await
            })
            .await?;

        let mut candidates = selection.highlights.into_iter();
        let chosen = candidates.next().ok_or(PipelineError::NoHighlightFound)?;
        for (rank, alternate) in candidates.enumerate() {
            debug!(
                rank = rank + 1,
                start = alternate.start_time,
                end = alternate.end_time,
                summary = %alternate.summary,
                "Alternate candidate not used"
            );
        }

        let source_duration = if self.normalizer.clamps_to_source() {
            let duration = self
                .components
                .segmenter
                .source_duration(input)
                .await
                .map_err(|e| PipelineError::media_decode(Stage::Normalization, e.to_string()))?;
            Some(duration)
        } else {
            None
        };
        let window = self.normalizer.apply(&chosen, target, source_duration);
        logger.log_progress(&format!(
            "selected {:.2}-{:.2}, normalized to {:.2}-{:.2}",
            chosen.start_time, chosen.end_time, window.start_time, window.end_time
        ));

        let clip = self
            .pool
            .run(
                Stage::Extraction,
                self.components
                    .extractor
                    .cut(input, window.start_time, window.end_time),
            )
            .await
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        Ok((clip, window))
    }

    async fn detect_scenes(&self, input: &VideoAsset) -> PipelineResult<Vec<SceneBoundary>> {
        self.components
            .segmenter
            .detect(input)
            .await
            .map_err(PipelineError::from_scene_error)
    }

    async fn transcribe(&self, input: &VideoAsset) -> PipelineResult<Vec<TranscriptSegment>> {
        self.components
            .transcriber
            .transcribe(input)
            .await
            .map_err(PipelineError::from_transcription_error)
    }
}

fn validate_request(request: &HighlightRequest) -> PipelineResult<()> {
    request
        .validate()
        .map_err(|e| PipelineError::validation(Stage::Intake, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use hclip_inference::{CompletionRequest, InferenceEngine, InferenceResult, ModelLoader};
    use hclip_media::{LocalAssetStore, MediaError, MediaResult};
    use hclip_models::AssetId;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;
    use tempfile::TempDir;

    struct FakeSegmenter {
        scenes: Vec<SceneBoundary>,
        duration: f64,
        fail: bool,
    }

    #[async_trait]
    impl SceneSegmenter for FakeSegmenter {
        async fn detect(&self, _asset: &VideoAsset) -> MediaResult<Vec<SceneBoundary>> {
            if self.fail {
                return Err(MediaError::InvalidVideo("No video stream found".into()));
            }
            Ok(self.scenes.clone())
        }

        async fn source_duration(&self, _asset: &VideoAsset) -> MediaResult<f64> {
            Ok(self.duration)
        }
    }

    struct FakeTranscriber {
        segments: Vec<TranscriptSegment>,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _asset: &VideoAsset) -> MediaResult<Vec<TranscriptSegment>> {
            Ok(self.segments.clone())
        }
    }

    /// Writes a small file named after the input, like the real extractor.
    struct FakeExtractor {
        output_dir: PathBuf,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClipExtractor for FakeExtractor {
        async fn cut(&self, asset: &VideoAsset, start: f64, end: f64) -> MediaResult<VideoAsset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            hclip_media::clip::validate_range(start, end)?;
            tokio::fs::create_dir_all(&self.output_dir).await?;
            let path = self
                .output_dir
                .join(hclip_media::clip::clip_file_name(asset));
            tokio::fs::write(&path, format!("{start}-{end}")).await?;
            Ok(VideoAsset::new(AssetId::new(), path))
        }
    }

    /// Answers with a fixed body, or echoes the user intent as a candidate.
    enum Reply {
        Fixed(String),
        EchoIntent,
    }

    /// Records how many stage permits were free when the model was used.
    #[derive(Default)]
    struct PermitWatch {
        pool: OnceLock<StagePool>,
        free: Mutex<Vec<usize>>,
    }

    impl PermitWatch {
        fn record(&self) {
            if let Some(pool) = self.pool.get() {
                self.free.lock().unwrap().push(pool.available());
            }
        }
    }

    struct ScriptedEngine {
        reply: Arc<Reply>,
        calls: Arc<AtomicUsize>,
        watch: Arc<PermitWatch>,
    }

    #[async_trait]
    impl InferenceEngine for ScriptedEngine {
        async fn complete(&mut self, request: &CompletionRequest) -> InferenceResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.watch.record();
            match self.reply.as_ref() {
                Reply::Fixed(body) => Ok(body.clone()),
                Reply::EchoIntent => {
                    let prompt = &request.messages[1].content;
                    let marker = "matches this request: '";
                    let start = prompt.find(marker).map(|i| i + marker.len()).unwrap_or(0);
                    let intent = &prompt[start..start + prompt[start..].find('\'').unwrap_or(0)];
                    Ok(serde_json::json!({
                        "highlights": [{
                            "start_time": 10.0,
                            "end_time": 40.0,
                            "summary": intent,
                            "reason": "echo"
                        }]
                    })
                    .to_string())
                }
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct ScriptedLoader {
        reply: Arc<Reply>,
        calls: Arc<AtomicUsize>,
        loads: AtomicUsize,
        artifact: PathBuf,
        watch: Arc<PermitWatch>,
    }

    #[async_trait]
    impl ModelLoader for ScriptedLoader {
        async fn load(&self) -> InferenceResult<Box<dyn InferenceEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.watch.record();
            Ok(Box::new(ScriptedEngine {
                reply: Arc::clone(&self.reply),
                calls: Arc::clone(&self.calls),
                watch: Arc::clone(&self.watch),
            }))
        }

        fn artifact(&self) -> &Path {
            &self.artifact
        }
    }

    struct Harness {
        dir: TempDir,
        pipeline: HighlightPipeline,
        extractor: Arc<FakeExtractor>,
        loader: Arc<ScriptedLoader>,
    }

    impl Harness {
        fn inference_calls(&self) -> usize {
            self.loader.calls.load(Ordering::SeqCst)
        }

        fn extractor_calls(&self) -> usize {
            self.extractor.calls.load(Ordering::SeqCst)
        }

        async fn input(&self) -> VideoAsset {
            let id = AssetId::new();
            let path = self.dir.path().join(format!("{}.mp4", id));
            tokio::fs::write(&path, b"video").await.unwrap();
            VideoAsset::new(id, path)
        }
    }

    fn speech() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(0.0, 30.0, "intro"),
            TranscriptSegment::new(50.0, 100.0, "the good part"),
        ]
    }

    fn highlight_json(start: f64, end: f64) -> String {
        format!(
            r#"{{"highlights": [{{"start_time": {start:?}, "end_time": {end:?}, "summary": "best", "reason": "laughs"}}]}}"#
        )
    }

    fn harness(transcript: Vec<TranscriptSegment>, reply: Reply, scene_failure: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let extractor = Arc::new(FakeExtractor {
            output_dir: dir.path().join("output"),
            calls: AtomicUsize::new(0),
        });
        let loader = Arc::new(ScriptedLoader {
            reply: Arc::new(reply),
            calls: Arc::new(AtomicUsize::new(0)),
            loads: AtomicUsize::new(0),
            artifact: PathBuf::from("models/test.gguf"),
            watch: Arc::new(PermitWatch::default()),
        });

        let components = PipelineComponents {
            store: Arc::new(LocalAssetStore::new(dir.path())),
            segmenter: Arc::new(FakeSegmenter {
                scenes: vec![
                    SceneBoundary::new(0.0, 120.0).unwrap(),
                    SceneBoundary::new(120.0, 300.0).unwrap(),
                ],
                duration: 300.0,
                fail: scene_failure,
            }),
            transcriber: Arc::new(FakeTranscriber {
                segments: transcript,
            }),
            extractor: extractor.clone(),
            model: Arc::new(SharedModel::new(loader.clone())),
        };

        let config = PipelineConfig {
            work_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("output"),
            ..Default::default()
        };

        Harness {
            pipeline: HighlightPipeline::new(components, config, 0.7),
            dir,
            extractor,
            loader,
        }
    }

    #[tokio::test]
    async fn test_success_normalizes_and_cleans_up() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);
        let input = h.input().await;

        let output = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap();

        assert_eq!(output.candidate.start_time, 60.0);
        assert_eq!(output.candidate.end_time, 90.0);
        assert_eq!(output.candidate.summary, "best");
        assert_eq!(output.clip.file_name(), format!("highlight_{}.mp4", input.id));
        assert_eq!(output.clip.state, AssetState::Completed);
        assert!(output.clip.path().exists());
        assert!(input.path().exists());

        let cleaned = output.cleanup.discharge().await;
        assert_eq!(cleaned.len(), 2);
        assert!(!input.path().exists());
        assert!(!output.clip.path().exists());
    }

    #[tokio::test]
    async fn test_model_load_and_selection_hold_no_stage_permit() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);
        let _ = h.loader.watch.pool.set(h.pipeline.pool.clone());
        let size = h.pipeline.pool.size();

        h.pipeline
            .run(h.input().await, &HighlightRequest::default())
            .await
            .unwrap();

        // one entry for the load, one for the completion
        assert_eq!(*h.loader.watch.free.lock().unwrap(), vec![size, size]);
    }

    #[tokio::test]
    async fn test_short_candidate_is_padded_from_zero() {
        let h = harness(speech(), Reply::Fixed(highlight_json(5.0, 20.0)), false);
        let output = h
            .pipeline
            .run(h.input().await, &HighlightRequest::default())
            .await
            .unwrap();

        assert_eq!(output.candidate.start_time, 0.0);
        assert_eq!(output.candidate.end_time, 30.0);
        output.cleanup.discharge().await;
    }

    #[tokio::test]
    async fn test_window_is_clamped_to_source_end() {
        let h = harness(speech(), Reply::Fixed(highlight_json(285.0, 300.0)), false);
        let output = h
            .pipeline
            .run(h.input().await, &HighlightRequest::default())
            .await
            .unwrap();

        assert_eq!(output.candidate.start_time, 270.0);
        assert_eq!(output.candidate.end_time, 300.0);
        output.cleanup.discharge().await;
    }

    #[tokio::test]
    async fn test_no_audio_stops_before_inference() {
        let h = harness(Vec::new(), Reply::Fixed(highlight_json(0.0, 30.0)), false);
        let input = h.input().await;

        let err = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoAudioContent));
        assert!(err.is_client_error());
        assert_eq!(h.inference_calls(), 0);
        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
        assert!(!input.path().exists());
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_parse_error() {
        let h = harness(speech(), Reply::Fixed("I think 1:30 is great".into()), false);
        let input = h.input().await;

        let err = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SelectionParse(_)));
        assert!(!err.is_client_error());
        assert_eq!(h.extractor_calls(), 0);
        assert!(!input.path().exists());
    }

    #[tokio::test]
    async fn test_empty_selection_is_no_highlight() {
        let h = harness(speech(), Reply::Fixed(r#"{"highlights": []}"#.into()), false);
        let input = h.input().await;

        let err = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoHighlightFound));
        assert_eq!(h.extractor_calls(), 0);
        assert!(!input.path().exists());
    }

    #[tokio::test]
    async fn test_decode_failure_is_fatal() {
        let h = harness(speech(), Reply::Fixed(highlight_json(0.0, 30.0)), true);
        let input = h.input().await;

        let err = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MediaDecode { stage: Stage::SceneDetection, .. }));
        assert_eq!(h.inference_calls(), 0);
        assert!(!input.path().exists());
    }

    #[tokio::test]
    async fn test_invalid_duration_removes_input() {
        let h = harness(speech(), Reply::Fixed(highlight_json(0.0, 30.0)), false);
        let input = h.input().await;

        let err = h
            .pipeline
            .run(input.clone(), &HighlightRequest::new(-1.0, None))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation { .. }));
        assert!(!input.path().exists());
    }

    #[tokio::test]
    async fn test_model_loaded_once_across_runs() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);

        for _ in 0..3 {
            let output = h
                .pipeline
                .run(h.input().await, &HighlightRequest::default())
                .await
                .unwrap();
            output.cleanup.discharge().await;
        }

        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.inference_calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_get_their_own_results() {
        let h = Arc::new(harness(speech(), Reply::EchoIntent, false));

        let mut tasks = Vec::new();
        for i in 0..4 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                let intent = format!("topic {i}");
                let request = HighlightRequest::new(30.0, Some(intent.clone()));
                let output = h.pipeline.run(h.input().await, &request).await.unwrap();
                let summary = output.candidate.summary.clone();
                output.cleanup.discharge().await;
                (intent, summary)
            }));
        }

        for task in tasks {
            let (intent, summary) = task.await.unwrap();
            assert_eq!(intent, summary);
        }
        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_upload_stores_then_runs() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);
        let stream: ByteStream = Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from_static(
            b"video bytes",
        ))]));

        let output = h
            .pipeline
            .process_upload(stream, Some("talk.mp4"), HighlightRequest::default())
            .await
            .unwrap();

        let input = &output.cleanup.assets()[0];
        assert_eq!(input.original_name.as_deref(), Some("talk.mp4"));
        assert_eq!(output.clip.file_name(), format!("highlight_{}.mp4", input.id));
        output.cleanup.discharge().await;
    }

    #[tokio::test]
    async fn test_process_upload_without_filename_is_validation() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);
        let stream: ByteStream = Box::pin(futures_util::stream::iter(Vec::new()));

        let err = h
            .pipeline
            .process_upload(stream, None, HighlightRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { stage: Stage::Intake, .. }));
    }

    #[tokio::test]
    async fn test_dropped_output_still_cleans_up() {
        let h = harness(speech(), Reply::Fixed(highlight_json(50.0, 100.0)), false);
        let input = h.input().await;
        let output = h
            .pipeline
            .run(input.clone(), &HighlightRequest::default())
            .await
            .unwrap();
        let clip_path = output.clip.path.clone();

        drop(output);

        for _ in 0..100 {
            if !input.path().exists() && !clip_path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("dropped output left files behind");
    }
}
