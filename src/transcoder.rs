//! Job orchestration: geometry, blur plan, temporal policy and command, then supervision.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::blur::{plan_regions, BlurPlan};
use crate::command::{build_args, thread_count, EncodeSpec};
use crate::config::TranscoderConfig;
use crate::domain::{Dimensions, TranscodeOptions, TranscodeResult};
use crate::error::{Result, TimelapseError};
use crate::ffmpeg::FFmpeg;
use crate::filter_graph::FilterGraph;
use crate::geometry::ScalingTransform;
use crate::job::{CancelToken, JobEvent, JobId, JobRegistry, Stage};
use crate::speed::SpeedPolicy;
use crate::supervisor::{Supervisor, SupervisorSettings};

/// Everything derived from the inputs before the encoder runs
#[derive(Debug, Clone, Serialize)]
pub struct TranscodePlan {
    pub video: Dimensions,
    pub thumbnail: Dimensions,
    pub transform: ScalingTransform,
    pub blur: BlurPlan,
    pub speed: SpeedPolicy,
    pub filter_graph: String,
    pub args: Vec<String>,
}

/// Derive the full plan. Pure: the same inputs always give the same plan.
pub fn plan_transcode(
    source: &Path,
    output: &Path,
    options: &TranscodeOptions,
    video: Dimensions,
    threads: usize,
    max_blur_regions: usize,
) -> Result<TranscodePlan> {
    if !options.speed_factor.is_finite() || options.speed_factor <= 0.0 {
        return Err(TimelapseError::InvalidInput(format!(
            "speed factor must be a positive number, got {}",
            options.speed_factor
        )));
    }

    let thumbnail = options.thumbnail_dimensions().unwrap_or(video);
    let transform = ScalingTransform::resolve(video, thumbnail)?;
    let blur = plan_regions(&options.blur_regions, &transform, max_blur_regions);
    let speed = SpeedPolicy::for_speed(options.speed_factor);
    let graph = FilterGraph::build(&speed.filter, &blur.honored);

    let args = build_args(&EncodeSpec {
        input: source,
        output,
        threads,
        graph: &graph,
        output_fps: speed.output_fps,
        quality: options.output_quality,
        speed_factor: options.speed_factor,
    });

    Ok(TranscodePlan {
        video,
        thumbnail,
        transform,
        blur,
        speed,
        filter_graph: graph.expression,
        args,
    })
}

/// Caller's view of a running job
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    events: UnboundedReceiver<JobEvent>,
    task: JoinHandle<Result<TranscodeResult>>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Next event; `None` after the terminal event
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    pub async fn wait(self) -> Result<TranscodeResult> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TimelapseError::Cancelled),
            Err(e) => Err(TimelapseError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("transcode task failed: {}", e),
            ))),
        }
    }
}

/// Entry point for running timelapse jobs
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: FFmpeg,
    config: TranscoderConfig,
    registry: JobRegistry,
}

impl Transcoder {
    pub fn new(config: TranscoderConfig) -> Result<Self> {
        let ffmpeg = FFmpeg::new(config.ffmpeg_path.as_deref())?;
        Ok(Self::with_ffmpeg(ffmpeg, config))
    }

    pub fn with_ffmpeg(ffmpeg: FFmpeg, config: TranscoderConfig) -> Self {
        Self {
            ffmpeg,
            config,
            registry: JobRegistry::new(),
        }
    }

    pub fn ffmpeg(&self) -> &FFmpeg {
        &self.ffmpeg
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Start a job on the current tokio runtime.
    ///
    /// Fails immediately when the source is missing or already being transcoded;
    /// everything after that is reported through the job's events.
    pub fn start(
        &self,
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        options: TranscodeOptions,
    ) -> Result<JobHandle> {
        let source = source.into();
        let output = output.into();
        let id = JobId::generate();
        let span = tracing::info_span!("job", job_id = %id);

        if !source.is_file() {
            span.in_scope(|| tracing::error!(source = %source.display(), "Source video not found"));
            return Err(TimelapseError::SourceNotFound(source));
        }

        let cancel = CancelToken::new();
        let guard = match self.registry.register(&id, &source, cancel.clone()) {
            Ok(guard) => guard,
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "Rejected transcode"));
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let ffmpeg = self.ffmpeg.clone();
        let config = self.config.clone();

        let task = tokio::spawn(
            async move {
                tracing::info!(
                    source = %source.display(),
                    output = %output.display(),
                    speed = options.speed_factor,
                    quality = %options.output_quality,
                    "Transcode started"
                );

                let result =
                    run_job(&ffmpeg, &config, &source, &output, &options, &cancel, &tx).await;

                // Free the source before the terminal event so callers may restart right away
                drop(guard);

                match &result {
                    Ok(done) => {
                        let _ = tx.send(JobEvent::Completed {
                            output_path: done.output_path.clone(),
                        });
                    }
                    Err(e) => {
                        tracing::error!(kind = ?e.kind(), error = %e, "Transcode failed");
                        let _ = tx.send(JobEvent::Failed(e.to_failure()));
                    }
                }
                result
            }
            .instrument(span),
        );

        Ok(JobHandle { id, events: rx, task })
    }

    /// Run a job to completion, handing every event to `on_event`.
    pub async fn transcode<F>(
        &self,
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        options: TranscodeOptions,
        mut on_event: F,
    ) -> Result<TranscodeResult>
    where
        F: FnMut(&JobId, &JobEvent),
    {
        let mut handle = self.start(source, output, options)?;
        while let Some(event) = handle.next_event().await {
            on_event(handle.id(), &event);
        }
        handle.wait().await
    }

    /// Returns false when `id` is not running
    pub fn cancel(&self, id: &JobId) -> bool {
        let found = self.registry.cancel(id);
        if found {
            tracing::info!(job_id = %id, "Cancellation requested");
        }
        found
    }

    pub fn cancel_all(&self) {
        self.registry.cancel_all();
    }

    /// Resolve source dimensions: explicit options, then probe, then fallback.
    pub async fn resolve_dimensions(
        &self,
        source: &Path,
        options: &TranscodeOptions,
    ) -> Dimensions {
        resolve_dimensions(&self.ffmpeg, &self.config, source, options).await
    }
}

async fn resolve_dimensions(
    ffmpeg: &FFmpeg,
    config: &TranscoderConfig,
    source: &Path,
    options: &TranscodeOptions,
) -> Dimensions {
    if let Some(dims) = options.video_dimensions() {
        return dims;
    }

    match ffmpeg.probe(source).await {
        Ok(info) => match info.dimensions {
            Some(dims) => {
                tracing::debug!(%dims, "Probed source dimensions");
                dims
            }
            None => {
                tracing::warn!(
                    fallback = %config.fallback_dimensions(),
                    "Probe found no dimensions"
                );
                config.fallback_dimensions()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, fallback = %config.fallback_dimensions(), "Probe failed");
            config.fallback_dimensions()
        }
    }
}

async fn run_job(
    ffmpeg: &FFmpeg,
    config: &TranscoderConfig,
    source: &Path,
    output: &Path,
    options: &TranscodeOptions,
    cancel: &CancelToken,
    events: &UnboundedSender<JobEvent>,
) -> Result<TranscodeResult> {
    let _ = events.send(JobEvent::Progress {
        percent: 0,
        stage: Stage::Starting,
    });

    if options.video_dimensions().is_none() {
        let _ = events.send(JobEvent::Progress {
            percent: 0,
            stage: Stage::Probing,
        });
    }
    let video = resolve_dimensions(ffmpeg, config, source, options).await;

    if cancel.is_cancelled() {
        return Err(TimelapseError::Cancelled);
    }

    let plan = plan_transcode(
        source,
        output,
        options,
        video,
        thread_count(config.min_threads),
        config.max_blur_regions,
    )?;

    if plan.transform.correction_applied {
        tracing::info!(
            scale = plan.transform.scale_x,
            offset_x = plan.transform.offset_x,
            offset_y = plan.transform.offset_y,
            "Thumbnail aspect differs from video, using uniform scale"
        );
    }
    let none_valid = !options.blur_regions.is_empty() && plan.blur.is_empty();
    if none_valid {
        let notice = TimelapseError::NoValidBlurRegions(format!(
            "all {} regions fall outside the {} frame",
            options.blur_regions.len(),
            video
        ));
        tracing::warn!(kind = ?notice.kind(), "{}", notice);
    }
    if !plan.blur.dropped.is_empty() {
        let _ = events.send(JobEvent::RegionsDropped {
            dropped: plan.blur.dropped.clone(),
            none_valid,
        });
    }
    tracing::debug!(
        args = ?FFmpeg::sanitize_args_for_logging(&plan.args),
        "Running encoder"
    );

    let mut supervisor = Supervisor::new(SupervisorSettings::from(config));
    let output_path = supervisor
        .run(ffmpeg.path(), &plan.args, output, cancel, events)
        .await?;

    if !options.preserve_original {
        match tokio::fs::remove_file(source).await {
            Ok(()) => tracing::info!(source = %source.display(), "Removed original recording"),
            Err(e) => tracing::warn!(error = %e, "Could not remove original recording"),
        }
    }

    Ok(TranscodeResult { output_path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlurRegion, OutputQuality};

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    fn scenario_options() -> TranscodeOptions {
        TranscodeOptions {
            speed_factor: 3.0,
            output_quality: OutputQuality::High,
            blur_regions: vec![BlurRegion {
                x: 50.0,
                y: 50.0,
                width: 100.0,
                height: 80.0,
            }],
            video_width: Some(1920),
            video_height: Some(1080),
            thumbnail_width: Some(320),
            thumbnail_height: Some(240),
            preserve_original: true,
        }
    }

    #[test]
    fn test_letterboxed_single_region_plan() {
        let options = scenario_options();
        let plan = plan_transcode(
            Path::new("capture.webm"),
            Path::new("capture_timelapse.mp4"),
            &options,
            options.video_dimensions().unwrap(),
            4,
            3,
        )
        .unwrap();

        assert!(plan.transform.correction_applied);
        assert_eq!(plan.transform.scale_x, 4.5);
        assert_eq!(plan.blur.honored.len(), 1);
        let rect = plan.blur.honored[0];
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (225, 225, 450, 360));
        assert!(plan.filter_graph.contains("split=2[base][r0]"));
        assert!(plan.filter_graph.contains("crop=450:360:225:225"));
        assert_eq!(plan.speed.output_fps, 60);
        assert_eq!(value_after(&plan.args, "-crf"), Some("22"));
        assert_eq!(value_after(&plan.args, "-r"), Some("60"));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let options = scenario_options();
        let a = plan_transcode(
            Path::new("a.webm"),
            Path::new("b.mp4"),
            &options,
            Dimensions::new(1920, 1080),
            6,
            3,
        )
        .unwrap();
        let b = plan_transcode(
            Path::new("a.webm"),
            Path::new("b.mp4"),
            &options,
            Dimensions::new(1920, 1080),
            6,
            3,
        )
        .unwrap();
        assert_eq!(a.args, b.args);
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        for speed in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let options = TranscodeOptions {
                speed_factor: speed,
                ..TranscodeOptions::default()
            };
            let err = plan_transcode(
                Path::new("a.webm"),
                Path::new("b.mp4"),
                &options,
                Dimensions::new(1920, 1080),
                4,
                3,
            )
            .unwrap_err();
            assert!(matches!(err, TimelapseError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_zero_dimensions_are_invalid_geometry() {
        let options = TranscodeOptions {
            thumbnail_width: Some(0),
            thumbnail_height: Some(240),
            ..TranscodeOptions::default()
        };
        let err = plan_transcode(
            Path::new("a.webm"),
            Path::new("b.mp4"),
            &options,
            Dimensions::new(1920, 1080),
            4,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, TimelapseError::InvalidGeometry(_)));
    }

    #[test]
    fn test_missing_thumbnail_uses_video_space() {
        let options = TranscodeOptions {
            blur_regions: vec![BlurRegion {
                x: 100.0,
                y: 100.0,
                width: 200.0,
                height: 50.0,
            }],
            ..TranscodeOptions::default()
        };
        let plan = plan_transcode(
            Path::new("a.webm"),
            Path::new("b.mp4"),
            &options,
            Dimensions::new(1280, 720),
            4,
            3,
        )
        .unwrap();
        assert!(!plan.transform.correction_applied);
        assert_eq!(plan.blur.honored[0].width, 200);
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected_at_start() {
        let transcoder = Transcoder::with_ffmpeg(
            FFmpeg::with_path("/nonexistent/ffmpeg"),
            TranscoderConfig::default(),
        );
        let err = transcoder
            .start(
                "/nonexistent/capture.webm",
                "/tmp/out.mp4",
                TranscodeOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, TimelapseError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("capture.webm");
        std::fs::write(&source, b"not really a video").unwrap();

        let transcoder = Transcoder::with_ffmpeg(
            FFmpeg::with_path("/nonexistent/ffmpeg"),
            TranscoderConfig::default(),
        );
        let options = TranscodeOptions {
            video_width: Some(1920),
            video_height: Some(1080),
            ..TranscodeOptions::default()
        };

        let mut events = Vec::new();
        let result = transcoder
            .transcode(&source, dir.path().join("out.mp4"), options, |_, e| {
                events.push(e.clone())
            })
            .await;

        assert!(matches!(result, Err(TimelapseError::EncoderSpawnFailure(_))));
        match events.last() {
            Some(JobEvent::Failed(failure)) => {
                assert_eq!(failure.kind, crate::error::ErrorKind::EncoderSpawnFailure)
            }
            other => panic!("unexpected last event: {other:?}"),
        }
        assert!(transcoder.registry().running().is_empty());
        // Source kept on failure
        assert!(source.exists());
    }
}
