use std::collections::BTreeMap;

use mta_core::config::{ConversionConfig, default_workers};
use mta_core::error::{ConvertError, Result};
use mta_core::frame::{ConvertedFrame, PixelBuffer};
use mta_core::rate::{FrameRatePolicy, FrameSelector};
use mta_core::traits::{FrameSink, FrameSource};

use crate::converter::convert_frame;

/// Lifecycle of one pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Summary of a completed run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineReport {
    /// Frames read from the source, selected or not.
    pub frames_decoded: usize,
    /// Frames converted and accepted by the sink.
    pub frames_converted: usize,
    /// Rate of the selected frames (`source fps / stride`).
    pub output_fps: f64,
}

/// Video conversion pipeline: source → stride selection → worker pool →
/// re-sequencing → sink.
///
/// Selection runs on the calling thread. Conversion is spread over
/// `workers` scoped threads; results are released to the sink strictly in
/// source order.
///
/// # Example
/// ```
/// use mta_core::config::ConversionConfig;
/// use mta_core::frame::PixelBuffer;
/// use mta_core::rate::FrameRatePolicy;
/// use mta_core::traits::MemorySource;
/// use mta_ascii::pipeline::{CollectSink, PipelineState, VideoPipeline};
///
/// let frames = vec![PixelBuffer::new(8, 8); 6];
/// let mut source = MemorySource::new(frames, 30.0);
/// let mut sink = CollectSink::new();
/// let mut pipeline = VideoPipeline::new(ConversionConfig::default(), FrameRatePolicy::Cap(10));
/// let report = pipeline.run(&mut source, &mut sink).unwrap();
/// assert_eq!(pipeline.state(), PipelineState::Completed);
/// assert_eq!(report.frames_converted, 2);
/// assert_eq!(sink.frames()[1].index, 3);
/// ```
#[derive(Debug)]
pub struct VideoPipeline {
    config: ConversionConfig,
    policy: FrameRatePolicy,
    workers: usize,
    state: PipelineState,
}

impl VideoPipeline {
    #[must_use]
    pub fn new(config: ConversionConfig, policy: FrameRatePolicy) -> Self {
        Self {
            config,
            policy,
            workers: default_workers(),
            state: PipelineState::Idle,
        }
    }

    /// Size of the conversion worker pool.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn policy(&self) -> FrameRatePolicy {
        self.policy
    }

    /// Drive `source` to exhaustion, handing converted frames to `sink`.
    ///
    /// On success the sink has been finished. On failure the sink has been
    /// aborted and the pipeline is `Failed`; if the sink had already
    /// accepted frames the error is wrapped in [`ConvertError::Incomplete`].
    ///
    /// # Errors
    /// `InvalidConfig` for bad parameters or a second run, otherwise the
    /// first decode, conversion or sink error.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<PipelineReport>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        if self.state != PipelineState::Idle {
            return Err(ConvertError::config(format!(
                "video pipeline already used (state {:?})",
                self.state
            )));
        }
        self.config.validate()?;
        self.policy.validate()?;
        if self.workers == 0 {
            return Err(ConvertError::config("workers must be at least 1"));
        }

        let source_fps = source.frame_rate();
        let mut selector = FrameSelector::new(self.policy, source_fps);
        self.state = PipelineState::Streaming;
        log::info!(
            "Pipeline streaming: source {source_fps:.3} fps, stride {}, {} worker(s)",
            selector.stride(),
            self.workers
        );

        let expected = source
            .frame_count_hint()
            .map(|n| selector.selected_of(n));
        let mut progress = Progress::expecting(expected);
        let result = stream(
            &self.config,
            self.workers,
            source,
            sink,
            &mut selector,
            &mut progress,
        )
        .and_then(|()| sink.finish());

        match result {
            Ok(()) => {
                self.state = PipelineState::Completed;
                let report = PipelineReport {
                    frames_decoded: progress.decoded,
                    frames_converted: progress.emitted,
                    output_fps: selector.output_fps(),
                };
                log::info!(
                    "Pipeline completed: {} decoded, {} converted",
                    report.frames_decoded,
                    report.frames_converted
                );
                Ok(report)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                sink.abort();
                log::error!(
                    "Pipeline failed after {} decoded / {} emitted frame(s): {e}",
                    progress.decoded,
                    progress.emitted
                );
                if progress.emitted > 0 {
                    Err(ConvertError::Incomplete {
                        frames_emitted: progress.emitted,
                        source: Box::new(e),
                    })
                } else {
                    Err(e)
                }
            }
        }
    }
}

/// Un log de progression toutes les N frames émises.
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Default)]
struct Progress {
    decoded: usize,
    selected: usize,
    emitted: usize,
    /// Frames the run should emit, from the source's frame count.
    expected: Option<usize>,
}

impl Progress {
    fn expecting(expected: Option<usize>) -> Self {
        Self {
            expected,
            ..Self::default()
        }
    }

    /// Count one emitted frame; true when a progress line is due.
    fn record_emitted(&mut self) -> bool {
        self.emitted += 1;
        self.emitted % PROGRESS_EVERY == 0
    }

    fn percent(&self) -> Option<f64> {
        self.expected
            .filter(|&n| n > 0)
            .map(|n| (self.emitted as f64 / n as f64 * 100.0).min(100.0))
    }

    fn log(&self) {
        match (self.expected, self.percent()) {
            (Some(total), Some(pct)) => {
                log::info!("Progress: {}/{total} ({pct:.1}%)", self.emitted);
            }
            _ => log::info!("Progress: {} frame(s)", self.emitted),
        }
    }
}

struct Job {
    seq: usize,
    index: usize,
    buffer: PixelBuffer,
}

struct Done {
    seq: usize,
    frame: Result<ConvertedFrame>,
}

fn stream<S, K>(
    config: &ConversionConfig,
    workers: usize,
    source: &mut S,
    sink: &mut K,
    selector: &mut FrameSelector,
    progress: &mut Progress,
) -> Result<()>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    std::thread::scope(|scope| {
        let (job_tx, job_rx) = flume::bounded::<Job>(workers * 2);
        // Unbounded: workers never block on results, so a full job queue
        // always drains.
        let (done_tx, done_rx) = flume::unbounded::<Done>();

        for id in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || convert_worker(id, config, &job_rx, &done_tx));
        }
        drop(job_rx);
        drop(done_tx);

        let mut reorder = Resequencer::new();
        let fed = feed(source, selector, &job_tx, &done_rx, &mut reorder, sink, progress);
        drop(job_tx);
        fed?;

        for done in done_rx.iter() {
            reorder.insert(done.seq, done.frame);
            release(&mut reorder, sink, progress)?;
        }
        if reorder.pending() > 0 {
            return Err(ConvertError::encode(format!(
                "{} converted frame(s) never released",
                reorder.pending()
            )));
        }
        Ok(())
    })
}

fn convert_worker(
    id: usize,
    config: &ConversionConfig,
    jobs: &flume::Receiver<Job>,
    done: &flume::Sender<Done>,
) {
    log::debug!("conversion worker {id} started");
    for job in jobs.iter() {
        let frame = convert_frame(&job.buffer, config, job.index).map_err(|e| e.at_frame(job.index));
        if done.send(Done { seq: job.seq, frame }).is_err() {
            break;
        }
    }
    log::debug!("conversion worker {id} stopped");
}

fn feed<S, K>(
    source: &mut S,
    selector: &mut FrameSelector,
    jobs: &flume::Sender<Job>,
    done: &flume::Receiver<Done>,
    reorder: &mut Resequencer<Result<ConvertedFrame>>,
    sink: &mut K,
    progress: &mut Progress,
) -> Result<()>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    while let Some(buffer) = source
        .next_frame()
        .map_err(|e| e.at_frame(progress.decoded))?
    {
        let index = progress.decoded;
        progress.decoded += 1;
        if !selector.admit() {
            continue;
        }

        let seq = progress.selected;
        progress.selected += 1;
        jobs.send(Job { seq, index, buffer })
            .map_err(|_| ConvertError::encode("conversion workers exited early").at_frame(index))?;

        for finished in done.try_iter() {
            reorder.insert(finished.seq, finished.frame);
        }
        release(reorder, sink, progress)?;
    }
    Ok(())
}

fn release<K: FrameSink + ?Sized>(
    reorder: &mut Resequencer<Result<ConvertedFrame>>,
    sink: &mut K,
    progress: &mut Progress,
) -> Result<()> {
    while let Some(result) = reorder.pop_ready() {
        let frame = result?;
        let index = frame.index;
        sink.accept(frame).map_err(|e| e.at_frame(index))?;
        if progress.record_emitted() {
            progress.log();
        }
    }
    Ok(())
}

/// Reorder buffer: items enter in any order, leave by ascending sequence
/// number with no gaps.
///
/// # Example
/// ```
/// use mta_ascii::pipeline::Resequencer;
/// let mut r = Resequencer::new();
/// r.insert(1, 'b');
/// assert_eq!(r.pop_ready(), None);
/// r.insert(0, 'a');
/// assert_eq!(r.pop_ready(), Some('a'));
/// assert_eq!(r.pop_ready(), Some('b'));
/// ```
#[derive(Debug)]
pub struct Resequencer<T> {
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Resequencer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    pub fn insert(&mut self, seq: usize, item: T) {
        debug_assert!(seq >= self.next, "sequence {seq} already released");
        self.pending.insert(seq, item);
    }

    /// Next item in sequence, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Items held back waiting for an earlier sequence number.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for Resequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps every frame in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    frames: Vec<ConvertedFrame>,
    finished: bool,
}

impl CollectSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn frames(&self) -> &[ConvertedFrame] {
        &self.frames
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn into_frames(self) -> Vec<ConvertedFrame> {
        self.frames
    }
}

impl FrameSink for CollectSink {
    fn accept(&mut self, frame: ConvertedFrame) -> Result<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
    }
}
