//! Push-based result delivery from backends to a consumer.
//!
//! A producer holds a [`StreamSender`] and pushes batches of
//! [`StreamResult`]s; the consumer polls the matching [`ResultsStream`].
//! Every stream ends with exactly one terminal event, whether the producer
//! calls [`StreamSender::finish`] or just drops the sender. Dropping the
//! consumer side is how a search is cancelled: later sends fail quietly.
//!
//! [`AggregatedResultsStream`] merges many streams into one, buffering
//! results for a short debounce window so thousands of tiny batches reach
//! the consumer as a few larger ones.

use depot_schema::ResourceKey;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Streams running longer than this are logged when they finish.
pub const DEFAULT_SLOW_STREAM: Duration = Duration::from_secs(5);

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamResult {
    /// The matching resource.
    pub key: ResourceKey,
    /// Backend-supplied relevance position; lower is more relevant.
    pub rank: u32,
}

impl StreamResult {
    /// Create a result.
    pub fn new(key: ResourceKey, rank: u32) -> Self {
        Self { key, rank }
    }
}

#[derive(Debug)]
enum StreamEvent {
    ResourcesFound(Vec<StreamResult>),
    Finished,
}

/// Producer half of a [`ResultsStream`].
#[derive(Debug)]
pub struct StreamSender {
    sender: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl StreamSender {
    /// Push a batch. Returns `false` once the consumer is gone.
    pub fn resources_found(&self, batch: Vec<StreamResult>) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        if batch.is_empty() {
            return !sender.is_closed();
        }
        sender.send(StreamEvent::ResourcesFound(batch)).is_ok()
    }

    /// Returns `true` while someone still listens.
    pub fn is_open(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Send the terminal event.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(sender) = self.sender.take() {
            // A dropped consumer is not an error.
            let _ = sender.send(StreamEvent::Finished);
        }
    }
}

impl Drop for StreamSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer half: a [`Stream`] of result batches that ends when the producer finishes.
#[derive(Debug)]
pub struct ResultsStream {
    name: String,
    events: UnboundedReceiverStream<StreamEvent>,
    started: Instant,
    slow_after: Duration,
    finished: bool,
}

impl ResultsStream {
    /// Create a connected producer/consumer pair.
    pub fn channel(name: impl Into<String>) -> (StreamSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Self {
            name: name.into(),
            events: UnboundedReceiverStream::new(rx),
            started: Instant::now(),
            slow_after: DEFAULT_SLOW_STREAM,
            finished: false,
        };
        (StreamSender { sender: Some(tx) }, stream)
    }

    /// A stream that yields `results` (if any) and finishes.
    pub fn ready(name: impl Into<String>, results: Vec<StreamResult>) -> Self {
        let (sender, stream) = Self::channel(name);
        sender.resources_found(results);
        sender.finish();
        stream
    }

    /// A stream that finishes without results.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::ready(name, Vec::new())
    }

    /// Override the slow-stream threshold.
    pub fn with_slow_warning(mut self, after: Duration) -> Self {
        self.slow_after = after;
        self
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the terminal event was consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn mark_finished(&mut self) {
        self.finished = true;
        report_if_slow(&self.name, self.started, self.slow_after);
    }
}

impl Stream for ResultsStream {
    type Item = Vec<StreamResult>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.events.poll_next_unpin(cx) {
            Poll::Ready(Some(StreamEvent::ResourcesFound(batch))) => Poll::Ready(Some(batch)),
            Poll::Ready(Some(StreamEvent::Finished) | None) => {
                self.mark_finished();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn report_if_slow(name: &str, started: Instant, slow_after: Duration) {
    let elapsed = started.elapsed();
    if elapsed > slow_after {
        tracing::debug!(
            stream = name,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream took really long"
        );
    }
}

/// Merges several [`ResultsStream`]s into one debounced stream.
///
/// Finishes exactly once, after every child finished and the buffer was flushed.
#[derive(Debug)]
pub struct AggregatedResultsStream {
    name: String,
    children: Vec<ResultsStream>,
    pending: Vec<StreamResult>,
    debounce: Duration,
    timer: Option<Pin<Box<Sleep>>>,
    started: Instant,
    slow_after: Duration,
    finished: bool,
}

impl AggregatedResultsStream {
    /// Merge `children`, emitting buffered results at most once per `debounce`.
    pub fn new(name: impl Into<String>, children: Vec<ResultsStream>, debounce: Duration) -> Self {
        let name = name.into();
        if children.is_empty() {
            tracing::warn!(stream = %name, "Aggregating no streams");
        }
        Self {
            name,
            children,
            pending: Vec::new(),
            debounce,
            timer: None,
            started: Instant::now(),
            slow_after: DEFAULT_SLOW_STREAM,
            finished: false,
        }
    }

    /// Override the slow-stream threshold.
    pub fn with_slow_warning(mut self, after: Duration) -> Self {
        self.slow_after = after;
        self
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Children that have not finished yet.
    pub fn pending_streams(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` once the terminal event was consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain the stream into one vector.
    pub async fn collect_all(mut self) -> Vec<StreamResult> {
        let mut all = Vec::new();
        while let Some(batch) = self.next().await {
            all.extend(batch);
        }
        all
    }

    fn take_pending(&mut self) -> Vec<StreamResult> {
        self.timer = None;
        std::mem::take(&mut self.pending)
    }
}

impl Stream for AggregatedResultsStream {
    type Item = Vec<StreamResult>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        // Children keep their registration order so earlier backends flush first.
        let mut index = 0;
        while index < this.children.len() {
            match this.children[index].poll_next_unpin(cx) {
                Poll::Ready(Some(batch)) => this.pending.extend(batch),
                Poll::Ready(None) => {
                    this.children.remove(index);
                }
                Poll::Pending => index += 1,
            }
        }

        if this.children.is_empty() {
            if !this.pending.is_empty() {
                return Poll::Ready(Some(this.take_pending()));
            }
            this.finished = true;
            report_if_slow(&this.name, this.started, this.slow_after);
            return Poll::Ready(None);
        }

        if this.pending.is_empty() {
            return Poll::Pending;
        }
        if this.debounce.is_zero() {
            return Poll::Ready(Some(this.take_pending()));
        }

        let debounce = this.debounce;
        let timer = this
            .timer
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(debounce)));
        if timer.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Some(this.take_pending()));
        }
        Poll::Pending
    }
}
