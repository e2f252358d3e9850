//! Upload session: form state, event handlers and the two submit flows
//!
//! A `Session` is cheap to clone and may run both flows concurrently. It does
//! not serialize submissions; whichever request completes last owns the
//! status message.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::client::{ClassCraftApi, ServerResponse};
use crate::error::Result;
use crate::form::{ClassCount, SelectedFile};
use crate::progress::{self, Progress, UploadProgress};
use crate::status::{DownloadOffer, Flow, StatusMessage};

/// Transient UI state of one session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    file: Option<SelectedFile>,
    num_classes: ClassCount,
    progress: Progress,
    in_flight: usize,
    message: Option<StatusMessage>,
    download_link: Option<String>,
}

impl SessionState {
    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn num_classes(&self) -> &ClassCount {
        &self.num_classes
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Number of requests awaiting a response
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn message(&self) -> Option<StatusMessage> {
        self.message
    }

    pub fn download_link(&self) -> Option<&str> {
        self.download_link.as_deref()
    }

    /// The link is offered only while the status shows its flow's success
    pub fn download_offer(&self) -> Option<DownloadOffer> {
        match (self.message, &self.download_link) {
            (Some(StatusMessage::Succeeded(flow)), Some(url)) => Some(DownloadOffer {
                flow,
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Notifications for whatever renders the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(StatusMessage),
    ProgressChanged(Progress),
    /// A new download link became available and should be brought into view
    LinkRevealed(DownloadOffer),
}

#[derive(Clone)]
pub struct Session {
    api: Arc<dyn ClassCraftApi>,
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(api: Arc<dyn ClassCraftApi>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            state: Arc::new(RwLock::new(SessionState::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Record the chosen file, replacing any previous selection
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = SelectedFile::pick(path).await?;
        debug!("Selected file {}", file.path().display());
        self.state.write().await.file = Some(file);
        Ok(())
    }

    /// Store the class count text. Rejection happens at submit time only.
    pub async fn set_num_classes(&self, text: &str) {
        self.state.write().await.num_classes = ClassCount::parse(text);
    }

    /// Upload the file with the class count and wait for the sorted result
    pub async fn submit_sort(&self) -> StatusMessage {
        let (file, num_classes) = {
            let state = self.state.read().await;
            (state.file.clone(), state.num_classes.positive())
        };

        let (file, num_classes) = match (file, num_classes) {
            (Some(file), Some(n)) => (file, n),
            _ => {
                warn!("Sort rejected: missing file or invalid class count");
                return self.set_message(StatusMessage::InvalidInput(Flow::Sort)).await;
            }
        };

        self.begin(Flow::Sort).await;
        let (reporter, rx) = progress::channel();
        let result = self
            .drive(rx, self.api.process(&file, num_classes, reporter))
            .await;
        self.complete(Flow::Sort, result).await
    }

    /// Upload the file and wait for the MAP score result
    pub async fn submit_compute_score(&self) -> StatusMessage {
        let file = self.state.read().await.file.clone();

        let Some(file) = file else {
            warn!("MAP calculation rejected: no file selected");
            return self
                .set_message(StatusMessage::InvalidInput(Flow::ComputeScore))
                .await;
        };

        self.begin(Flow::ComputeScore).await;
        let (reporter, rx) = progress::channel();
        let result = self.drive(rx, self.api.calculate(&file, reporter)).await;
        self.complete(Flow::ComputeScore, result).await
    }

    /// Await the request while forwarding upload progress into the state
    async fn drive<F>(&self, mut rx: watch::Receiver<UploadProgress>, call: F) -> F::Output
    where
        F: Future,
    {
        tokio::pin!(call);
        loop {
            tokio::select! {
                output = &mut call => return output,
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Reporter dropped, no more progress to forward
                        return call.await;
                    }
                    let upload = *rx.borrow_and_update();
                    self.update_progress(upload).await;
                }
            }
        }
    }

    async fn begin(&self, flow: Flow) {
        info!("Starting {} request", flow);
        let progress = {
            let mut state = self.state.write().await;
            state.in_flight += 1;
            state.progress = Progress::started();
            state.progress
        };
        self.set_message(StatusMessage::InFlight(flow)).await;
        self.emit(SessionEvent::ProgressChanged(progress));
    }

    async fn update_progress(&self, upload: UploadProgress) {
        let progress = {
            let mut state = self.state.write().await;
            if !state.progress.is_started() {
                return;
            }
            state.progress.update(upload);
            state.progress
        };
        self.emit(SessionEvent::ProgressChanged(progress));
    }

    async fn complete(&self, flow: Flow, result: Result<ServerResponse>) -> StatusMessage {
        let (message, revealed, progress) = {
            let mut state = self.state.write().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 {
                state.progress.finish();
            }

            let (message, revealed) = match result {
                Ok(response) => match response.download_url {
                    Some(url) => {
                        info!("✅ {} finished: {}", flow, url);
                        let is_new = state.download_link.as_deref() != Some(url.as_str());
                        state.download_link = Some(url.clone());
                        let offer = is_new.then(|| DownloadOffer { flow, url });
                        (StatusMessage::Succeeded(flow), offer)
                    }
                    None => {
                        warn!("{} succeeded without a download link", flow);
                        (StatusMessage::MissingDownloadLink, None)
                    }
                },
                Err(e) => {
                    error!("❌ {} request failed: {}", flow, e);
                    (StatusMessage::Failed(flow), None)
                }
            };

            state.message = Some(message);
            (message, revealed, state.progress)
        };

        self.emit(SessionEvent::ProgressChanged(progress));
        self.emit(SessionEvent::StatusChanged(message));
        if let Some(offer) = revealed {
            self.emit(SessionEvent::LinkRevealed(offer));
        }
        message
    }

    async fn set_message(&self, message: StatusMessage) -> StatusMessage {
        self.state.write().await.message = Some(message);
        self.emit(SessionEvent::StatusChanged(message));
        message
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
