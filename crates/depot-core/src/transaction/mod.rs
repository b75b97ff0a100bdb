//! Transactions: one in-flight install, remove or addon change.
//!
//! A [`Transaction`] is created by its backend with a [`TransactionDriver`]
//! that performs the real work. The [`TransactionModel`] owns queued and
//! running transactions and starts each driver when the backend is free;
//! the driver then reports through the [`TransactionHandle`] it was given.

mod model;

pub use model::{TransactionEvent, TransactionModel};

use depot_schema::{
    AddonList, BackendId, ResourceKey, TransactionId, TransactionRole, TransactionStatus,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// The backend side of a transaction.
pub trait TransactionDriver: Send + fmt::Debug {
    /// Begin the operation. Progress goes through `handle`.
    fn start(&mut self, handle: TransactionHandle);

    /// Ask the operation to stop. Confirmed by a `Cancelled` status.
    fn cancel(&mut self);

    /// The user agreed to a proceed request.
    fn proceed(&mut self) {}
}

/// An update reported by a running driver.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionUpdate {
    /// Move to a new status.
    Status(TransactionStatus),
    /// Overall progress, 0..=100.
    Progress(u8),
    /// Whether cancellation is currently possible.
    Cancellable(bool),
    /// Bytes per second.
    DownloadSpeed(u64),
    /// Estimated time left.
    RemainingTime(Option<Duration>),
    /// Hard failure; moves the transaction to `DoneWithError`.
    Failed(String),
    /// Non-blocking message for the user.
    PassiveMessage(String),
    /// The backend needs confirmation before continuing.
    ProceedRequest {
        /// Short question.
        title: String,
        /// Details.
        description: String,
    },
    /// Whether the transaction should be shown to users.
    Visible(bool),
}

/// A [`TransactionUpdate`] addressed to one transaction.
#[derive(Debug, Clone)]
pub struct TransactionMessage {
    /// Target transaction.
    pub id: TransactionId,
    /// The update.
    pub update: TransactionUpdate,
}

/// A driver's line back to the [`TransactionModel`]. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    id: TransactionId,
    sender: mpsc::UnboundedSender<TransactionMessage>,
}

impl TransactionHandle {
    pub(crate) fn new(id: TransactionId, sender: mpsc::UnboundedSender<TransactionMessage>) -> Self {
        Self { id, sender }
    }

    /// The transaction this handle reports for.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Send an update. Returns `false` once the model is gone.
    pub fn send(&self, update: TransactionUpdate) -> bool {
        self.sender
            .send(TransactionMessage {
                id: self.id,
                update,
            })
            .is_ok()
    }

    /// Move to `status`.
    pub fn set_status(&self, status: TransactionStatus) -> bool {
        self.send(TransactionUpdate::Status(status))
    }

    /// Report progress.
    pub fn set_progress(&self, progress: u8) -> bool {
        self.send(TransactionUpdate::Progress(progress))
    }

    /// Allow or forbid cancellation from now on.
    pub fn set_cancellable(&self, cancellable: bool) -> bool {
        self.send(TransactionUpdate::Cancellable(cancellable))
    }

    /// Report the transfer rate.
    pub fn set_download_speed(&self, bytes_per_sec: u64) -> bool {
        self.send(TransactionUpdate::DownloadSpeed(bytes_per_sec))
    }

    /// Report the time estimate.
    pub fn set_remaining_time(&self, remaining: Option<Duration>) -> bool {
        self.send(TransactionUpdate::RemainingTime(remaining))
    }

    /// Show or hide the transaction.
    pub fn set_visible(&self, visible: bool) -> bool {
        self.send(TransactionUpdate::Visible(visible))
    }

    /// Fail with a message for the user.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(TransactionUpdate::Failed(message.into()))
    }

    /// Show a non-blocking message.
    pub fn passive_message(&self, message: impl Into<String>) -> bool {
        self.send(TransactionUpdate::PassiveMessage(message.into()))
    }

    /// Ask the user to confirm before continuing.
    pub fn proceed_request(&self, title: impl Into<String>, description: impl Into<String>) -> bool {
        self.send(TransactionUpdate::ProceedRequest {
            title: title.into(),
            description: description.into(),
        })
    }
}

/// One install, remove or addon-change operation.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    backend: BackendId,
    resource: Option<ResourceKey>,
    name: String,
    role: TransactionRole,
    addons: AddonList,
    status: TransactionStatus,
    progress: u8,
    cancellable: bool,
    visible: bool,
    download_speed: u64,
    remaining_time: Option<Duration>,
    error: Option<String>,
    driver: Box<dyn TransactionDriver>,
}

impl Transaction {
    /// Create a queued transaction acting on `resource` (`None` for aggregate updates).
    pub fn new(
        backend: BackendId,
        resource: Option<ResourceKey>,
        name: impl Into<String>,
        role: TransactionRole,
        driver: impl TransactionDriver + 'static,
    ) -> Self {
        Self {
            id: TransactionId::new(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)),
            backend,
            resource,
            name: name.into(),
            role,
            addons: AddonList::default(),
            status: TransactionStatus::Queued,
            progress: 0,
            cancellable: true,
            visible: true,
            download_speed: 0,
            remaining_time: None,
            error: None,
            driver: Box::new(driver),
        }
    }

    /// Attach addon changes.
    pub fn with_addons(mut self, addons: AddonList) -> Self {
        self.addons = addons;
        self
    }

    /// Set the initial cancellable flag.
    pub fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }

    /// Set the initial visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Unique id.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Backend performing the operation.
    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    /// Resource acted upon, `None` for aggregate operations.
    pub fn resource(&self) -> Option<&ResourceKey> {
        self.resource.as_ref()
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the transaction does.
    pub fn role(&self) -> TransactionRole {
        self.role
    }

    /// Addon changes carried by a `ChangeAddons` (or install) transaction.
    pub fn addons(&self) -> &AddonList {
        &self.addons
    }

    /// Current status.
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// User-facing status text.
    pub fn status_text(&self) -> &'static str {
        self.status.status_text(self.role)
    }

    /// Progress, 0..=100.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Whether cancellation would currently be accepted.
    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Whether the transaction is shown to users.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// `true` while downloading or committing.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Bytes per second.
    pub fn download_speed(&self) -> u64 {
        self.download_speed
    }

    /// Estimated time left.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.remaining_time
    }

    /// Failure message, once the transaction failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
