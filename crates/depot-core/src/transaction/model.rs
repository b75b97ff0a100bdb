use super::{Transaction, TransactionHandle, TransactionMessage, TransactionUpdate};
use crate::error::TransactionError;
use crate::signal::Subscribers;
use depot_schema::{BackendId, ResourceKey, TransactionId, TransactionStatus};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Notifications published by the [`TransactionModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    /// The model went from empty to non-empty.
    StartingFirstTransaction,
    /// A transaction was queued.
    Added {
        /// The transaction.
        id: TransactionId,
        /// Resource it acts on.
        resource: Option<ResourceKey>,
    },
    /// The driver was started; the transaction owns its backend now.
    Started {
        /// The transaction.
        id: TransactionId,
    },
    /// Status moved forward.
    StatusChanged {
        /// The transaction.
        id: TransactionId,
        /// Resource it acts on.
        resource: Option<ResourceKey>,
        /// New status.
        status: TransactionStatus,
    },
    /// Progress moved forward.
    ProgressChanged {
        /// The transaction.
        id: TransactionId,
        /// Resource it acts on.
        resource: Option<ResourceKey>,
        /// New progress.
        progress: u8,
    },
    /// Cancellable flag flipped.
    CancellableChanged {
        /// The transaction.
        id: TransactionId,
        /// New flag.
        cancellable: bool,
    },
    /// Speed, time estimate or visibility changed.
    DetailsChanged {
        /// The transaction.
        id: TransactionId,
    },
    /// A cancel request hit a non-cancellable transaction.
    CancellationRejected {
        /// The transaction.
        id: TransactionId,
    },
    /// The backend wants confirmation.
    ProceedRequested {
        /// The transaction.
        id: TransactionId,
        /// Short question.
        title: String,
        /// Details.
        description: String,
    },
    /// Non-blocking message for the user.
    PassiveMessage {
        /// The transaction.
        id: TransactionId,
        /// Message text.
        message: String,
    },
    /// The transaction reached a terminal status and was dropped.
    Removed {
        /// The transaction.
        id: TransactionId,
        /// Resource it acted on.
        resource: Option<ResourceKey>,
        /// Terminal status.
        status: TransactionStatus,
        /// Failure message, for `DoneWithError`.
        error: Option<String>,
    },
    /// The model became empty.
    LastTransactionFinished,
    /// [`TransactionModel::progress`] changed.
    AggregateProgressChanged(u8),
}

impl TransactionEvent {
    /// The resource the event concerns, when it names one.
    pub fn resource(&self) -> Option<&ResourceKey> {
        match self {
            Self::Added { resource, .. }
            | Self::StatusChanged { resource, .. }
            | Self::ProgressChanged { resource, .. }
            | Self::Removed { resource, .. } => resource.as_ref(),
            _ => None,
        }
    }
}

/// Registry of active transactions.
///
/// Keeps at most one started transaction per backend. Later requests for the
/// same backend wait in `Queued` and start, in submission order, when the
/// running one reaches a terminal status.
#[derive(Debug)]
pub struct TransactionModel {
    transactions: Vec<Transaction>,
    running: HashMap<BackendId, TransactionId>,
    sender: mpsc::UnboundedSender<TransactionMessage>,
    receiver: mpsc::UnboundedReceiver<TransactionMessage>,
    subscribers: Subscribers<TransactionEvent>,
    last_progress: u8,
}

impl Default for TransactionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionModel {
    /// Create an empty model.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            transactions: Vec::new(),
            running: HashMap::new(),
            sender,
            receiver,
            subscribers: Subscribers::new(),
            last_progress: 0,
        }
    }

    /// Listen to [`TransactionEvent`]s.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TransactionEvent> {
        self.subscribers.subscribe()
    }

    /// Queue a transaction and start it if its backend is idle.
    pub fn add_transaction(&mut self, transaction: Transaction) -> TransactionId {
        let id = transaction.id();
        let backend = transaction.backend().clone();
        if transaction.status() != TransactionStatus::Queued {
            tracing::warn!(%id, status = %transaction.status(), "Adding a transaction that is not queued");
        }

        if self.transactions.is_empty() {
            self.emit(TransactionEvent::StartingFirstTransaction);
        }
        let resource = transaction.resource().cloned();
        self.transactions.push(transaction);
        self.emit(TransactionEvent::Added { id, resource });

        self.start_next(&backend);
        self.refresh_progress();
        id
    }

    /// Look up an active transaction.
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id() == id)
    }

    /// Active transactions in submission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The active transaction acting on `resource`, if any. Linear scan.
    pub fn transaction_from_resource(&self, resource: &ResourceKey) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.resource() == Some(resource))
    }

    /// Position of a transaction in submission order.
    pub fn index_of(&self, id: TransactionId) -> Option<usize> {
        self.transactions.iter().position(|t| t.id() == id)
    }

    /// Returns `true` if the transaction is still active.
    pub fn contains(&self, id: TransactionId) -> bool {
        self.index_of(id).is_some()
    }

    /// Number of active transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns `true` if nothing is queued or running.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// The transaction currently owning `backend`.
    pub fn running_on(&self, backend: &BackendId) -> Option<TransactionId> {
        self.running.get(backend).copied()
    }

    /// Mean progress of the active, visible transactions; 0 if there are none.
    pub fn progress(&self) -> u8 {
        let (sum, count) = self
            .transactions
            .iter()
            .filter(|t| t.is_active() && t.is_visible())
            .fold((0u32, 0u32), |(sum, count), t| {
                (sum + u32::from(t.progress()), count + 1)
            });
        if count == 0 { 0 } else { (sum / count) as u8 }
    }

    /// Request cancellation.
    ///
    /// A transaction that was never started is finalized as `Cancelled` right
    /// away; a running one is asked through its driver and ends when the
    /// backend confirms.
    pub fn cancel(&mut self, id: TransactionId) -> Result<(), TransactionError> {
        let index = self.index_of(id).ok_or(TransactionError::Unknown(id))?;
        if !self.transactions[index].is_cancellable() {
            tracing::warn!(%id, "Cancellation rejected, transaction is not cancellable");
            self.emit(TransactionEvent::CancellationRejected { id });
            return Err(TransactionError::NotCancellable(id));
        }

        let backend = self.transactions[index].backend().clone();
        if self.running.get(&backend) == Some(&id) {
            self.transactions[index].driver.cancel();
        } else {
            tracing::debug!(%id, "Cancelling a transaction that never started");
            self.set_status(index, TransactionStatus::Cancelled);
        }
        Ok(())
    }

    /// Forward the user's confirmation to the driver.
    pub fn proceed(&mut self, id: TransactionId) -> Result<(), TransactionError> {
        let index = self.index_of(id).ok_or(TransactionError::Unknown(id))?;
        self.transactions[index].driver.proceed();
        Ok(())
    }

    /// Apply one driver update.
    pub fn handle_event(&mut self, message: TransactionMessage) {
        let TransactionMessage { id, update } = message;
        let Some(index) = self.index_of(id) else {
            tracing::debug!(%id, ?update, "Update for a transaction that already finished");
            return;
        };

        match update {
            TransactionUpdate::Status(status) => self.set_status(index, status),
            TransactionUpdate::Progress(progress) => self.set_progress(index, progress),
            TransactionUpdate::Cancellable(cancellable) => {
                let transaction = &mut self.transactions[index];
                if transaction.cancellable != cancellable {
                    transaction.cancellable = cancellable;
                    self.emit(TransactionEvent::CancellableChanged { id, cancellable });
                }
            }
            TransactionUpdate::DownloadSpeed(speed) => {
                self.transactions[index].download_speed = speed;
                self.emit(TransactionEvent::DetailsChanged { id });
            }
            TransactionUpdate::RemainingTime(remaining) => {
                self.transactions[index].remaining_time = remaining;
                self.emit(TransactionEvent::DetailsChanged { id });
            }
            TransactionUpdate::Visible(visible) => {
                self.transactions[index].visible = visible;
                self.emit(TransactionEvent::DetailsChanged { id });
                self.refresh_progress();
            }
            TransactionUpdate::Failed(message) => {
                tracing::warn!(%id, error = %message, "Transaction failed");
                self.transactions[index].error = Some(message);
                self.set_status(index, TransactionStatus::DoneWithError);
            }
            TransactionUpdate::PassiveMessage(message) => {
                self.emit(TransactionEvent::PassiveMessage { id, message });
            }
            TransactionUpdate::ProceedRequest { title, description } => {
                self.emit(TransactionEvent::ProceedRequested {
                    id,
                    title,
                    description,
                });
            }
        }
    }

    /// Apply every update already waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.handle_event(message);
            handled += 1;
        }
        handled
    }

    /// Wait for the next driver update.
    pub async fn next_event(&mut self) -> Option<TransactionMessage> {
        self.receiver.recv().await
    }

    fn set_status(&mut self, index: usize, status: TransactionStatus) {
        let transaction = &mut self.transactions[index];
        let id = transaction.id();
        let from = transaction.status();
        if from == status {
            return;
        }
        if !from.can_advance_to(status, transaction.role()) {
            tracing::warn!(%id, %from, to = %status, role = ?transaction.role(), "Ignoring invalid transaction transition");
            return;
        }
        if status.is_active() && self.running.get(transaction.backend()) != Some(&id) {
            tracing::warn!(%id, to = %status, "Ignoring activity of a transaction that was not started");
            return;
        }

        transaction.status = status;
        let resource = transaction.resource().cloned();
        self.emit(TransactionEvent::StatusChanged {
            id,
            resource,
            status,
        });

        if status.is_terminal() {
            self.finalize(index);
        } else {
            self.refresh_progress();
        }
    }

    fn set_progress(&mut self, index: usize, progress: u8) {
        let transaction = &mut self.transactions[index];
        let id = transaction.id();
        let progress = progress.min(100);
        if progress < transaction.progress {
            tracing::debug!(%id, current = transaction.progress, reported = progress, "Ignoring decreasing progress");
            return;
        }
        if progress == transaction.progress {
            return;
        }
        transaction.progress = progress;
        let resource = transaction.resource().cloned();
        self.emit(TransactionEvent::ProgressChanged {
            id,
            resource,
            progress,
        });
        self.refresh_progress();
    }

    fn finalize(&mut self, index: usize) {
        let mut transaction = self.transactions.remove(index);
        let id = transaction.id();
        let resource = transaction.resource().cloned();

        if transaction.progress != 100 {
            transaction.progress = 100;
            self.emit(TransactionEvent::ProgressChanged {
                id,
                resource: resource.clone(),
                progress: 100,
            });
        }
        transaction.cancellable = false;

        let backend = transaction.backend().clone();
        if self.running.get(&backend) == Some(&id) {
            self.running.remove(&backend);
        }

        tracing::debug!(%id, status = %transaction.status(), "Transaction finished");
        self.emit(TransactionEvent::Removed {
            id,
            resource,
            status: transaction.status(),
            error: transaction.error.take(),
        });

        self.start_next(&backend);
        self.refresh_progress();
        if self.transactions.is_empty() {
            self.emit(TransactionEvent::LastTransactionFinished);
        }
    }

    fn start_next(&mut self, backend: &BackendId) {
        if let Some(running) = self.running.get(backend) {
            tracing::debug!(%backend, %running, "Backend busy, transaction stays queued");
            return;
        }
        let Some(next) = self
            .transactions
            .iter_mut()
            .find(|t| t.backend() == backend && t.status() == TransactionStatus::Queued)
        else {
            return;
        };

        let id = next.id();
        tracing::debug!(%backend, %id, "Starting transaction");
        self.running.insert(backend.clone(), id);
        next.driver
            .start(TransactionHandle::new(id, self.sender.clone()));
        self.emit(TransactionEvent::Started { id });
    }

    fn refresh_progress(&mut self) {
        let progress = self.progress();
        if progress != self.last_progress {
            self.last_progress = progress;
            self.emit(TransactionEvent::AggregateProgressChanged(progress));
        }
    }

    fn emit(&mut self, event: TransactionEvent) {
        self.subscribers.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionDriver;
    use depot_schema::{ResourceId, TransactionRole};
    use std::sync::{Arc, Mutex};

    /// Driver that records its handle and cancel calls.
    #[derive(Debug, Clone, Default)]
    struct Recorder {
        handle: Arc<Mutex<Option<TransactionHandle>>>,
        cancels: Arc<Mutex<usize>>,
    }

    impl Recorder {
        fn handle(&self) -> TransactionHandle {
            self.handle.lock().unwrap().clone().expect("driver not started")
        }

        fn started(&self) -> bool {
            self.handle.lock().unwrap().is_some()
        }
    }

    impl TransactionDriver for Recorder {
        fn start(&mut self, handle: TransactionHandle) {
            *self.handle.lock().unwrap() = Some(handle);
        }

        fn cancel(&mut self) {
            *self.cancels.lock().unwrap() += 1;
            if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                handle.set_status(TransactionStatus::Cancelled);
            }
        }
    }

    fn install(backend: &str, resource: u64) -> (Transaction, Recorder) {
        let recorder = Recorder::default();
        let key = ResourceKey::new(BackendId::new(backend), ResourceId::new(resource));
        let transaction = Transaction::new(
            BackendId::new(backend),
            Some(key),
            format!("pkg-{resource}"),
            TransactionRole::Install,
            recorder.clone(),
        );
        (transaction, recorder)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TransactionEvent>) -> Vec<TransactionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_one_running_transaction_per_backend() {
        let mut model = TransactionModel::new();
        let (first, first_driver) = install("apt", 1);
        let (second, second_driver) = install("apt", 2);
        let (other, other_driver) = install("flatpak", 1);

        let first_id = model.add_transaction(first);
        let second_id = model.add_transaction(second);
        model.add_transaction(other);

        assert!(first_driver.started());
        assert!(!second_driver.started());
        assert!(other_driver.started(), "other backends run concurrently");

        first_driver.handle().set_status(TransactionStatus::Downloading);
        model.pump();
        let active_on_apt = model
            .transactions()
            .iter()
            .filter(|t| t.backend() == "apt" && t.is_active())
            .count();
        assert_eq!(active_on_apt, 1);
        assert_eq!(
            model.transaction(second_id).map(Transaction::status),
            Some(TransactionStatus::Queued)
        );

        first_driver.handle().set_status(TransactionStatus::Committing);
        first_driver.handle().set_status(TransactionStatus::Done);
        model.pump();

        assert!(!model.contains(first_id));
        assert!(second_driver.started());
        assert_eq!(model.running_on(&BackendId::new("apt")), Some(second_id));
    }

    #[test]
    fn test_queued_transaction_cannot_become_active() {
        let mut model = TransactionModel::new();
        let (first, _first_driver) = install("apt", 1);
        let (second, second_driver) = install("apt", 2);
        model.add_transaction(first);
        let second_id = model.add_transaction(second);

        // A stray update for the queued one must not make it run.
        model.handle_event(TransactionMessage {
            id: second_id,
            update: TransactionUpdate::Status(TransactionStatus::Committing),
        });
        assert!(!second_driver.started());
        assert_eq!(
            model.transaction(second_id).map(Transaction::status),
            Some(TransactionStatus::Queued)
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_100() {
        let mut model = TransactionModel::new();
        let mut events = model.subscribe();
        let (transaction, driver) = install("apt", 1);
        let id = model.add_transaction(transaction);

        let handle = driver.handle();
        handle.set_status(TransactionStatus::Downloading);
        handle.set_progress(40);
        handle.set_progress(20);
        handle.set_progress(250);
        model.pump();
        assert_eq!(model.transaction(id).map(Transaction::progress), Some(100));

        let (transaction, driver) = install("flatpak", 2);
        let id = model.add_transaction(transaction);
        let handle = driver.handle();
        handle.set_status(TransactionStatus::Committing);
        handle.set_progress(30);
        handle.set_status(TransactionStatus::Done);
        model.pump();

        let progress: Vec<u8> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                TransactionEvent::ProgressChanged { id: pid, progress, .. } if pid == id => {
                    Some(progress)
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![30, 100]);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_failure_surfaces_message_and_advances_queue() {
        let mut model = TransactionModel::new();
        let mut events = model.subscribe();
        let (first, first_driver) = install("apt", 1);
        let (second, second_driver) = install("apt", 2);
        let first_id = model.add_transaction(first);
        model.add_transaction(second);

        first_driver.handle().set_status(TransactionStatus::Committing);
        first_driver.handle().fail("dependency conflict");
        model.pump();

        let removed = drain(&mut events).into_iter().find_map(|e| match e {
            TransactionEvent::Removed { id, status, error, .. } if id == first_id => {
                Some((status, error))
            }
            _ => None,
        });
        assert_eq!(
            removed,
            Some((
                TransactionStatus::DoneWithError,
                Some("dependency conflict".to_string())
            ))
        );
        assert!(second_driver.started());
    }

    #[test]
    fn test_cancel_rejected_when_not_cancellable() {
        let mut model = TransactionModel::new();
        let mut events = model.subscribe();
        let (transaction, driver) = install("apt", 1);
        let id = model.add_transaction(transaction.with_cancellable(false));
        driver.handle().set_status(TransactionStatus::Downloading);
        model.pump();

        assert_eq!(model.cancel(id), Err(TransactionError::NotCancellable(id)));
        assert_eq!(*driver.cancels.lock().unwrap(), 0);
        assert_eq!(
            model.transaction(id).map(Transaction::status),
            Some(TransactionStatus::Downloading)
        );
        assert!(
            drain(&mut events).contains(&TransactionEvent::CancellationRejected { id })
        );
    }

    #[test]
    fn test_cancel_running_goes_through_driver() {
        let mut model = TransactionModel::new();
        let (transaction, driver) = install("apt", 1);
        let id = model.add_transaction(transaction);
        driver.handle().set_status(TransactionStatus::Downloading);
        model.pump();

        model.cancel(id).unwrap();
        assert_eq!(*driver.cancels.lock().unwrap(), 1);
        assert!(model.contains(id), "waits for the backend to confirm");
        model.pump();
        assert!(!model.contains(id));
    }

    #[test]
    fn test_cancel_queued_finalizes_immediately() {
        let mut model = TransactionModel::new();
        let (first, _first_driver) = install("apt", 1);
        let (second, second_driver) = install("apt", 2);
        model.add_transaction(first);
        let second_id = model.add_transaction(second);

        model.cancel(second_id).unwrap();
        assert!(!model.contains(second_id));
        assert_eq!(*second_driver.cancels.lock().unwrap(), 0);
        assert!(matches!(
            model.cancel(second_id),
            Err(TransactionError::Unknown(_))
        ));
    }

    #[test]
    fn test_first_and_last_notifications() {
        let mut model = TransactionModel::new();
        let mut events = model.subscribe();
        let (transaction, driver) = install("apt", 1);
        let id = model.add_transaction(transaction);
        let handle = driver.handle();
        handle.set_status(TransactionStatus::Committing);
        handle.set_status(TransactionStatus::Done);
        model.pump();

        let events = drain(&mut events);
        assert_eq!(events.first(), Some(&TransactionEvent::StartingFirstTransaction));
        assert_eq!(events.last(), Some(&TransactionEvent::LastTransactionFinished));
        assert!(model.transaction_from_resource(&ResourceKey::new(
            BackendId::new("apt"),
            ResourceId::new(1)
        ))
        .is_none());
        assert!(!model.contains(id));
    }

    #[test]
    fn test_aggregate_progress_counts_active_visible_only() {
        let mut model = TransactionModel::new();
        let (a, a_driver) = install("apt", 1);
        let (b, b_driver) = install("flatpak", 1);
        model.add_transaction(a);
        model.add_transaction(b.with_visible(false));

        a_driver.handle().set_status(TransactionStatus::Downloading);
        a_driver.handle().set_progress(60);
        b_driver.handle().set_status(TransactionStatus::Downloading);
        b_driver.handle().set_progress(10);
        model.pump();
        assert_eq!(model.progress(), 60);
    }
}
