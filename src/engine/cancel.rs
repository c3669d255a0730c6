use tokio::sync::broadcast;

/// Caller-held trigger for stopping a run early. The engine subscribes one
/// receiver per worker; cancellation is cooperative and observed at loop
/// top, after a rate-limiter wait, and raced against in-flight I/O.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: broadcast::Sender<()>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signals cancellation. Returns false when no run is listening.
    pub fn cancel(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking poll of a worker's cancellation receiver. A lagged or
/// closed channel counts as cancelled: the sender fired and moved on, or
/// the caller dropped its handle entirely.
pub(crate) fn cancel_requested(rx: &mut broadcast::Receiver<()>) -> bool {
    use tokio::sync::broadcast::error::TryRecvError;

    match rx.try_recv() {
        Ok(_) => true,
        Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Closed) => true,
        Err(TryRecvError::Empty) => false,
    }
}
