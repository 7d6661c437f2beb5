use tokio::sync::oneshot;

/// Creates the pair that stops a request listener: drop the handle and the
/// listener's accept loop exits after its current iteration.
pub(crate) fn shutdown_signal() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (ShutdownHandle { _tx: tx }, ShutdownSignal { rx })
}

pub(crate) struct ShutdownHandle {
    _tx: oneshot::Sender<()>,
}

pub(crate) struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl ShutdownSignal {
    /// Resolves when the handle is dropped (or explicitly signalled).
    /// Cancel-safe, so it can sit in a `select!` arm next to `accept`.
    pub(crate) async fn wait(&mut self) {
        // Sent value and sender-drop both mean "stop".
        let _ = (&mut self.rx).await;
    }
}
