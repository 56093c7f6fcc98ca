use std::future::Future;
use std::io;

use tracing::debug;

/// Future resolving on the first termination request: Ctrl-C, and on unix
/// also `SIGTERM` and `SIGHUP`.
///
/// Handlers are installed when this is called, so a signal arriving before the
/// future is first polled is not lost. Must be called inside a tokio runtime.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()> + Send> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut term = signal(SignalKind::terminate())?;
  let mut hup = signal(SignalKind::hangup())?;
  Ok(async move {
    tokio::select! {
      _ = ctrl_c() => debug!("received interrupt"),
      _ = term.recv() => debug!("received SIGTERM"),
      _ = hup.recv() => debug!("received SIGHUP"),
    }
  })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()> + Send> {
  Ok(async {
    ctrl_c().await;
    debug!("received interrupt");
  })
}

/// Never resolves where Ctrl-C cannot be observed.
async fn ctrl_c() {
  if tokio::signal::ctrl_c().await.is_err() {
    std::future::pending::<()>().await;
  }
}
