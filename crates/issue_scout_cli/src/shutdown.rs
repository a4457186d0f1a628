use console::Term;

/// Resolve when the user presses Ctrl+C.
///
/// Used as the cancellation signal for an in-flight request. A second Ctrl+C
/// exits immediately. If the handler cannot be installed the future never
/// resolves, so the request simply runs uncancellable.
pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    let is_tty = Term::stdout().is_term();
    if is_tty {
        eprintln!("\n\nCancelling request...");
        eprintln!("Press Ctrl+C again to force quit.");
    } else {
        tracing::warn!("Shutdown requested, cancelling request");
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
