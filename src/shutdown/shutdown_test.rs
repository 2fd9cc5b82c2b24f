#[cfg(test)]
mod tests {
    use crate::shutdown::{GracefulShutdown, TimeoutError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_waits_for_tracked_tasks() {
        let token = CancellationToken::new();
        let gsh = GracefulShutdown::new(token.clone());
        let finished = Arc::new(AtomicBool::new(false));

        let task_token = gsh.token();
        let flag = finished.clone();
        gsh.spawn(async move {
            task_token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        token.cancel();
        gsh.await_shutdown().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_on_stuck_task() {
        let token = CancellationToken::new();
        let mut gsh = GracefulShutdown::new(token.clone());
        gsh.set_graceful_timeout(Duration::from_secs(1));
        gsh.spawn(std::future::pending::<()>());

        token.cancel();
        let err = gsh.await_shutdown().await.unwrap_err();
        assert!(err.downcast_ref::<TimeoutError>().is_some());
    }
}
