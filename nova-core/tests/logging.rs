use nova_core::logging::{self, LogLevel};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

// One test: the sink slot is process-wide.
#[test]
fn sinks_receive_filter_replace_and_clear() {
    assert!(logging::init());
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    logging::register_sync_callback_with_level(
        move |line| sink.lock().unwrap().push(line),
        LogLevel::Info,
    );

    tracing::debug!("below the threshold");
    tracing::info!(file = "white_img.bin", "unpacked");
    tracing::warn!("odd entry");
    {
        let lines = seen.lock().unwrap();
        assert_eq!(lines.len(), 2, "{lines:?}");
        assert!(lines[0].contains("[LOGGING] [INFO  ] logging@"), "{}", lines[0]);
        assert!(lines[0].ends_with(": unpacked file=white_img.bin"), "{}", lines[0]);
        assert!(lines[1].contains("[WARNING]"));
    }

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    logging::register_async_callback(move |line| {
        let _ = tx.lock().unwrap().send(line);
    })
    .unwrap();
    tracing::trace!("queued");
    let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(line.contains("[FINEST]") && line.ends_with("queued"), "{line}");
    assert_eq!(seen.lock().unwrap().len(), 2);

    logging::clear_callback();
    tracing::error!("nobody listens");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(logging::free_log_memory_batch(vec![line, String::new()]), 2);
}
