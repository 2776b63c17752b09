use nova_core::logging;
use std::sync::{Arc, Mutex};

// Own binary: the host claims the global subscriber before the library does.
#[test]
fn host_subscriber_keeps_the_slot() {
    tracing::subscriber::set_global_default(tracing_subscriber::registry()).unwrap();
    assert!(!logging::init());
    assert!(!logging::init());

    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    logging::register_sync_callback(move |line| sink.lock().unwrap().push(line));
    tracing::warn!("goes to the host");
    assert!(seen.lock().unwrap().is_empty());
}
