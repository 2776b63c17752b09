//! Process-wide log sink.
//!
//! Engines log through `tracing`. [`SinkLayer`] renders each event as
//! `HH:MM:SS.mmm [TARGET] [LEVEL] file@line: message` and hands the line to
//! the single registered sink. Registering a sink replaces the previous one;
//! there is no listener list.

use crate::error::{NovaError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, RwLock, mpsc};
use std::thread;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding `EnvFilter` directives for the installed layer.
pub const FILTER_ENV: &str = "NOVA_LOG";

#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Finest = 0,
    Fine = 1,
    Info = 2,
    Warn = 3,
    Fatal = 4,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Finest => "[FINEST]",
            LogLevel::Fine => "[FINE  ]",
            LogLevel::Info => "[INFO  ]",
            LogLevel::Warn => "[WARNING]",
            LogLevel::Fatal => "[FATAL ]",
        }
    }
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::TRACE => LogLevel::Finest,
            Level::DEBUG => LogLevel::Fine,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Fatal,
        }
    }
}

impl TryFrom<i32> for LogLevel {
    type Error = NovaError;
    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(LogLevel::Finest),
            1 => Ok(LogLevel::Fine),
            2 => Ok(LogLevel::Info),
            3 => Ok(LogLevel::Warn),
            4 => Ok(LogLevel::Fatal),
            _ => Err(NovaError::InvalidArgument(format!("unknown log level {raw}"))),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "finest" | "trace" => Ok(LogLevel::Finest),
            "fine" | "debug" => Ok(LogLevel::Fine),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "fatal" | "error" => Ok(LogLevel::Fatal),
            other => other
                .parse::<i32>()
                .map_err(|_| NovaError::InvalidArgument(format!("unknown log level {s}")))
                .and_then(LogLevel::try_from),
        }
    }
}

pub type LogSink = Arc<dyn Fn(String) + Send + Sync>;

enum Delivery {
    Sync(LogSink),
    Async(mpsc::Sender<String>),
}

struct Registration {
    min_level: LogLevel,
    delivery: Delivery,
}

static SLOT: RwLock<Option<Registration>> = RwLock::new(None);
static INIT: Once = Once::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs [`SinkLayer`] as the global subscriber. Safe to call repeatedly.
///
/// Returns whether the layer is in place. When the host already owns the
/// global subscriber, registered sinks receive nothing; that is reported
/// once on stderr.
pub fn init() -> bool {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("trace"));
        match tracing_subscriber::registry()
            .with(filter)
            .with(SinkLayer)
            .try_init()
        {
            Ok(()) => INSTALLED.store(true, Ordering::Release),
            Err(e) => eprintln!("nova: log sink not installed, another subscriber is active ({e})"),
        }
    });
    INSTALLED.load(Ordering::Acquire)
}

pub fn register_sync_callback<F>(sink: F)
where
    F: Fn(String) + Send + Sync + 'static,
{
    register_sync_callback_with_level(sink, LogLevel::Finest)
}

pub fn register_sync_callback_with_level<F>(sink: F, min_level: LogLevel)
where
    F: Fn(String) + Send + Sync + 'static,
{
    install(Registration {
        min_level,
        delivery: Delivery::Sync(Arc::new(sink)),
    });
}

pub fn register_async_callback<F>(sink: F) -> Result<()>
where
    F: Fn(String) + Send + Sync + 'static,
{
    register_async_callback_with_level(sink, LogLevel::Finest)
}

/// Queues events onto a dedicated delivery thread; the logging call returns
/// immediately. The thread drains and exits once this registration is replaced.
pub fn register_async_callback_with_level<F>(sink: F, min_level: LogLevel) -> Result<()>
where
    F: Fn(String) + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("nova-log".into())
        .spawn(move || {
            for line in rx {
                sink(line);
            }
        })?;
    install(Registration {
        min_level,
        delivery: Delivery::Async(tx),
    });
    Ok(())
}

pub fn clear_callback() {
    if let Ok(mut slot) = SLOT.write() {
        *slot = None;
    }
}

fn install(reg: Registration) {
    init();
    if let Ok(mut slot) = SLOT.write() {
        *slot = Some(reg);
    }
}

/// Releases one delivered message.
pub fn free_log_memory(message: String) {
    drop(message);
}

/// Releases a batch of delivered messages, returning how many were freed.
pub fn free_log_memory_batch(messages: Vec<String>) -> usize {
    messages.into_iter().map(free_log_memory).count()
}

pub struct SinkLayer;

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = LogLevel::from(event.metadata().level());
        let sync_sink = {
            let Ok(slot) = SLOT.read() else { return };
            let Some(reg) = slot.as_ref() else { return };
            if level < reg.min_level {
                return;
            }
            match &reg.delivery {
                Delivery::Sync(sink) => Arc::clone(sink),
                Delivery::Async(tx) => {
                    let _ = tx.send(render(event, level));
                    return;
                }
            }
        };
        // lock released: the sink may itself log
        sync_sink(render(event, level));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push_str(&format!(" {}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message.push_str(&format!("{value:?}"));
        } else {
            self.fields.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

fn render(event: &Event<'_>, level: LogLevel) -> String {
    let meta = event.metadata();
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);

    let ts = OffsetDateTime::now_utc()
        .format(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .unwrap_or_default();
    let file = meta
        .file()
        .and_then(|f| Path::new(f).file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    format!(
        "{} [{}] {} {}@{}: {}{}",
        ts,
        meta.target().to_uppercase(),
        level.tag(),
        file,
        meta.line().unwrap_or(0),
        visitor.message,
        visitor.fields
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_and_map() {
        assert!(LogLevel::Finest < LogLevel::Fatal);
        assert_eq!(LogLevel::from(&Level::WARN), LogLevel::Warn);
        assert_eq!(LogLevel::from(&Level::ERROR), LogLevel::Fatal);
        assert_eq!(LogLevel::try_from(2).unwrap(), LogLevel::Info);
        assert!(LogLevel::try_from(5).is_err());
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("1".parse::<LogLevel>().unwrap(), LogLevel::Fine);
        assert_eq!("loud".parse::<LogLevel>().unwrap_err().code(), 6);
    }

    #[test]
    fn batch_free_counts() {
        assert_eq!(free_log_memory_batch(vec!["a".into(), "b".into()]), 2);
    }
}
