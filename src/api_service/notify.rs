use std::fmt;

/// Kind of toast shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastKind::Success => f.write_str("success"),
            ToastKind::Error => f.write_str("error"),
        }
    }
}

/// Fire-and-forget user notification
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: ToastKind);
}

/// Writes toasts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: ToastKind) {
        match kind {
            ToastKind::Success => log::info!("[toast:{}] {}", kind, message),
            ToastKind::Error => log::warn!("[toast:{}] {}", kind, message),
        }
    }
}
