//! User-facing notices.
//!
//! All user-visible outcomes of the auth flow travel through one explicit
//! channel as [`UserNotice`] values; raw provider errors never reach the
//! user directly. The consumer (chat handler or web layer) decides how to
//! render them.

use tokio::sync::mpsc;

/// Severity of a user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational, e.g. a successful connection.
    Info,
    /// Degraded but working, e.g. missing optional scopes.
    Warning,
    /// A failed operation requiring user attention.
    Error,
}

/// A message destined for the user, with a short title and a longer detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    /// Severity of the notice.
    pub kind: NoticeKind,
    /// Short headline.
    pub title: String,
    /// Longer human-readable description.
    pub detail: String,
}

impl UserNotice {
    /// Creates an informational notice.
    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Creates a warning notice.
    pub fn warning(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Creates an error notice.
    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Sending half of the notice channel.
pub type NoticeSender = mpsc::UnboundedSender<UserNotice>;

/// Receiving half of the notice channel.
pub type NoticeReceiver = mpsc::UnboundedReceiver<UserNotice>;

/// Creates a notice channel pair.
pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}
