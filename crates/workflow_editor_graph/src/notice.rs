// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fire-and-forget notices for the user (toasts, banners).

use crate::graph::ConnectionError;
use std::sync::mpsc;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Confirmation
    Info,
    /// Rejected action, nothing changed
    Warning,
    /// Failed operation
    Error,
}

/// A message for the notification surface
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Human readable message
    pub message: String,
    /// Rejected connection, if that is what this notice reports
    pub rejection: Option<ConnectionError>,
}

impl Notice {
    /// Informational notice
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            rejection: None,
        }
    }

    /// Error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            rejection: None,
        }
    }

    /// Warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            rejection: None,
        }
    }

    /// Warning for a rejected connection attempt
    pub fn rejected(err: &ConnectionError) -> Self {
        let message = match err {
            ConnectionError::UnknownEndpoint(_) => "That port no longer exists".to_string(),
            ConnectionError::TypeMismatch { output, input } => {
                format!("Cannot connect a {output} output to a {input} input")
            }
            ConnectionError::InputAlreadyConnected { .. } => {
                "That input already has a connection".to_string()
            }
            ConnectionError::SelfConnection(_) => "A node cannot connect to itself".to_string(),
        };
        Self {
            level: NoticeLevel::Warning,
            message,
            rejection: Some(err.clone()),
        }
    }
}

/// Sending half of the notice channel. Sends never block or fail loudly.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    sender: Option<mpsc::Sender<Notice>>,
}

impl NoticeSender {
    /// Create a new channel and return `(sender, receiver)`
    pub fn channel() -> (Self, NoticeReceiver) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            NoticeReceiver { receiver },
        )
    }

    /// Sender that drops every notice
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    /// Post a notice. Delivery is best effort.
    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!("{}", notice.message),
            NoticeLevel::Warning => tracing::warn!("{}", notice.message),
            NoticeLevel::Error => tracing::error!("{}", notice.message),
        }
        if let Some(sender) = &self.sender {
            // Receiver gone means nobody is showing notices anymore.
            let _ = sender.send(notice);
        }
    }
}

impl Default for NoticeSender {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Receiving half of the notice channel, drained by the UI
#[derive(Debug)]
pub struct NoticeReceiver {
    receiver: mpsc::Receiver<Notice>,
}

impl NoticeReceiver {
    /// Take every pending notice without blocking
    pub fn drain(&self) -> Vec<Notice> {
        self.receiver.try_iter().collect()
    }
}
