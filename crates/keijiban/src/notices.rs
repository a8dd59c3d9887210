//! User-facing notices: toasts for info/success/warning, and blocking
//! alerts for errors that stay until dismissed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How many past notices are kept for display.
const NOTICE_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Info => "情報",
            NoticeKind::Success => "成功",
            NoticeKind::Warning => "警告",
            NoticeKind::Error => "エラー",
        }
    }

    fn auto_clear(&self) -> Option<Duration> {
        match self {
            NoticeKind::Info => Some(Duration::from_secs(3)),
            NoticeKind::Success => Some(Duration::from_secs(2)),
            NoticeKind::Warning => Some(Duration::from_secs(5)),
            NoticeKind::Error => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub content: String,
    pub kind: NoticeKind,
    pub created_at: Instant,
    pub auto_clear_duration: Option<Duration>,
}

impl Notice {
    pub fn new(content: impl Into<String>, kind: NoticeKind) -> Self {
        Self {
            content: content.into(),
            kind,
            created_at: Instant::now(),
            auto_clear_duration: kind.auto_clear(),
        }
    }

    pub fn with_duration(content: impl Into<String>, kind: NoticeKind, duration: Duration) -> Self {
        Self {
            auto_clear_duration: Some(duration),
            ..Self::new(content, kind)
        }
    }

    /// Blocking notices must be dismissed explicitly.
    pub fn is_blocking(&self) -> bool {
        self.auto_clear_duration.is_none()
    }

    pub fn is_expired(&self) -> bool {
        match self.auto_clear_duration {
            Some(duration) => self.created_at.elapsed() > duration,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusManager {
    current: Option<Notice>,
    log: VecDeque<Notice>,
}

impl StatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Notice::new(message, NoticeKind::Info));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Notice::new(message, NoticeKind::Success));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Notice::new(message, NoticeKind::Warning));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Notice::new(message, NoticeKind::Error));
    }

    pub fn push(&mut self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => log::error!("{}", notice.content),
            NoticeKind::Warning => log::warn!("{}", notice.content),
            _ => log::info!("{}", notice.content),
        }
        // a pending blocking notice is never replaced by a toast
        let keep_current = notice.kind != NoticeKind::Error
            && self.current.as_ref().is_some_and(Notice::is_blocking);
        if !keep_current {
            self.current = Some(notice.clone());
        }

        self.log.push_back(notice);
        if self.log.len() > NOTICE_LOG_CAPACITY {
            self.log.pop_front();
        }
    }

    /// Drops an expired toast. Blocking notices stay.
    pub fn update(&mut self) {
        if self.current.as_ref().is_some_and(Notice::is_expired) {
            self.current = None;
        }
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn blocking(&self) -> Option<&Notice> {
        self.current.as_ref().filter(|n| n.is_blocking())
    }

    /// Every notice raised so far, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Notice> {
        self.log.iter()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.log.back()
    }
}
