//! 日志注入模块
//!
//! # 设计思路
//!
//! 截图核心不绑定任何日志后端，也不依赖全局状态：
//! 调用方构造 `Logger` 时注入一个 `LogSink`，再随会话一路传递。
//! - `FacadeLogSink`：转发到 `log` 门面，由宿主决定后端（如 `env_logger`）
//! - `NullLogSink`：丢弃所有消息（默认）
//! - `MemoryLogSink`：收集到内存，便于测试断言与故障现场导出
//!
//! # 实现思路
//!
//! `Logger` 只负责拼接级别前缀与会话标识，`LogSink` 只负责落地，
//! 两者通过 `Arc<dyn LogSink>` 解耦，克隆 `Logger` 不会复制底层缓冲。

use std::fmt;
use std::sync::{Arc, Mutex};

/// 消息级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// 诊断级别的细节消息
    Verbose,
    Info,
    Warning,
}

/// 日志落地接口。
pub trait LogSink: Send + Sync {
    fn on_message(&self, level: LogLevel, message: &str);
}

/// 转发到 `log` 门面。
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogSink;

impl LogSink for FacadeLogSink {
    fn on_message(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Verbose => log::debug!(target: "visual_capture", "{}", message),
            LogLevel::Info => log::info!(target: "visual_capture", "{}", message),
            LogLevel::Warning => log::warn!(target: "visual_capture", "{}", message),
        }
    }
}

/// 丢弃全部消息。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn on_message(&self, _level: LogLevel, _message: &str) {}
}

/// 内存收集器。
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<(LogLevel, String)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 已收集消息的快照。
    pub fn lines(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|(_, line)| line).collect()
    }

    /// 指定级别的消息。
    pub fn lines_at(&self, level: LogLevel) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn on_message(&self, level: LogLevel, message: &str) {
        let entry = (level, message.to_string());
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// 带会话标识的日志句柄。
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    session_id: String,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("session_id", &self.session_id).finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(NullLogSink))
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            session_id: String::new(),
        }
    }

    /// 派生一个绑定会话标识的句柄，共享同一个 sink。
    pub fn with_session_id(&self, session_id: impl Into<String>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn verbose(&self, message: impl fmt::Display) {
        self.sink
            .on_message(LogLevel::Verbose, &format!("[VERBOSE] {{{}}} {}", self.session_id, message));
    }

    pub fn log(&self, message: impl fmt::Display) {
        self.sink
            .on_message(LogLevel::Info, &format!("[LOG    ] {{{}}} {}", self.session_id, message));
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.sink
            .on_message(LogLevel::Warning, &format!("[WARNING] {{{}}} {}", self.session_id, message));
    }
}
