use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            3 => LogLevel::Debug,
            4 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            // 不明な指定は Info に落とす
            _ => LogLevel::Info,
        }
    }
}

/// ログカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    System,
    Session,
    Config,

    // 外部ツール
    Tree,
    Sampler,

    // パース
    Parser,
}

impl LogCategory {
    fn as_str(self) -> &'static str {
        match self {
            LogCategory::System => "SYSTEM",
            LogCategory::Session => "SESSION",
            LogCategory::Config => "CONFIG",
            LogCategory::Tree => "TREE",
            LogCategory::Sampler => "SAMPLER",
            LogCategory::Parser => "PARSER",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// グローバルログレベル
static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// ログの出力先（未設定なら stderr）
static LOG_SINK: OnceLock<Box<dyn Fn(&str) + Send + Sync>> = OnceLock::new();

/// ログレベルを設定
pub fn set_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// 現在のログレベルを取得
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(GLOBAL_LOG_LEVEL.load(Ordering::Relaxed))
}

/// ログ出力先を差し替える（テストでのキャプチャ用。最初の 1 回のみ有効）
pub fn set_log_sink<F>(sink: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let _ = LOG_SINK.set(Box::new(sink));
}

/// 1 行分のログを整形して出力
pub fn emit(level: LogLevel, category: LogCategory, message: &str) {
    if level > log_level() {
        return;
    }

    let line = format!(
        "[{}] [{}] [{}] {}",
        chrono::Utc::now().format("%H:%M:%S%.3f"),
        level,
        category,
        message
    );

    match LOG_SINK.get() {
        Some(sink) => sink(&line),
        None => eprintln!("{line}"),
    }
}

/// ログマクロ
#[macro_export]
macro_rules! log_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::Error,
            $category,
            &format!($($arg)*),
        );
    };
}

#[macro_export]
macro_rules! log_warn {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::Warn,
            $category,
            &format!($($arg)*),
        );
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::Info,
            $category,
            &format!($($arg)*),
        );
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::Debug,
            $category,
            &format!($($arg)*),
        );
    };
}

#[macro_export]
macro_rules! log_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::logging::emit(
            $crate::logging::LogLevel::Trace,
            $category,
            &format!($($arg)*),
        );
    };
}

/// 便利なマクロ - よく使うカテゴリ別
#[macro_export]
macro_rules! log_session {
    ($level:ident, $($arg:tt)*) => {
        paste::paste! {
            [<log_ $level>]!($crate::logging::LogCategory::Session, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_tree {
    ($level:ident, $($arg:tt)*) => {
        paste::paste! {
            [<log_ $level>]!($crate::logging::LogCategory::Tree, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_sampler {
    ($level:ident, $($arg:tt)*) => {
        paste::paste! {
            [<log_ $level>]!($crate::logging::LogCategory::Sampler, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_parser {
    ($level:ident, $($arg:tt)*) => {
        paste::paste! {
            [<log_ $level>]!($crate::logging::LogCategory::Parser, $($arg)*);
        }
    };
}
