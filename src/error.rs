use thiserror::Error;

/// 監視エラーの分類
///
/// 外部ツール2種と OS クエリの失敗をそれぞれ区別して伝搬する。
/// `Probe` は「生存確認クエリ自体の失敗」であり、「プロセスが存在しない」
/// （`is_alive` が `Ok(false)` を返すケース）とは別物。
#[derive(Debug, Error)]
pub enum MonitorError {
    /// 生存確認クエリが実行できなかった
    #[error("liveness probe failed for pid {pid}: {reason}")]
    Probe { pid: u32, reason: String },

    /// 監視対象が start() 時点で存在しない
    ///
    /// クエリは成功している点で `Probe` と異なる。
    #[error("target process {pid} is not running")]
    TargetNotRunning { pid: u32 },

    /// 外部ツールのバイナリが見つからない
    #[error("external tool not available: {tool}")]
    ToolUnavailable { tool: String },

    /// 外部ツールは起動したが非ゼロ終了した
    #[error("{tool} failed ({status}): {stderr}")]
    ToolExecution {
        tool: String,
        status: String,
        stderr: String,
    },

    /// ツール出力が期待した形式と一致しない
    #[error("failed to parse {source_name} output: {reason}")]
    Parse { source_name: String, reason: String },
}

impl MonitorError {
    /// spawn エラーをツール起因のエラーに分類
    pub fn from_spawn(tool: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ToolUnavailable {
                tool: tool.to_string(),
            }
        } else {
            Self::ToolExecution {
                tool: tool.to_string(),
                status: "spawn failed".to_string(),
                stderr: err.to_string(),
            }
        }
    }

    /// ツール不在エラーかどうか（連続失敗カウントの対象判定に使う）
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. })
    }
}
