use async_trait::async_trait;
use tokio::process::Command;

use crate::error::MonitorError;
use crate::{log_sampler, log_trace};

/// メトリクス収集の共通インターフェース
#[async_trait]
pub trait SampleCollector: Send + Sync {
    /// 指定 PID 集合の統計を 1 計測サイクル分取得し、生テキストを返す
    ///
    /// 同一セッションで呼び出しを重ねてはならない（呼び出しごとに
    /// 外部プロセスを 1 つ起動する）。
    async fn collect(&self, pids: &[u32]) -> Result<String, MonitorError>;

    /// ツールの事前チェック（start() の前提条件確認で呼ばれる）
    async fn preflight(&self) -> Result<(), MonitorError> {
        Ok(())
    }
}

/// pidstat コマンドによるメトリクス収集
pub struct PidstatCollector {
    command: String,
}

impl PidstatCollector {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// pidstat の引数列を構築（1 秒窓 × 1 回計測）
    fn build_args(pids: &[u32]) -> Vec<String> {
        let pid_list = pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            "-h".to_string(),
            "-d".to_string(),
            "-u".to_string(),
            "-r".to_string(),
            "-p".to_string(),
            pid_list,
            "1".to_string(),
            "1".to_string(),
        ]
    }
}

impl Default for PidstatCollector {
    fn default() -> Self {
        Self::new("pidstat")
    }
}

#[async_trait]
impl SampleCollector for PidstatCollector {
    async fn collect(&self, pids: &[u32]) -> Result<String, MonitorError> {
        let output = Command::new(&self.command)
            .args(Self::build_args(pids))
            // 小数点記法を固定（ロケール依存の "," 出力を防ぐ）
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| MonitorError::from_spawn(&self.command, e))?;

        if !output.status.success() {
            return Err(MonitorError::ToolExecution {
                tool: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        log_sampler!(
            trace,
            "collected {} bytes for {} pid(s)",
            output.stdout.len(),
            pids.len()
        );

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn preflight(&self) -> Result<(), MonitorError> {
        check_tool_available(&self.command).await
    }
}

/// 外部ツールの存在確認
///
/// `-V` でバージョン表示を試みる。バイナリ不在のみを
/// `ToolUnavailable` として扱い、終了コードは問わない
/// （pstree は -V で非ゼロ終了する実装がある）。
pub async fn check_tool_available(command: &str) -> Result<(), MonitorError> {
    match Command::new(command).arg("-V").output().await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MonitorError::ToolUnavailable {
            tool: command.to_string(),
        }),
        Err(e) => Err(MonitorError::ToolExecution {
            tool: command.to_string(),
            status: "spawn failed".to_string(),
            stderr: e.to_string(),
        }),
    }
}
