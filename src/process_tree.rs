use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio::process::Command;

use crate::error::MonitorError;
use crate::{log_debug, log_tree};

/// プロセスツリー解決の共通インターフェース
#[async_trait]
pub trait TreeResolver: Send + Sync {
    /// ルート PID 配下の現在のツリーを解決（ルート自身を含む）
    async fn resolve(&self, root_pid: u32) -> Result<Vec<u32>, MonitorError>;

    /// ツールの事前チェック（start() の前提条件確認で呼ばれる）
    async fn preflight(&self) -> Result<(), MonitorError> {
        Ok(())
    }
}

/// pstree コマンドによるツリー解決
pub struct PstreeResolver {
    command: String,
}

impl PstreeResolver {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for PstreeResolver {
    fn default() -> Self {
        Self::new("pstree")
    }
}

#[async_trait]
impl TreeResolver for PstreeResolver {
    async fn resolve(&self, root_pid: u32) -> Result<Vec<u32>, MonitorError> {
        let output = Command::new(&self.command)
            .arg("-p")
            .arg(root_pid.to_string())
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

        let text = String::from_utf8_lossy(&output.stdout);
        let pids = parse_pstree_pids(&text);

        if pids.is_empty() {
            return Err(MonitorError::Parse {
                source_name: self.command.clone(),
                reason: format!("no pid tokens found in output for pid {root_pid}"),
            });
        }

        log_tree!(debug, "resolved {} pid(s) under {}", pids.len(), root_pid);

        Ok(pids)
    }

    async fn preflight(&self) -> Result<(), MonitorError> {
        crate::collector::check_tool_available(&self.command).await
    }
}

/// pstree 出力から PID トークンを抽出
///
/// `{name}(tid)` 形式のスレッドマーカーは除外し、残る `(<digits>)` を
/// 出現順に集める。重複は最初の出現のみ残す。
pub fn parse_pstree_pids(text: &str) -> Vec<u32> {
    static THREAD_RE: OnceLock<Regex> = OnceLock::new();
    static PID_RE: OnceLock<Regex> = OnceLock::new();

    let thread_re = THREAD_RE.get_or_init(|| Regex::new(r"\{[^}]*\}\(\d+\)").unwrap());
    let pid_re = PID_RE.get_or_init(|| Regex::new(r"\((\d+)\)").unwrap());

    let without_threads = thread_re.replace_all(text, "");

    let mut seen = HashSet::new();
    let mut pids = Vec::new();

    for caps in pid_re.captures_iter(&without_threads) {
        if let Ok(pid) = caps[1].parse::<u32>() {
            if seen.insert(pid) {
                pids.push(pid);
            }
        }
    }

    pids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_chain() {
        let output = "bash(1234)---node(1240)---node(1241)\n";
        assert_eq!(parse_pstree_pids(output), vec![1234, 1240, 1241]);
    }

    #[test]
    fn test_parse_root_only() {
        let output = "sleep(999)\n";
        assert_eq!(parse_pstree_pids(output), vec![999]);
    }

    #[test]
    fn test_parse_excludes_thread_markers() {
        // スレッドの (tid) はプロセスではない
        let output = "node(100)-+-{node}(101)\n          |-{node}(102)\n          `-worker(103)\n";
        assert_eq!(parse_pstree_pids(output), vec![100, 103]);
    }

    #[test]
    fn test_parse_deduplicates_preserving_order() {
        let output = "a(5)---b(3)---c(5)---d(2)\n";
        assert_eq!(parse_pstree_pids(output), vec![5, 3, 2]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_pstree_pids("").is_empty());
        assert!(parse_pstree_pids("no pids here\n").is_empty());
    }

    #[test]
    fn test_parse_multiline_tree() {
        let output = "\
systemd(1)-+-cron(400)
           |-node(500)-+-node(510)
           |           `-{node}(511)
           `-sshd(600)---bash(610)
";
        assert_eq!(parse_pstree_pids(output), vec![1, 400, 500, 510, 600, 610]);
    }
}
