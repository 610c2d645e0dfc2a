// テストフィクスチャとモックコンポーネント
// Note: 統合テスト用共通関数は複数の統合テストファイルから使用されるが、
// Rustコンパイラーは各統合テストを独立してコンパイルするため
// dead_code警告が発生する。実際には使用されているため警告を抑制。

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use pidmon::{LivenessProbe, MonitorConfig, MonitorError, SampleCollector, TreeResolver};

/// 常に同じ生存判定を返すプローブ
pub struct StaticProbe {
    pub alive: bool,
}

impl LivenessProbe for StaticProbe {
    fn is_alive(&self, _pid: u32) -> Result<bool, MonitorError> {
        Ok(self.alive)
    }
}

/// 指定回数 true を返した後 false になるプローブ
///
/// start() の前提条件確認も 1 回分を消費する点に注意。
pub struct CountdownProbe {
    remaining: AtomicI64,
}

impl CountdownProbe {
    pub fn new(alive_checks: i64) -> Self {
        Self {
            remaining: AtomicI64::new(alive_checks),
        }
    }
}

impl LivenessProbe for CountdownProbe {
    fn is_alive(&self, _pid: u32) -> Result<bool, MonitorError> {
        Ok(self.remaining.fetch_sub(1, Ordering::SeqCst) > 0)
    }
}

/// プローブ応答のシナリオ要素
pub enum ProbeStep {
    Alive,
    Dead,
    Fail,
}

/// 事前に並べた応答を順に返すプローブ
///
/// シナリオが尽きた後は Dead を返し続ける。start() の前提条件確認も
/// 1 ステップを消費する。
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeStep>>,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<ProbeStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
        }
    }
}

impl LivenessProbe for ScriptedProbe {
    fn is_alive(&self, pid: u32) -> Result<bool, MonitorError> {
        match self.script.lock().unwrap().pop_front() {
            Some(ProbeStep::Alive) => Ok(true),
            Some(ProbeStep::Fail) => Err(MonitorError::Probe {
                pid,
                reason: "scripted probe failure".to_string(),
            }),
            Some(ProbeStep::Dead) | None => Ok(false),
        }
    }
}

/// 固定のプロセス集合を返すツリーリゾルバ
pub struct StaticTree {
    pub pids: Vec<u32>,
}

#[async_trait]
impl TreeResolver for StaticTree {
    async fn resolve(&self, _root_pid: u32) -> Result<Vec<u32>, MonitorError> {
        Ok(self.pids.clone())
    }
}

/// 固定テキストを返すコレクタ
pub struct ScriptedCollector {
    pub raw: String,
}

#[async_trait]
impl SampleCollector for ScriptedCollector {
    async fn collect(&self, _pids: &[u32]) -> Result<String, MonitorError> {
        Ok(self.raw.clone())
    }
}

/// 常にツール不在で失敗するコレクタ
pub struct UnavailableCollector;

#[async_trait]
impl SampleCollector for UnavailableCollector {
    async fn collect(&self, _pids: &[u32]) -> Result<String, MonitorError> {
        Err(MonitorError::ToolUnavailable {
            tool: "pidstat".to_string(),
        })
    }
}

/// pidstat -h -d -u -r 互換の出力を生成（1 PID につき 1 データ行）
pub fn pidstat_output_for(pids: &[u32]) -> String {
    let mut out = String::from(
        "Linux 5.15.0-generic (testhost) \t08/04/26 \t_x86_64_\t(4 CPU)\n\n\
         # Time        UID       PID    %usr %system  %guest    %CPU   CPU  minflt/s  majflt/s     VSZ    RSS   %MEM   kB_rd/s   kB_wr/s kB_ccwr/s  Command\n",
    );
    for pid in pids {
        out.push_str(&format!(
            " 1754300000  1000  {pid}  1.00  0.50  0.00  1.50  0  10.00  0.00  100000  5000  0.10  1.00  0.50  0.00  test\n"
        ));
    }
    out
}

/// テスト用の短周期設定を生成
pub fn fast_config(period_ms: u64) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.monitor.period_ms = period_ms;
    config
}
