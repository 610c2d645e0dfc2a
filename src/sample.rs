use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::MonitorError;

/// 集計対象のメトリクス列（pidstat -u -r -d の数値列）
///
/// ヘッダに現れなくても全キーが 0 で初期化される。
pub const DEFAULT_METRIC_KEYS: &[&str] = &[
    "%usr", "%system", "%guest", "%CPU", "minflt/s", "majflt/s", "VSZ", "RSS", "%MEM", "kB_rd/s",
    "kB_wr/s", "kB_ccwr/s",
];

/// 識別子列（スキーマには含まれるが集計対象外）
pub const IDENTIFIER_COLUMNS: &[&str] = &["Time", "UID", "USER", "PID", "CPU", "Command"];

/// 1 tick 分の正規化済みメトリクスレコード
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// サンプル取得時刻
    pub date: DateTime<Utc>,
    /// 監視開始からの経過秒数
    pub elapsed_seconds: u64,
    /// 監視対象のルート PID
    pub root_pid: u32,
    /// tick 開始時点で解決されたプロセスツリー（重複なし・出現順）
    pub pids: Vec<u32>,
    /// 実際にデータ行を返した PID（pids の部分集合）
    pub active_pids: Vec<u32>,
    /// メトリクス名 → 全プロセス合算値
    pub metrics: BTreeMap<String, f64>,
    /// 収集開始から emit 直前までの実測時間（ミリ秒）
    pub sample_duration_ms: u64,
}

impl Sample {
    /// 全メトリクスを 0 で初期化したマップを生成
    pub fn zeroed_metrics() -> BTreeMap<String, f64> {
        DEFAULT_METRIC_KEYS
            .iter()
            .map(|key| (key.to_string(), 0.0))
            .collect()
    }
}

/// tick ごとのパース入力コンテキスト
#[derive(Debug, Clone)]
pub struct TickContext {
    pub root_pid: u32,
    pub pids: Vec<u32>,
    pub elapsed_seconds: u64,
    pub date: DateTime<Utc>,
    /// 収集開始時刻（sample_duration_ms の起点）
    pub started: Instant,
}

impl TickContext {
    pub fn new(root_pid: u32, pids: Vec<u32>, elapsed_seconds: u64) -> Self {
        Self {
            root_pid,
            pids,
            elapsed_seconds,
            date: Utc::now(),
            started: Instant::now(),
        }
    }
}

/// セッションが発行するイベント
///
/// `End` はセッションが Running に入った場合ちょうど 1 回だけ発行される。
/// `Error` は非終端（`fatal` が立っている場合のみ直後に `End` が続く）。
#[derive(Debug)]
pub enum MonitorEvent {
    /// サンプル取得成功（0 回以上）
    Monitored { pid: u32, sample: Sample },
    /// 監視終了（対象プロセス消滅または stop() 呼び出し）
    End { pid: u32 },
    /// 監視中のエラー
    Error { error: MonitorError, fatal: bool },
}
