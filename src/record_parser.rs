use std::collections::HashSet;

use crate::error::MonitorError;
use crate::sample::{Sample, TickContext, IDENTIFIER_COLUMNS};
use crate::{log_parser, log_trace};

/// pidstat の表形式テキストを Sample に正規化するパーサ
///
/// ヘッダ行（先頭 `#`）が列名と列順を定義する。識別子列はスキーマ
/// としてのみ扱い、それ以外の列を集計キーとして全行合算する。
/// 出力形式のドリフトは監視停止ではなく劣化で吸収する方針:
/// パースできない数値は 0 として加算し、空入力はゼロ値の
/// Sample になる。
pub struct RecordParser {
    identifier_columns: HashSet<&'static str>,
}

impl RecordParser {
    pub fn new() -> Self {
        Self {
            identifier_columns: IDENTIFIER_COLUMNS.iter().copied().collect(),
        }
    }

    /// 生テキストを 1 件の Sample に集計
    pub fn parse(&self, tick: &TickContext, raw: &str) -> Result<Sample, MonitorError> {
        let mut metrics = Sample::zeroed_metrics();
        let mut header: Option<Vec<String>> = None;
        let mut active_pids: Vec<u32> = Vec::new();
        let mut seen_pids: HashSet<u32> = HashSet::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // ヘッダ行: 列スキーマを更新
            if let Some(rest) = line.strip_prefix('#') {
                header = Some(rest.split_whitespace().map(str::to_string).collect());
                continue;
            }

            // データ行は数字で始まる（バナー行などはここで落ちる）
            if !line.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }

            // ヘッダ未出現のデータ行は列対応が取れないため読み飛ばす
            let Some(columns) = &header else {
                continue;
            };

            let fields: Vec<&str> = line.split_whitespace().collect();

            for (index, name) in columns.iter().enumerate() {
                let Some(field) = fields.get(index) else {
                    break;
                };

                if name == "PID" {
                    if let Ok(pid) = field.parse::<u32>() {
                        if seen_pids.insert(pid) {
                            active_pids.push(pid);
                        }
                    }
                    continue;
                }

                if self.identifier_columns.contains(name.as_str()) {
                    continue;
                }

                *metrics.entry(name.clone()).or_insert(0.0) += parse_decimal(field);
            }
        }

        log_parser!(
            trace,
            "accumulated {} data row(s) from {} byte(s)",
            active_pids.len(),
            raw.len()
        );

        Ok(Sample {
            date: tick.date,
            elapsed_seconds: tick.elapsed_seconds,
            root_pid: tick.root_pid,
            pids: tick.pids.clone(),
            active_pids,
            metrics,
            sample_duration_ms: tick.started.elapsed().as_millis() as u64,
        })
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 数値フィールドのパース
///
/// `.` と `,` の両方を小数点として受理する。パース不能は 0 扱い。
fn parse_decimal(field: &str) -> f64 {
    field.replace(',', ".").parse::<f64>().unwrap_or(0.0)
}
