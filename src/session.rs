use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::collector::{PidstatCollector, SampleCollector};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::liveness::{KillProbe, LivenessProbe};
use crate::process_tree::{PstreeResolver, TreeResolver};
use crate::record_parser::RecordParser;
use crate::sample::{MonitorEvent, Sample, TickContext};
use crate::{log_debug, log_error, log_info, log_session, log_trace, log_warn};

/// tick 間遅延の下限（収集が周期より遅い場合のビジーループ防止）
const MIN_TICK_DELAY: Duration = Duration::from_millis(10);

/// セッションのライフサイクル状態
///
/// `Idle → Running → Stopped` が基本。明示キャンセル時のみ
/// `Running → Stopping → Stopped`。`Stopped` からの遷移はない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// 監視セッション
///
/// 1 対象プロセスにつき 1 セッション。`Stopped` 到達後は再利用不可。
/// すべての結果・失敗はイベントチャネル経由で届き、`start()`/`stop()`
/// が同期的にエラーを返すことはない。
pub struct MonitorSession {
    target_pid: u32,
    config: MonitorConfig,
    phase: Arc<Mutex<SessionPhase>>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
    probe: Arc<dyn LivenessProbe>,
    tree: Arc<dyn TreeResolver>,
    collector: Arc<dyn SampleCollector>,
}

impl MonitorSession {
    /// デフォルト構成（pstree + pidstat + シグナル 0 生存確認）で作成
    pub fn new(target_pid: u32, config: MonitorConfig) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let probe: Arc<dyn LivenessProbe> = Arc::new(KillProbe);
        let tree: Arc<dyn TreeResolver> = Arc::new(PstreeResolver::new(config.tools.pstree.clone()));
        let collector: Arc<dyn SampleCollector> =
            Arc::new(PidstatCollector::new(config.tools.pidstat.clone()));

        Self::with_components(target_pid, config, probe, tree, collector)
    }

    /// コンポーネント注入版（テスト用モックの差し込み口）
    pub fn with_components(
        target_pid: u32,
        config: MonitorConfig,
        probe: Arc<dyn LivenessProbe>,
        tree: Arc<dyn TreeResolver>,
        collector: Arc<dyn SampleCollector>,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let session = Self {
            target_pid,
            config,
            phase: Arc::new(Mutex::new(SessionPhase::Idle)),
            events_tx,
            stop_tx,
            stop_rx,
            task: None,
            probe,
            tree,
            collector,
        };

        (session, events_rx)
    }

    /// 監視対象の PID
    pub fn target_pid(&self) -> u32 {
        self.target_pid
    }

    /// 現在のライフサイクル状態
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    /// 監視を開始
    ///
    /// 前提条件（外部ツールの存在・対象の生存）を確認し、満たさない
    /// 場合はエラーイベントを発行して Idle のまま戻る。Running 中の
    /// 再呼び出しは no-op。
    pub async fn start(&mut self) {
        {
            let phase = self.phase.lock().unwrap();
            match *phase {
                SessionPhase::Running | SessionPhase::Stopping => {
                    log_session!(debug, "start() ignored: already running (pid {})", self.target_pid);
                    return;
                }
                SessionPhase::Stopped => {
                    // セッションは使い捨て
                    log_session!(warn, "start() ignored: session already stopped (pid {})", self.target_pid);
                    return;
                }
                SessionPhase::Idle => {}
            }
        }

        // 前提条件: 外部ツールの存在確認
        if let Err(error) = self.tree.preflight().await {
            self.emit_precondition_error(error);
            return;
        }
        if let Err(error) = self.collector.preflight().await {
            self.emit_precondition_error(error);
            return;
        }

        // 前提条件: 対象プロセスの生存確認
        match self.probe.is_alive(self.target_pid) {
            Ok(true) => {}
            Ok(false) => {
                self.emit_precondition_error(MonitorError::TargetNotRunning {
                    pid: self.target_pid,
                });
                return;
            }
            Err(error) => {
                self.emit_precondition_error(error);
                return;
            }
        }

        *self.phase.lock().unwrap() = SessionPhase::Running;
        log_session!(info, "monitoring started for pid {}", self.target_pid);

        let tick_loop = TickLoop {
            target_pid: self.target_pid,
            period: self.config.period(),
            max_tool_failures: self.config.monitor.max_tool_failures,
            phase: self.phase.clone(),
            events_tx: self.events_tx.clone(),
            stop_rx: self.stop_rx.clone(),
            probe: self.probe.clone(),
            tree: self.tree.clone(),
            collector: self.collector.clone(),
            parser: RecordParser::new(),
        };

        self.task = Some(tokio::spawn(tick_loop.run()));
    }

    /// 監視を停止
    ///
    /// Running でなければ no-op。停止は次の tick 境界で反映され、
    /// スケジュール済みの待機も中断される。End イベントはループ側で
    /// ちょうど 1 回発行される。
    pub fn stop(&mut self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == SessionPhase::Running {
            *phase = SessionPhase::Stopping;
            let _ = self.stop_tx.send(true);
            log_session!(info, "stop requested for pid {}", self.target_pid);
        }
    }

    /// tick ループの完了を待つ
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// start() 前提条件エラーの発行（Idle のまま・End は続かない）
    fn emit_precondition_error(&self, error: MonitorError) {
        log_session!(error, "cannot start monitoring pid {}: {}", self.target_pid, error);
        let _ = self.events_tx.send(MonitorEvent::Error { error, fatal: true });
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        // セッションが破棄されたらループも止める
        let _ = self.stop_tx.send(true);
    }
}

/// tick ループの実体（spawn されたタスク側で動く）
struct TickLoop {
    target_pid: u32,
    period: Duration,
    max_tool_failures: u32,
    phase: Arc<Mutex<SessionPhase>>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    stop_rx: watch::Receiver<bool>,
    probe: Arc<dyn LivenessProbe>,
    tree: Arc<dyn TreeResolver>,
    collector: Arc<dyn SampleCollector>,
    parser: RecordParser,
}

impl TickLoop {
    async fn run(mut self) {
        let started_at = Instant::now();
        let mut consecutive_unavailable: u32 = 0;

        loop {
            // 停止要求は tick 境界で反映
            if *self.stop_rx.borrow_and_update() {
                self.finish("stop requested");
                break;
            }

            let tick_started = Instant::now();

            match self.probe.is_alive(self.target_pid) {
                Ok(true) => match self.run_tick(started_at, tick_started).await {
                    Ok(sample) => {
                        consecutive_unavailable = 0;
                        let _ = self.events_tx.send(MonitorEvent::Monitored {
                            pid: self.target_pid,
                            sample,
                        });
                    }
                    Err(error) => {
                        if error.is_tool_unavailable() {
                            consecutive_unavailable += 1;
                            if consecutive_unavailable >= self.max_tool_failures {
                                // ツールチェーン全体が死んでいる。継続不能。
                                log_session!(
                                    error,
                                    "giving up after {} consecutive tool failures: {}",
                                    consecutive_unavailable,
                                    error
                                );
                                let _ = self.events_tx.send(MonitorEvent::Error { error, fatal: true });
                                self.finish("tool chain unavailable");
                                break;
                            }
                        }
                        log_session!(warn, "tick failed for pid {}: {}", self.target_pid, error);
                        let _ = self.events_tx.send(MonitorEvent::Error { error, fatal: false });
                    }
                },
                Ok(false) => {
                    // 対象プロセス消滅は正常終了
                    self.finish("target process exited");
                    break;
                }
                Err(error) => {
                    // 生存確認クエリ自体の失敗。tick をスキップして続行。
                    let _ = self.events_tx.send(MonitorEvent::Error { error, fatal: false });
                }
            }

            // 実測 tick 時間を差し引いた自己調整遅延
            let delay = self
                .period
                .saturating_sub(tick_started.elapsed())
                .max(MIN_TICK_DELAY);
            log_session!(trace, "next tick for pid {} in {:?}", self.target_pid, delay);

            tokio::select! {
                _ = self.stop_rx.changed() => {
                    if *self.stop_rx.borrow() {
                        self.finish("stop requested");
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// 1 tick: ツリー解決 → 収集 → パース
    ///
    /// 各外部ツール呼び出しは周期を上限とするタイムアウトで包み、
    /// ループ自体の liveness を保証する。
    async fn run_tick(
        &self,
        started_at: Instant,
        tick_started: Instant,
    ) -> Result<Sample, MonitorError> {
        let pids = timeout(self.period, self.tree.resolve(self.target_pid))
            .await
            .map_err(|_| self.timeout_error("process tree resolution"))??;

        let tick = TickContext {
            root_pid: self.target_pid,
            pids,
            elapsed_seconds: started_at.elapsed().as_secs(),
            date: Utc::now(),
            started: tick_started,
        };

        let raw = timeout(self.period, self.collector.collect(&tick.pids))
            .await
            .map_err(|_| self.timeout_error("sample collection"))??;

        self.parser.parse(&tick, &raw)
    }

    fn timeout_error(&self, stage: &str) -> MonitorError {
        MonitorError::ToolExecution {
            tool: stage.to_string(),
            status: "timeout".to_string(),
            stderr: format!("exceeded period of {}ms", self.period.as_millis()),
        }
    }

    /// End を発行して Stopped へ遷移（ちょうど 1 回だけ）
    fn finish(&self, reason: &str) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == SessionPhase::Stopped {
            return;
        }
        *phase = SessionPhase::Stopped;

        log_session!(info, "monitoring ended for pid {}: {}", self.target_pid, reason);
        let _ = self.events_tx.send(MonitorEvent::End {
            pid: self.target_pid,
        });
    }
}
