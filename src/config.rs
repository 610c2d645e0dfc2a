use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// メインの設定構造体
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    /// 監視設定
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// 外部ツール設定
    #[serde(default)]
    pub tools: ToolSettings,

    /// ログ設定
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// 監視ループ関連の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// サンプリング周期（ミリ秒）
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// ループ内で連続して許容するツール不在エラーの回数
    #[serde(default = "default_max_tool_failures")]
    pub max_tool_failures: u32,
}

/// 外部ツール関連の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// プロセスツリー列挙コマンド
    #[serde(default = "default_pstree_command")]
    pub pstree: String,

    /// プロセス統計コマンド
    #[serde(default = "default_pidstat_command")]
    pub pidstat: String,
}

/// ログ関連の設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingSettings {
    /// 詳細ログを有効にするか
    #[serde(default)]
    pub verbose: bool,

    /// ログレベル（"error" 〜 "trace"）
    pub level: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            max_tool_failures: default_max_tool_failures(),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            pstree: default_pstree_command(),
            pidstat: default_pidstat_command(),
        }
    }
}

// デフォルト値関数
fn default_period_ms() -> u64 {
    5000
}

fn default_max_tool_failures() -> u32 {
    3
}

fn default_pstree_command() -> String {
    "pstree".to_string()
}

fn default_pidstat_command() -> String {
    "pidstat".to_string()
}

impl MonitorConfig {
    /// サンプリング周期を Duration として取得
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.monitor.period_ms)
    }

    /// 設定ファイルから読み込み
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// 設定ファイルに保存
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        // ディレクトリが存在しない場合は作成
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// デフォルトの設定ファイルパスを取得
    pub fn default_config_path() -> Result<PathBuf> {
        let home_dir = home::home_dir().context("Failed to get home directory")?;

        Ok(home_dir.join(".pidmon").join("config.toml"))
    }

    /// 設定ファイルパスの候補を取得（優先順位順）
    pub fn config_path_candidates() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. カレントディレクトリの .pidmon/config.toml
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join(".pidmon").join("config.toml"));
        }

        // 2. ホームディレクトリの .pidmon/config.toml
        if let Some(home_dir) = home::home_dir() {
            paths.push(home_dir.join(".pidmon").join("config.toml"));
        }

        // 3. XDG規格に従った設定ディレクトリ（Linux/Unix）
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(
                PathBuf::from(xdg_config_home)
                    .join("pidmon")
                    .join("config.toml"),
            );
        } else if let Some(home_dir) = home::home_dir() {
            paths.push(home_dir.join(".config").join("pidmon").join("config.toml"));
        }

        paths
    }

    /// 設定ファイルを自動検出して読み込み
    pub fn load_auto() -> Result<Option<(Self, PathBuf)>> {
        for path in Self::config_path_candidates() {
            if path.exists() {
                let config = Self::from_file(&path)?;
                return Ok(Some((config, path)));
            }
        }
        Ok(None)
    }

    /// 環境変数で設定を上書き
    pub fn apply_env_overrides(&mut self) {
        if let Ok(period) = std::env::var("PIDMON_PERIOD_MS") {
            if let Ok(ms) = period.parse::<u64>() {
                self.monitor.period_ms = ms;
            }
        }

        if let Ok(pstree) = std::env::var("PIDMON_PSTREE") {
            self.tools.pstree = pstree;
        }

        if let Ok(pidstat) = std::env::var("PIDMON_PIDSTAT") {
            self.tools.pidstat = pidstat;
        }

        if let Ok(verbose) = std::env::var("PIDMON_VERBOSE") {
            self.logging.verbose = verbose == "1" || verbose.to_lowercase() == "true";
        }

        if let Ok(level) = std::env::var("PIDMON_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
    }

    /// ログ設定を logging モジュールへ反映
    pub fn apply_log_settings(&self) {
        if let Some(level) = &self.logging.level {
            crate::logging::set_log_level(crate::logging::LogLevel::from(level.as_str()));
        } else if self.logging.verbose {
            crate::logging::set_log_level(crate::logging::LogLevel::Debug);
        }
    }

    /// 設定のサンプルを生成
    pub fn sample() -> Self {
        let mut config = Self::default();

        config.monitor.period_ms = 5000;
        config.monitor.max_tool_failures = 3;
        config.tools.pstree = "pstree".to_string();
        config.tools.pidstat = "pidstat".to_string();
        config.logging.verbose = false;

        config
    }
}
