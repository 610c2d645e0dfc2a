use crate::error::MonitorError;

/// 生存確認の共通インターフェース
///
/// `Ok(false)` は「クエリ成功・プロセス不在」。クエリ自体の失敗は
/// `MonitorError::Probe` で区別する。高頻度で呼んでもリソースを
/// リークしないこと。
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> Result<bool, MonitorError>;
}

/// シグナル 0 送信による生存確認
pub struct KillProbe;

#[cfg(unix)]
impl LivenessProbe for KillProbe {
    fn is_alive(&self, pid: u32) -> Result<bool, MonitorError> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Ok(true),
            // ESRCH: プロセスが存在しない
            Err(Errno::ESRCH) => Ok(false),
            // EPERM: 存在するがシグナル送信権限がない
            Err(Errno::EPERM) => Ok(true),
            Err(errno) => Err(MonitorError::Probe {
                pid,
                reason: errno.to_string(),
            }),
        }
    }
}

#[cfg(not(unix))]
impl LivenessProbe for KillProbe {
    fn is_alive(&self, pid: u32) -> Result<bool, MonitorError> {
        Err(MonitorError::Probe {
            pid,
            reason: "liveness probe is only supported on unix".to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        let probe = KillProbe;
        let result = probe.is_alive(std::process::id());
        assert_eq!(result.unwrap(), true);
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        // 終了・回収済みの子プロセスの PID は ESRCH になる
        let mut child = std::process::Command::new("true")
            .spawn()
            .expect("failed to spawn child");
        let pid = child.id();
        child.wait().expect("failed to wait for child");

        let probe = KillProbe;
        assert_eq!(probe.is_alive(pid).unwrap(), false);
    }

    #[test]
    fn test_init_process_is_alive() {
        // PID 1 は常に存在する（権限がなくても EPERM → 生存扱い）
        let probe = KillProbe;
        assert_eq!(probe.is_alive(1).unwrap(), true);
    }
}
