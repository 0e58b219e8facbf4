//! Process isolation for generated programs

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::SandboxConfig;

/// Environment variable carrying the real input path into the child
pub const INPUT_ENV: &str = "VISION_AGENT_INPUT";

/// Environment variable carrying the real output path into the child
pub const OUTPUT_ENV: &str = "VISION_AGENT_OUTPUT";

/// How a generated program is confined
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    pub timeout: Duration,
    pub isolate_workdir: bool,
    pub inherit_env: bool,
    pub env_allow: Vec<String>,
    pub max_memory_mb: Option<u64>,
    pub max_cpu_secs: Option<u64>,
}

impl SandboxPolicy {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            isolate_workdir: config.isolate_workdir,
            inherit_env: config.inherit_env,
            env_allow: config.env_allow.clone(),
            max_memory_mb: config.max_memory_mb,
            max_cpu_secs: config.max_cpu_secs,
        }
    }

    /// Apply environment and resource restrictions to a command
    pub fn apply(&self, cmd: &mut Command, input: &Path, output: &Path) {
        debug!(inherit_env = self.inherit_env, "SandboxPolicy::apply: called");
        if !self.inherit_env {
            cmd.env_clear();
            for name in &self.env_allow {
                if let Some(value) = std::env::var_os(name) {
                    cmd.env(name, value);
                }
            }
        }

        cmd.env(INPUT_ENV, input).env(OUTPUT_ENV, output);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(target_os = "linux")]
        self.apply_rlimits(cmd);
    }

    #[cfg(target_os = "linux")]
    fn apply_rlimits(&self, cmd: &mut Command) {
        use nix::sys::resource::{Resource, setrlimit};

        let memory = self.max_memory_mb.map(|mb| mb.saturating_mul(1024 * 1024));
        let cpu = self.max_cpu_secs;
        if memory.is_none() && cpu.is_none() {
            return;
        }
        debug!(?memory, ?cpu, "SandboxPolicy::apply_rlimits: limiting child");

        // SAFETY: runs in the child between fork and exec; setrlimit is async-signal-safe
        // and the closure does not allocate.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(bytes) = memory {
                    setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
                }
                if let Some(secs) = cpu {
                    setrlimit(Resource::RLIMIT_CPU, secs, secs)?;
                }
                Ok(())
            });
        }
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

/// Kill every process in the child's process group
#[cfg(unix)]
pub(crate) fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "kill_process_group: killpg failed");
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_process_group(_pid: u32) {}
