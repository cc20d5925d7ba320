use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::{Error, Result};
use crate::services::Telemetry;
use crate::types::AppStats;

/// Resource usage of the current process, sampled with `sysinfo`.
///
/// CPU usage is relative to the previous sample, so the first reading is 0.
/// GPU usage is not probed and always reads 0.
#[derive(Clone)]
pub struct SystemTelemetry {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
}

impl Default for SystemTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemTelemetry")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl SystemTelemetry {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    fn sample(&self) -> Result<AppStats> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| Error::Telemetry("system handle poisoned".to_string()))?;
        system.refresh_memory();

        let (cpu_usage, memory_usage) = match self.pid {
            Some(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system
                    .process(pid)
                    .map(|p| (p.cpu_usage(), p.memory()))
                    .unwrap_or((0.0, 0))
            }
            None => (0.0, 0),
        };

        Ok(AppStats {
            cpu_usage,
            memory_usage,
            total_memory: system.total_memory(),
            gpu_usage: 0.0,
        })
    }
}

#[async_trait]
impl Telemetry for SystemTelemetry {
    async fn get_stats(&self) -> Result<AppStats> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.sample())
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))?
    }
}
