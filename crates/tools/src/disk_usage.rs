//! Disk usage tool: reports capacity of the filesystem holding a path.

use async_trait::async_trait;
use toolloop_config::DiskConfig;
use toolloop_core::action::Arguments;
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolOutput};
use tracing::debug;

const GIB: f64 = (1u64 << 30) as f64;

pub struct DiskUsageTool {
    config: DiskConfig,
}

impl DiskUsageTool {
    pub fn new(config: DiskConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for DiskUsageTool {
    fn name(&self) -> &str {
        "get_disk_usage"
    }

    fn description(&self) -> &str {
        "Display the current disk usage for a file system path. Returns total, used and free space in GB and the usage percentage."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::optional(
                "path",
                ParameterKind::String,
                "The file system path to check",
            )
            .with_default(self.config.default_path.clone()),
        ])
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.config.default_path)
            .to_string();

        debug!(tool = self.name(), %path, "Reading filesystem stats");

        let stats_path = path.clone();
        let stats = tokio::task::spawn_blocking(move || fs2::statvfs(&stats_path))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "get_disk_usage".into(),
                reason: e.to_string(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "get_disk_usage".into(),
                reason: format!("{path}: {e}"),
            })?;

        Ok(ToolOutput::Structured(report(
            &path,
            stats.total_space(),
            stats.free_space(),
        )))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the usage report from raw byte counts.
fn report(path: &str, total: u64, free: u64) -> serde_json::Value {
    let used = total.saturating_sub(free);
    let percent = if total == 0 {
        0.0
    } else {
        round2(used as f64 / total as f64 * 100.0)
    };

    serde_json::json!({
        "Path": path,
        "Total Space (GB)": round2(total as f64 / GIB),
        "Used Space (GB)": round2(used as f64 / GIB),
        "Free Space (GB)": round2(free as f64 / GIB),
        "Usage Percentage (%)": percent,
    })
}
