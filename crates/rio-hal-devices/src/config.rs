//! 调度器配置
//!
//! 控制超声波轮询线程的时序参数。可以直接构造，也可以从 TOML 加载：
//!
//! ```toml
//! [ultrasonic]
//! ping_time_us = 10
//! ping_interval_ms = 100
//! max_period_ms = 1000
//! stop_timeout_ms = 2000
//! ```

use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 超声波调度器配置
///
/// # Example
///
/// ```
/// use rio_hal_devices::SchedulerConfig;
///
/// // 默认配置（10µs 触发脉冲，100ms 传感器间隔）
/// let config = SchedulerConfig::default();
/// assert!(config.validate().is_ok());
///
/// // 自定义配置
/// let config = SchedulerConfig {
///     ping_interval_ms: 60,
///     ..SchedulerConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 触发脉冲宽度（微秒）
    pub ping_time_us: u64,
    /// 相邻两次 ping 的间隔（毫秒）
    ///
    /// 必须大于最长回波往返时间，否则相邻传感器的回波会互相干扰。
    pub ping_interval_ms: u64,
    /// 计数器最大周期（毫秒），超过则读数过期
    pub max_period_ms: u64,
    /// 停止轮询线程时的告警周期（毫秒）
    ///
    /// 停止总是等到线程退出；每等待这么久仍未退出记录一次告警。
    pub stop_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ping_time_us: 10,
            ping_interval_ms: 100,
            max_period_ms: 1000,
            stop_timeout_ms: 2000,
        }
    }
}

/// TOML 文件中的顶层结构
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ultrasonic: SchedulerConfig,
}

impl SchedulerConfig {
    pub fn ping_time(&self) -> Duration {
        Duration::from_micros(self.ping_time_us)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn max_period(&self) -> Duration {
        Duration::from_millis(self.max_period_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// 检查参数合法性
    ///
    /// # 错误
    /// - 任一参数为 0
    /// - `ping_interval` 不大于 `ping_time`
    pub fn validate(&self) -> Result<(), DeviceError> {
        let fields = [
            ("ping_time_us", self.ping_time_us),
            ("ping_interval_ms", self.ping_interval_ms),
            ("max_period_ms", self.max_period_ms),
            ("stop_timeout_ms", self.stop_timeout_ms),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| *value == 0) {
            return Err(DeviceError::Config(format!("{} must be non-zero", name)));
        }

        if self.ping_interval() <= self.ping_time() {
            return Err(DeviceError::Config(format!(
                "ping_interval_ms ({}ms) must exceed ping_time_us ({}µs)",
                self.ping_interval_ms, self.ping_time_us
            )));
        }

        Ok(())
    }

    /// 从 TOML 字符串解析（读取 `[ultrasonic]` 表，缺省字段使用默认值）
    pub fn from_toml_str(content: &str) -> Result<Self, DeviceError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| DeviceError::Config(e.to_string()))?;
        file.ultrasonic.validate()?;
        Ok(file.ultrasonic)
    }

    /// 从 TOML 文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DeviceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML（带 `[ultrasonic]` 表头）
    pub fn to_toml_string(&self) -> Result<String, DeviceError> {
        let body = toml::to_string(self).map_err(|e| DeviceError::Config(e.to_string()))?;
        Ok(format!("[ultrasonic]\n{}", body))
    }
}
