//! PID 反馈源

use crate::error::DeviceError;

/// PID 反馈量的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PidSourceType {
    /// 位移（位置、距离、角度）
    #[default]
    Displacement,
    /// 速率
    Rate,
}

/// 可作为 PID 控制器反馈输入的传感器
///
/// 默认实现只接受 [`PidSourceType::Displacement`]，本 crate 中的设备都只提供位移量。
pub trait PidSource {
    /// 当前反馈值
    fn pid_get(&self) -> f64;

    fn pid_source_type(&self) -> PidSourceType {
        PidSourceType::Displacement
    }

    /// 设置反馈量类型
    ///
    /// # 错误
    /// - `DeviceError::InvalidPidSource`: 设备不支持该类型
    fn set_pid_source_type(&mut self, kind: PidSourceType) -> Result<(), DeviceError> {
        match kind {
            PidSourceType::Displacement => Ok(()),
            other => Err(DeviceError::InvalidPidSource(other)),
        }
    }
}
