//! 传感器注册表
//!
//! 记录所有存活的超声波传感器，并维护轮询顺序。
//!
//! 存储采用 arena + 稳定句柄：记录保存在 slot 数组中，轮询顺序是一个
//! 存活句柄的有序序列（新传感器插入队首）。删除只会让 slot 变为空并递增
//! generation，过期句柄不可能再命中新记录。
//!
//! 注册表本身不是线程安全的，由 [`Scheduler`](crate::Scheduler) 通过互斥锁保护；
//! 结构性修改只会在轮询线程停止后进行。

use crate::error::RegistryError;
use rio_hal_io::{Counter, DigitalOutput};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 传感器句柄（arena 下标 + generation）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorHandle {
    index: u32,
    generation: u32,
}

impl SensorHandle {
    /// arena 下标
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// 注册表中的一条传感器记录
///
/// 只保存轮询线程和模式切换需要的共享资源；单位、PID 设置等仍由
/// `Ultrasonic` 实例自己持有。
#[derive(Clone)]
pub struct SensorRecord {
    /// 触发通道
    pub ping: Arc<dyn DigitalOutput>,
    /// 回波计数器
    pub counter: Arc<dyn Counter>,
    /// 是否参与轮询
    pub enabled: Arc<AtomicBool>,
}

impl SensorRecord {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SensorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRecord")
            .field("ping_channel", &self.ping.channel())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    record: Option<SensorRecord>,
}

/// 传感器注册表
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// 轮询顺序（队首即 head）
    order: VecDeque<SensorHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入到队首（O(1)）
    pub fn insert(&mut self, record: SensorRecord) -> SensorHandle {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.record = Some(record);
                SensorHandle {
                    index,
                    generation: slot.generation,
                }
            },
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                SensorHandle {
                    index,
                    generation: 0,
                }
            },
        };

        self.order.push_front(handle);
        handle
    }

    /// 从轮询顺序中摘除（线性扫描）
    ///
    /// # 错误
    /// - `RegistryError::Empty`: 注册表为空
    /// - `RegistryError::NotRegistered`: 句柄不存在（或已过期）
    pub fn remove(&mut self, handle: SensorHandle) -> Result<SensorRecord, RegistryError> {
        if self.order.is_empty() {
            return Err(RegistryError::Empty(handle));
        }

        let position = self
            .order
            .iter()
            .position(|h| *h == handle)
            .ok_or(RegistryError::NotRegistered(handle))?;
        self.order.remove(position);

        let record = self
            .slots
            .get_mut(handle.index as usize)
            .and_then(|slot| slot.record.take())
            .ok_or(RegistryError::NotRegistered(handle))?;
        self.free.push(handle.index);
        Ok(record)
    }

    /// 队首句柄
    pub fn head(&self) -> Option<SensorHandle> {
        self.order.front().copied()
    }

    /// 轮询顺序中第 `position` 个传感器
    pub fn get(&self, position: usize) -> Option<(SensorHandle, &SensorRecord)> {
        let handle = *self.order.get(position)?;
        self.record(handle).map(|record| (handle, record))
    }

    /// 按句柄查找记录
    pub fn record(&self, handle: SensorHandle) -> Option<&SensorRecord> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn contains(&self, handle: SensorHandle) -> bool {
        self.record(handle).is_some()
    }

    /// 按轮询顺序列出所有存活句柄
    pub fn handles(&self) -> Vec<SensorHandle> {
        self.order.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 清零所有传感器的计数器（使进行中的测量失效），返回清零数量
    pub fn reset_all_counters(&self) -> usize {
        let mut reset = 0;
        for record in self.order.iter().filter_map(|handle| self.record(*handle)) {
            record.counter.reset();
            reset += 1;
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rio_hal_io::mock::{SimCounter, SimDigitalOutput};

    fn sim_record(channel: u32) -> (SensorRecord, Arc<SimCounter>) {
        let counter = Arc::new(SimCounter::new(channel + 1));
        let record = SensorRecord {
            ping: Arc::new(SimDigitalOutput::new(channel)),
            counter: counter.clone(),
            enabled: Arc::new(AtomicBool::new(true)),
        };
        (record, counter)
    }

    #[test]
    fn test_insert_at_head() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        let b = registry.insert(sim_record(2).0);
        let c = registry.insert(sim_record(4).0);

        assert_eq!(registry.head(), Some(c));
        assert_eq!(registry.handles(), vec![c, b, a]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(1).map(|(h, _)| h), Some(b));
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_remove_middle_preserves_order() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        let b = registry.insert(sim_record(2).0);
        let c = registry.insert(sim_record(4).0);

        let record = registry.remove(b).unwrap();
        assert_eq!(record.ping.channel(), 2);
        assert_eq!(registry.handles(), vec![c, a]);
        assert!(!registry.contains(b));
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        let b = registry.insert(sim_record(2).0);

        registry.remove(b).unwrap();
        assert_eq!(registry.head(), Some(a));
        registry.remove(a).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.head(), None);
    }

    #[test]
    fn test_remove_from_empty() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        registry.remove(a).unwrap();
        assert_eq!(registry.remove(a).unwrap_err(), RegistryError::Empty(a));
    }

    #[test]
    fn test_remove_unknown_handle() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        let _b = registry.insert(sim_record(2).0);
        registry.remove(a).unwrap();
        assert_eq!(registry.remove(a).unwrap_err(), RegistryError::NotRegistered(a));
    }

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let mut registry = Registry::new();
        let a = registry.insert(sim_record(0).0);
        registry.remove(a).unwrap();

        let b = registry.insert(sim_record(2).0);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(registry.record(a).is_none());
        assert_eq!(registry.record(b).map(|r| r.ping.channel()), Some(2));
    }

    #[test]
    fn test_reset_all_counters() {
        let mut registry = Registry::new();
        let (r1, c1) = sim_record(0);
        let (r2, c2) = sim_record(2);
        registry.insert(r1);
        registry.insert(r2);
        c1.simulate_echo(std::time::Duration::from_millis(1));

        assert_eq!(registry.reset_all_counters(), 2);
        assert_eq!(c1.get(), 0);
        assert_eq!(c1.reset_count(), 1);
        assert_eq!(c2.reset_count(), 1);
    }
}
