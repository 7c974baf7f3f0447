//! 仿真 IO 后端（Mock 模式）
//!
//! 无硬件依赖，用于单元测试和集成测试：
//! - [`SimDigitalOutput`] 记录每次脉冲的时间戳
//! - [`SimCounter`] 支持手动注入边沿或模拟一次完整回波
//! - [`SimAnalogInput`] / [`SimPowerMonitor`] 可设置电压
//! - [`SimRelay`] 记录正/反向输出
//!
//! 通道在 IO 对象 Drop 时自动释放。

use crate::{
    AnalogInput, ChannelKind, Counter, DigitalOutput, IoBackend, IoError, PowerMonitor,
    RelayOutput,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::trace;

/// 数字通道数量（板载 10 + MXP 16）
pub const NUM_DIGITAL_CHANNELS: u32 = 26;
/// 模拟输入通道数量（板载 4 + MXP 4）
pub const NUM_ANALOG_INPUTS: u32 = 8;
/// 继电器通道数量
pub const NUM_RELAY_CHANNELS: u32 = 4;

/// 计数器默认最大周期
const DEFAULT_MAX_PERIOD: Duration = Duration::from_millis(500);

type Allocations = Arc<Mutex<HashSet<(ChannelKind, u32)>>>;

/// 通道占用凭证，Drop 时释放通道
#[derive(Debug)]
struct ChannelLease {
    allocations: Allocations,
    kind: ChannelKind,
    channel: u32,
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.allocations.lock().remove(&(self.kind, self.channel));
    }
}

/// 仿真数字输出
#[derive(Debug)]
pub struct SimDigitalOutput {
    channel: u32,
    pulses: Mutex<Vec<Instant>>,
    last_width: Mutex<Option<Duration>>,
    /// 回波联动：每次脉冲后在目标计数器上模拟一次回波
    echo: Mutex<Option<(Weak<SimCounter>, Duration)>>,
    _lease: Option<ChannelLease>,
}

impl SimDigitalOutput {
    /// 创建未经后端分配的独立仿真输出
    pub fn new(channel: u32) -> Self {
        Self::with_lease(channel, None)
    }

    fn with_lease(channel: u32, lease: Option<ChannelLease>) -> Self {
        Self {
            channel,
            pulses: Mutex::new(Vec::new()),
            last_width: Mutex::new(None),
            echo: Mutex::new(None),
            _lease: lease,
        }
    }

    /// 所有脉冲的时间戳（按发生顺序）
    pub fn pulse_times(&self) -> Vec<Instant> {
        self.pulses.lock().clone()
    }

    /// 脉冲次数
    pub fn pulse_count(&self) -> usize {
        self.pulses.lock().len()
    }

    /// 最近一次脉冲宽度
    pub fn last_pulse_width(&self) -> Option<Duration> {
        *self.last_width.lock()
    }

    /// 每次脉冲后在 `counter` 上模拟宽度为 `width` 的回波
    pub fn link_echo(&self, counter: &Arc<SimCounter>, width: Duration) {
        *self.echo.lock() = Some((Arc::downgrade(counter), width));
    }
}

impl DigitalOutput for SimDigitalOutput {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn pulse(&self, width: Duration) {
        self.pulses.lock().push(Instant::now());
        *self.last_width.lock() = Some(width);
        trace!("SimDigitalOutput {}: pulse {:?}", self.channel, width);

        let echo = self.echo.lock().clone();
        if let Some((counter, echo_width)) = echo
            && let Some(counter) = counter.upgrade()
        {
            counter.simulate_echo(echo_width);
        }
    }
}

#[derive(Debug)]
struct CounterState {
    edges: u32,
    period: Duration,
    last_edge: Option<Instant>,
    max_period: Duration,
    semi_period: bool,
}

/// 仿真边沿计数器
#[derive(Debug)]
pub struct SimCounter {
    channel: u32,
    state: Mutex<CounterState>,
    resets: AtomicU64,
    _lease: Option<ChannelLease>,
}

impl SimCounter {
    /// 创建未经后端分配的独立仿真计数器
    pub fn new(channel: u32) -> Self {
        Self::with_lease(channel, None)
    }

    fn with_lease(channel: u32, lease: Option<ChannelLease>) -> Self {
        Self {
            channel,
            state: Mutex::new(CounterState {
                edges: 0,
                period: Duration::ZERO,
                last_edge: None,
                max_period: DEFAULT_MAX_PERIOD,
                semi_period: false,
            }),
            resets: AtomicU64::new(0),
            _lease: lease,
        }
    }

    /// 计数器所在的数字输入通道
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// 注入 `count` 个边沿（不改变周期测量）
    pub fn add_edges(&self, count: u32) {
        let mut state = self.state.lock();
        state.edges = state.edges.saturating_add(count);
        state.last_edge = Some(Instant::now());
    }

    /// 模拟一次完整回波（上升沿 + 下降沿），测得周期为 `width`
    pub fn simulate_echo(&self, width: Duration) {
        let mut state = self.state.lock();
        state.edges = state.edges.saturating_add(2);
        state.period = width;
        state.last_edge = Some(Instant::now());
    }

    /// 直接设置周期测量值（不改变边沿计数）
    pub fn set_period(&self, period: Duration) {
        let mut state = self.state.lock();
        state.period = period;
        state.last_edge = Some(Instant::now());
    }

    /// `reset()` 被调用的次数
    pub fn reset_count(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    pub fn max_period(&self) -> Duration {
        self.state.lock().max_period
    }

    pub fn is_semi_period_mode(&self) -> bool {
        self.state.lock().semi_period
    }
}

impl Counter for SimCounter {
    fn set_max_period(&self, max_period: Duration) {
        self.state.lock().max_period = max_period;
    }

    fn set_semi_period_mode(&self, high_semi_period: bool) {
        self.state.lock().semi_period = high_semi_period;
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.edges = 0;
        state.period = Duration::ZERO;
        state.last_edge = None;
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u32 {
        self.state.lock().edges
    }

    fn period(&self) -> Duration {
        let state = self.state.lock();
        match state.last_edge {
            Some(at) if at.elapsed() <= state.max_period => state.period,
            // 超过最大周期未收到边沿：读数过期
            _ => Duration::ZERO,
        }
    }
}

/// 仿真模拟输入
#[derive(Debug)]
pub struct SimAnalogInput {
    channel: u32,
    voltage: Mutex<f64>,
    average_voltage: Mutex<Option<f64>>,
    _lease: Option<ChannelLease>,
}

impl SimAnalogInput {
    pub fn new(channel: u32) -> Self {
        Self::with_lease(channel, None)
    }

    fn with_lease(channel: u32, lease: Option<ChannelLease>) -> Self {
        Self {
            channel,
            voltage: Mutex::new(0.0),
            average_voltage: Mutex::new(None),
            _lease: lease,
        }
    }

    /// 设置瞬时电压（未单独设置平均电压时也作为平均值）
    pub fn set_voltage(&self, volts: f64) {
        *self.voltage.lock() = volts;
    }

    /// 单独设置平均电压
    pub fn set_average_voltage(&self, volts: f64) {
        *self.average_voltage.lock() = Some(volts);
    }
}

impl AnalogInput for SimAnalogInput {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn voltage(&self) -> f64 {
        *self.voltage.lock()
    }

    fn average_voltage(&self) -> f64 {
        self.average_voltage.lock().unwrap_or_else(|| self.voltage())
    }
}

/// 仿真电源监测
#[derive(Debug)]
pub struct SimPowerMonitor {
    voltage_5v: Mutex<f64>,
}

impl SimPowerMonitor {
    pub fn new() -> Self {
        Self {
            voltage_5v: Mutex::new(5.0),
        }
    }

    pub fn set_voltage_5v(&self, volts: f64) {
        *self.voltage_5v.lock() = volts;
    }
}

impl Default for SimPowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerMonitor for SimPowerMonitor {
    fn voltage_5v(&self) -> f64 {
        *self.voltage_5v.lock()
    }
}

/// 仿真继电器
#[derive(Debug)]
pub struct SimRelay {
    channel: u32,
    forward: Mutex<bool>,
    reverse: Mutex<bool>,
    _lease: Option<ChannelLease>,
}

impl SimRelay {
    pub fn new(channel: u32) -> Self {
        Self::with_lease(channel, None)
    }

    fn with_lease(channel: u32, lease: Option<ChannelLease>) -> Self {
        Self {
            channel,
            forward: Mutex::new(false),
            reverse: Mutex::new(false),
            _lease: lease,
        }
    }
}

impl RelayOutput for SimRelay {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn set_forward(&self, on: bool) {
        *self.forward.lock() = on;
    }

    fn set_reverse(&self, on: bool) {
        *self.reverse.lock() = on;
    }

    fn forward(&self) -> bool {
        *self.forward.lock()
    }

    fn reverse(&self) -> bool {
        *self.reverse.lock()
    }
}

/// 仿真 IO 后端
///
/// 负责通道分配，并保留已分配对象的弱引用，便于测试代码取回仿真对象
/// 注入数据或检查输出。
#[derive(Debug, Default)]
pub struct SimBackend {
    allocations: Allocations,
    outputs: Mutex<HashMap<u32, Weak<SimDigitalOutput>>>,
    counters: Mutex<HashMap<u32, Weak<SimCounter>>>,
    analog_inputs: Mutex<HashMap<u32, Weak<SimAnalogInput>>>,
    relays: Mutex<HashMap<u32, Weak<SimRelay>>>,
    power: Arc<SimPowerMonitor>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, kind: ChannelKind, channel: u32) -> Result<ChannelLease, IoError> {
        let max = match kind {
            ChannelKind::Digital => NUM_DIGITAL_CHANNELS,
            ChannelKind::Analog => NUM_ANALOG_INPUTS,
            ChannelKind::Relay => NUM_RELAY_CHANNELS,
        };
        if channel >= max {
            return Err(IoError::ChannelOutOfRange { kind, channel, max });
        }

        let mut allocations = self.allocations.lock();
        if !allocations.insert((kind, channel)) {
            return Err(IoError::ChannelInUse { kind, channel });
        }
        Ok(ChannelLease {
            allocations: self.allocations.clone(),
            kind,
            channel,
        })
    }

    /// 通道是否已被占用
    pub fn is_allocated(&self, kind: ChannelKind, channel: u32) -> bool {
        self.allocations.lock().contains(&(kind, channel))
    }

    /// 取回已分配的仿真数字输出
    pub fn sim_output(&self, channel: u32) -> Option<Arc<SimDigitalOutput>> {
        self.outputs.lock().get(&channel).and_then(Weak::upgrade)
    }

    /// 取回已分配的仿真计数器（按数字输入通道）
    pub fn sim_counter(&self, channel: u32) -> Option<Arc<SimCounter>> {
        self.counters.lock().get(&channel).and_then(Weak::upgrade)
    }

    /// 取回已分配的仿真模拟输入
    pub fn sim_analog_input(&self, channel: u32) -> Option<Arc<SimAnalogInput>> {
        self.analog_inputs.lock().get(&channel).and_then(Weak::upgrade)
    }

    /// 取回已分配的仿真继电器
    pub fn sim_relay(&self, channel: u32) -> Option<Arc<SimRelay>> {
        self.relays.lock().get(&channel).and_then(Weak::upgrade)
    }

    /// 仿真电源监测
    pub fn sim_power(&self) -> Arc<SimPowerMonitor> {
        self.power.clone()
    }
}

impl IoBackend for SimBackend {
    fn digital_output(&self, channel: u32) -> Result<Arc<dyn DigitalOutput>, IoError> {
        let lease = self.allocate(ChannelKind::Digital, channel)?;
        let output = Arc::new(SimDigitalOutput::with_lease(channel, Some(lease)));
        self.outputs.lock().insert(channel, Arc::downgrade(&output));
        Ok(output)
    }

    fn echo_counter(&self, channel: u32) -> Result<Arc<dyn Counter>, IoError> {
        let lease = self.allocate(ChannelKind::Digital, channel)?;
        let counter = Arc::new(SimCounter::with_lease(channel, Some(lease)));
        self.counters.lock().insert(channel, Arc::downgrade(&counter));
        Ok(counter)
    }

    fn analog_input(&self, channel: u32) -> Result<Arc<dyn AnalogInput>, IoError> {
        let lease = self.allocate(ChannelKind::Analog, channel)?;
        let input = Arc::new(SimAnalogInput::with_lease(channel, Some(lease)));
        self.analog_inputs.lock().insert(channel, Arc::downgrade(&input));
        Ok(input)
    }

    fn relay(&self, channel: u32) -> Result<Arc<dyn RelayOutput>, IoError> {
        let lease = self.allocate(ChannelKind::Relay, channel)?;
        let relay = Arc::new(SimRelay::with_lease(channel, Some(lease)));
        self.relays.lock().insert(channel, Arc::downgrade(&relay));
        Ok(relay)
    }

    fn power_monitor(&self) -> Arc<dyn PowerMonitor> {
        self.power.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_allocation_is_exclusive() {
        let backend = SimBackend::new();
        let _out = backend.digital_output(3).unwrap();

        let err = backend.echo_counter(3).err().unwrap();
        assert_eq!(
            err,
            IoError::ChannelInUse {
                kind: ChannelKind::Digital,
                channel: 3
            }
        );

        // 不同类型的通道号互不冲突
        assert!(backend.analog_input(3).is_ok());
    }

    #[test]
    fn test_channel_out_of_range() {
        let backend = SimBackend::new();
        let err = backend.relay(NUM_RELAY_CHANNELS).err().unwrap();
        assert!(matches!(err, IoError::ChannelOutOfRange { max, .. } if max == NUM_RELAY_CHANNELS));
    }

    #[test]
    fn test_channel_released_on_drop() {
        let backend = SimBackend::new();
        let out = backend.digital_output(5).unwrap();
        assert!(backend.is_allocated(ChannelKind::Digital, 5));
        drop(out);
        assert!(!backend.is_allocated(ChannelKind::Digital, 5));
        assert!(backend.sim_output(5).is_none());
        assert!(backend.digital_output(5).is_ok());
    }

    #[test]
    fn test_sim_output_records_pulses() {
        let out = SimDigitalOutput::new(0);
        out.pulse(Duration::from_micros(10));
        out.pulse(Duration::from_micros(10));
        assert_eq!(out.pulse_count(), 2);
        assert_eq!(out.last_pulse_width(), Some(Duration::from_micros(10)));
        let times = out.pulse_times();
        assert!(times[1] >= times[0]);
    }

    #[test]
    fn test_sim_counter_echo_and_reset() {
        let counter = SimCounter::new(1);
        counter.set_max_period(Duration::from_secs(1));
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.period(), Duration::ZERO);

        counter.simulate_echo(Duration::from_millis(10));
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.period(), Duration::from_millis(10));

        counter.reset();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.period(), Duration::ZERO);
        assert_eq!(counter.reset_count(), 1);
    }

    #[test]
    fn test_sim_counter_stale_period_reads_zero() {
        let counter = SimCounter::new(1);
        counter.set_max_period(Duration::from_millis(20));
        counter.simulate_echo(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.period(), Duration::ZERO);
    }

    #[test]
    fn test_linked_echo() {
        let out = SimDigitalOutput::new(0);
        let counter = Arc::new(SimCounter::new(1));
        counter.set_max_period(Duration::from_secs(1));
        out.link_echo(&counter, Duration::from_millis(3));

        out.pulse(Duration::from_micros(10));
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.period(), Duration::from_millis(3));
    }

    #[test]
    fn test_analog_average_defaults_to_voltage() {
        let input = SimAnalogInput::new(0);
        input.set_voltage(1.25);
        assert_eq!(input.average_voltage(), 1.25);
        input.set_average_voltage(2.0);
        assert_eq!(input.voltage(), 1.25);
        assert_eq!(input.average_voltage(), 2.0);
    }

    #[test]
    fn test_backend_returns_sim_handles() {
        let backend = SimBackend::new();
        let relay = backend.relay(0).unwrap();
        relay.set_forward(true);
        assert!(backend.sim_relay(0).unwrap().forward());

        backend.sim_power().set_voltage_5v(4.9);
        assert_eq!(backend.power_monitor().voltage_5v(), 4.9);
    }
}
