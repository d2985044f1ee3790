//! 帧时钟模块
//!
//! 提供显式的 `Clock` 值，在启动时创建一次，由帧循环持有并推进。
//! 取代进程级的计时器单例（频率/起始时间全局量），避免隐藏的全局可变状态。

use std::time::{Duration, Instant};

/// 帧时钟
///
/// 记录启动时刻，并在每帧调用 `tick` 时计算与上一帧的间隔。
/// 不含任何全局状态，可以在测试中独立创建。
#[derive(Debug, Clone)]
pub struct Clock {
    /// 时钟创建时刻
    start: Instant,
    /// 上一次 tick 的时刻
    last_tick: Instant,
    /// 已经历的帧数
    frame_count: u64,
}

impl Clock {
    /// 创建新的时钟，以当前时刻为起点
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_count: 0,
        }
    }

    /// 推进一帧，返回与上一帧的时间间隔
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.frame_count += 1;
        delta
    }

    /// 自时钟创建以来经过的时间
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 自时钟创建以来经过的秒数（用于着色器动画参数）
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// 已经历的帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_tick_advances() {
        let mut clock = Clock::new();
        assert_eq!(clock.frame_count(), 0);

        clock.tick();
        clock.tick();
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_clock_elapsed_monotonic() {
        let mut clock = Clock::new();
        let first = clock.elapsed();
        clock.tick();
        let second = clock.elapsed();
        assert!(second >= first);
    }
}
