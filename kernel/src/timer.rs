//! 预约和处理时钟中断

use core::sync::atomic::{AtomicU64, Ordering};

use crate::core_sync::interface::{IpiTransport, ReadyQueue};
use crate::core_sync::CoreSync;

pub mod interface {
    /// 每核一次性时钟比较寄存器
    pub trait DeadlineTimer: Sync {
        /// 在比较寄存器当前值上累加一个固定 tick 周期
        ///
        /// 比较寄存器盯的是绝对时刻:必须在时钟中断返回前调用,
        /// 否则该核不会再收到时钟中断
        fn schedule_next_tick(&self, hart_id: usize);
    }

    impl<'a, T: DeadlineTimer> DeadlineTimer for &'a T {
        fn schedule_next_tick(&self, hart_id: usize) {
            (**self).schedule_next_tick(hart_id)
        }
    }
}

use self::interface::DeadlineTimer;

/// 每核 tick 计数与时间片判定
pub struct Ticker<D, const N: usize> {
    deadline: D,
    ticks: [AtomicU64; N],
    ticks_per_switch: u64,
}

impl<D: DeadlineTimer, const N: usize> Ticker<D, N> {
    pub fn new(deadline: D, ticks_per_switch: u64) -> Self {
        assert!(ticks_per_switch > 0);
        const ZERO: AtomicU64 = AtomicU64::new(0);
        Ticker {
            deadline,
            ticks: [ZERO; N],
            ticks_per_switch,
        }
    }

    /// 机器时钟中断入口,必须运行在 hart_id 核上
    ///
    /// 先预约下一次中断,再计数;时间片耗尽时向本核置位切换标志。
    /// 自指请求不需要 IPI,中断返回路径自会检查
    pub fn on_tick<I, Q>(&self, hart_id: usize, sync: &CoreSync<I, Q, N>)
    where
        I: IpiTransport,
        Q: ReadyQueue,
    {
        assert!(hart_id < N);
        self.deadline.schedule_next_tick(hart_id);
        let ticks = self.ticks[hart_id].fetch_add(1, Ordering::Relaxed) + 1;
        if ticks % self.ticks_per_switch == 0 {
            sync.preempt_local(hart_id);
        }
    }

    /// hart_id 自启动以来经历的 tick 数
    pub fn ticks(&self, hart_id: usize) -> u64 {
        self.ticks[hart_id].load(Ordering::Relaxed)
    }
}

/// 自上电以来的 mtime 计数
#[cfg(feature = "k210")]
pub fn get_cycles() -> u64 {
    k210_soc::clint::mtime()
}

#[cfg(feature = "k210")]
pub fn get_time_ms() -> u64 {
    use crate::config::{Config, ConfigImpl};
    // 计数值 / 每毫秒计数
    get_cycles() / (ConfigImpl::CLINT_FREQ / 1_000)
}

/// 返回上电以来的时长
#[cfg(feature = "k210")]
pub fn get_duration() -> core::time::Duration {
    use crate::config::{Config, ConfigImpl};
    const NSEC_PER_SEC: u64 = 1_000_000_000;
    let nsec = get_cycles() * (NSEC_PER_SEC / 1_000) / (ConfigImpl::CLINT_FREQ / 1_000);
    core::time::Duration::new(nsec / NSEC_PER_SEC, (nsec % NSEC_PER_SEC) as u32)
}
