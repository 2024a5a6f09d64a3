//! 板级参数

/// 板级参数,由具体板卡给出
pub trait Config {
    /// 处理器核数
    const CPU_NUM: usize;
    /// 引导核,构造同步域时即为醒着状态
    const BOOT_HART_ID: usize = 0;
    /// 核心时钟频率
    const CLOCK_FREQ: u64;
    /// CLINT mtime 计数频率
    const CLINT_FREQ: u64;
    /// 每秒 tick 数
    const TICKS_PER_SEC: u64 = 100;
    /// 相邻两次时钟中断之间 mtime 走过的计数
    const TICK_INTERVAL: u64 = Self::CLINT_FREQ / Self::TICKS_PER_SEC;
    /// 每多少个 tick 评估一次上下文切换
    const TICKS_PER_SWITCH: u64 = 1;
    /// PLIC 中断源号上限
    const IRQ_SOURCE_MAX: usize;
    /// 每核就绪环容量
    const READY_CAPACITY: usize = 32;
}

pub struct ConfigImpl;

impl Config for ConfigImpl {
    const CPU_NUM: usize = 2;
    const CLOCK_FREQ: u64 = 403_000_000;
    /// K210 的 CLINT 计数频率为核心频率 / 50
    const CLINT_FREQ: u64 = 403_000_000 / 50;
    const IRQ_SOURCE_MAX: usize = 65;
}
