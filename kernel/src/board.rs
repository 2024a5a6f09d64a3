//! K210 板级接线
//!
//! 把 `k210-soc` 的寄存器访问适配成同步域、分发器和 tick 需要的
//! 传输接口,并定义全局单例。机器态下 PLIC target 号即 hart 号。

use k210_soc::{clint, plic, uarths};
use lazy_static::lazy_static;

use crate::config::{Config, ConfigImpl};
use crate::core_sync::{interface::IpiTransport, CoreSync};
use crate::hart;
use crate::interrupt::{interface::PlicTransport, IrqDispatcher};
use crate::logger::{self, interface::Console};
use crate::scheduler::ReadyList;
use crate::timer::{interface::DeadlineTimer, Ticker};

/// CLINT 软件中断信箱
pub struct ClintIpi;

impl IpiTransport for ClintIpi {
    fn send(&self, hart_id: usize) {
        clint::msip_set(hart_id);
    }
    fn clear(&self, hart_id: usize) -> bool {
        clint::msip_clear(hart_id)
    }
}

/// CLINT 时钟比较寄存器
pub struct ClintDeadline;

impl DeadlineTimer for ClintDeadline {
    fn schedule_next_tick(&self, hart_id: usize) {
        clint::bump_mtimecmp(hart_id, ConfigImpl::TICK_INTERVAL);
    }
}

/// PLIC 机器态 target
pub struct PlicHw;

impl PlicTransport for PlicHw {
    fn claim(&self, hart_id: usize) -> Option<u32> {
        match plic::claim(hart_id) {
            0 => None,
            source => Some(source),
        }
    }
    fn complete(&self, hart_id: usize, source: u32) {
        plic::complete(hart_id, source);
    }
    fn priority(&self, source: u32) -> u32 {
        plic::priority(source)
    }
    fn set_priority(&self, source: u32, priority: u32) {
        plic::set_priority(source, priority);
    }
    fn threshold(&self, hart_id: usize) -> u32 {
        plic::threshold(hart_id)
    }
    fn set_threshold(&self, hart_id: usize, threshold: u32) {
        plic::set_threshold(hart_id, threshold);
    }
    fn set_enable(&self, hart_id: usize, source: u32, enabled: bool) {
        plic::set_enable(hart_id, source, enabled);
    }
}

struct UarthsConsole;

impl Console for UarthsConsole {
    fn put_byte(&self, byte: u8) {
        uarths::put_byte(byte);
    }
}

/// 每核就绪队列的具体类型
pub type Ready = ReadyList<{ ConfigImpl::CPU_NUM }, { ConfigImpl::READY_CAPACITY }>;

lazy_static! {
    /// 每核就绪队列
    pub static ref READY: Ready = ReadyList::new();
    /// 全部核共享的同步域
    pub static ref CORE_SYNC: CoreSync<ClintIpi, &'static Ready, { ConfigImpl::CPU_NUM }> =
        CoreSync::new(ClintIpi, &*READY);
    /// 外部中断分发
    pub static ref IRQ: IrqDispatcher<PlicHw, { ConfigImpl::IRQ_SOURCE_MAX + 1 }> =
        IrqDispatcher::new(PlicHw);
    /// 时钟 tick
    pub static ref TICKER: Ticker<ClintDeadline, { ConfigImpl::CPU_NUM }> =
        Ticker::new(ClintDeadline, ConfigImpl::TICKS_PER_SWITCH);
}

/// 引导核的一次性全局初始化
///
/// 其余核必须等它完成后才能触碰任何全局单例
pub fn init_bsp() {
    uarths::init(ConfigImpl::CLOCK_FREQ as u32, 115_200);
    static CONSOLE: UarthsConsole = UarthsConsole;
    logger::set_console(&CONSOLE);
    logger::init();
    lazy_static::initialize(&READY);
    lazy_static::initialize(&CORE_SYNC);
    lazy_static::initialize(&IRQ);
    lazy_static::initialize(&TICKER);
}

/// 每核的本地初始化
///
/// 清掉上电残留的 IPI 挂起位,清空 PLIC 使能,预约第一次时钟中断,
/// 再打开本核的各路中断使能
pub fn init_hart(hart_id: usize) {
    clint::msip_clear(hart_id);
    plic::init(hart_id);
    clint::set_mtimecmp(hart_id, clint::mtime().wrapping_add(ConfigImpl::TICK_INTERVAL));
    crate::trap::init();
    hart::ipi_enable();
    hart::timer_irq_enable();
    hart::external_irq_enable();
}
