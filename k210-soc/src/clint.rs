//! CLINT:核本地中断器
//!
//! 每核一个软件中断信箱位(`msip`)和一个 64 位时钟比较寄存器
//! (`mtimecmp`),全局一个 `mtime` 计数器。信箱位是电平语义:
//! 置位一次和置位多次对目标核等效,挂起位由目标核自己清除。

use k210_pac as pac;

/// K210 有两个 hart
pub const CPU_NUM: usize = 2;

fn clint() -> &'static pac::clint::RegisterBlock {
    unsafe { &*pac::CLINT::ptr() }
}

/// 置位 hart_id 的软件中断挂起位
///
/// 核号越界时静默忽略,调用方负责校验
pub fn msip_set(hart_id: usize) {
    if hart_id >= CPU_NUM {
        return;
    }
    clint().msip[hart_id].write(|w| unsafe { w.bits(1) });
}

/// 清除 hart_id 的软件中断挂起位,返回清除前是否置位
///
/// 必须由 hart_id 自己在软件中断处理中调用,否则会反复重入
pub fn msip_clear(hart_id: usize) -> bool {
    if hart_id >= CPU_NUM {
        return false;
    }
    let pending = clint().msip[hart_id].read().bits() != 0;
    clint().msip[hart_id].write(|w| unsafe { w.bits(0) });
    pending
}

/// 读 hart_id 的时钟比较寄存器
pub fn mtimecmp(hart_id: usize) -> u64 {
    clint().mtimecmp[hart_id].read().bits()
}

/// 写 hart_id 的时钟比较寄存器
pub fn set_mtimecmp(hart_id: usize, value: u64) {
    clint().mtimecmp[hart_id].write(|w| unsafe { w.bits(value) });
}

/// 在比较寄存器当前值上累加一个增量
///
/// 比较寄存器盯的是绝对时刻;周期逐次累加,相位不随中断时延漂移
pub fn bump_mtimecmp(hart_id: usize, delta: u64) {
    set_mtimecmp(hart_id, mtimecmp(hart_id).wrapping_add(delta));
}

/// 读全局 mtime 计数
pub fn mtime() -> u64 {
    clint().mtime.read().bits()
}
