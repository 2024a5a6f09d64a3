//! 机器态陷入入口与分发
//!
//! Direct 模式,所有陷入都进 `__trap`:保存通用寄存器和
//! mepc/mstatus,按 mcause 分发,返回前恢复现场 mret。
//! 真正的任务切换属于 RTOS 的切换路径;本层只在
//! [`CoreSync::take_context_switch`](crate::core_sync::CoreSync::take_context_switch)
//! 上暴露"本次中断是否要求重新评估就绪队列"。

#[cfg(target_arch = "riscv64")]
use core::arch::global_asm;

use riscv::register::{
    mcause::{self, Interrupt, Trap},
    mepc,
};

use crate::board::{CORE_SYNC, IRQ, TICKER};
use crate::hart::get_hart_id;

#[cfg(target_arch = "riscv64")]
global_asm!(include_str!("trap.asm"));

#[cfg(target_arch = "riscv64")]
extern "C" {
    fn __trap();
}

/// 把陷入入口写进 mtvec,Direct 模式
pub fn init() {
    #[cfg(target_arch = "riscv64")]
    unsafe {
        riscv::register::mtvec::write(__trap as usize, riscv::register::mtvec::TrapMode::Direct);
    }
}

/// 陷入分发
#[no_mangle]
pub extern "C" fn handle_trap() {
    let hart_id = get_hart_id();
    match mcause::read().cause() {
        // 核间同步事件
        Trap::Interrupt(Interrupt::MachineSoft) => CORE_SYNC.on_software_interrupt(hart_id),
        // 时钟中断
        Trap::Interrupt(Interrupt::MachineTimer) => TICKER.on_tick(hart_id, &*CORE_SYNC),
        // 外部中断
        Trap::Interrupt(Interrupt::MachineExternal) => IRQ.dispatch(hart_id),
        // 其他情况,无法处理
        cause => {
            panic!("cause: {:?}, mepc: {:x}", cause, mepc::read());
        }
    }
}
