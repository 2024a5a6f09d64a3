//! hart 本地的 CSR 操作:核号、全局中断使能与各类中断源的开关
//!
//! 这些操作只影响调用核自己。非 RISC-V 目标上(宿主机单元测试)
//! 全部退化为空操作。

/// 获取当前 hart id
pub fn get_hart_id() -> usize {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    {
        riscv::register::mhartid::read()
    }
    #[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
    {
        0
    }
}

/// 关闭本核全局中断,返回先前的 MIE 状态
pub fn interrupt_disable() -> bool {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    {
        let mie = riscv::register::mstatus::read().mie();
        unsafe { riscv::register::mstatus::clear_mie() };
        mie
    }
    #[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
    {
        false
    }
}

/// 打开本核全局中断
pub fn interrupt_enable() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::register::mstatus::set_mie()
    };
}

/// 恢复先前保存的 MIE 状态
pub fn interrupt_restore(mie: bool) {
    if mie {
        interrupt_enable();
    }
}

/// 打开本核软件中断接收,同时打开全局中断使能
///
/// 此后本核可以收到自己和对端发来的 IPI
pub fn ipi_enable() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::register::mie::set_msoft();
        riscv::register::mstatus::set_mie();
    }
}

/// 屏蔽本核软件中断
pub fn ipi_disable() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::register::mie::clear_msoft()
    };
}

/// 打开本核时钟中断
pub fn timer_irq_enable() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::register::mie::set_mtimer()
    };
}

/// 打开本核外部中断
pub fn external_irq_enable() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::register::mie::set_mext()
    };
}

/// 休眠,等待中断
pub fn wait_for_interrupt() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        riscv::asm::wfi()
    };
}
