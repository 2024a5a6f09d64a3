//! K210 双核演示:引导核把任务迁移到副核并唤醒它
//!
//! hart0 完成全局初始化后,经同步域把演示任务逐个迁给 hart1,
//! 再唤醒 hart1;两个核都跑同一个就绪环排空循环。UARTHS 的接收
//! 中断走驱动侧的 PLIC 注册/使能契约。

#![no_std]
#![no_main]

#[cfg(target_arch = "riscv64")]
use core::arch::global_asm;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use libkernel::board::{self, CORE_SYNC, IRQ, READY};
use libkernel::config::{Config, ConfigImpl};
use libkernel::core_sync::TaskRef;
use libkernel::hart;
use libkernel::interrupt::interface::IrqHandler;
use libkernel::print;
use log::info;

#[cfg(target_arch = "riscv64")]
global_asm!(include_str!("entry.asm"));

const BOOT_HART_ID: usize = ConfigImpl::BOOT_HART_ID;

/// 引导核全局初始化完成之前,其余核不得触碰全局单例
static BOOT_COMPLETE: AtomicBool = AtomicBool::new(false);

/// 演示任务:任务控制块只是一个携带入口的静态结构
struct DemoTask {
    name: &'static str,
    entry: fn(),
}

fn task_greet() {
    info!("greet: 来自 hart {} 的问候", hart::get_hart_id());
}

fn task_ticks() {
    info!(
        "ticks: hart {} 已经历 {} 个 tick",
        hart::get_hart_id(),
        board::TICKER.ticks(hart::get_hart_id())
    );
}

static DEMO_TASKS: [DemoTask; 2] = [
    DemoTask {
        name: "greet",
        entry: task_greet,
    },
    DemoTask {
        name: "ticks",
        entry: task_ticks,
    },
];

/// UARTHS 收到什么回显什么
struct UarthsEcho;

impl IrqHandler for UarthsEcho {
    fn handle(&self, _source: u32) {
        while let Some(byte) = k210_soc::uarths::get_byte() {
            print!("{}", byte as char);
        }
    }
}

fn clear_bss() {
    extern "C" {
        fn sbss();
        fn ebss();
    }
    (sbss as usize..ebss as usize).for_each(|addr| unsafe { (addr as *mut u8).write_volatile(0) });
}

/// 就绪环排空循环,兼作中断返回路径的再评估点
fn run_ready_tasks(hart_id: usize) -> ! {
    loop {
        if CORE_SYNC.take_context_switch(hart_id) || !READY.is_empty(hart_id) {
            while let Some(task) = READY.take_next(hart_id) {
                let demo: &DemoTask = unsafe { &*(task.as_ptr() as *const DemoTask) };
                info!("hart {} 执行任务 {}", hart_id, demo.name);
                (demo.entry)();
            }
        }
        hart::wait_for_interrupt();
    }
}

#[no_mangle]
pub extern "C" fn rust_main(hart_id: usize) -> ! {
    if hart_id == BOOT_HART_ID {
        clear_bss();
        board::init_bsp();
        board::init_hart(hart_id);
        BOOT_COMPLETE.store(true, Ordering::Release);
        info!("内核启动于 hart {}", hart_id);

        // 驱动侧的 PLIC 契约:注册处理对象,设优先级并打开使能
        static ECHO: UarthsEcho = UarthsEcho;
        k210_soc::uarths::enable_rx_irq();
        IRQ.register_handler(k210_soc::plic::source::UARTHS, &ECHO);
        IRQ.enable_source(hart_id, k210_soc::plic::source::UARTHS, 1);

        // 任务逐个迁给副核,每个任务一个 IPI 往返
        for task in DEMO_TASKS.iter() {
            CORE_SYNC.post_new_task(1, TaskRef::new(NonNull::from(task).cast()));
        }
        CORE_SYNC.wake_core(1);

        run_ready_tasks(hart_id)
    } else {
        while !BOOT_COMPLETE.load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
        board::init_hart(hart_id);
        // 唤醒信号正是本核的软件中断,只能忙等,不能 wfi
        CORE_SYNC.wait_until_awake(hart_id);
        info!("hart {} 被唤醒", hart_id);

        run_ready_tasks(hart_id)
    }
}
