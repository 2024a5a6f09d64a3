//! PLIC:平台级中断控制器
//!
//! 寄存器布局(相对基址 0x0C00_0000):
//!
//! ```text
//! 0x0000_0000 + 4 * source      各源优先级,0 等效于禁用
//! 0x0000_1000 + 4 * word        挂起位
//! 0x0000_2000 + 0x80 * target   使能向量,每 target 1024 位
//! 0x0020_0000 + 0x1000 * target 优先级阈值
//! 0x0020_0004 + 0x1000 * target 认领/完成
//! ```
//!
//! K210 上机器态 target 号即 hart 号。认领寄存器的读和写由硬件
//! 完成仲裁:读原子地取走最高优先级挂起源,写回源号重新武装门控。

use core::ptr::{read_volatile, write_volatile};

use k210_pac as pac;

/// 中断源数量。源号取值 1..=65,0 表示"无中断"
pub const SOURCE_MAX: usize = 65;

/// 中断源号,与 SoC 的中断路由一致
pub mod source {
    pub const SPI0: u32 = 1;
    pub const SPI1: u32 = 2;
    pub const SPI_SLAVE: u32 = 3;
    pub const SPI3: u32 = 4;
    pub const I2S0: u32 = 5;
    pub const I2S1: u32 = 6;
    pub const I2S2: u32 = 7;
    pub const I2C0: u32 = 8;
    pub const I2C1: u32 = 9;
    pub const I2C2: u32 = 10;
    pub const UART1: u32 = 11;
    pub const UART2: u32 = 12;
    pub const UART3: u32 = 13;
    pub const TIMER0A: u32 = 14;
    pub const TIMER0B: u32 = 15;
    pub const TIMER1A: u32 = 16;
    pub const TIMER1B: u32 = 17;
    pub const TIMER2A: u32 = 18;
    pub const TIMER2B: u32 = 19;
    pub const RTC: u32 = 20;
    pub const WDT0: u32 = 21;
    pub const WDT1: u32 = 22;
    pub const APB_GPIO: u32 = 23;
    pub const DVP: u32 = 24;
    pub const AI: u32 = 25;
    pub const FFT: u32 = 26;
    pub const DMA0: u32 = 27;
    pub const DMA1: u32 = 28;
    pub const DMA2: u32 = 29;
    pub const DMA3: u32 = 30;
    pub const DMA4: u32 = 31;
    pub const DMA5: u32 = 32;
    pub const UARTHS: u32 = 33;
    /// GPIOHS 各管脚依次占用 34..=65
    pub const GPIOHS0: u32 = 34;
}

const PRIORITY_OFFSET: usize = 0x0;
const ENABLE_OFFSET: usize = 0x2000;
const ENABLE_STRIDE: usize = 0x80;
const TARGET_OFFSET: usize = 0x20_0000;
const TARGET_STRIDE: usize = 0x1000;

fn reg(offset: usize) -> *mut u32 {
    (pac::PLIC::ptr() as usize + offset) as *mut u32
}

/// 设置 source 的优先级
pub fn set_priority(source: u32, priority: u32) {
    unsafe { write_volatile(reg(PRIORITY_OFFSET + 4 * source as usize), priority) };
}

/// 读 source 的优先级
pub fn priority(source: u32) -> u32 {
    unsafe { read_volatile(reg(PRIORITY_OFFSET + 4 * source as usize)) }
}

/// 读改写 target 使能向量中的一位
pub fn set_enable(target: usize, source: u32, enabled: bool) {
    let word = reg(ENABLE_OFFSET + ENABLE_STRIDE * target + 4 * (source as usize / 32));
    let mask = 1u32 << (source % 32);
    unsafe {
        let bits = read_volatile(word);
        write_volatile(word, if enabled { bits | mask } else { bits & !mask });
    }
}

/// 读 target 的优先级阈值
pub fn threshold(target: usize) -> u32 {
    unsafe { read_volatile(reg(TARGET_OFFSET + TARGET_STRIDE * target)) }
}

/// 设置 target 的优先级阈值,只放行严格高于阈值的源
pub fn set_threshold(target: usize, threshold: u32) {
    unsafe { write_volatile(reg(TARGET_OFFSET + TARGET_STRIDE * target), threshold) };
}

/// 认领:硬件原子地清除对应挂起位,返回最高优先级挂起源,0 表示无
pub fn claim(target: usize) -> u32 {
    unsafe { read_volatile(reg(TARGET_OFFSET + TARGET_STRIDE * target + 4)) }
}

/// 完成:写回认领到的源号,重新武装该源的门控
pub fn complete(target: usize, source: u32) {
    unsafe { write_volatile(reg(TARGET_OFFSET + TARGET_STRIDE * target + 4), source) };
}

/// 上电初始化:清空 target 的全部使能位,阈值归零
pub fn init(target: usize) {
    for word in 0..=SOURCE_MAX / 32 {
        unsafe { write_volatile(reg(ENABLE_OFFSET + ENABLE_STRIDE * target + 4 * word), 0) };
    }
    set_threshold(target, 0);
}
