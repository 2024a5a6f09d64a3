//! UARTHS:高速串口,内核控制台
//!
//! 寄存器(相对基址 0x3800_0000):
//!
//! ```text
//! 0x00 txdata   bit31 = full,低 8 位数据
//! 0x04 rxdata   bit31 = empty,低 8 位数据
//! 0x08 txctrl   bit0 = txen
//! 0x0c rxctrl   bit0 = rxen,[18:16] 接收水位
//! 0x10 ie       bit0 = txwm,bit1 = rxwm
//! 0x18 div      分频,波特率 = 时钟 / (div + 1)
//! ```

use core::ptr::{read_volatile, write_volatile};

use k210_pac as pac;

const TXDATA: usize = 0x00;
const RXDATA: usize = 0x04;
const TXCTRL: usize = 0x08;
const RXCTRL: usize = 0x0c;
const IE: usize = 0x10;
const DIV: usize = 0x18;

const TXDATA_FULL: u32 = 1 << 31;
const RXDATA_EMPTY: u32 = 1 << 31;
const IE_RXWM: u32 = 1 << 1;

fn reg(offset: usize) -> *mut u32 {
    (pac::UARTHS::ptr() as usize + offset) as *mut u32
}

/// 配置波特率并打开收发
pub fn init(clock_freq: u32, baud: u32) {
    unsafe {
        write_volatile(reg(DIV), clock_freq / baud - 1);
        write_volatile(reg(TXCTRL), 1);
        write_volatile(reg(RXCTRL), 1);
    }
}

/// 忙等发送一个字节
pub fn put_byte(byte: u8) {
    unsafe {
        while read_volatile(reg(TXDATA)) & TXDATA_FULL != 0 {}
        write_volatile(reg(TXDATA), byte as u32);
    }
}

/// 非阻塞收一个字节
pub fn get_byte() -> Option<u8> {
    let data = unsafe { read_volatile(reg(RXDATA)) };
    if data & RXDATA_EMPTY != 0 {
        None
    } else {
        Some(data as u8)
    }
}

/// 打开接收水位中断。水位保持 0:FIFO 非空即挂起
pub fn enable_rx_irq() {
    unsafe { write_volatile(reg(IE), IE_RXWM) };
}
