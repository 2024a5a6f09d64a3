//! K210 片上外设的寄存器访问层
//!
//! 只覆盖核间同步与中断分发所需的外设:CLINT(IPI 信箱、时钟比较
//! 寄存器)、PLIC(外部中断仲裁)以及充当内核控制台的 UARTHS。
//! 其余外设驱动不属于本仓库。

#![no_std]

pub mod clint;
pub mod plic;
pub mod uarths;
