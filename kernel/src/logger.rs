//! 内核日志与控制台输出

use core::fmt::{self, Write};

use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::hart::get_hart_id;

pub mod interface {
    /// 控制台字节输出,由板卡实现
    pub trait Console: Sync {
        fn put_byte(&self, byte: u8);
    }
}

/// 控制台输出端。板卡安装 [`interface::Console`] 之前丢弃输出
struct Stdout {
    console: Option<&'static dyn interface::Console>,
}

impl Write for Stdout {
    /// 打印一个字符串
    ///
    /// 串口一次收一个字节,非 ASCII 字符按 utf-8 编码逐字节送出
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(console) = self.console {
            s.bytes().for_each(|b| console.put_byte(b));
        }
        Ok(())
    }
}

lazy_static! {
    /// 给 STDOUT 上锁
    static ref STDOUT: Mutex<Stdout> = Mutex::new(Stdout { console: None });
}

/// 安装板卡控制台
pub fn set_console(console: &'static dyn interface::Console) {
    STDOUT.lock().console = Some(console);
}

pub fn _print(args: fmt::Arguments) {
    STDOUT.lock().write_fmt(args).unwrap();
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::logger::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ({
        $crate::logger::_print(format_args!($($arg)*));
        $crate::print!("\n");
    })
}

#[cfg(all(not(test), target_arch = "riscv64"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    match info.location() {
        Some(location) => {
            log::error!(
                "[kernel] panicked at '{}', {}:{}:{}",
                info.message(),
                location.file(),
                location.line(),
                location.column()
            );
        }
        None => log::error!("[kernel] panicked at '{}'", info.message()),
    }

    loop {
        crate::hart::wait_for_interrupt();
    }
}

struct EnvLogger;

impl Log for EnvLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        // {:<5} 表示左对齐占 5 格
        // \x1b[31m 表示其之后的前景色都为红。\x1b[0m 表示之后的都重置
        println!(
            "[\x1b[{}m{:<5}\x1b[0m {}] {}",
            level2color(record.level()),
            record.level(),
            get_hart_id(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// 前景色 https://en.wikipedia.org/wiki/ANSI_escape_code#3-bit_and_4-bit
#[repr(u8)]
enum FGColor {
    Red = 31,
    Green = 32,
    Blue = 34,
    DarkGray = 90,
    LightYellow = 93,
}

/// 根据不同日志等级得到颜色
fn level2color(level: Level) -> u8 {
    use FGColor::*;
    return match level {
        Level::Error => Red,
        Level::Warn => LightYellow,
        Level::Info => Blue,
        Level::Debug => Green,
        Level::Trace => DarkGray,
    } as u8;
}

/// 注意,如果 bss 段在此之后清零,请确保 logger 初始化时不会使用 bss 段的变量
pub fn init() {
    static LOGGER: EnvLogger = EnvLogger;
    log::set_logger(&LOGGER).unwrap();
    // 根据环境变量 LOG 的值来选择 LevelFilter
    log::set_max_level(match option_env!("LOG") {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("none") => LevelFilter::Off,
        _ => LevelFilter::Info,
    });
}
