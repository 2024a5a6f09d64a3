#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod logger;
pub mod config;
pub mod core_sync;
pub mod hart;
pub mod interrupt;
pub mod scheduler;
pub mod sync;
pub mod timer;

#[cfg(feature = "k210")]
pub mod board;
#[cfg(feature = "k210")]
pub mod trap;
