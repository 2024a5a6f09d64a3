//! 一个带关中断功能的互斥锁 [`SpinLock`]

use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::hart;

/// 关闭中断的互斥锁
///
/// 临界区内本核不会被打断,对端核最多自旋等待一个临界区的长度
#[derive(Default)]
pub struct SpinLock<T>(Mutex<T>);

/// 封装 [`MutexGuard`] 来实现 drop 时恢复 MIE
pub struct LockGuard<'a, T> {
    /// 在 drop 时需要先 drop 掉 [`MutexGuard`] 再恢复 MIE
    guard: Option<MutexGuard<'a, T>>,
    /// 上锁前的全局中断使能状态
    mie: bool,
}

impl<T> SpinLock<T> {
    /// 创建一个新对象
    pub const fn new(obj: T) -> Self {
        Self(Mutex::new(obj))
    }

    /// 进入临界区
    pub fn critical_section<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mie = hart::interrupt_disable();
        let ret = f(&mut self.0.lock());
        hart::interrupt_restore(mie);

        ret
    }

    /// 获得上锁的对象
    pub fn lock(&self) -> LockGuard<'_, T> {
        let mie = hart::interrupt_disable();
        LockGuard {
            guard: Some(self.0.lock()),
            mie,
        }
    }
}

/// 释放时,先释放内部的 MutexGuard,再恢复 MIE
impl<'a, T> Drop for LockGuard<'a, T> {
    fn drop(&mut self) {
        self.guard.take();
        hart::interrupt_restore(self.mie);
    }
}

impl<'a, T> Deref for LockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.guard.as_ref().unwrap().deref()
    }
}

impl<'a, T> DerefMut for LockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.as_mut().unwrap().deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_section_returns_value() {
        let lock = SpinLock::new(3usize);
        assert_eq!(lock.critical_section(|v| *v + 1), 4);
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new(0usize);
        {
            let mut guard = lock.lock();
            *guard = 7;
        }
        assert_eq!(*lock.lock(), 7);
    }
}
