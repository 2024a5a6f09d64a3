//! 外部中断的认领/完成分发 [`IrqDispatcher`]
//!
//! PLIC 把最高优先级的挂起源交给认领者;分发器查表调用注册的处理
//! 对象,再写回完成,重新武装该源的门控。处理期间目标的优先级阈值
//! 被抬到认领源的优先级,只有严格更高优先级的源可以嵌套进来。
//!
//! 同一套注册/使能接口原样暴露给所有需要中断投递的外设驱动。

use log::warn;

use crate::hart;
use crate::sync::SpinLock;

pub mod interface {
    /// PLIC 寄存器访问,固定硬件契约
    pub trait PlicTransport: Sync {
        /// 认领:硬件原子地清除对应挂起位,返回最高优先级挂起源
        fn claim(&self, hart_id: usize) -> Option<u32>;

        /// 完成:写回认领到的源号,重新武装该源的门控
        fn complete(&self, hart_id: usize, source: u32);

        fn priority(&self, source: u32) -> u32;

        /// 0 优先级等效于禁用该源
        fn set_priority(&self, source: u32, priority: u32);

        fn threshold(&self, hart_id: usize) -> u32;

        fn set_threshold(&self, hart_id: usize, threshold: u32);

        /// 读改写使能向量中的一位
        fn set_enable(&self, hart_id: usize, source: u32, enabled: bool);
    }

    /// 中断源的处理对象,上下文保存在处理对象自身中
    pub trait IrqHandler: Sync {
        fn handle(&self, source: u32);
    }

    impl<'a, T: PlicTransport> PlicTransport for &'a T {
        fn claim(&self, hart_id: usize) -> Option<u32> {
            (**self).claim(hart_id)
        }
        fn complete(&self, hart_id: usize, source: u32) {
            (**self).complete(hart_id, source)
        }
        fn priority(&self, source: u32) -> u32 {
            (**self).priority(source)
        }
        fn set_priority(&self, source: u32, priority: u32) {
            (**self).set_priority(source, priority)
        }
        fn threshold(&self, hart_id: usize) -> u32 {
            (**self).threshold(hart_id)
        }
        fn set_threshold(&self, hart_id: usize, threshold: u32) {
            (**self).set_threshold(hart_id, threshold)
        }
        fn set_enable(&self, hart_id: usize, source: u32, enabled: bool) {
            (**self).set_enable(hart_id, source, enabled)
        }
    }
}

use self::interface::{IrqHandler, PlicTransport};

/// 阈值作用域守卫
///
/// 构造时把目标阈值抬到认领源的优先级,任何退出路径都恢复原值
struct ThresholdGuard<'a, P: PlicTransport> {
    plic: &'a P,
    hart_id: usize,
    saved: u32,
}

impl<'a, P: PlicTransport> ThresholdGuard<'a, P> {
    fn raise(plic: &'a P, hart_id: usize, priority: u32) -> Self {
        let saved = plic.threshold(hart_id);
        plic.set_threshold(hart_id, priority);
        ThresholdGuard {
            plic,
            hart_id,
            saved,
        }
    }
}

impl<'a, P: PlicTransport> Drop for ThresholdGuard<'a, P> {
    fn drop(&mut self) {
        self.plic.set_threshold(self.hart_id, self.saved);
    }
}

/// 处理对象表:源号直接作下标,O(1) 分发,无动态分配
///
/// 表在安装或驱动打开时改写,每次外部中断只读
pub struct IrqDispatcher<P, const S: usize> {
    plic: P,
    handlers: SpinLock<[Option<&'static dyn IrqHandler>; S]>,
}

impl<P: PlicTransport, const S: usize> IrqDispatcher<P, S> {
    pub fn new(plic: P) -> Self {
        IrqDispatcher {
            plic,
            handlers: SpinLock::new([None; S]),
        }
    }

    /// 注册 source 的处理对象,重复注册覆盖旧值
    pub fn register_handler(&self, source: u32, handler: &'static dyn IrqHandler) {
        assert!((source as usize) < S);
        self.handlers.lock()[source as usize] = Some(handler);
    }

    /// 驱动打开某中断源:设优先级并打开目标的使能位
    pub fn enable_source(&self, hart_id: usize, source: u32, priority: u32) {
        assert!((source as usize) < S);
        self.plic.set_priority(source, priority);
        self.plic.set_enable(hart_id, source, true);
    }

    /// 关闭目标对某中断源的接收,优先级保持不动
    pub fn disable_source(&self, hart_id: usize, source: u32) {
        assert!((source as usize) < S);
        self.plic.set_enable(hart_id, source, false);
    }

    /// 机器外部中断入口:认领、分发、完成
    ///
    /// 每次陷入认领一个源;还有挂起源时硬件会保持外部中断线
    pub fn dispatch(&self, hart_id: usize) {
        let source = match self.plic.claim(hart_id) {
            Some(source) => source,
            // 挂起源已被另一目标抢先认领
            None => return,
        };
        assert!((source as usize) < S);

        let _threshold = ThresholdGuard::raise(&self.plic, hart_id, self.plic.priority(source));
        let handler = self.handlers.lock()[source as usize];
        // 阈值已抬高,放开全局中断,给严格更高优先级的源一个嵌套窗口
        hart::interrupt_enable();
        match handler {
            Some(handler) => handler.handle(source),
            None => warn!("中断源 {} 没有处理对象,丢弃", source),
        }
        hart::interrupt_disable();
        self.plic.complete(hart_id, source);
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::vec::Vec;

    use super::interface::{IrqHandler, PlicTransport};
    use super::*;

    /// 单槽挂起的 PLIC 模型,记录阈值与完成的轨迹
    #[derive(Default)]
    struct MockPlic {
        pending: SpinLock<Vec<u32>>,
        priorities: [AtomicU32; 8],
        threshold: AtomicU32,
        threshold_trace: SpinLock<Vec<u32>>,
        completed: SpinLock<Vec<u32>>,
    }

    impl MockPlic {
        fn with_pending(sources: &[u32]) -> Self {
            let plic = MockPlic::default();
            plic.pending.lock().extend_from_slice(sources);
            plic
        }
    }

    impl PlicTransport for MockPlic {
        fn claim(&self, _hart_id: usize) -> Option<u32> {
            self.pending.lock().pop()
        }
        fn complete(&self, _hart_id: usize, source: u32) {
            self.completed.lock().push(source);
        }
        fn priority(&self, source: u32) -> u32 {
            self.priorities[source as usize].load(Ordering::SeqCst)
        }
        fn set_priority(&self, source: u32, priority: u32) {
            self.priorities[source as usize].store(priority, Ordering::SeqCst);
        }
        fn threshold(&self, _hart_id: usize) -> u32 {
            self.threshold.load(Ordering::SeqCst)
        }
        fn set_threshold(&self, _hart_id: usize, threshold: u32) {
            self.threshold.store(threshold, Ordering::SeqCst);
            self.threshold_trace.lock().push(threshold);
        }
        fn set_enable(&self, _hart_id: usize, _source: u32, _enabled: bool) {}
    }

    static HITS: [AtomicUsize; 8] = [
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ];

    struct Counting;

    impl IrqHandler for Counting {
        fn handle(&self, source: u32) {
            HITS[source as usize].fetch_add(1, Ordering::SeqCst);
        }
    }

    static COUNTING: Counting = Counting;

    fn hits(source: u32) -> usize {
        HITS[source as usize].load(Ordering::SeqCst)
    }

    #[test]
    fn claim_dispatch_complete() {
        let plic = MockPlic::with_pending(&[3]);
        plic.set_priority(3, 5);
        let irq: IrqDispatcher<&MockPlic, 8> = IrqDispatcher::new(&plic);
        irq.register_handler(3, &COUNTING);

        let before = hits(3);
        irq.dispatch(0);
        assert_eq!(hits(3) - before, 1);
        assert_eq!(&plic.completed.lock()[..], &[3][..]);
        // 阈值先抬到源优先级,处理完恢复
        assert_eq!(&plic.threshold_trace.lock()[..], &[5, 0][..]);
        assert_eq!(plic.threshold.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn spurious_claim_is_ignored() {
        let plic = MockPlic::default();
        let irq: IrqDispatcher<&MockPlic, 8> = IrqDispatcher::new(&plic);
        irq.dispatch(0);
        assert!(plic.completed.lock().is_empty());
        assert!(plic.threshold_trace.lock().is_empty());
    }

    #[test]
    fn missing_handler_still_completes() {
        let plic = MockPlic::with_pending(&[4]);
        let irq: IrqDispatcher<&MockPlic, 8> = IrqDispatcher::new(&plic);
        irq.dispatch(0);
        // 没有处理对象也要完成,否则该源永远被门控挡住
        assert_eq!(&plic.completed.lock()[..], &[4][..]);
    }

    #[test]
    fn reregister_replaces() {
        static OTHER_HITS: AtomicUsize = AtomicUsize::new(0);
        struct Other;
        impl IrqHandler for Other {
            fn handle(&self, _source: u32) {
                OTHER_HITS.fetch_add(1, Ordering::SeqCst);
            }
        }
        static OTHER: Other = Other;

        let plic = MockPlic::with_pending(&[2, 2]);
        let irq: IrqDispatcher<&MockPlic, 8> = IrqDispatcher::new(&plic);
        irq.register_handler(2, &COUNTING);
        let before = hits(2);
        irq.dispatch(0);
        assert_eq!(hits(2) - before, 1);

        irq.register_handler(2, &OTHER);
        irq.dispatch(0);
        assert_eq!(hits(2) - before, 1);
        assert_eq!(OTHER_HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn enable_source_sets_priority() {
        let plic = MockPlic::default();
        let irq: IrqDispatcher<&MockPlic, 8> = IrqDispatcher::new(&plic);
        irq.enable_source(0, 6, 2);
        assert_eq!(plic.priority(6), 2);
    }
}
