//! 双核同步域
//!
//! RTOS 内核本身只有单核调度器,两个核之间的就绪队列修改、上下文
//! 切换请求和睡眠/唤醒迁移全部经由本模块协调:生产者核把载荷写入
//! 目标核的任务槽,CAS 占用目标核的事件槽,再敲响目标核的 IPI
//! 信箱;目标核的软件中断处理消费事件、执行副作用、释放槽位。
//! 释放这一步就是允许下一个事件发布的信号。
//!
//! 除 IPI 信箱位外所有状态都在 [`CoreSync`] 里,每个字段同一时刻
//! 只有一个合法写者,由协议而非锁保证。

pub mod event;

pub use self::event::{arbitrate, Arbitration, Event, EventSlot};

use core::num::NonZeroUsize;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 指向 RTOS 任务控制块的不透明非空引用
///
/// 同步域不解释它,只负责把它从生产者核搬到目标核的就绪队列
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskRef(NonZeroUsize);

impl TaskRef {
    pub fn new(ptr: NonNull<()>) -> TaskRef {
        // NonNull 保证非零
        TaskRef(unsafe { NonZeroUsize::new_unchecked(ptr.as_ptr() as usize) })
    }

    /// 从任务槽的原始值恢复,0 表示槽空
    pub fn from_raw(raw: usize) -> Option<TaskRef> {
        NonZeroUsize::new(raw).map(TaskRef)
    }

    pub fn as_raw(self) -> usize {
        self.0.get()
    }

    pub fn as_ptr(self) -> *mut () {
        self.0.get() as *mut ()
    }
}

pub mod interface {
    use super::TaskRef;

    /// 处理器间中断信箱,由 CLINT 一类的硬件提供
    pub trait IpiTransport: Sync {
        /// 置位目标核的挂起位。电平语义,重复发送与发送一次等效
        fn send(&self, hart_id: usize);

        /// 清除目标核的挂起位,返回清除前是否置位
        ///
        /// 必须由目标核自己的软件中断处理调用,否则会反复重入
        fn clear(&self, hart_id: usize) -> bool;
    }

    /// 就绪队列,由调度器一侧实现
    pub trait ReadyQueue: Sync {
        /// 把任务拼接进 hart_id 的就绪队列
        fn enqueue(&self, hart_id: usize, task: TaskRef);
    }

    impl<'a, T: IpiTransport> IpiTransport for &'a T {
        fn send(&self, hart_id: usize) {
            (**self).send(hart_id)
        }
        fn clear(&self, hart_id: usize) -> bool {
            (**self).clear(hart_id)
        }
    }

    impl<'a, T: ReadyQueue> ReadyQueue for &'a T {
        fn enqueue(&self, hart_id: usize, task: TaskRef) {
            (**self).enqueue(hart_id, task)
        }
    }
}

use self::interface::{IpiTransport, ReadyQueue};

/// 单个核的同步记录
struct HartSync {
    /// 单深度事件槽
    event: EventSlot,
    /// 在途任务,0 表示空。消费前生产者不得复用
    pending_task: AtomicUsize,
    /// 核是否醒着
    awake: AtomicBool,
    /// 待中断返回路径消费的切换标志
    switch_pending: AtomicBool,
}

impl HartSync {
    const INIT: HartSync = HartSync {
        event: EventSlot::EMPTY,
        pending_task: AtomicUsize::new(0),
        awake: AtomicBool::new(false),
        switch_pending: AtomicBool::new(false),
    };
}

/// 核间同步域
///
/// 固定核数 N,启动时构造一次,进程生命周期内常驻。0 号核随引导
/// 流程直接进入醒着状态,其余核由引导核显式唤醒。所有访问都带
/// 显式核号,单元测试可以构造多个互不相干的域。
pub struct CoreSync<I, Q, const N: usize> {
    harts: [HartSync; N],
    ipi: I,
    ready: Q,
}

impl<I: IpiTransport, Q: ReadyQueue, const N: usize> CoreSync<I, Q, N> {
    pub fn new(ipi: I, ready: Q) -> Self {
        let domain = CoreSync {
            harts: [HartSync::INIT; N],
            ipi,
            ready,
        };
        domain.harts[0].awake.store(true, Ordering::Relaxed);
        domain
    }

    /// 事件槽占用循环,按仲裁表决定重试还是合并
    ///
    /// 返回 true 表示本次调用完成了 `None -> event` 的迁移并需要
    /// 补发 IPI;false 表示并入了已挂起的同类事件。自旋上界是目标
    /// 核消费当前事件的中断时延。
    fn post_event(&self, hart_id: usize, event: Event) -> bool {
        loop {
            match arbitrate(self.harts[hart_id].event.load(), event) {
                Arbitration::Coalesce => return false,
                Arbitration::Claim => {
                    if self.harts[hart_id].event.try_claim(event) == Event::None {
                        return true;
                    }
                }
                Arbitration::Retry => core::hint::spin_loop(),
            }
        }
    }

    /// 请求 hart_id 重新评估它的就绪队列
    ///
    /// 可从任意核调用。同类请求挂起期间的重复调用合并为一次,
    /// 且不再补发 IPI
    pub fn request_context_switch(&self, hart_id: usize) {
        assert!(hart_id < N);
        if self.post_event(hart_id, Event::ContextSwitch) {
            self.ipi.send(hart_id);
        }
    }

    /// 把任务提交给 hart_id 的就绪队列
    ///
    /// 每核同时至多一个在途任务:上一个任务未被目标核消费时在此
    /// 自旋等待,因此批量迁移是一个任务一个 IPI 往返。只能在容忍
    /// 短暂忙等的上下文调用;从 ISR 调用之所以成立,是因为任务槽
    /// 由目标核自己的 ISR 及时排空。
    pub fn post_new_task(&self, hart_id: usize, task: TaskRef) {
        assert!(hart_id < N);
        let slot = &self.harts[hart_id].pending_task;
        // 载荷先于事件发布,事件可见时载荷必定可见
        while slot
            .compare_exchange(0, task.as_raw(), Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        let posted = self.post_event(hart_id, Event::AddTask);
        debug_assert!(posted);
        self.ipi.send(hart_id);
    }

    /// 唤醒 hart_id
    pub fn wake_core(&self, hart_id: usize) {
        assert!(hart_id < N);
        self.post_event(hart_id, Event::Wake);
        self.ipi.send(hart_id);
    }

    /// 无锁查询核是否醒着
    pub fn is_core_awake(&self, hart_id: usize) -> bool {
        assert!(hart_id < N);
        self.harts[hart_id].awake.load(Ordering::Acquire)
    }

    /// 自旋等待本核被唤醒
    ///
    /// 唤醒依赖的正是本核的软件中断,所以这里只能忙等,不能阻塞
    pub fn wait_until_awake(&self, hart_id: usize) {
        while !self.is_core_awake(hart_id) {
            core::hint::spin_loop();
        }
    }

    /// 本核时间片耗尽,直接置位切换标志
    ///
    /// 自指请求不走事件槽也不发 IPI:代码已经跑在目标核上,
    /// 中断返回路径自会检查该标志
    pub fn preempt_local(&self, hart_id: usize) {
        assert!(hart_id < N);
        self.harts[hart_id].switch_pending.store(true, Ordering::Relaxed);
    }

    /// 中断返回路径消费切换标志
    ///
    /// 返回 true 时调用方应重新评估就绪队列并可能切换当前任务
    pub fn take_context_switch(&self, hart_id: usize) -> bool {
        assert!(hart_id < N);
        self.harts[hart_id].switch_pending.swap(false, Ordering::AcqRel)
    }

    /// 机器软件中断入口,必须运行在 hart_id 核上
    ///
    /// 先清信箱再消费事件:信箱是电平语义,处理中途发布的新事件
    /// 会重新置位,不会丢
    pub fn on_software_interrupt(&self, hart_id: usize) {
        assert!(hart_id < N);
        self.ipi.clear(hart_id);
        let hart = &self.harts[hart_id];
        let event = hart.event.load();
        match event {
            // 虚假触发,或事件已在上一轮处理中消费
            Event::None => return,
            Event::AddTask => {
                let raw = hart.pending_task.swap(0, Ordering::AcqRel);
                let task = TaskRef::from_raw(raw).expect("AddTask 事件没有携带载荷");
                self.ready.enqueue(hart_id, task);
            }
            Event::ContextSwitch => {
                hart.switch_pending.store(true, Ordering::Relaxed);
            }
            Event::Wake => {
                hart.awake.store(true, Ordering::Release);
            }
        }
        // 副作用完成后才释放槽位,此后新事件才可以发布
        hart.event.release();
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::vec::Vec;

    use super::interface::{IpiTransport, ReadyQueue};
    use super::*;
    use crate::sync::SpinLock;

    #[derive(Default)]
    struct MockIpi {
        pending: [AtomicBool; 2],
        sent: [AtomicUsize; 2],
    }

    impl IpiTransport for MockIpi {
        fn send(&self, hart_id: usize) {
            self.pending[hart_id].store(true, Ordering::SeqCst);
            self.sent[hart_id].fetch_add(1, Ordering::SeqCst);
        }
        fn clear(&self, hart_id: usize) -> bool {
            self.pending[hart_id].swap(false, Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MockQueue {
        tasks: SpinLock<Vec<(usize, TaskRef)>>,
    }

    impl ReadyQueue for MockQueue {
        fn enqueue(&self, hart_id: usize, task: TaskRef) {
            self.tasks.lock().push((hart_id, task));
        }
    }

    fn task(raw: usize) -> TaskRef {
        TaskRef::from_raw(raw).unwrap()
    }

    fn domain<'a>(
        ipi: &'a MockIpi,
        queue: &'a MockQueue,
    ) -> CoreSync<&'a MockIpi, &'a MockQueue, 2> {
        CoreSync::new(ipi, queue)
    }

    #[test]
    fn boot_state() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);
        assert!(sync.is_core_awake(0));
        assert!(!sync.is_core_awake(1));
    }

    #[test]
    fn post_task_roundtrip() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);

        sync.post_new_task(1, task(0x1000));
        assert!(ipi.pending[1].load(Ordering::SeqCst));
        assert_eq!(sync.harts[1].event.load(), Event::AddTask);

        sync.on_software_interrupt(1);
        assert_eq!(&queue.tasks.lock()[..], &[(1, task(0x1000))][..]);
        // 槽已排空,事件已释放
        assert_eq!(sync.harts[1].pending_task.load(Ordering::SeqCst), 0);
        assert_eq!(sync.harts[1].event.load(), Event::None);
        assert!(!ipi.pending[1].load(Ordering::SeqCst));

        // 第二个任务不需要自旋即可入槽
        sync.post_new_task(1, task(0x2000));
        sync.on_software_interrupt(1);
        assert_eq!(queue.tasks.lock().len(), 2);
    }

    #[test]
    fn context_switch_coalesces() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);

        sync.request_context_switch(1);
        sync.request_context_switch(1);
        sync.request_context_switch(1);
        // 合并的请求不补发 IPI
        assert_eq!(ipi.sent[1].load(Ordering::SeqCst), 1);

        sync.on_software_interrupt(1);
        assert!(sync.take_context_switch(1));
        // 一批请求只评估一次
        assert!(!sync.take_context_switch(1));
        assert_eq!(sync.harts[1].event.load(), Event::None);
    }

    #[test]
    fn wake_sets_flag_once_serviced() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);

        sync.wake_core(1);
        assert!(!sync.is_core_awake(1));
        sync.on_software_interrupt(1);
        assert!(sync.is_core_awake(1));
    }

    #[test]
    fn spurious_interrupt_is_harmless() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);

        sync.on_software_interrupt(1);
        assert_eq!(sync.harts[1].event.load(), Event::None);
        assert!(queue.tasks.lock().is_empty());
        assert!(!sync.take_context_switch(1));
    }

    #[test]
    fn timer_preempt_skips_event_slot() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);

        sync.preempt_local(0);
        assert_eq!(sync.harts[0].event.load(), Event::None);
        assert_eq!(ipi.sent[0].load(Ordering::SeqCst), 0);
        assert!(sync.take_context_switch(0));
    }

    #[test]
    #[should_panic]
    fn out_of_range_hart_asserts() {
        let (ipi, queue) = (MockIpi::default(), MockQueue::default());
        let sync = domain(&ipi, &queue);
        sync.wake_core(2);
    }
}
