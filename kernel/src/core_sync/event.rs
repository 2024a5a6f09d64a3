//! 核间事件与仲裁规则

use core::sync::atomic::{AtomicUsize, Ordering};

/// 每核事件槽中的事件
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(usize)]
pub enum Event {
    /// 槽空闲,可被任意生产者占用
    None = 0,
    /// 向目标核的就绪队列拼接一个任务,载荷在任务槽中
    AddTask = 1,
    /// 请求目标核重新评估就绪队列
    ContextSwitch = 2,
    /// 唤醒目标核
    Wake = 3,
}

impl Event {
    fn from_raw(raw: usize) -> Event {
        match raw {
            0 => Event::None,
            1 => Event::AddTask,
            2 => Event::ContextSwitch,
            3 => Event::Wake,
            _ => panic!("事件槽损坏: {}", raw),
        }
    }
}

/// 仲裁结果,决定生产者占槽失败后的下一步动作
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arbitration {
    /// 槽空闲,尝试 CAS 占用
    Claim,
    /// 同类事件已挂起,并入它,不再补发 IPI
    Coalesce,
    /// 槽被占用,自旋重试
    Retry,
}

/// 事件仲裁表:(槽内当前事件, 请求事件) -> 动作
///
/// 只有 ContextSwitch 遇到已挂起的 ContextSwitch 时允许合并;
/// AddTask 和 Wake 绝不合并,否则会丢任务或丢唤醒
pub const fn arbitrate(current: Event, requested: Event) -> Arbitration {
    match (current, requested) {
        (Event::None, _) => Arbitration::Claim,
        (Event::ContextSwitch, Event::ContextSwitch) => Arbitration::Coalesce,
        _ => Arbitration::Retry,
    }
}

/// 单深度事件槽
///
/// 生产者通过 CAS 完成 `None -> 事件` 的迁移;只有槽所属核的软件
/// 中断处理在副作用完成后执行 `事件 -> None` 的迁移。CAS 用真正的
/// 原子指令而非关中断:生产者和消费者跑在不同的核上,关中断管不到
/// 对端。
pub struct EventSlot(AtomicUsize);

impl EventSlot {
    pub const EMPTY: EventSlot = EventSlot(AtomicUsize::new(Event::None as usize));

    /// acquire 读:读到事件后,事件的载荷一定已可见
    pub fn load(&self) -> Event {
        Event::from_raw(self.0.load(Ordering::Acquire))
    }

    /// 尝试 `None -> requested`,返回迁移前槽内的事件
    ///
    /// 返回 [`Event::None`] 即占用成功。成功路径带 release 语义,
    /// 先写的载荷随事件一起发布
    pub fn try_claim(&self, requested: Event) -> Event {
        match self.0.compare_exchange(
            Event::None as usize,
            requested as usize,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(prev) => Event::from_raw(prev),
            Err(prev) => Event::from_raw(prev),
        }
    }

    /// 事件处理完毕,释放槽。release 写,此后槽可再次被占用
    pub fn release(&self) {
        self.0.store(Event::None as usize, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbitration_table() {
        // 空槽对任何请求都可占用
        for requested in [Event::AddTask, Event::ContextSwitch, Event::Wake] {
            assert_eq!(arbitrate(Event::None, requested), Arbitration::Claim);
        }
        // 唯一的合并项
        assert_eq!(
            arbitrate(Event::ContextSwitch, Event::ContextSwitch),
            Arbitration::Coalesce
        );
        // 其余组合一律重试
        assert_eq!(
            arbitrate(Event::AddTask, Event::AddTask),
            Arbitration::Retry
        );
        assert_eq!(arbitrate(Event::Wake, Event::Wake), Arbitration::Retry);
        assert_eq!(
            arbitrate(Event::AddTask, Event::ContextSwitch),
            Arbitration::Retry
        );
        assert_eq!(
            arbitrate(Event::ContextSwitch, Event::AddTask),
            Arbitration::Retry
        );
        assert_eq!(arbitrate(Event::Wake, Event::AddTask), Arbitration::Retry);
        assert_eq!(
            arbitrate(Event::ContextSwitch, Event::Wake),
            Arbitration::Retry
        );
    }

    #[test]
    fn claim_and_release() {
        let slot = EventSlot::EMPTY;
        assert_eq!(slot.load(), Event::None);
        assert_eq!(slot.try_claim(Event::AddTask), Event::None);
        assert_eq!(slot.load(), Event::AddTask);
        // 占用失败返回占着槽的事件
        assert_eq!(slot.try_claim(Event::Wake), Event::AddTask);
        slot.release();
        assert_eq!(slot.try_claim(Event::Wake), Event::None);
        assert_eq!(slot.load(), Event::Wake);
    }
}
