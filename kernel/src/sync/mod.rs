pub mod spinlock;

pub use self::spinlock::SpinLock;
