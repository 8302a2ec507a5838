#![allow(dead_code)]

use kernel_sync::irq::{InterruptControl, InterruptState};
use kernel_sync::Clock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// 100 ns ticks since construction; yields the thread between polls.
pub struct HostClock {
    start: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for HostClock {
    fn ticks(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos() / 100).unwrap()
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}

/// Records the interrupt flag of a pretend CPU.
pub struct FakeCpu {
    enabled: AtomicBool,
    pub disables: AtomicUsize,
    on_restore: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl FakeCpu {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            disables: AtomicUsize::new(0),
            on_restore: Mutex::new(None),
        }
    }

    /// Runs `hook` at the start of every `restore`, before the flag changes.
    pub fn on_restore(&self, hook: impl Fn() + Send + 'static) {
        *self.on_restore.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl InterruptControl for FakeCpu {
    fn save_and_disable(&self) -> InterruptState {
        self.disables.fetch_add(1, Ordering::SeqCst);
        let was = self.enabled.swap(false, Ordering::SeqCst);
        InterruptState::new().with_interrupts_enabled(was)
    }

    fn restore(&self, state: InterruptState) {
        if let Some(hook) = self.on_restore.lock().unwrap().as_ref() {
            hook();
        }
        if state.interrupts_enabled() {
            self.enabled.store(true, Ordering::SeqCst);
        }
    }

    fn halt(&self) -> ! {
        panic!("cpu halted");
    }
}
