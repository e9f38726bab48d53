use super::AcquisitionMode;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies one dispatch. `epoch` changes on every mode switch and teardown,
/// so a completion whose epoch differs from the session's is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchTag {
    pub epoch: u64,
    pub mode: AcquisitionMode,
    pub index: u32,
}

/// Result of one dispatch: raw fixed-point energy counters, or the kernel's error text.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelCompletion {
    pub tag: DispatchTag,
    pub result: std::result::Result<Vec<u32>, String>,
}

impl KernelCompletion {
    pub fn success(tag: DispatchTag, counters: Vec<u32>) -> Self {
        Self {
            tag,
            result: Ok(counters),
        }
    }

    pub fn failure(tag: DispatchTag, error: impl Into<String>) -> Self {
        Self {
            tag,
            result: Err(error.into()),
        }
    }
}

/// Kernel-side handle of the completion channel.
///
/// Gated by the session's liveness flag: once the session tears down, `send`
/// drops the completion and returns `false`.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    sender: Sender<KernelCompletion>,
    is_running: Arc<AtomicBool>,
}

impl CompletionSender {
    pub fn send(&self, completion: KernelCompletion) -> bool {
        if !self.is_running.load(Ordering::Acquire) {
            return false;
        }
        self.sender.send(completion).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

/// Creates a completion channel together with its liveness flag.
///
/// The flag starts set; clearing it closes every clone of the sender.
pub fn completion_channel() -> (CompletionSender, Receiver<KernelCompletion>, Arc<AtomicBool>) {
    let (sender, receiver) = unbounded();
    let is_running = Arc::new(AtomicBool::new(true));
    (
        CompletionSender {
            sender,
            is_running: is_running.clone(),
        },
        receiver,
        is_running,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(index: u32) -> DispatchTag {
        DispatchTag {
            epoch: 1,
            mode: AcquisitionMode::Realtime,
            index,
        }
    }

    #[test]
    fn test_sender_delivers_while_running() {
        let (sender, receiver, _flag) = completion_channel();
        assert!(sender.send(KernelCompletion::success(tag(0), vec![1, 2])));
        let got = receiver.try_recv().unwrap();
        assert_eq!(got.tag.index, 0);
        assert_eq!(got.result, Ok(vec![1, 2]));
    }

    #[test]
    fn test_cleared_flag_closes_every_clone() {
        let (sender, receiver, flag) = completion_channel();
        let clone = sender.clone();
        flag.store(false, Ordering::Release);

        assert!(!sender.is_open());
        assert!(!clone.send(KernelCompletion::failure(tag(3), "late")));
        assert!(receiver.try_recv().is_err());
    }
}
