/// Ticket for one requested display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// The renderer's refresh scheduling, as seen by the pipeline.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancelling an unknown or already delivered handle is a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Pending frame requests, delivered in request order by the driver loop.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out everything requested so far. Requests made while the returned
    /// handles are being serviced wait for the next refresh.
    pub fn take_due(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.pending.contains(&handle)
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|&h| h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_are_delivered_once() {
        let mut queue = FrameQueue::new();
        let a = queue.request_frame();
        let b = queue.request_frame();
        assert_ne!(a, b);

        assert_eq!(queue.take_due(), vec![a, b]);
        assert!(queue.take_due().is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue = FrameQueue::new();
        let a = queue.request_frame();

        queue.cancel_frame(a);
        queue.cancel_frame(a);
        assert_eq!(queue.pending_len(), 0);
        assert!(!queue.is_pending(a));
    }
}
