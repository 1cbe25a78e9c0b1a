//! Receive events and the queues between interrupt and main-loop context.
//!
//! The receiver raises GDO0 when it detects a sync word and drops it when the
//! packet is complete (or discarded). An edge handler turns each edge into a
//! [`ReceiveEvent`] and hands it to the main loop through an [`EventQueue`]:
//!
//! ```text
//!            rising edge              falling edge
//!   Idle ─────────────────▶ Receiving ─────────────▶ Idle (frame available)
//! ```
//!
//! Contains:
//! - [`EventQueue`]: bounded queue behind a `critical_section` mutex; a full
//!   queue drops the new entry
//! - [`ReceiverState`]: the state machine above, driven by polled events
//! - `isr`: the edge handler for a global queue
//! - `init_event_queue!` / `gdo0_edge!`: macros declaring and feeding
//!   `RX_EVENTS`

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::Deque;

use crate::consts::EVENT_QUEUE_LEN;

mod isr;
pub use isr::*;

mod macros;

/// Signal edge seen on the receiver's GDO0 pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Edge {
    /// Sync word detected.
    Rising,
    /// End of packet.
    Falling,
}

/// What the main loop learns from one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ReceiveEvent {
    /// Nothing pending.
    #[default]
    None,
    /// A packet started arriving.
    RxStarted,
    /// A packet is complete and waiting in the RX FIFO.
    RxFinished,
}

impl From<Edge> for ReceiveEvent {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::Rising => ReceiveEvent::RxStarted,
            Edge::Falling => ReceiveEvent::RxFinished,
        }
    }
}

/// Fixed-depth FIFO shared between contexts.
///
/// Both ends only hold the lock for a single push or pop, so it is safe to
/// feed from an interrupt handler.
pub struct EventQueue<T, const N: usize> {
    inner: Mutex<RefCell<Deque<T, N>>>,
}

impl<T, const N: usize> Default for EventQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> EventQueue<T, N> {
    /// Empty queue; usable in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Appends `item` without blocking.
    ///
    /// # Returns
    /// `false` if the queue was full and `item` was dropped.
    pub fn try_push(&self, item: T) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).push_back(item).is_ok())
    }

    /// Removes the oldest entry, if any.
    pub fn pop(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).pop_front())
    }

    /// Discards everything queued.
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).clear());
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).len())
    }

    /// `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> fmt::Debug for EventQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}

/// Queue of receive events with the default depth.
pub type ReceiveEvents = EventQueue<ReceiveEvent, EVENT_QUEUE_LEN>;

impl<const N: usize> EventQueue<ReceiveEvent, N> {
    /// Oldest pending event, or [`ReceiveEvent::None`].
    pub fn poll(&self) -> ReceiveEvent {
        self.pop().unwrap_or_default()
    }
}

/// Receiver side of the link as seen by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ReceiverState {
    /// Listening, nothing in flight. Transmitting is allowed.
    #[default]
    Idle,
    /// A packet is arriving.
    Receiving,
}

impl ReceiverState {
    /// State after `event`.
    pub fn next(self, event: ReceiveEvent) -> Self {
        match event {
            ReceiveEvent::RxStarted => ReceiverState::Receiving,
            ReceiveEvent::RxFinished => ReceiverState::Idle,
            ReceiveEvent::None => self,
        }
    }

    /// A new frame may be sent.
    pub fn is_ready(self) -> bool {
        self == ReceiverState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let queue: ReceiveEvents = EventQueue::new();
        assert!(queue.try_push(ReceiveEvent::RxStarted));
        assert!(queue.try_push(ReceiveEvent::RxFinished));
        assert_eq!(queue.poll(), ReceiveEvent::RxStarted);
        assert_eq!(queue.poll(), ReceiveEvent::RxFinished);
        assert_eq!(queue.poll(), ReceiveEvent::None);
    }

    #[test]
    fn test_full_queue_drops_new_events() {
        let queue: EventQueue<u8, 3> = EventQueue::new();
        for i in 0..3 {
            assert!(queue.try_push(i));
        }
        assert!(!queue.try_push(99));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(0));
        assert!(queue.try_push(3));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_default_depth() {
        let queue = ReceiveEvents::new();
        assert_eq!(queue.capacity(), 20);
        for _ in 0..25 {
            let _ = queue.try_push(ReceiveEvent::RxStarted);
        }
        assert_eq!(queue.len(), 20);
    }

    #[test]
    fn test_receiver_state() {
        let mut state = ReceiverState::default();
        assert!(state.is_ready());
        state = state.next(ReceiveEvent::RxStarted);
        assert_eq!(state, ReceiverState::Receiving);
        state = state.next(ReceiveEvent::None);
        assert!(!state.is_ready());
        state = state.next(ReceiveEvent::RxFinished);
        assert!(state.is_ready());
    }

    #[test]
    fn test_edges_map_to_events() {
        assert_eq!(ReceiveEvent::from(Edge::Rising), ReceiveEvent::RxStarted);
        assert_eq!(ReceiveEvent::from(Edge::Falling), ReceiveEvent::RxFinished);
    }
}
