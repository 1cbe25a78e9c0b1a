use super::{Edge, EventQueue, ReceiveEvent, ReceiveEvents};

/// Initializer for a global receive-event queue.
///
/// # Example
/// ```rust
/// use backscatter::events::{ReceiveEvents, event_queue_init};
///
/// static RX_EVENTS: ReceiveEvents = event_queue_init();
/// ```
pub const fn event_queue_init() -> ReceiveEvents {
    EventQueue::new()
}

/// Edge handler for the receiver's GDO0 pin.
///
/// Only enqueues; never blocks. If the queue is full the event is lost.
///
/// # Arguments
/// * The global event queue
/// * Which edge fired
///
/// # Returns
/// `false` if the event was dropped.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn IO_IRQ_BANK0() {
///     let edge = if gdo0.is_high().unwrap_or(false) { Edge::Rising } else { Edge::Falling };
///     on_gdo0_edge(&RX_EVENTS, edge);
/// }
/// ```
pub fn on_gdo0_edge<const N: usize>(queue: &EventQueue<ReceiveEvent, N>, edge: Edge) -> bool {
    queue.try_push(ReceiveEvent::from(edge))
}

#[cfg(test)]
mod tests {
    use super::*;

    static EVENTS: ReceiveEvents = event_queue_init();

    #[test]
    fn test_edges_reach_the_main_loop() {
        assert!(on_gdo0_edge(&EVENTS, Edge::Rising));
        assert!(on_gdo0_edge(&EVENTS, Edge::Falling));
        assert_eq!(EVENTS.poll(), ReceiveEvent::RxStarted);
        assert_eq!(EVENTS.poll(), ReceiveEvent::RxFinished);
        assert_eq!(EVENTS.poll(), ReceiveEvent::None);
    }
}
