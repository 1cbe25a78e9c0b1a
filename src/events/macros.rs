/// Declares the global `RX_EVENTS` queue.
///
/// The queue is shared between the GDO0 edge handler and the main loop.
///
/// # Example
/// ```rust
/// backscatter::init_event_queue!();
///
/// assert!(RX_EVENTS.is_empty());
/// ```
#[macro_export]
macro_rules! init_event_queue {
    () => {
        pub static RX_EVENTS: $crate::events::ReceiveEvents = $crate::events::EventQueue::new();
    };
    ( $depth:expr ) => {
        pub static RX_EVENTS: $crate::events::EventQueue<$crate::events::ReceiveEvent, { $depth }> =
            $crate::events::EventQueue::new();
    };
}

/// Forwards a GDO0 edge into `RX_EVENTS`.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn IO_IRQ_BANK0() {
///     if gdo0.interrupt_status(EdgeHigh) {
///         gdo0_edge!(rising);
///     } else {
///         gdo0_edge!(falling);
///     }
/// }
/// ```
///
/// # Notes
/// - Requires `init_event_queue!` to have been used earlier.
/// - A full queue silently drops the event.
#[macro_export]
macro_rules! gdo0_edge {
    (rising) => {
        let _ = $crate::events::on_gdo0_edge(&RX_EVENTS, $crate::events::Edge::Rising);
    };
    (falling) => {
        let _ = $crate::events::on_gdo0_edge(&RX_EVENTS, $crate::events::Edge::Falling);
    };
}

#[cfg(test)]
mod tests {
    use crate::events::ReceiveEvent;

    crate::init_event_queue!(4);

    #[test]
    fn test_macros_feed_the_global_queue() {
        for _ in 0..3 {
            crate::gdo0_edge!(rising);
            crate::gdo0_edge!(falling);
        }
        assert_eq!(RX_EVENTS.len(), 4);
        assert_eq!(RX_EVENTS.poll(), ReceiveEvent::RxStarted);
        assert_eq!(RX_EVENTS.poll(), ReceiveEvent::RxFinished);
    }
}
