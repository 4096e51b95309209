use core_types::ReadingMode;
use dom::Rect;
use std::sync::mpsc::{Receiver, Sender, channel};

/// Notification from the host environment to the reading engine.
///
/// Structural tree changes are not delivered here; the engine drains the
/// document's own mutation journal for those.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceEvent {
    /// Scroll or resize; `rect` is the new viewport in page coordinates.
    ViewportChanged { rect: Rect },
    /// Explicit user action on the reading toggle or style setting.
    ModeChanged { mode: ReadingMode },
}

pub struct SourceBus {
    pub tx: Sender<SourceEvent>, // shareable for host-side sources
    pub rx: Receiver<SourceEvent>,
}

impl SourceBus {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }
}

impl Default for SourceBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{SourceBus, SourceEvent};
    use core_types::ReadingMode;
    use dom::Rect;

    #[test]
    fn events_arrive_in_send_order() {
        let bus = SourceBus::new();
        bus.tx
            .send(SourceEvent::ViewportChanged {
                rect: Rect::new(0.0, 0.0, 800.0, 600.0),
            })
            .unwrap();
        bus.tx
            .send(SourceEvent::ModeChanged { mode: ReadingMode::default() })
            .unwrap();
        let first = bus.rx.try_recv().unwrap();
        let second = bus.rx.try_recv().unwrap();
        assert!(matches!(first, SourceEvent::ViewportChanged { .. }));
        assert!(matches!(second, SourceEvent::ModeChanged { .. }));
        assert!(bus.rx.try_recv().is_err());
    }
}
