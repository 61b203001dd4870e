//! Keeping the message list pinned to the newest message.
//!
//! Scrolling belongs to the host; the message list only says when it should
//! happen.

use std::cell::Cell;
use std::rc::Rc;

/// Host hook invoked when the view should jump to its newest message.
pub trait ScrollToBottom {
    fn scroll_to_bottom(&self);
}

/// Host without a scrollable viewport.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScroll;

impl ScrollToBottom for NoopScroll {
    fn scroll_to_bottom(&self) {}
}

/// Counts scroll requests. Clones share the counter, so a host can keep one
/// handle while the list owns another.
#[derive(Debug, Clone, Default)]
pub struct ScrollCounter {
    count: Rc<Cell<usize>>,
}

impl ScrollCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }
}

impl ScrollToBottom for ScrollCounter {
    fn scroll_to_bottom(&self) {
        self.count.set(self.count.get() + 1);
    }
}

impl<T: ScrollToBottom + ?Sized> ScrollToBottom for Box<T> {
    fn scroll_to_bottom(&self) {
        (**self).scroll_to_bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_shared_between_clones() {
        let counter = ScrollCounter::new();
        let handle = counter.clone();

        counter.scroll_to_bottom();
        counter.scroll_to_bottom();

        assert_eq!(handle.count(), 2);
    }

    #[test]
    fn test_boxed_scroll() {
        let counter = ScrollCounter::new();
        let boxed: Box<dyn ScrollToBottom> = Box::new(counter.clone());
        boxed.scroll_to_bottom();
        assert_eq!(counter.count(), 1);
    }
}
