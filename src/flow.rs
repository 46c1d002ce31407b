//! HTTP/2 flow control
//!
//! Flow control per RFC 7540 Section 5.2, applied at both the connection
//! and stream level. Windows are tracked as i64: a window may legitimately
//! go negative when the peer shrinks SETTINGS_INITIAL_WINDOW_SIZE while
//! data is in flight, but it must never exceed 2^31-1.

use crate::error::{Error, Result};
use crate::DEFAULT_INITIAL_WINDOW_SIZE;

/// Upper bound on any flow-control window (2^31 - 1)
pub const MAX_WINDOW_SIZE: i64 = 0x7FFF_FFFF;

/// A single flow control window.
#[derive(Debug, Clone)]
pub struct FlowWindow {
    /// Initial window size, updated by SETTINGS_INITIAL_WINDOW_SIZE
    initial_size: u32,
    /// Current window size
    current_size: i64,
}

impl FlowWindow {
    /// Create a new flow control window with the protocol default size
    pub fn new() -> Self {
        Self::with_initial_size(DEFAULT_INITIAL_WINDOW_SIZE)
    }

    /// Create a new flow control window with specified initial size
    pub fn with_initial_size(initial_size: u32) -> Self {
        FlowWindow {
            initial_size,
            current_size: initial_size as i64,
        }
    }

    /// Get current window size
    pub fn size(&self) -> i64 {
        self.current_size
    }

    /// Get initial window size
    pub fn initial_size(&self) -> u32 {
        self.initial_size
    }

    /// Check if window has available capacity
    pub fn has_capacity(&self) -> bool {
        self.current_size > 0
    }

    /// Check if window can cover the full amount
    pub fn can_send(&self, amount: usize) -> bool {
        self.current_size >= amount as i64
    }

    /// Consume capacity for sending data.
    ///
    /// Returns the amount actually consumed, which may be less than
    /// requested when the window is partially open, or 0 when exhausted.
    pub fn consume(&mut self, amount: usize) -> usize {
        if amount == 0 || self.current_size <= 0 {
            return 0;
        }

        let granted = std::cmp::min(amount as i64, self.current_size);
        self.current_size -= granted;
        granted as usize
    }

    /// Charge received data against the window.
    ///
    /// Unlike [`consume`](Self::consume) this is all-or-nothing: a peer
    /// sending past the advertised window is a FLOW_CONTROL_ERROR.
    pub fn charge_received(&mut self, amount: usize) -> Result<()> {
        let amount = amount as i64;
        if amount > self.current_size {
            return Err(Error::FlowControl(format!(
                "received {} bytes against a window of {}",
                amount, self.current_size
            )));
        }
        self.current_size -= amount;
        Ok(())
    }

    /// Apply a WINDOW_UPDATE increment.
    ///
    /// A zero increment is a PROTOCOL_ERROR, and pushing the window past
    /// 2^31-1 is a FLOW_CONTROL_ERROR (RFC 7540 Section 6.9.1).
    pub fn increase(&mut self, increment: u32) -> Result<i64> {
        if increment == 0 {
            return Err(Error::Protocol(
                "WINDOW_UPDATE increment must be non-zero".to_string(),
            ));
        }

        let new_size = self.current_size + increment as i64;
        if new_size > MAX_WINDOW_SIZE {
            return Err(Error::FlowControl(format!(
                "window size {} exceeds maximum (2^31-1)",
                new_size
            )));
        }

        self.current_size = new_size;
        Ok(self.current_size)
    }

    /// Update initial window size from SETTINGS_INITIAL_WINDOW_SIZE.
    ///
    /// The delta is applied to the current window as Section 6.9.2
    /// requires, which is the one situation where a window may go negative.
    pub fn update_initial_size(&mut self, new_initial_size: u32) -> Result<()> {
        let diff = new_initial_size as i64 - self.initial_size as i64;
        let new_current = self.current_size + diff;

        if new_current > MAX_WINDOW_SIZE {
            return Err(Error::FlowControl(format!(
                "adjusted window size {} exceeds maximum (2^31-1)",
                new_current
            )));
        }

        self.initial_size = new_initial_size;
        self.current_size = new_current;
        Ok(())
    }
}

impl Default for FlowWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Paired send/receive windows, shared shape for the connection level and
/// each stream.
#[derive(Debug, Clone)]
pub struct FlowControl {
    /// Send window: how much we may still transmit
    send_window: FlowWindow,
    /// Receive window: how much the peer may still transmit
    recv_window: FlowWindow,
}

impl FlowControl {
    /// Create with default window sizes on both sides
    pub fn new() -> Self {
        FlowControl {
            send_window: FlowWindow::new(),
            recv_window: FlowWindow::new(),
        }
    }

    /// Create with specified initial window sizes
    pub fn with_initial_sizes(send_size: u32, recv_size: u32) -> Self {
        FlowControl {
            send_window: FlowWindow::with_initial_size(send_size),
            recv_window: FlowWindow::with_initial_size(recv_size),
        }
    }

    /// Get send window
    pub fn send_window(&self) -> &FlowWindow {
        &self.send_window
    }

    /// Get mutable send window
    pub fn send_window_mut(&mut self) -> &mut FlowWindow {
        &mut self.send_window
    }

    /// Get receive window
    pub fn recv_window(&self) -> &FlowWindow {
        &self.recv_window
    }

    /// Get mutable receive window
    pub fn recv_window_mut(&mut self) -> &mut FlowWindow {
        &mut self.recv_window
    }

    /// Check if the send window covers the full amount
    pub fn can_send(&self, amount: usize) -> bool {
        self.send_window.can_send(amount)
    }

    /// Consume send window for outbound data
    pub fn consume_send(&mut self, amount: usize) -> usize {
        self.send_window.consume(amount)
    }

    /// Apply a peer WINDOW_UPDATE to the send window
    pub fn increase_send(&mut self, increment: u32) -> Result<i64> {
        self.send_window.increase(increment)
    }

    /// Charge inbound data against the receive window
    pub fn charge_received(&mut self, amount: usize) -> Result<()> {
        self.recv_window.charge_received(amount)
    }

    /// Suggested WINDOW_UPDATE increment, if one is due.
    ///
    /// Replenishes once the receive window drops below half of its initial
    /// size, restoring it to the full initial size.
    pub fn pending_window_update(&self) -> Option<u32> {
        let recv_size = self.recv_window.size();
        let initial_size = self.recv_window.initial_size() as i64;

        if recv_size < initial_size / 2 {
            Some((initial_size - recv_size) as u32)
        } else {
            None
        }
    }

    /// Record a WINDOW_UPDATE we sent (credits the receive window)
    pub fn apply_window_update_sent(&mut self, increment: u32) -> Result<i64> {
        self.recv_window.increase(increment)
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_basics() {
        let window = FlowWindow::new();
        assert_eq!(window.size(), DEFAULT_INITIAL_WINDOW_SIZE as i64);
        assert!(window.has_capacity());
        assert!(window.can_send(1000));
    }

    #[test]
    fn test_window_consume_partial() {
        let mut window = FlowWindow::with_initial_size(100);

        assert_eq!(window.consume(50), 50);
        assert_eq!(window.size(), 50);

        // Only what remains is granted
        assert_eq!(window.consume(60), 50);
        assert_eq!(window.size(), 0);

        assert_eq!(window.consume(10), 0);
    }

    #[test]
    fn test_window_increase() {
        let mut window = FlowWindow::with_initial_size(100);
        window.consume(50);

        window.increase(100).unwrap();
        assert_eq!(window.size(), 150);
    }

    #[test]
    fn test_window_increase_zero_is_protocol_error() {
        let mut window = FlowWindow::new();
        let err = window.increase(0).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_window_overflow() {
        let mut window = FlowWindow::with_initial_size(0x7FFF_FFFF);
        let err = window.increase(1).unwrap_err();
        assert!(matches!(err, Error::FlowControl(_)));
    }

    #[test]
    fn test_charge_received_within_window() {
        let mut window = FlowWindow::with_initial_size(100);
        window.charge_received(100).unwrap();
        assert_eq!(window.size(), 0);
    }

    #[test]
    fn test_charge_received_overrun() {
        let mut window = FlowWindow::with_initial_size(100);
        let err = window.charge_received(101).unwrap_err();
        assert!(matches!(err, Error::FlowControl(_)));
    }

    #[test]
    fn test_update_initial_size() {
        let mut window = FlowWindow::with_initial_size(100);
        window.consume(50);
        assert_eq!(window.size(), 50);

        window.update_initial_size(200).unwrap();
        assert_eq!(window.initial_size(), 200);
        assert_eq!(window.size(), 150); // 50 + 100

        window.update_initial_size(150).unwrap();
        assert_eq!(window.size(), 100); // 150 - 50
    }

    #[test]
    fn test_update_initial_size_can_go_negative() {
        let mut window = FlowWindow::with_initial_size(100);
        window.consume(80);
        assert_eq!(window.size(), 20);

        // Peer shrinks the initial size below what is in flight
        window.update_initial_size(10).unwrap();
        assert_eq!(window.size(), -70);
        assert!(!window.has_capacity());
    }

    #[test]
    fn test_flow_control_pair() {
        let mut flow = FlowControl::new();

        assert!(flow.can_send(1000));
        assert_eq!(flow.consume_send(1000), 1000);

        flow.charge_received(1000).unwrap();
        assert_eq!(
            flow.recv_window().size(),
            (DEFAULT_INITIAL_WINDOW_SIZE - 1000) as i64
        );

        flow.increase_send(500).unwrap();
        assert!(flow.can_send(500));
    }

    #[test]
    fn test_pending_window_update() {
        let mut flow = FlowControl::with_initial_sizes(100, 100);

        assert_eq!(flow.pending_window_update(), None);

        flow.charge_received(60).unwrap();
        assert_eq!(flow.pending_window_update(), Some(60));

        flow.apply_window_update_sent(60).unwrap();
        assert_eq!(flow.pending_window_update(), None);
        assert_eq!(flow.recv_window().size(), 100);
    }
}
