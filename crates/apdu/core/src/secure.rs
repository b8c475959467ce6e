//! Secure messaging pipeline
//!
//! Secure messaging layers transform whole APDUs: the request side wraps an
//! encoded command, the response side unwraps an encoded response including its
//! status word. Layers are kept on a LIFO stack. Requests pass through the most
//! recently pushed layer first and responses travel back in the opposite order.
//!
//! The cryptography itself lives behind [`SecureMessaging`]; this module only
//! orders the layers.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

/// Error type for secure messaging layers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecureMessagingError {
    /// Integrity check of a protected response failed
    #[error("Secure messaging MAC verification failed")]
    Mac,

    /// Protected data objects are malformed
    #[error("Secure messaging encoding error: {0}")]
    Encoding(String),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl SecureMessagingError {
    /// Create an encoding error
    pub fn encoding<S: Into<String>>(message: S) -> Self {
        Self::Encoding(message.into())
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

/// A secure messaging layer
pub trait SecureMessaging: Send + fmt::Debug {
    /// Protect an encoded command APDU
    fn process_request(&mut self, command: Bytes) -> Result<Bytes, SecureMessagingError>;

    /// Verify and unprotect an encoded response APDU (data and status word)
    fn process_response(&mut self, response: Bytes) -> Result<Bytes, SecureMessagingError>;
}

/// LIFO stack of secure messaging layers
#[derive(Debug, Default)]
pub struct SecureMessagingStack {
    layers: Vec<Box<dyn SecureMessaging>>,
}

impl SecureMessagingStack {
    /// Create an empty stack
    pub const fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Push a layer on top of the stack
    pub fn push(&mut self, layer: Box<dyn SecureMessaging>) {
        debug!(layer = ?layer, depth = self.layers.len() + 1, "Pushed secure messaging layer");
        self.layers.push(layer);
    }

    /// Remove the most recently pushed layer, `None` when empty
    pub fn pop(&mut self) -> Option<Box<dyn SecureMessaging>> {
        let layer = self.layers.pop();
        if let Some(layer) = &layer {
            debug!(layer = ?layer, depth = self.layers.len(), "Popped secure messaging layer");
        }
        layer
    }

    /// Remove all layers
    pub fn clear(&mut self) {
        if !self.layers.is_empty() {
            debug!(depth = self.layers.len(), "Cleared secure messaging stack");
        }
        self.layers.clear();
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer is active
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Apply the request side of every layer, last pushed first
    pub fn wrap_request(&mut self, command: Bytes) -> Result<Bytes, SecureMessagingError> {
        self.layers
            .iter_mut()
            .rev()
            .try_fold(command, |command, layer| layer.process_request(command))
    }

    /// Apply the response side of every layer, first pushed first
    pub fn unwrap_response(&mut self, response: Bytes) -> Result<Bytes, SecureMessagingError> {
        self.layers
            .iter_mut()
            .try_fold(response, |response, layer| layer.process_response(response))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::command::Command;

    /// Layer appending a marker byte to the command data and stripping it from
    /// the front of responses, recording the order it was invoked in
    #[derive(Debug)]
    pub(crate) struct MarkerLayer {
        pub(crate) marker: u8,
        pub(crate) log: Arc<Mutex<Vec<String>>>,
    }

    impl MarkerLayer {
        pub(crate) fn boxed(marker: u8, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn SecureMessaging> {
            Box::new(Self {
                marker,
                log: Arc::clone(log),
            })
        }
    }

    impl SecureMessaging for MarkerLayer {
        fn process_request(&mut self, command: Bytes) -> Result<Bytes, SecureMessagingError> {
            self.log.lock().unwrap().push(format!("wrap {:02X}", self.marker));
            let command = Command::from_bytes(&command)
                .map_err(|e| SecureMessagingError::encoding(e.to_string()))?;
            let mut data = command.data().to_vec();
            data.push(self.marker);
            command
                .with_data(data)
                .try_to_bytes()
                .map_err(|e| SecureMessagingError::encoding(e.to_string()))
        }

        fn process_response(&mut self, response: Bytes) -> Result<Bytes, SecureMessagingError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("unwrap {:02X}", self.marker));
            match response.split_first() {
                Some((first, rest)) if *first == self.marker => Ok(Bytes::copy_from_slice(rest)),
                _ => Err(SecureMessagingError::Mac),
            }
        }
    }

    #[test]
    fn test_stack_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = SecureMessagingStack::new();
        stack.push(MarkerLayer::boxed(0xA1, &log));
        stack.push(MarkerLayer::boxed(0xB2, &log));
        assert_eq!(stack.len(), 2);

        let wrapped = stack.wrap_request(Bytes::from_static(&[0x00, 0xB0, 0x00, 0x00])).unwrap();
        assert_eq!(wrapped.as_ref(), &[0x00, 0xB0, 0x00, 0x00, 0x02, 0xB2, 0xA1]);

        let unwrapped = stack
            .unwrap_response(Bytes::from_static(&[0xA1, 0xB2, 0x90, 0x00]))
            .unwrap();
        assert_eq!(unwrapped.as_ref(), &[0x90, 0x00]);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["wrap B2", "wrap A1", "unwrap A1", "unwrap B2"]
        );
    }

    #[test]
    fn test_stack_push_pop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = SecureMessagingStack::new();
        assert!(stack.pop().is_none());
        assert!(stack.is_empty());

        stack.push(MarkerLayer::boxed(0x01, &log));
        stack.push(MarkerLayer::boxed(0x02, &log));
        assert!(stack.pop().is_some());
        assert_eq!(stack.len(), 1);

        let wrapped = stack.wrap_request(Bytes::from_static(&[0x00, 0xB0, 0x00, 0x00])).unwrap();
        assert_eq!(wrapped.as_ref(), &[0x00, 0xB0, 0x00, 0x00, 0x01, 0x01]);

        stack.clear();
        assert!(stack.is_empty());
        let passthrough = stack.wrap_request(Bytes::from_static(&[0x00])).unwrap();
        assert_eq!(passthrough.as_ref(), &[0x00]);
    }

    #[test]
    fn test_stack_error_aborts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = SecureMessagingStack::new();
        stack.push(MarkerLayer::boxed(0x01, &log));
        stack.push(MarkerLayer::boxed(0x02, &log));

        assert_eq!(
            stack.unwrap_response(Bytes::from_static(&[0x02, 0x01, 0x90, 0x00])),
            Err(SecureMessagingError::Mac)
        );
        // the second layer never ran
        assert_eq!(*log.lock().unwrap(), vec!["unwrap 01"]);
        assert_eq!(stack.len(), 2);
    }
}
