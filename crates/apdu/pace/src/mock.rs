//! Scripted reader for control command tests

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use eidlink_apdu_core::{ControlTransport, TransportError};

use crate::codec::PaceFunction;

/// Control transport answering from a queue and recording what it was sent
#[derive(Debug, Default)]
pub(crate) struct MockControl {
    pub(crate) responses: VecDeque<Result<Bytes, TransportError>>,
    pub(crate) calls: Vec<(u32, Vec<u8>)>,
    /// Sleep before answering EstablishPaceChannel
    pub(crate) establish_delay: Option<Duration>,
}

impl MockControl {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_response(&mut self, response: &str) {
        let response = hex::decode(response).expect("valid hex fixture");
        self.responses.push_back(Ok(Bytes::from(response)));
    }

    pub(crate) fn push_error(&mut self, error: TransportError) {
        self.responses.push_back(Err(error));
    }
}

impl ControlTransport for MockControl {
    fn do_control(&mut self, code: u32, payload: &[u8]) -> Result<Bytes, TransportError> {
        self.calls.push((code, payload.to_vec()));
        if payload.first() == Some(&(PaceFunction::EstablishPaceChannel as u8)) {
            if let Some(delay) = self.establish_delay {
                thread::sleep(delay);
            }
        }
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Communication))
    }

    fn control_code(&self, function: u32) -> u32 {
        // SCARD_CTL_CODE on pcsc-lite
        0x4200_0000 + function
    }
}
