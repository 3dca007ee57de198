//! In-memory doubles for the hardware and network seams.

use std::{cell::RefCell, collections::VecDeque, convert::Infallible, rc::Rc};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorKind, ErrorType, InputPin, OutputPin},
};

use crate::{
    clock::{ClockSource, Timestamp},
    connectivity::{LinkError, Transport, WifiLink},
    sensor::{HumiditySensor, SensorError},
    types::TransportEvent,
};

#[derive(Debug, Clone, Copy)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Relay pin that records every level written to it. Clones share the record.
#[derive(Clone, Default)]
pub struct MockRelay {
    levels: Rc<RefCell<Vec<bool>>>,
    fail: bool,
}

impl MockRelay {
    pub fn failing() -> Self {
        Self {
            levels: Rc::default(),
            fail: true,
        }
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }

    fn write(&mut self, level: bool) -> Result<(), MockPinError> {
        if self.fail {
            return Err(MockPinError);
        }
        self.levels.borrow_mut().push(level);
        Ok(())
    }
}

impl ErrorType for MockRelay {
    type Error = MockPinError;
}

impl OutputPin for MockRelay {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

pub struct LightPin(pub bool);

impl ErrorType for LightPin {
    type Error = Infallible;
}

impl InputPin for LightPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0)
    }
}

/// Replays queued `(celsius, percent)` pairs, repeating the last one forever.
pub struct ScriptedClimate {
    script: VecDeque<(f32, f32)>,
    last: (f32, f32),
}

impl ScriptedClimate {
    pub fn new(script: &[(f32, f32)]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            last: (f32::NAN, f32::NAN),
        }
    }
}

impl HumiditySensor for ScriptedClimate {
    fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

pub struct FixedClock(pub Timestamp);

impl ClockSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Default)]
pub struct MockWifi {
    pub connected: bool,
    pub connects_on_begin: bool,
    pub begin_calls: usize,
}

impl WifiLink for MockWifi {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn begin_connect(&mut self) -> Result<(), LinkError> {
        self.begin_calls += 1;
        if self.connects_on_begin {
            self.connected = true;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTransport {
    pub connected: bool,
    pub inbound: VecDeque<TransportEvent>,
    pub sent: Vec<String>,
}

impl MockTransport {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: TransportEvent) {
        self.inbound.push_back(event);
    }

    pub fn push_text(&mut self, text: &str) {
        self.push(TransportEvent::Text(text.to_string()));
    }
}

impl Transport for MockTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.inbound.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_text(&mut self, text: &str) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.sent.push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDelay {
    pub total_ms: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
