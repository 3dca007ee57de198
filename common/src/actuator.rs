use embedded_hal::digital::{Error as _, OutputPin};
use log::warn;

use crate::types::{ActuatorState, Channel};

/// Light and fan relays with last-known-state readback.
///
/// Writes are fire-and-forget: a failing pin is logged and the requested
/// state is still recorded. Both relays are driven low on construction.
pub struct ActuatorBank<P> {
    light: P,
    fan: P,
    state: ActuatorState,
}

impl<P: OutputPin> ActuatorBank<P> {
    pub fn new(light: P, fan: P) -> Self {
        let mut bank = Self {
            light,
            fan,
            state: ActuatorState::default(),
        };
        bank.drive(Channel::Light, false);
        bank.drive(Channel::Fan, false);
        bank
    }

    pub fn set(&mut self, channel: Channel, on: bool) {
        self.drive(channel, on);
        self.state.set(channel, on);
    }

    pub fn get(&self, channel: Channel) -> bool {
        self.state.get(channel)
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    fn drive(&mut self, channel: Channel, on: bool) {
        let pin = match channel {
            Channel::Light => &mut self.light,
            Channel::Fan => &mut self.fan,
        };

        let result = if on { pin.set_high() } else { pin.set_low() };
        if let Err(err) = result {
            warn!(
                "failed to drive {} relay {}: {:?}",
                channel.as_str(),
                if on { "high" } else { "low" },
                err.kind()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRelay;

    #[test]
    fn starts_with_both_relays_low() {
        let light = MockRelay::default();
        let fan = MockRelay::default();
        let bank = ActuatorBank::new(light.clone(), fan.clone());

        assert_eq!(bank.state(), ActuatorState::default());
        assert_eq!(light.levels(), vec![false]);
        assert_eq!(fan.levels(), vec![false]);
    }

    #[test]
    fn set_writes_only_the_addressed_relay() {
        let light = MockRelay::default();
        let fan = MockRelay::default();
        let mut bank = ActuatorBank::new(light.clone(), fan.clone());

        bank.set(Channel::Fan, true);

        assert!(bank.get(Channel::Fan));
        assert!(!bank.get(Channel::Light));
        assert_eq!(fan.levels(), vec![false, true]);
        assert_eq!(light.levels(), vec![false]);
    }

    #[test]
    fn readback_never_writes() {
        let light = MockRelay::default();
        let fan = MockRelay::default();
        let bank = ActuatorBank::new(light, fan.clone());

        for _ in 0..5 {
            assert!(!bank.get(Channel::Fan));
            let _ = bank.state();
        }
        assert_eq!(fan.levels(), vec![false]);
    }

    #[test]
    fn failed_write_still_records_state() {
        let light = MockRelay::failing();
        let fan = MockRelay::default();
        let mut bank = ActuatorBank::new(light.clone(), fan);

        bank.set(Channel::Light, true);

        assert!(bank.get(Channel::Light));
        assert!(light.levels().is_empty());
    }
}
