use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::{
    context::NodeContext,
    protocol::{CMD_AUTO_OFF, CMD_AUTO_ON, CMD_FAN_OFF, CMD_FAN_ON, CMD_LIGHT_OFF, CMD_LIGHT_ON},
    types::Channel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AutoOn,
    AutoOff,
    LightOn,
    LightOff,
    FanOn,
    FanOff,
}

impl Command {
    fn actuator(self) -> Option<(Channel, bool)> {
        match self {
            Self::LightOn => Some((Channel::Light, true)),
            Self::LightOff => Some((Channel::Light, false)),
            Self::FanOn => Some((Channel::Fan, true)),
            Self::FanOff => Some((Channel::Fan, false)),
            Self::AutoOn | Self::AutoOff => None,
        }
    }
}

/// Exact, case-sensitive token match.
impl TryFrom<&str> for Command {
    type Error = ();

    fn try_from(token: &str) -> Result<Self, Self::Error> {
        match token {
            CMD_AUTO_ON => Ok(Self::AutoOn),
            CMD_AUTO_OFF => Ok(Self::AutoOff),
            CMD_LIGHT_ON => Ok(Self::LightOn),
            CMD_LIGHT_OFF => Ok(Self::LightOff),
            CMD_FAN_ON => Ok(Self::FanOn),
            CMD_FAN_OFF => Ok(Self::FanOff),
            _ => Err(()),
        }
    }
}

/// Applies an inbound token to the node state.
///
/// Unrecognized tokens leave every piece of state untouched and are only
/// visible in the debug log. Returns the command that was applied.
pub fn dispatch<P: OutputPin>(ctx: &mut NodeContext<P>, token: &str) -> Option<Command> {
    let Ok(command) = Command::try_from(token) else {
        debug!("ignoring unrecognized token `{token}`");
        return None;
    };

    match command {
        Command::AutoOn => ctx.set_auto_mode(true),
        Command::AutoOff => ctx.set_auto_mode(false),
        other => {
            if let Some((channel, on)) = other.actuator() {
                ctx.actuators.set(channel, on);
                info!(
                    "{} relay switched {}",
                    channel.as_str(),
                    if on { "on" } else { "off" }
                );
            }
        }
    }

    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuator::ActuatorBank,
        protocol::{CONNECTED_SENTINEL, SERVER_ACK},
        testing::MockRelay,
        types::ActuatorState,
    };

    fn context() -> (NodeContext<MockRelay>, MockRelay, MockRelay) {
        let light = MockRelay::default();
        let fan = MockRelay::default();
        let ctx = NodeContext::new(ActuatorBank::new(light.clone(), fan.clone()));
        (ctx, light, fan)
    }

    #[test]
    fn light_on_then_off_is_order_sensitive() {
        let (mut ctx, light, _) = context();

        assert_eq!(dispatch(&mut ctx, "LIGHT_ON"), Some(Command::LightOn));
        assert!(ctx.actuators.get(Channel::Light));

        assert_eq!(dispatch(&mut ctx, "LIGHT_OFF"), Some(Command::LightOff));
        assert!(!ctx.actuators.get(Channel::Light));

        assert_eq!(light.levels(), vec![false, true, false]);
    }

    #[test]
    fn fan_commands_drive_fan_relay() {
        let (mut ctx, light, fan) = context();

        dispatch(&mut ctx, "FAN_ON");
        assert!(ctx.actuators.get(Channel::Fan));
        dispatch(&mut ctx, "FAN_OFF");
        assert!(!ctx.actuators.get(Channel::Fan));

        assert_eq!(fan.levels(), vec![false, true, false]);
        assert_eq!(light.levels(), vec![false]);
    }

    #[test]
    fn unrecognized_tokens_change_nothing() {
        let (mut ctx, light, fan) = context();
        dispatch(&mut ctx, "FAN_ON");
        let before = ctx.actuators.state();

        for token in [
            "FOO",
            "light_on",
            "LIGHT_ON ",
            "LIGHT",
            "LIGHT_ON_NOW",
            "",
            CONNECTED_SENTINEL,
            SERVER_ACK,
        ] {
            assert_eq!(dispatch(&mut ctx, token), None, "token `{token}`");
        }

        assert_eq!(ctx.actuators.state(), before);
        assert!(!ctx.auto_mode());
        assert_eq!(light.levels(), vec![false]);
        assert_eq!(fan.levels(), vec![false, true]);
    }

    #[test]
    fn auto_mode_toggles_never_touch_actuators() {
        let (mut ctx, light, fan) = context();
        dispatch(&mut ctx, "LIGHT_ON");
        let before = ctx.actuators.state();

        for _ in 0..3 {
            dispatch(&mut ctx, "AUTO_ON");
            assert!(ctx.auto_mode());
            dispatch(&mut ctx, "AUTO_OFF");
            assert!(!ctx.auto_mode());
        }
        dispatch(&mut ctx, "AUTO_ON");

        assert!(ctx.auto_mode());
        assert_eq!(ctx.actuators.state(), before);
        assert_eq!(
            before,
            ActuatorState {
                light: true,
                fan: false
            }
        );
        assert_eq!(light.levels(), vec![false, true]);
        assert_eq!(fan.levels(), vec![false]);
    }
}
