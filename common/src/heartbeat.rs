use crate::config::HeartbeatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Idle,
    SendPing,
    /// Too many pongs were missed; drop the session and reconnect.
    Reconnect,
}

/// Ping/pong liveness tracking for a single socket session.
///
/// A ping goes out every `ping_interval_ms`. A pong not seen within
/// `pong_timeout_ms` of its ping counts as a miss; reaching
/// `missed_pong_tolerance` misses asks for a reconnect.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_ping_ms: u64,
    awaiting_pong: bool,
    missed: u32,
}

impl Heartbeat {
    pub fn new(config: HeartbeatConfig, now_ms: u64) -> Self {
        Self {
            config,
            last_ping_ms: now_ms,
            awaiting_pong: false,
            missed: 0,
        }
    }

    pub fn on_pong(&mut self) {
        self.awaiting_pong = false;
        self.missed = 0;
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn poll(&mut self, now_ms: u64) -> HeartbeatAction {
        let since_ping = now_ms.saturating_sub(self.last_ping_ms);

        if self.awaiting_pong && since_ping >= self.config.pong_timeout_ms {
            self.awaiting_pong = false;
            self.missed += 1;
            if self.missed >= u32::from(self.config.missed_pong_tolerance.max(1)) {
                return HeartbeatAction::Reconnect;
            }
        }

        if since_ping >= self.config.ping_interval_ms {
            self.last_ping_ms = now_ms;
            self.awaiting_pong = true;
            return HeartbeatAction::SendPing;
        }

        HeartbeatAction::Idle
    }
}

/// Fixed-interval gate for connection attempts. No backoff.
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    interval_ms: u64,
    last_attempt_ms: Option<u64>,
}

impl ReconnectTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_attempt_ms: None,
        }
    }

    pub fn ready(&self, now_ms: u64) -> bool {
        self.remaining_ms(now_ms) == 0
    }

    pub fn mark_attempt(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_attempt_ms {
            None => 0,
            Some(last) => self
                .interval_ms
                .saturating_sub(now_ms.saturating_sub(last)),
        }
    }
}
