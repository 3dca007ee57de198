use serde::{Serialize, Serializer};

use crate::{clock::Timestamp, sensor::SensorReading, types::ActuatorState};

#[derive(Serialize)]
struct TelemetryFrame<'a> {
    #[serde(serialize_with = "one_decimal")]
    temperature: f32,
    #[serde(serialize_with = "one_decimal")]
    humidity: f32,
    #[serde(serialize_with = "bool_as_digit")]
    light: bool,
    #[serde(serialize_with = "display")]
    timestamp: &'a Timestamp,
}

fn one_decimal<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    let rounded = (f64::from(*value) * 10.0).round() / 10.0;
    // -0.04 rounds to -0.0
    serializer.serialize_f64(if rounded == 0.0 { 0.0 } else { rounded })
}

fn bool_as_digit<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

fn display<S: Serializer>(value: &&Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(*value)
}

/// Builds the outbound telemetry document.
///
/// `light` is 1 when the light sensor reports dark. Fields are emitted in a
/// fixed order: temperature, humidity, light, timestamp.
pub fn encode(reading: &SensorReading, timestamp: &Timestamp) -> serde_json::Result<String> {
    serde_json::to_string(&TelemetryFrame {
        temperature: reading.temperature,
        humidity: reading.humidity,
        light: reading.is_dark,
        timestamp,
    })
}

/// Human-readable summary for the local log. Only reads recorded actuator state.
pub fn diagnostic_line(
    reading: &SensorReading,
    timestamp: &Timestamp,
    actuators: ActuatorState,
) -> String {
    format!(
        "temp={:.1}C humidity={:.1}% ldr={} light_relay={} fan_relay={} time={}",
        reading.temperature,
        reading.humidity,
        if reading.is_dark { "DARK" } else { "BRIGHT" },
        on_off(actuators.light),
        on_off(actuators.fan),
        timestamp
    )
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}
