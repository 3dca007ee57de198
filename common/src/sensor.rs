use embedded_hal::digital::{Error as _, InputPin};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity, percent.
    pub humidity: f32,
    pub is_dark: bool,
}

impl SensorReading {
    /// Rejects the whole reading if either value is NaN; there is no partial reporting.
    pub fn new(temperature: f32, humidity: f32, is_dark: bool) -> Result<Self, SensorError> {
        if temperature.is_nan() || humidity.is_nan() {
            return Err(SensorError::NotANumber {
                temperature,
                humidity,
            });
        }

        Ok(Self {
            temperature,
            humidity,
            is_dark,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor returned NaN (temperature={temperature}, humidity={humidity})")]
    NotANumber { temperature: f32, humidity: f32 },
    #[error("humidity sensor bus error: {0}")]
    Bus(String),
    #[error("light input error: {0}")]
    LightInput(String),
}

pub trait SensorReader {
    fn read(&mut self) -> Result<SensorReading, SensorError>;
}

/// Temperature/humidity driver. Returns `(celsius, percent)`; either may be NaN.
pub trait HumiditySensor {
    fn read_climate(&mut self) -> Result<(f32, f32), SensorError>;
}

/// Climate sensor plus a digital light-level input. A HIGH light pin means dark.
pub struct ClimateSensor<H, L> {
    climate: H,
    light: L,
}

impl<H, L> ClimateSensor<H, L>
where
    H: HumiditySensor,
    L: InputPin,
{
    pub fn new(climate: H, light: L) -> Self {
        Self { climate, light }
    }
}

impl<H, L> SensorReader for ClimateSensor<H, L>
where
    H: HumiditySensor,
    L: InputPin,
{
    fn read(&mut self) -> Result<SensorReading, SensorError> {
        let (temperature, humidity) = self.climate.read_climate()?;
        let is_dark = self
            .light
            .is_high()
            .map_err(|err| SensorError::LightInput(format!("{:?}", err.kind())))?;

        SensorReading::new(temperature, humidity, is_dark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LightPin;

    struct FixedClimate(f32, f32);

    impl HumiditySensor for FixedClimate {
        fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
            Ok((self.0, self.1))
        }
    }

    struct BrokenBus;

    impl HumiditySensor for BrokenBus {
        fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
            Err(SensorError::Bus("timeout".to_string()))
        }
    }

    #[test]
    fn high_light_pin_reads_as_dark() {
        let mut sensor = ClimateSensor::new(FixedClimate(24.5, 61.2), LightPin(true));
        let reading = sensor.read().unwrap();

        assert_eq!(reading.temperature, 24.5);
        assert_eq!(reading.humidity, 61.2);
        assert!(reading.is_dark);

        let mut sensor = ClimateSensor::new(FixedClimate(24.5, 61.2), LightPin(false));
        assert!(!sensor.read().unwrap().is_dark);
    }

    #[test]
    fn nan_in_either_value_discards_reading() {
        let mut sensor = ClimateSensor::new(FixedClimate(f32::NAN, 50.0), LightPin(false));
        assert!(matches!(
            sensor.read(),
            Err(SensorError::NotANumber { .. })
        ));

        let mut sensor = ClimateSensor::new(FixedClimate(21.0, f32::NAN), LightPin(false));
        assert!(matches!(
            sensor.read(),
            Err(SensorError::NotANumber { .. })
        ));
    }

    #[test]
    fn bus_failure_is_propagated() {
        let mut sensor = ClimateSensor::new(BrokenBus, LightPin(false));
        assert_eq!(
            sensor.read(),
            Err(SensorError::Bus("timeout".to_string()))
        );
    }
}
