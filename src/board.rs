//! ESP32-C3 peripheral bindings
//!
//! Light sensor on ADC1 and the buzzer on an LEDC low-speed channel.

use crate::quantizer::{Reading, map_value};
use crate::sampler::LightSensor;
use crate::sequencer::Buzzer;
use crate::{NodeError, config};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::gpio::AnyPin;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::{ADC1, GPIO2, LEDC};
use esp_hal::time::Rate;
use log::{debug, warn};

/// Full scale of a 12-bit ADC conversion
const ADC_MAX: u32 = 4095;

/// Photoresistor divider on GPIO2 (ADC1 channel 2)
pub struct AdcLightSensor {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    pin: AdcPin<GPIO2<'static>, ADC1<'static>>,
}

impl AdcLightSensor {
    pub fn new(adc1: ADC1<'static>, pin: GPIO2<'static>) -> Self {
        let mut adc_config = AdcConfig::new();
        let pin = adc_config.enable_pin(pin, Attenuation::_11dB);
        let adc = Adc::new(adc1, adc_config);
        debug!("[SENSOR] ADC1 ready on GPIO{}", config::SENSOR_ADC_PIN);
        Self { adc, pin }
    }
}

impl LightSensor for AdcLightSensor {
    fn read(&mut self) -> Result<Reading, NodeError> {
        let raw = loop {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(value) => break value,
                Err(nb::Error::WouldBlock) => continue,
                Err(nb::Error::Other(_)) => return Err(NodeError::SensorError),
            }
        };

        // Stretch the 12-bit conversion over the 16-bit reading range
        Ok(map_value(raw as u32, 0, ADC_MAX, 0, config::RAW_MAX as u32) as Reading)
    }
}

/// Passive buzzer on an LEDC channel.
///
/// The timer and channel are reprogrammed on every change, so frequency and
/// duty always come from this struct's fields.
pub struct LedcBuzzer {
    ledc: Ledc<'static>,
    pin: AnyPin<'static>,
    frequency: Rate,
}

impl LedcBuzzer {
    pub fn new(ledc: LEDC<'static>, pin: AnyPin<'static>) -> Self {
        let mut ledc = Ledc::new(ledc);
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
        Self {
            ledc,
            pin,
            frequency: Rate::from_hz(config::SCALE_NOTES_HZ[0]),
        }
    }

    fn drive(&mut self, duty_percent: u8) -> Result<(), NodeError> {
        let mut lstimer = self.ledc.timer::<LowSpeed>(timer::Number::Timer0);
        lstimer
            .configure(timer::config::Config {
                duty: timer::config::Duty::Duty10Bit,
                clock_source: timer::LSClockSource::APBClk,
                frequency: self.frequency,
            })
            .map_err(|e| {
                warn!("[TONE] LEDC timer rejected {:?}: {:?}", self.frequency, e);
                NodeError::ActuatorError
            })?;

        let mut channel = self
            .ledc
            .channel(channel::Number::Channel0, self.pin.reborrow());
        channel
            .configure(channel::config::Config {
                timer: &lstimer,
                duty_pct: duty_percent,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .map_err(|e| {
                warn!("[TONE] LEDC channel error: {:?}", e);
                NodeError::ActuatorError
            })
    }
}

impl Buzzer for LedcBuzzer {
    fn set_frequency(&mut self, hz: u32) -> Result<(), NodeError> {
        if hz == 0 {
            return Err(NodeError::ActuatorError);
        }
        self.frequency = Rate::from_hz(hz);
        Ok(())
    }

    fn enable(&mut self, duty_percent: u8) -> Result<(), NodeError> {
        self.drive(duty_percent.min(100))
    }

    fn disable(&mut self) -> Result<(), NodeError> {
        self.drive(0)
    }
}
