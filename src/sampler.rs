//! Light sensor sampling module
//!
//! Runs one timed acquisition window when the record button is held and
//! returns the readings in the order they were taken.

use crate::indicator::ActivityLed;
use crate::quantizer::{Reading, Scale, scale_reading};
use crate::{NodeError, config};
use embassy_time::{Duration, Instant, Ticker};
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use log::{debug, info, warn};

/// Shortest interval accepted between two reads
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Source of light readings in the full 16-bit range
pub trait LightSensor {
    fn read(&mut self) -> Result<Reading, NodeError>;
}

/// What a sampled value represents when it leaves the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorOutput {
    /// The 16-bit reading as taken
    Raw,
    /// Reading mapped onto `0..=SCALED_MAX`, quantized by the conductor
    Scaled,
    /// Reading already quantized to a note frequency on the node
    Notes,
}

/// Sampler settings
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub window: Duration,
    pub interval: Duration,
    pub output: SensorOutput,
    pub scale: Scale,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window: config::SAMPLE_WINDOW,
            interval: config::SAMPLE_INTERVAL,
            output: SensorOutput::Scaled,
            scale: Scale::default(),
        }
    }
}

/// Readings captured in one window together with their count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sampling {
    readings: Vec<u32, { config::MAX_READINGS }>,
    count: usize,
}

impl Sampling {
    pub fn readings(&self) -> &[u32] {
        &self.readings
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn push(&mut self, value: u32) -> Result<(), u32> {
        self.readings.push(value)?;
        self.count += 1;
        Ok(())
    }
}

/// Drives the light sensor through an acquisition window
pub struct SensorSampler<S, T, L>
where
    S: LightSensor,
    T: InputPin,
    L: OutputPin,
{
    sensor: S,
    trigger: T,
    led: ActivityLed<L>,
    config: SamplerConfig,
}

impl<S, T, L> SensorSampler<S, T, L>
where
    S: LightSensor,
    T: InputPin,
    L: OutputPin,
{
    pub fn new(sensor: S, trigger: T, led: L, config: SamplerConfig) -> Self {
        Self {
            sensor,
            trigger,
            led: ActivityLed::new(led),
            config,
        }
    }

    /// Whether the record button is held
    pub fn is_triggered(&mut self) -> bool {
        match self.trigger.is_high() {
            Ok(active) => active,
            Err(_) => {
                warn!("[SENSOR] Failed to read trigger pin, treating as released");
                false
            }
        }
    }

    /// Sample with the configured window and interval
    pub async fn sample_window(&mut self) -> Sampling {
        let (window, interval) = (self.config.window, self.config.interval);
        self.sample(window, interval).await
    }

    /// Read the sensor every `interval` until `window` has elapsed.
    ///
    /// Returns nothing if the trigger is released at entry. The window is a
    /// hard bound: the last read happens before the deadline and no wait
    /// extends past it. A sensor fault or a full buffer ends the window early.
    pub async fn sample(&mut self, window: Duration, interval: Duration) -> Sampling {
        let mut sampling = Sampling::default();

        if !self.is_triggered() {
            debug!("[SENSOR] Trigger inactive, nothing sampled");
            return sampling;
        }

        let interval = interval.max(MIN_INTERVAL);
        let deadline = Instant::now() + window;
        let mut ticker = Ticker::every(interval);

        info!(
            "[SENSOR] Sampling for {} ms every {} ms",
            window.as_millis(),
            interval.as_millis()
        );

        while Instant::now() < deadline {
            self.led.on().ok(); // Silent error handling
            let reading = self.sensor.read();
            self.led.off().ok();

            let reading = match reading {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("[SENSOR] Sensor read failed: {:?}", e);
                    break;
                }
            };

            if sampling.push(self.convert(reading)).is_err() {
                warn!("[SENSOR] Reading buffer full after {} samples", sampling.count());
                break;
            }

            if Instant::now() + interval > deadline {
                break;
            }
            ticker.next().await;
        }

        info!("[SENSOR] Captured {} readings", sampling.count());
        sampling
    }

    fn convert(&self, raw: Reading) -> u32 {
        match self.config.output {
            SensorOutput::Raw => raw as u32,
            SensorOutput::Scaled => scale_reading(raw) as u32,
            SensorOutput::Notes => self.config.scale.classify(scale_reading(raw)).frequency_hz,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indicator::tests::FakePin;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_hal::digital::ErrorType;

    /// Sensor returning a fixed script of readings, then repeating the last
    pub(crate) struct ScriptedSensor {
        pub script: &'static [Reading],
        pub reads: usize,
        pub fail_after: Option<usize>,
    }

    impl ScriptedSensor {
        pub fn new(script: &'static [Reading]) -> Self {
            Self {
                script,
                reads: 0,
                fail_after: None,
            }
        }
    }

    impl LightSensor for ScriptedSensor {
        fn read(&mut self) -> Result<Reading, NodeError> {
            if self.fail_after == Some(self.reads) {
                return Err(NodeError::SensorError);
            }
            let index = self.reads.min(self.script.len() - 1);
            self.reads += 1;
            Ok(self.script[index])
        }
    }

    pub(crate) struct Button(pub bool);

    impl ErrorType for Button {
        type Error = Infallible;
    }

    impl InputPin for Button {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    fn sampler(
        pressed: bool,
        output: SensorOutput,
    ) -> SensorSampler<ScriptedSensor, Button, FakePin> {
        let config = SamplerConfig {
            output,
            ..SamplerConfig::default()
        };
        SensorSampler::new(
            ScriptedSensor::new(&[0, 32768, 65535]),
            Button(pressed),
            FakePin::default(),
            config,
        )
    }

    #[test]
    fn released_trigger_returns_nothing() {
        let mut sampler = sampler(false, SensorOutput::Raw);
        let sampling = block_on(sampler.sample(
            Duration::from_millis(50),
            Duration::from_millis(5),
        ));
        assert!(sampling.is_empty());
        assert_eq!(sampling.count(), sampling.readings().len());
        assert_eq!(sampler.sensor.reads, 0);
    }

    #[test]
    fn count_matches_readings() {
        let mut sampler = sampler(true, SensorOutput::Raw);
        let sampling = block_on(sampler.sample(
            Duration::from_millis(100),
            Duration::from_millis(10),
        ));
        assert!(!sampling.is_empty());
        assert!(sampling.count() <= 10);
        assert_eq!(sampling.count(), sampling.readings().len());
        assert_eq!(sampling.count(), sampler.sensor.reads);
        assert_eq!(&sampling.readings()[..3], &[0, 32768, 65535]);
    }

    #[test]
    fn window_is_a_hard_bound() {
        let mut sampler = sampler(true, SensorOutput::Raw);
        let start = Instant::now();
        block_on(sampler.sample(Duration::from_millis(60), Duration::from_millis(25)));
        assert!(start.elapsed() <= Duration::from_millis(60));
    }

    #[test]
    fn scaled_and_note_outputs() {
        let mut scaled = sampler(true, SensorOutput::Scaled);
        let sampling = block_on(scaled.sample(
            Duration::from_millis(40),
            Duration::from_millis(10),
        ));
        assert_eq!(&sampling.readings()[..3], &[0, 349, 699]);

        let mut notes = sampler(true, SensorOutput::Notes);
        let sampling = block_on(notes.sample(Duration::from_millis(40), Duration::from_millis(10)));
        assert_eq!(&sampling.readings()[..3], &[262, 349, 494]);
    }

    #[test]
    fn sensor_fault_ends_window_consistently() {
        let mut sampler = sampler(true, SensorOutput::Raw);
        sampler.sensor.fail_after = Some(2);
        let sampling = block_on(sampler.sample(
            Duration::from_millis(200),
            Duration::from_millis(5),
        ));
        assert_eq!(sampling.count(), 2);
        assert_eq!(sampling.readings().len(), 2);
        assert!(!sampler.led.is_lit());
    }
}
