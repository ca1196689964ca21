//! Activity LED control
//!
//! The node has three single-colour LEDs: red while booting, blue while a
//! reading is taken and green while a tone sounds.

use crate::NodeError;
use embedded_hal::digital::OutputPin;

/// One activity LED on a GPIO output
pub struct ActivityLed<P>
where
    P: OutputPin,
{
    pin: P,
    lit: bool,
}

impl<P> ActivityLed<P>
where
    P: OutputPin,
{
    /// Wrap `pin`, starting dark
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: true };
        led.off().ok(); // Silent error handling
        led
    }

    pub fn set(&mut self, on: bool) -> Result<(), NodeError> {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| NodeError::IndicatorError)?;
        self.lit = on;
        Ok(())
    }

    pub fn on(&mut self) -> Result<(), NodeError> {
        self.set(true)
    }

    pub fn off(&mut self) -> Result<(), NodeError> {
        self.set(false)
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Output pin that remembers its level
    #[derive(Default)]
    pub(crate) struct FakePin {
        pub high: bool,
        pub toggles: usize,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.toggles += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.toggles += 1;
            Ok(())
        }
    }

    #[test]
    fn starts_dark() {
        let led = ActivityLed::new(FakePin {
            high: true,
            toggles: 0,
        });
        assert!(!led.is_lit());
        assert!(!led.pin.high);
    }

    #[test]
    fn follows_set() {
        let mut led = ActivityLed::new(FakePin::default());
        led.on().unwrap();
        assert!(led.is_lit() && led.pin.high);
        led.off().unwrap();
        assert!(!led.is_lit() && !led.pin.high);
    }
}
