//! Request routing
//!
//! Maps `(method, path)` onto the sampler and the tone sequencer and builds
//! the JSON response. Routing never touches the network itself.

use crate::config;
use crate::http::{HttpRequest, HttpResponse, Method, Status};
use crate::melody::Melody;
use crate::sampler::{LightSensor, SensorSampler};
use crate::sequencer::SequencerHandle;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};
use serde::Serialize;

const MELODY_STARTED: &str = "Note playing started.";
const SOUNDS_STOPPED: &str = "All sounds stopped.";

/// Identity reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: &'static str,
    pub api_version: &'static str,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_id: config::DEVICE_ID,
            api_version: config::API_VERSION,
        }
    }
}

#[derive(Serialize)]
struct SensorBody<'r> {
    raw_data_array: &'r [u32],
    raw_data_length: usize,
}

#[derive(Serialize)]
struct HealthBody<'r> {
    status: &'r str,
    device_id: &'r str,
    api: &'r str,
}

#[derive(Serialize)]
struct StatusBody<'r> {
    status: &'r str,
    message: &'r str,
}

#[derive(Serialize)]
struct ErrorBody<'r> {
    error: &'r str,
}

/// Dispatches parsed requests
pub struct Router<'a, S, T, L>
where
    S: LightSensor,
    T: InputPin,
    L: OutputPin,
{
    sampler: SensorSampler<S, T, L>,
    tone: SequencerHandle<'a>,
    device: DeviceInfo,
}

impl<'a, S, T, L> Router<'a, S, T, L>
where
    S: LightSensor,
    T: InputPin,
    L: OutputPin,
{
    pub fn new(
        sampler: SensorSampler<S, T, L>,
        tone: SequencerHandle<'a>,
        device: DeviceInfo,
    ) -> Self {
        Self {
            sampler,
            tone,
            device,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Handle one request. `/sensor` holds the caller for the sampling window.
    pub async fn dispatch(&mut self, request: &HttpRequest<'_>) -> HttpResponse {
        match (request.method, request.path) {
            (Method::Get, "/sensor") => self.sensor().await,
            (Method::Get, "/health") => self.health(),
            (Method::Post, "/melody") => self.melody(request.body),
            (Method::Post, "/stop") => self.stop(),
            (method, path) => {
                info!("[ROUTER] No route for {:?} {}", method, path);
                HttpResponse::empty(Status::NotFound)
            }
        }
    }

    async fn sensor(&mut self) -> HttpResponse {
        // The light sensor and the buzzer are never driven together
        if self.tone.is_busy() {
            info!("[ROUTER] Sequencer busy ({:?}), returning no readings", self.tone.state());
            return HttpResponse::json(
                Status::Ok,
                &SensorBody {
                    raw_data_array: &[],
                    raw_data_length: 0,
                },
            );
        }

        let sampling = self.sampler.sample_window().await;
        HttpResponse::json(
            Status::Ok,
            &SensorBody {
                raw_data_array: sampling.readings(),
                raw_data_length: sampling.count(),
            },
        )
    }

    fn health(&self) -> HttpResponse {
        HttpResponse::json(
            Status::Ok,
            &HealthBody {
                status: "ok",
                device_id: self.device.device_id,
                api: self.device.api_version,
            },
        )
    }

    fn melody(&mut self, body: &[u8]) -> HttpResponse {
        let melody = match Melody::from_json(body) {
            Ok(melody) => melody,
            Err(e) => {
                warn!("[ROUTER] Rejected melody: {:?}", e);
                return HttpResponse::json(Status::BadRequest, &ErrorBody { error: e.message() });
            }
        };

        if melody.is_empty() {
            return self.stop();
        }

        info!("[ROUTER] Queued melody of {} notes", melody.len());
        self.tone.play(melody);
        HttpResponse::json(
            Status::Ok,
            &StatusBody {
                status: "ok",
                message: MELODY_STARTED,
            },
        )
    }

    fn stop(&mut self) -> HttpResponse {
        self.tone.stop();
        HttpResponse::json(
            Status::Ok,
            &StatusBody {
                status: "ok",
                message: SOUNDS_STOPPED,
            },
        )
    }
}
