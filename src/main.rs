#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pin, Pull};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};

// Standard library imports
extern crate alloc;

// WiFi imports
use esp_wifi::wifi;

// Embassy imports
use embassy_executor::Spawner;
use embassy_net::{Config, Runner, Stack, StackResources};
use esp_hal_embassy::Executor;
use static_cell::StaticCell;

// Import our library modules
use light_orchestra_node::board::{AdcLightSensor, LedcBuzzer};
use light_orchestra_node::indicator::ActivityLed;
use light_orchestra_node::router::{DeviceInfo, Router};
use light_orchestra_node::sampler::{SamplerConfig, SensorSampler};
use light_orchestra_node::sequencer::{ToneControl, ToneSequencer};
use light_orchestra_node::server::HttpServer;
use light_orchestra_node::wifi::WiFiManager;
use light_orchestra_node::{VERSION, config};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

type NodeRouter = Router<'static, AdcLightSensor, Input<'static>, Output<'static>>;
type NodeSequencer = ToneSequencer<'static, LedcBuzzer, Output<'static>>;

// Static cells for embassy components
static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

// Mailbox between the HTTP router and the tone sequencer
static TONE_CONTROL: ToneControl = ToneControl::new();

// Static executor for embassy tasks
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    esp_println::println!("[MAIN] PANIC: {}", info);
    loop {}
}

/// Startup cannot continue; stop here
fn fatal(stage: &str, error: impl core::fmt::Debug) -> ! {
    error!("[MAIN] {} failed: {:?}", stage, error);
    panic!("{} failed", stage);
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, wifi::WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Plays melodies queued by the router
#[embassy_executor::task]
async fn tone_task(mut sequencer: NodeSequencer) -> ! {
    sequencer.run().await
}

/// Rejoins the network whenever the link drops
#[embassy_executor::task]
async fn wifi_task(mut wifi_manager: WiFiManager<'static>) -> ! {
    wifi_manager.maintain().await
}

/// Joins the network, then serves HTTP for the life of the node
#[embassy_executor::task]
async fn app_task(
    spawner: Spawner,
    mut wifi_manager: WiFiManager<'static>,
    stack: Stack<'static>,
    mut router: NodeRouter,
    mut boot_led: ActivityLed<Output<'static>>,
) {
    let address = match wifi_manager
        .connect(config::WIFI_SSID, config::WIFI_PASSWORD)
        .await
    {
        Ok(address) => address,
        Err(e) => fatal("WiFi association", e),
    };
    spawner.spawn(wifi_task(wifi_manager)).ok();

    let mut server = HttpServer::new(stack);
    if let Err(e) = server.bind(config::HTTP_PORT) {
        fatal("HTTP bind", e);
    }

    boot_led.off().ok(); // Silent error handling
    info!(
        "[MAIN] Node '{}' serving on http://{}:{}/",
        router.device().device_id,
        address,
        server.port()
    );

    if let Err(e) = server.serve(&mut router).await {
        error!("[HTTP] Server stopped: {:?}", e);
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    info!("[MAIN] Light orchestra node v{} starting", VERSION);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Red stays lit until the node is reachable
    let mut boot_led = ActivityLed::new(Output::new(
        peripherals.GPIO7,
        Level::Low,
        OutputConfig::default(),
    ));
    boot_led.on().ok();

    // Initialize WiFi driver
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;
    let wifi_init = esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK)
        .unwrap_or_else(|e| fatal("WiFi driver init", e));
    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);

    let (wifi_controller, wifi_interfaces) = wifi::new(wifi_init_ref, peripherals.WIFI)
        .unwrap_or_else(|e| fatal("WiFi controller", e));
    info!("[WIFI] WiFi driver initialized");

    // Create embassy-net stack with DHCP configuration
    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        stack_resources,
        seed,
    );
    let wifi_manager = WiFiManager::new(wifi_controller, stack);

    // Sensor side: ADC, record button, blue LED
    let sensor = AdcLightSensor::new(peripherals.ADC1, peripherals.GPIO2);
    let trigger = Input::new(
        peripherals.GPIO6,
        InputConfig::default().with_pull(Pull::Down),
    );
    let blue_led = Output::new(peripherals.GPIO10, Level::Low, OutputConfig::default());
    let sampler = SensorSampler::new(sensor, trigger, blue_led, SamplerConfig::default());
    info!(
        "[SENSOR] Sampler ready (ADC GPIO{}, trigger GPIO{})",
        config::SENSOR_ADC_PIN,
        config::TRIGGER_PIN
    );

    // Tone side: LEDC buzzer, green LED
    let buzzer = LedcBuzzer::new(peripherals.LEDC, peripherals.GPIO5.degrade());
    let green_led = Output::new(peripherals.GPIO8, Level::Low, OutputConfig::default());
    let sequencer = ToneSequencer::new(buzzer, green_led, &TONE_CONTROL);
    info!("[TONE] Buzzer ready on GPIO{}", config::BUZZER_PIN);

    let router = Router::new(sampler, TONE_CONTROL.handle(), DeviceInfo::default());

    // Initialize embassy executor and run tasks
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        info!("[MAIN] Spawning network task...");
        spawner.spawn(net_task(runner)).ok();

        info!("[MAIN] Spawning tone task...");
        spawner.spawn(tone_task(sequencer)).ok();

        info!("[MAIN] Spawning application task...");
        spawner
            .spawn(app_task(spawner, wifi_manager, stack, router, boot_led))
            .ok();
    });
}
