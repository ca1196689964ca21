fn main() {
    // Load .env file for WiFi and device identity configuration
    load_env_config();

    // Linker setup only applies to the firmware build; host tests link normally
    if std::env::var_os("CARGO_FEATURE_ESP32C3").is_some() {
        linker_be_nice();
        // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
        println!("cargo:rustc-link-arg=-Tlinkall.x");
    }
}

/// Read a trimmed variable, falling back to `default` when unset or empty
fn env_or(name: &str, default: &str) -> String {
    let value = std::env::var(name)
        .unwrap_or_else(|_| String::new())
        .trim()
        .to_string();
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Load environment configuration from .env file
/// Environment variables take priority over .env file values
fn load_env_config() {
    use std::path::Path;

    // Tell cargo to rerun this build script if .env file changes
    println!("cargo:rerun-if-changed=.env");

    // Tell cargo to rerun if environment variables change
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=DEVICE_ID");

    // Try to load .env file if it exists
    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => println!("cargo:warning=Loaded .env file"),
            Err(e) => println!("cargo:warning=Failed to load .env file: {}", e),
        }
    }

    // Note: We need to handle the case where env vars are set to empty strings
    let wifi_ssid = env_or("WIFI_SSID", "");
    let wifi_password = env_or("WIFI_PASSWORD", "");
    let device_id = env_or("DEVICE_ID", "light-orchestra-node");

    // Set environment variables for the compilation
    println!("cargo:rustc-env=WIFI_SSID={}", wifi_ssid);
    println!("cargo:rustc-env=WIFI_PASSWORD={}", wifi_password);
    println!("cargo:rustc-env=DEVICE_ID={}", device_id);

    // Only nag about credentials when building firmware
    if std::env::var_os("CARGO_FEATURE_ESP32C3").is_none() {
        return;
    }

    if wifi_ssid.is_empty() {
        println!("cargo:warning=WIFI_SSID is empty - node will fail to join a network");
    } else {
        println!("cargo:warning=WIFI_SSID configured: {}", wifi_ssid);
    }

    if wifi_password.is_empty() {
        println!("cargo:warning=WIFI_PASSWORD is empty - assuming an open network");
    } else {
        println!("cargo:warning=WIFI_PASSWORD configured (length: {})", wifi_password.len());
    }

    println!("cargo:warning=DEVICE_ID: {}", device_id);
}

fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_wifi_preempt_enable"
                | "esp_wifi_preempt_yield_task"
                | "esp_wifi_preempt_task_create" => {
                    eprintln!();
                    eprintln!("💡 `esp-wifi` has no scheduler enabled. Make sure you have the `builtin-scheduler` feature enabled, or that you provide an external scheduler.");
                    eprintln!();
                }
                "__esp_hal_embassy_time_driver" | "_embassy_time_now" => {
                    eprintln!();
                    eprintln!("💡 No embassy time driver linked - make sure `esp_hal_embassy::init` is called before using timers");
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
