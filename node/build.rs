use std::env;

fn main() -> anyhow::Result<()> {
    if env::var_os("CARGO_FEATURE_ESP32").is_some() {
        // https://github.com/rust-lang/cargo/issues/9641
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    }

    // Baked into the default config via option_env!.
    for var in ["WIFI_SSID", "WIFI_PASS", "WS_HOST"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    Ok(())
}
