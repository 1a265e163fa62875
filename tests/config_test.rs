use anyhow::Result;
use rust_solar_scada::config::Config;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let mut config = Config::default();
    config.visualization.port = 8081;
    config.visualization.address = "192.168.1.1".to_string();
    config.modbus.enabled = true;
    config.modbus.port = 1502;
    config.uplink.device_id = "SOLAR-GW-042".to_string();

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;

    // Verify loaded config matches original
    assert_eq!(loaded_config.visualization.port, 8081);
    assert_eq!(loaded_config.visualization.address, "192.168.1.1");
    assert!(loaded_config.modbus.enabled);
    assert_eq!(loaded_config.modbus.port, 1502);
    assert_eq!(loaded_config.uplink.device_id, "SOLAR-GW-042");

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created
    assert!(non_existent_path.exists());
    assert_eq!(default_config.visualization.port, 8080);
    assert_eq!(default_config.visualization.address, "127.0.0.1");
    assert_eq!(default_config.acquisition.fast_interval_ms, 1000);
    assert_eq!(default_config.acquisition.slow_interval_ms, 5000);
    assert_eq!(default_config.acquisition.calibration_secs, 120);
    assert_eq!(default_config.metering.voltage_nominal_v, 220.0);
    assert!(!default_config.modbus.enabled);
    assert!(!default_config.uplink.enabled);

    Ok(())
}

#[test]
fn test_partial_config_uses_section_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Only the modbus section is given; everything else must default
    std::fs::write(
        &config_path,
        "modbus:\n  enabled: true\n  port: 1502\n  address: \"0.0.0.0\"\n",
    )?;

    let config = Config::from_file(&config_path)?;
    assert!(config.modbus.enabled);
    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.acquisition.fault_threshold, 5);

    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.visualization.address, "127.0.0.1");

    // Apply command-line arguments
    config.apply_args(
        Some(9000),
        Some("192.168.0.1".to_string()),
        Some(true),
        Some("0.0.0.0".to_string()),
        Some(1502),
        Some("http://collector.invalid/api/energy-data".to_string()),
        Some("SOLAR-GW-007".to_string()),
    );

    // Verify values were overridden
    assert_eq!(config.visualization.port, 9000);
    assert_eq!(config.visualization.address, "192.168.0.1");
    assert!(config.modbus.enabled);
    assert_eq!(config.modbus.address, "0.0.0.0");
    assert_eq!(config.modbus.port, 1502);
    // Supplying a collector URL enables the uplink
    assert!(config.uplink.enabled);
    assert_eq!(config.uplink.device_id, "SOLAR-GW-007");

    // Absent arguments leave the configuration untouched
    let mut untouched = Config::default();
    untouched.apply_args(None, None, None, None, None, None, None);
    assert_eq!(untouched.visualization.port, 8080);
    assert!(!untouched.uplink.enabled);
}

#[test]
fn test_config_validation() {
    // Default config is valid
    let valid_config = Config::default();
    assert!(valid_config.validate().is_ok());

    // Invalid bind address
    let mut bad_address = Config::default();
    bad_address.visualization.address = "not-an-ip".to_string();
    assert!(bad_address.validate().is_err());

    // Fast cadence slower than the slow cadence
    let mut bad_cadence = Config::default();
    bad_cadence.acquisition.fast_interval_ms = 10_000;
    assert!(bad_cadence.validate().is_err());

    // Zero fault threshold would never escalate to FAULT
    let mut bad_threshold = Config::default();
    bad_threshold.acquisition.fault_threshold = 0;
    assert!(bad_threshold.validate().is_err());

    // Enabled uplink requires a well-formed collector URL
    let mut bad_uplink = Config::default();
    bad_uplink.uplink.enabled = true;
    bad_uplink.uplink.collector_url = "not a url".to_string();
    assert!(bad_uplink.validate().is_err());

    // The same URL is fine while the uplink stays disabled
    let mut disabled_uplink = Config::default();
    disabled_uplink.uplink.collector_url = "not a url".to_string();
    assert!(disabled_uplink.validate().is_ok());
}

#[test]
fn test_invalid_yaml_produces_sample_config() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // An unknown section must be rejected by the schema
    std::fs::write(&config_path, "bogus_section:\n  key: 1\n")?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(temp_dir.path().join("config.sample.yaml").exists());

    Ok(())
}
