use std::env;
use std::error::Error;

use dotenv::dotenv;
use modbus_drift::common::logger::init_logger;
use modbus_drift::common::setting::Settings;
use modbus_drift::driver::modbus::dummy_transport::DummyTransport;
use modbus_drift::driver::modbus::link::ModbusLink;
use modbus_drift::driver::modbus::modbus_tcp::ModbusTcpTransport;
use modbus_drift::driver::modbus::traits::ModbusTransport;
use modbus_drift::entity::po::device_config_po::DriftConfigPo;
use modbus_drift::{debug, info, Drift};

const LOG_TAG: &str = "main";

/// Read devices once and print them.
/// Usage: `modbus-drift [device ...]`, every device of the topology when none is given.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // load .env if present
    dotenv().ok();

    let settings = Settings::get();

    init_logger()?;
    info!(LOG_TAG, "settings loaded, env: {}", settings.env.env);
    debug!(LOG_TAG, "settings: {:?}", settings);

    let config = DriftConfigPo::from_file(&settings.drift.topology)?;
    let transport: Box<dyn ModbusTransport> = if settings.drift.is_dummy() {
        info!(LOG_TAG, "dummy mode, modbus server at {} will not be contacted", config.address);
        Box::new(DummyTransport::new())
    } else {
        Box::new(ModbusTcpTransport::with_unit(&config.address, config.port, config.unit_id))
    };
    let link = ModbusLink::new(&config.address, config.port, transport).with_connect_timeout(settings.drift.connect_timeout());
    let drift = Drift::from_config_with_link(&config, link)?;

    let mut names: Vec<String> = env::args().skip(1).collect();
    if names.is_empty() {
        names = drift.devices().iter().map(|device| device.qualified_name()).collect();
        names.sort();
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let readings = drift.read_devices(&refs, true).await?;
    for (name, (value, unit)) in names.iter().zip(readings) {
        match unit {
            Some(unit) => println!("{}: {} {}", name, value, unit),
            None => println!("{}: {}", name, value),
        }
    }
    Ok(())
}
