// Configuration file handling.

use ekey_gateway::config::{Config, FlowControl, Parity};
use ekey_gateway::dispatch::DeviceRegistry;
use ekey_gateway::protocol::Protocol;
use tempfile::tempdir;

#[tokio::test]
async fn default_file_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    Config::create_default(path).await.unwrap();
    let config = Config::load(path).await.unwrap();

    assert!(config.udp.enabled);
    assert_eq!(config.udp.port, 56000);
    assert!(!config.serial.enabled);
    assert_eq!(config.serial.baud_rate, 9600);
    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].protocol, Protocol::Home);
}

#[tokio::test]
async fn full_file_is_parsed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(
        &path,
        r#"
[udp]
bind_address = "127.0.0.1"
port = 56001

[serial]
enabled = true
port = "/dev/ttyAMA0"
baud_rate = 19200
data_bits = 7
parity = "even"
stop_bits = 2
flow_control = "xon"
timeout_ms = 1500

[[devices]]
ip = "10.0.0.10"
protocol = "MULTI"

[[devices]]
ip = "10.0.0.11"
protocol = "net"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = Config::load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(config.udp.port, 56001);
    assert_eq!(config.serial.data_bits, 7);
    assert_eq!(config.serial.parity, Parity::Even);
    assert_eq!(config.serial.flow_control, FlowControl::Xon);
    assert_eq!(config.serial.idle_timeout().as_millis(), 1500);
    assert_eq!(config.logging.file, None);

    let registry = DeviceRegistry::from_config(&config.devices).unwrap();
    assert_eq!(
        registry.protocol_for(&"10.0.0.11".parse().unwrap()),
        Some(Protocol::Net)
    );
    assert_eq!(registry.protocol_for(&"10.0.0.12".parse().unwrap()), None);
}

#[tokio::test]
async fn invalid_files_are_rejected() {
    let dir = tempdir().unwrap();
    let cases = [
        ("missing.toml", None),
        ("syntax.toml", Some("[udp\nport = 1")),
        (
            "protocol.toml",
            Some("[[devices]]\nip = \"10.0.0.1\"\nprotocol = \"TCP\"\n"),
        ),
        ("stopbits.toml", Some("[serial]\nstop_bits = 3\n")),
    ];
    for (name, content) in cases {
        let path = dir.path().join(name);
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        assert!(
            Config::load(path.to_str().unwrap()).await.is_err(),
            "{} should fail",
            name
        );
    }
}
