use std::sync::Arc;
use std::time::Duration;

use log::Level;
use regex::Regex;

use super::*;
use crate::error::{Error, TransportError};
use crate::logging::CaptureLog;
use crate::test_support::{DeviceConfig, FakeDevice};

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn builder(device: &FakeDevice) -> SessionBuilder {
    SessionBuilder::new("127.0.0.1")
        .transports([TransportKind::Telnet])
        .telnet_port(device.port())
        .timeout(Duration::from_secs(2))
}

fn credentials() -> Credentials {
    Credentials::new("admin", "cisco")
}

async fn connect(device: &FakeDevice) -> Session {
    let mut session = builder(device).build().unwrap();
    session.open(credentials()).await.unwrap();
    device.clear_commands();
    session
}

/// Connected and already in privileged mode, with the command log cleared.
async fn connect_privileged(device: &FakeDevice) -> Session {
    let mut session = connect(device).await;
    session.ensure_mode(Mode::Privileged).await.unwrap();
    device.clear_commands();
    session
}

#[tokio::test]
async fn test_open_falls_back_to_telnet() {
    let device = FakeDevice::start().await;
    let capture = Arc::new(CaptureLog::default());
    let mut session = SessionBuilder::new("127.0.0.1")
        .transports([TransportKind::Ssh, TransportKind::Telnet])
        .ssh_port(closed_port().await)
        .telnet_port(device.port())
        .timeout(Duration::from_secs(2))
        .logger(capture.clone())
        .build()
        .unwrap();

    session.open(credentials()).await.unwrap();

    assert!(session.is_open());
    assert_eq!(session.transport_kind(), Some(TransportKind::Telnet));
    assert_eq!(session.mode(), &Mode::Unknown);
    assert!(capture.contains(Level::Debug, "ssh transport failed"));
    assert!(capture.contains(Level::Debug, "Opening session as admin"));
}

#[tokio::test]
async fn test_open_fails_when_every_transport_fails() {
    let port = closed_port().await;
    let mut session = SessionBuilder::new("127.0.0.1")
        .ssh_port(port)
        .telnet_port(port)
        .build()
        .unwrap();

    let err = session.open(credentials()).await.unwrap_err();

    assert!(err.is_transport_unavailable());
    assert!(!session.is_open());
    assert_eq!(session.transport_kind(), None);
    assert_eq!(session.mode(), &Mode::Unknown);
}

#[tokio::test]
async fn test_open_rejects_bad_login() {
    let device = FakeDevice::start().await;
    let mut session = builder(&device).build().unwrap();

    let err = session
        .open(Credentials::new("admin", "wrong"))
        .await
        .unwrap_err();

    match err {
        Error::Session(SessionError::TransportUnavailable { attempts, .. }) => {
            assert_eq!(attempts.len(), 1);
            assert!(attempts[0].contains("Authentication failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_open_twice() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;
    assert!(matches!(
        session.open(credentials()).await.unwrap_err(),
        Error::Session(SessionError::AlreadyConnected)
    ));
    assert!(session.is_open());
}

#[tokio::test]
async fn test_get_mode_follows_prompt() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    assert_eq!(session.get_mode().await.unwrap(), Mode::User);

    session.ensure_mode(Mode::Privileged).await.unwrap();
    assert_eq!(session.get_mode().await.unwrap(), Mode::Privileged);

    session.ensure_mode(Mode::Configuration).await.unwrap();
    assert_eq!(session.get_mode().await.unwrap(), Mode::Configuration);

    session.run("interface Gi1/0/1").await.unwrap();
    assert_eq!(
        session.get_mode().await.unwrap(),
        Mode::Named("config-if".to_string())
    );
    assert_eq!(session.mode(), &Mode::Named("config-if".to_string()));
}

#[tokio::test]
async fn test_enable_from_user_mode() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    session.ensure_mode(Mode::Privileged).await.unwrap();

    assert_eq!(device.commands(), vec!["", "", "enable", "cisco"]);
    assert_eq!(session.mode(), &Mode::Privileged);
}

#[tokio::test]
async fn test_enable_without_secret() {
    let device = FakeDevice::start_with(DeviceConfig {
        enable_secret: None,
        ..DeviceConfig::default()
    })
    .await;
    let mut session = connect(&device).await;

    session.ensure_mode(Mode::Privileged).await.unwrap();

    assert_eq!(device.commands(), vec!["", "", "enable"]);
    assert_eq!(session.mode(), &Mode::Privileged);
    assert!(session.is_open());
    assert_eq!(session.get_mode().await.unwrap(), Mode::Privileged);
}

#[tokio::test]
async fn test_login_survives_hash_banner() {
    let device = FakeDevice::start_with(DeviceConfig {
        banner: "\r\n##########\r\n# Authorized access only #\r\n##########\r\n".to_string(),
        ..DeviceConfig::default()
    })
    .await;
    let mut session = connect(&device).await;

    assert_eq!(session.get_mode().await.unwrap(), Mode::User);
    assert_eq!(device.commands(), vec![""]);
}

#[tokio::test]
async fn test_ensure_configuration_is_noop_in_sub_mode() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    session.config("interface Gi1/0/1").await.unwrap();
    device.clear_commands();

    session.ensure_mode(Mode::Configuration).await.unwrap();

    // only the empty-line mode check
    assert_eq!(device.commands(), vec![""]);
}

#[tokio::test]
async fn test_ensure_configuration_is_noop_in_configuration() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    session.ensure_mode(Mode::Configuration).await.unwrap();
    device.clear_commands();

    session.ensure_mode(Mode::Configuration).await.unwrap();

    assert_eq!(device.commands(), vec![""]);
}

#[tokio::test]
async fn test_privileged_from_sub_mode_sends_end() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    session.config("line vty 0 15").await.unwrap();
    device.clear_commands();

    session.ensure_mode(Mode::Privileged).await.unwrap();

    assert_eq!(device.commands(), vec!["", "end", ""]);
    assert_eq!(session.mode(), &Mode::Privileged);
}

#[tokio::test]
async fn test_user_target_leaves_privileged_alone() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    session.ensure_mode(Mode::User).await.unwrap();

    assert_eq!(device.commands(), vec![""]);
    assert_eq!(session.mode(), &Mode::Privileged);
}

#[tokio::test]
async fn test_user_target_ends_configuration() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    session.config("interface Gi1/0/1").await.unwrap();
    device.clear_commands();

    session.ensure_mode(Mode::User).await.unwrap();

    assert_eq!(device.commands(), vec!["", "end"]);
    assert_eq!(session.mode(), &Mode::Privileged);
}

#[tokio::test]
async fn test_configuration_from_user_mode_is_rejected_by_device() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let err = session.ensure_mode(Mode::Configuration).await.unwrap_err();

    assert!(err.is_invalid_input());
    assert_eq!(device.commands(), vec!["", "configure terminal"]);
    assert!(session.is_open());
}

#[tokio::test]
async fn test_named_mode_cannot_be_targeted() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let err = session
        .ensure_mode(Mode::Named("config-if".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Session(SessionError::InvalidConfig { .. })
    ));
    assert!(device.commands().is_empty());
}

#[tokio::test]
async fn test_failed_enable_is_not_detected() {
    let device = FakeDevice::start_with(DeviceConfig {
        enable_secret: Some("different".to_string()),
        ..DeviceConfig::default()
    })
    .await;
    let mut session = connect(&device).await;

    // The transition is optimistic: a refused enable still reports success
    // and the session stays in user mode.
    session.ensure_mode(Mode::Privileged).await.unwrap();

    assert_eq!(session.get_mode().await.unwrap(), Mode::User);
}

#[tokio::test]
async fn test_run_returns_output_unchanged() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let output = session.run("show version").await.unwrap();

    assert!(output.starts_with("show version\r\n"));
    assert!(output.contains("Cisco IOS Software"));
    assert!(output.ends_with("switch1>"));
}

#[tokio::test]
async fn test_run_invalid_input() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let err = session.run("bogus command").await.unwrap_err();

    match err {
        Error::Session(SessionError::InvalidDeviceInput { command, output }) => {
            assert_eq!(command, "bogus command");
            assert!(output.contains("% Invalid input detected"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // the connection is still usable
    assert!(session.is_open());
    assert!(session.run("show version").await.is_ok());
}

#[tokio::test]
async fn test_run_logs_command_and_latency_warning() {
    let device = FakeDevice::start().await;
    let capture = Arc::new(CaptureLog::default());
    let mut session = builder(&device)
        .latency_warning(Some(Duration::from_millis(50)))
        .logger(capture.clone())
        .build()
        .unwrap();
    session.open(credentials()).await.unwrap();

    session.run("show version").await.unwrap();
    assert!(capture.contains(Level::Debug, "Executing show version"));

    session.run("show slow").await.unwrap();
    assert!(capture.contains(Level::Warn, "High latency detected"));
    assert!(
        capture
            .records()
            .iter()
            .all(|(_, message)| message.starts_with("127.0.0.1: "))
    );
}

#[tokio::test]
async fn test_latency_warning_disabled() {
    let device = FakeDevice::start().await;
    let capture = Arc::new(CaptureLog::default());
    let mut session = builder(&device)
        .latency_warning(None)
        .logger(capture.clone())
        .build()
        .unwrap();
    session.open(credentials()).await.unwrap();

    session.run("show slow").await.unwrap();

    assert!(!capture.contains(Level::Warn, "High latency detected"));
}

#[tokio::test]
async fn test_latency() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let latency = session.latency().await.unwrap();

    assert!(latency < Duration::from_secs(2));
    assert_eq!(device.commands(), vec![""]);
}

#[tokio::test]
async fn test_timeout_tears_session_down() {
    let device = FakeDevice::start().await;
    let capture = Arc::new(CaptureLog::default());
    let mut session = builder(&device)
        .timeout(Duration::from_millis(300))
        .logger(capture.clone())
        .build()
        .unwrap();
    session.open(credentials()).await.unwrap();

    let err = session.run("hang").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Transport(TransportError::Timeout(_))
    ));
    assert!(!session.is_open());
    assert_eq!(session.mode(), &Mode::Unknown);
    assert!(capture.contains(Level::Warn, "transport fault"));
    assert!(matches!(
        session.run("show version").await.unwrap_err(),
        Error::Session(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_disconnect_tears_session_down() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let err = session.run("exit").await.unwrap_err();

    assert!(err.is_transport_fault());
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_close() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    session.close().await.unwrap();

    assert!(!session.is_open());
    assert_eq!(session.transport_kind(), None);
    assert!(matches!(
        session.get_mode().await.unwrap_err(),
        Error::Session(SessionError::NotConnected)
    ));
    // closing again is harmless
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_reopen_after_close() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;
    session.close().await.unwrap();

    session.open(credentials()).await.unwrap();

    assert_eq!(session.get_mode().await.unwrap(), Mode::User);
}

#[tokio::test]
async fn test_command_helpers() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    session.get("version").await.unwrap();
    session.exec("write memory").await.unwrap();
    session.config("ip domain-name example.net").await.unwrap();
    session.set("ip name-server", "10.0.0.53").await.unwrap();
    session.enable("ip routing").await.unwrap();
    session.disable("ip http server").await.unwrap();
    session.generate("crypto key", "rsa modulus 2048").await.unwrap();

    assert_eq!(
        device.commands(),
        vec![
            "show version",
            "",
            "",
            "write memory",
            "",
            "configure terminal",
            "ip domain-name example.net",
            "ip name-server 10.0.0.53",
            "ip routing",
            "no ip http server",
            "crypto key generate rsa modulus 2048",
        ]
    );
}

#[tokio::test]
async fn test_zeroize_confirms() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    session.ensure_mode(Mode::Configuration).await.unwrap();
    device.clear_commands();

    let output = session.zeroize("crypto key").await.unwrap();

    assert_eq!(device.commands(), vec!["crypto key zeroize", "yes"]);
    assert!(output.ends_with("switch1(config)#"));
}

#[tokio::test]
async fn test_get_parsed() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let status = session.get_parsed("interfaces status").await.unwrap();
    let records = status.records().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].get("short_type"), Some("Fa"));

    let version = session.get_parsed("version").await.unwrap();
    assert!(version.is_raw());
    assert!(version.raw().unwrap().contains("Cisco IOS Software"));
}

#[tokio::test]
async fn test_privileged_block() {
    let device = FakeDevice::start().await;
    let mut session = connect(&device).await;

    let output = session
        .privileged(async |s| s.run("show version").await)
        .await
        .unwrap();

    assert!(output.ends_with("switch1#"));
    assert_eq!(
        device.commands(),
        vec!["", "", "enable", "cisco", "show version"]
    );
}

#[tokio::test]
async fn test_configuration_and_save() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    session
        .configuration_and_save(async |s| {
            s.set("ip domain-name", "example.net").await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(
        device.commands(),
        vec![
            "",
            "configure terminal",
            "ip domain-name example.net",
            "",
            "end",
            "",
            "write memory",
        ]
    );
}

#[tokio::test]
async fn test_configuration_block_error_skips_save() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    let err = session
        .configuration_and_save(async |s| {
            s.run("bogus").await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_invalid_input());
    assert!(!device.commands().iter().any(|c| c == "write memory"));
}

#[tokio::test]
async fn test_interface_block() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    session
        .interface("GigabitEthernet1/0/1", async |s| {
            assert_eq!(s.mode(), &Mode::Named("config-if".to_string()));
            s.set("description", "uplink").await?;
            s.disable("shutdown").await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(
        device.commands(),
        vec![
            "",
            "configure terminal",
            "interface GigabitEthernet1/0/1",
            "description uplink",
            "no shutdown",
        ]
    );
    assert_eq!(session.mode(), &Mode::Named("config-if".to_string()));
}

#[tokio::test]
async fn test_interfaces_visits_each_match_by_name() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;
    let mut statuses = Vec::new();

    let visited = session
        .interfaces(&Regex::new("^Gi").unwrap(), async |s, record| {
            statuses.push(record.get("status").unwrap_or_default().to_string());
            s.set("description", "access").await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(visited, vec!["Gi1/0/1", "Gi1/0/2"]);
    assert_eq!(statuses, vec!["connected", "notconnect"]);

    let selectors: Vec<String> = device
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("interface "))
        .collect();
    assert_eq!(selectors, vec!["interface Gi1/0/1", "interface Gi1/0/2"]);
    assert_eq!(
        device
            .commands()
            .iter()
            .filter(|c| *c == "description access")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_interfaces_without_matches() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    let visited = session
        .interfaces(&Regex::new("^Te").unwrap(), async |_, _| Ok(()))
        .await
        .unwrap();

    assert!(visited.is_empty());
    assert_eq!(device.commands(), vec!["", "", "show interfaces status"]);
}

#[tokio::test]
async fn test_lines_block() {
    let device = FakeDevice::start().await;
    let mut session = connect_privileged(&device).await;

    session
        .lines("vty 0 15", async |s| {
            s.set("transport input", "ssh").await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(session.mode(), &Mode::Named("config-line".to_string()));
    assert_eq!(
        device.commands(),
        vec!["", "configure terminal", "line vty 0 15", "transport input ssh"]
    );
}
