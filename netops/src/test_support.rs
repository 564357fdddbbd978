//! A fake Cisco-style device for session tests.
//!
//! Listens on a loopback port and speaks the Telnet line protocol: it
//! negotiates echo, asks for a username and password, then tracks its own
//! CLI mode and answers a small command set. Every line received after login
//! is recorded so tests can assert exactly what a session sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const IAC: u8 = 255;
const WILL: u8 = 251;
const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

const INVALID: &str = "                ^\r\n% Invalid input detected at '^' marker.\r\n\r\n";

const INTERFACES_STATUS: &str = "\r\n\
    Port      Name               Status       Vlan       Duplex  Speed Type\r\n\
    Gi1/0/1   uplink             connected    trunk        a-full a-1000 10/100/1000BaseTX\r\n\
    Gi1/0/2                      notconnect   10             auto   auto 10/100/1000BaseTX\r\n\
    Fa0/1     printer            connected    20           a-full  a-100 10/100BaseTX\r\n\
    \r\n";

/// How the fake device behaves.
#[derive(Debug, Clone)]
pub(crate) struct DeviceConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    /// `None` lets `enable` through without asking.
    pub enable_secret: Option<String>,
    /// Sent before the username prompt.
    pub banner: String,
    /// Delay before answering `show slow`.
    pub slow_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: "switch1".to_string(),
            username: "admin".to_string(),
            password: "cisco".to_string(),
            enable_secret: Some("cisco".to_string()),
            banner: String::new(),
            slow_delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceMode {
    User,
    Privileged,
    Config,
    Sub(&'static str),
}

impl DeviceMode {
    fn is_config(&self) -> bool {
        matches!(self, DeviceMode::Config | DeviceMode::Sub(_))
    }

    fn is_exec(&self) -> bool {
        matches!(self, DeviceMode::User | DeviceMode::Privileged)
    }
}

enum Pending {
    None,
    EnableSecret,
    Confirm,
}

/// A running fake device.
pub(crate) struct FakeDevice {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    pub(crate) async fn start() -> Self {
        Self::start_with(DeviceConfig::default()).await
    }

    pub(crate) async fn start_with(config: DeviceConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));

        let recorded = commands.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, config.clone(), recorded.clone()));
            }
        });

        Self {
            port,
            commands,
            task,
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Lines received after login, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read one line, skipping Telnet commands sent by the client.
async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = Vec::new();
    loop {
        let byte = reader.read_u8().await.ok()?;
        match byte {
            IAC => {
                let command = reader.read_u8().await.ok()?;
                if command != IAC {
                    reader.read_u8().await.ok()?;
                }
            }
            b'\r' | 0 => {}
            b'\n' => return Some(String::from_utf8_lossy(&line).into_owned()),
            other => line.push(other),
        }
    }
}

async fn serve(socket: TcpStream, config: DeviceConfig, commands: Arc<Mutex<Vec<String>>>) {
    let (read_half, mut writer) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let mut greeting = vec![IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SGA];
    greeting.extend_from_slice(config.banner.as_bytes());
    if writer.write_all(&greeting).await.is_err() {
        return;
    }
    if !config.banner.is_empty() {
        // let the banner arrive in a read of its own
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if writer
        .write_all(b"\r\n\r\nUser Access Verification\r\n\r\nUsername: ")
        .await
        .is_err()
    {
        return;
    }

    // login
    loop {
        let Some(username) = read_line(&mut reader).await else {
            return;
        };
        let _ = writer
            .write_all(format!("{}\r\nPassword: ", username).as_bytes())
            .await;
        let Some(password) = read_line(&mut reader).await else {
            return;
        };
        if username == config.username && password == config.password {
            break;
        }
        let _ = writer
            .write_all(b"\r\n% Login invalid\r\n\r\nUsername: ")
            .await;
    }

    let mut mode = DeviceMode::User;
    let mut pending = Pending::None;
    let prompt = |mode: &DeviceMode| -> String {
        match mode {
            DeviceMode::User => format!("{}>", config.hostname),
            DeviceMode::Privileged => format!("{}#", config.hostname),
            DeviceMode::Config => format!("{}(config)#", config.hostname),
            DeviceMode::Sub(tag) => format!("{}({})#", config.hostname, tag),
        }
    };

    if writer
        .write_all(format!("\r\n\r\n{}", prompt(&mode)).as_bytes())
        .await
        .is_err()
    {
        return;
    }

    while let Some(line) = read_line(&mut reader).await {
        commands.lock().unwrap().push(line.clone());

        let mut reply = String::new();
        match std::mem::replace(&mut pending, Pending::None) {
            Pending::EnableSecret => {
                // secret is not echoed
                reply.push_str("\r\n");
                if config.enable_secret.as_deref() == Some(line.as_str()) {
                    mode = DeviceMode::Privileged;
                } else {
                    reply.push_str("% Access denied\r\n\r\n");
                }
            }
            Pending::Confirm => {
                reply.push_str(&line);
                reply.push_str("\r\n");
            }
            Pending::None => {
                reply.push_str(&line);
                reply.push_str("\r\n");
                let command = line.trim();
                match command {
                    "" => {}
                    "enable" if mode == DeviceMode::User => {
                        if config.enable_secret.is_some() {
                            reply.push_str("Password: ");
                            pending = Pending::EnableSecret;
                        } else {
                            mode = DeviceMode::Privileged;
                        }
                    }
                    "enable" => {}
                    "end" if mode.is_config() => mode = DeviceMode::Privileged,
                    "exit" if mode.is_exec() => return,
                    "exit" => {
                        mode = match mode {
                            DeviceMode::Sub(_) => DeviceMode::Config,
                            _ => DeviceMode::Privileged,
                        }
                    }
                    "configure terminal" if mode == DeviceMode::Privileged => {
                        reply.push_str(
                            "Enter configuration commands, one per line.  End with CNTL/Z.\r\n",
                        );
                        mode = DeviceMode::Config;
                    }
                    "write memory" if mode == DeviceMode::Privileged => {
                        reply.push_str("Building configuration...\r\n[OK]\r\n");
                    }
                    "show version" if mode.is_exec() => {
                        reply.push_str(
                            "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE11\r\n",
                        );
                    }
                    "show interfaces status" if mode.is_exec() => {
                        reply.push_str(INTERFACES_STATUS);
                    }
                    "show slow" => {
                        tokio::time::sleep(config.slow_delay).await;
                    }
                    // never answers
                    "hang" => continue,
                    c if c.starts_with("crypto key zeroize") && mode.is_config() => {
                        reply.push_str(
                            "% All keys will be removed.\r\nDo you really want to remove these keys? [yes/no]: ",
                        );
                        pending = Pending::Confirm;
                    }
                    c if c.starts_with("interface ") && mode.is_config() => {
                        mode = DeviceMode::Sub("config-if");
                    }
                    c if c.starts_with("line ") && mode.is_config() => {
                        mode = DeviceMode::Sub("config-line");
                    }
                    c if c.starts_with("bogus") => reply.push_str(INVALID),
                    _ if mode.is_config() => {}
                    _ => reply.push_str(INVALID),
                }
            }
        }

        if !matches!(pending, Pending::EnableSecret | Pending::Confirm) {
            reply.push_str(&prompt(&mode));
        }
        if writer.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
