//! In-process CP750 stand-in for integration tests.
//!
//! Listens on an ephemeral port, speaks the real line protocol, and records
//! every command it receives so tests can assert on exchange ordering.
//! Failure modes (silent replies, hangs, malformed replies) are switchable
//! through [`MockCp750::state`].
#![allow(dead_code)]

use dolby_cp750::DeviceConfig;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub struct MockCp750 {
    addr: SocketAddr,
    state: Arc<Mutex<MockState>>,
    commands: Arc<Mutex<Vec<String>>>,
}

pub struct MockState {
    pub fader: f64,
    pub input: String,
    pub mute: bool,
    pub dig_valid: [bool; 4],
    /// Reply with an empty line to the next N commands
    pub silent_replies: usize,
    /// Swallow the next N commands entirely (no reply, connection kept open)
    pub hang_replies: usize,
    /// Reply to mute queries with the command name but no value token
    pub drop_mute_value: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            fader: -90.0,
            input: "dig_1".to_string(),
            mute: false,
            dig_valid: [false; 4],
            silent_replies: 0,
            hang_replies: 0,
            drop_mute_value: false,
        }
    }
}

impl MockCp750 {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(MockState::default()));
        let commands = Arc::new(Mutex::new(Vec::new()));

        let accept_state = state.clone();
        let accept_commands = commands.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                let commands = accept_commands.clone();
                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.into_split();
                    let mut lines = BufReader::new(read_half).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let reply = {
                            let mut state = state.lock().unwrap();
                            commands.lock().unwrap().push(line.clone());
                            if state.hang_replies > 0 {
                                state.hang_replies -= 1;
                                continue;
                            }
                            respond(&mut state, &line)
                        };
                        let frame = format!("{reply}\r\n");
                        if write_half.write_all(frame.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            state,
            commands,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Device configuration pointing at this mock, with a poll cadence long
    /// enough that only explicit refreshes (and the immediate startup poll)
    /// run during a test
    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::new("127.0.0.1")
            .with_port(self.port())
            .with_poll_interval(Duration::from_secs(3600))
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Commands received so far, in arrival order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }
}

fn respond(state: &mut MockState, line: &str) -> String {
    if state.silent_replies > 0 {
        state.silent_replies -= 1;
        return String::new();
    }

    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return line.to_string();
    };
    let argument = tokens.next();

    match (command, argument) {
        ("cp750.sys.fader", Some("?")) => format!("cp750.sys.fader {}", state.fader),
        ("cp750.sys.fader", Some(value)) => {
            if let Ok(value) = value.parse() {
                state.fader = value;
            }
            line.to_string()
        }
        ("cp750.sys.input_mode", Some("?")) => format!("cp750.sys.input_mode {}", state.input),
        ("cp750.sys.input_mode", Some(token)) => {
            state.input = token.to_string();
            line.to_string()
        }
        ("cp750.sys.mute", Some("?")) => {
            if state.drop_mute_value {
                "cp750.sys.mute".to_string()
            } else {
                format!("cp750.sys.mute {}", u8::from(state.mute))
            }
        }
        ("cp750.sys.mute", Some(value)) => {
            state.mute = value == "1";
            line.to_string()
        }
        (command, Some("?")) => match dig_valid_channel(command) {
            Some(channel) => {
                format!("{command} {}", u8::from(state.dig_valid[channel - 1]))
            }
            // The real device echoes unrecognized commands.
            None => line.to_string(),
        },
        _ => line.to_string(),
    }
}

fn dig_valid_channel(command: &str) -> Option<usize> {
    let channel: usize = command
        .strip_prefix("cp750.state.dig_")?
        .strip_suffix("_valid")?
        .parse()
        .ok()?;
    (1..=4).contains(&channel).then_some(channel)
}
