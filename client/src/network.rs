//! Peer network loop: UDP link to the authority, console helm, and the
//! variable-rate and fixed-rate update loops

use crate::game::{ClientGameState, Notification};
use crate::input::{InputAction, InputManager, HELP};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{timestamp_millis, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,

    game_state: ClientGameState,
    input_manager: InputManager,

    ping_ms: u64,
    fake_ping_ms: u64,
    frame_rate: u32,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        frame_rate: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            ping_ms: 0,
            fake_ping_ms,
            frame_rate: frame_rate.max(1),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server at {}...", self.server_addr);
        self.game_state.reset();
        self.input_manager.reset();

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                vessel_id,
                tick_rate,
                tuning,
            } => {
                info!(
                    "Connected! Client ID: {}, vessel {} ({} Hz)",
                    client_id, vessel_id, tick_rate
                );
                self.connected = true;
                self.game_state
                    .on_connected(client_id, vessel_id, tick_rate, tuning);
            }

            Packet::Rejected { reason } => {
                warn!("Rejected by server: {}", reason);
                self.connected = false;
                self.game_state.reset();
            }

            Packet::Heartbeat { timestamp } => {
                self.ping_ms = timestamp_millis().saturating_sub(timestamp);
            }

            other => self.game_state.apply_packet(other),
        }
    }

    async fn handle_line(&mut self, line: &str) -> bool {
        match self.input_manager.parse_line(line) {
            Some(InputAction::Command(command)) => {
                if !self.connected {
                    warn!("Not connected yet; order ignored");
                    return true;
                }
                let packet = self.input_manager.sequence(command);
                if let Err(e) = self.send_packet(&packet).await {
                    error!("Error sending command: {}", e);
                }
            }
            Some(InputAction::Status) => self.print_status(),
            Some(InputAction::Help) => println!("{}", HELP),
            Some(InputAction::Quit) => return false,
            None => {
                if !line.trim().is_empty() {
                    println!("Unknown order '{}'. Type 'help'.", line.trim());
                }
            }
        }
        true
    }

    fn print_status(&self) {
        let Some(motion) = self.game_state.own_motion() else {
            println!("No vessel yet");
            return;
        };
        let rudder = self
            .game_state
            .predicted_rudder()
            .map(|predictor| predictor.rudder_deg())
            .unwrap_or(0.0);
        let waypoints = self.game_state.course().map(|c| c.len()).unwrap_or(0);

        println!(
            "pos ({:.1}, {:.1}) hdg {:.0} | {:.1} kn | throttle {} | rudder {:.1} | {} waypoints{} | ping {} ms",
            motion.pose.position.x,
            motion.pose.position.y,
            motion.pose.heading_deg,
            self.game_state.get_current_speed(),
            self.game_state.get_current_throttle(),
            rudder,
            waypoints,
            if self.game_state.autopilot_engaged() {
                ", autopilot"
            } else {
                ""
            },
            self.ping_ms,
        );
    }

    fn report_notifications(&mut self) {
        for notification in self.game_state.drain_notifications() {
            match notification {
                Notification::SpeedChanged(knots) => debug!("Speed {:.1} kn", knots),
                Notification::ThrottleChanged(level) => info!("Throttle {}", level),
                Notification::WaypointAdded(point) => {
                    info!("Waypoint added at ({:.1}, {:.1})", point.x, point.y)
                }
                Notification::WaypointsCleared => info!("Waypoints cleared"),
                Notification::AutopilotToggled(enabled) => {
                    info!("Autopilot {}", if enabled { "engaged" } else { "off" })
                }
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut frame_interval = interval(Duration::from_secs_f64(1.0 / self.frame_rate as f64));
        let mut physics_interval =
            interval(Duration::from_secs_f32(self.game_state.fixed_dt()));
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut physics_period = self.game_state.fixed_dt();
        let mut last_frame = Instant::now();

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Dropping undecodable datagram: {}", e),
                            }

                            // The authority dictates the fixed step.
                            let fixed_dt = self.game_state.fixed_dt();
                            if fixed_dt != physics_period {
                                physics_period = fixed_dt;
                                physics_interval = interval(Duration::from_secs_f32(fixed_dt));
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_line(&line).await {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("Error reading console: {}", e);
                            break;
                        }
                    }
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    self.game_state
                        .update_frame(self.input_manager.steering_axis(), dt);
                    self.report_notifications();
                },

                _ = physics_interval.tick() => {
                    self.game_state.fixed_step(physics_period);
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        let packet = Packet::Heartbeat { timestamp: timestamp_millis() };
                        if let Err(e) = self.send_packet(&packet).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        info!("Client stopped");

        Ok(())
    }
}
