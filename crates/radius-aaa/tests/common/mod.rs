//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use radius_aaa::{
    AuditLogger, AuthService, Config, Engine, Nas, RadiusService, Repositories, Request,
    ResponseWriter, ServerError, User,
};
use radius_wire::chap::ChapResponse;
use radius_wire::eap::add_eap_to_radius_packet;
use radius_wire::{
    calculate_message_authenticator, compute_chap_response, encrypt_user_password,
    generate_request_authenticator, Attribute, AttributeType, Code, EapPacket, Packet,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SECRET: &[u8] = b"testing123";
pub const NAS_ADDR: &str = "127.0.0.1:50000";
pub const HUAWEI_NAS_ADDR: &str = "127.0.0.2:50000";

/// Collects every reply the service writes
#[derive(Default)]
pub struct CapturingWriter {
    pub packets: Mutex<Vec<Packet>>,
}

#[async_trait]
impl ResponseWriter for CapturingWriter {
    async fn write(&self, packet: &Packet) -> Result<(), ServerError> {
        self.packets.lock().await.push(packet.clone());
        Ok(())
    }
}

pub fn nas_list() -> Vec<Nas> {
    let mut local = Nas::new("127.0.0.1".parse().unwrap(), "testing123");
    local.identifier = "bras-local".into();

    let mut huawei = Nas::new("127.0.0.2".parse().unwrap(), "testing123");
    huawei.identifier = "bras-huawei".into();
    huawei.vendor_code = "2011".into();

    vec![local, huawei]
}

pub fn users() -> Vec<User> {
    let mut limited = User::new("bob", "bobpass");
    limited.active_num = 1;
    limited.up_rate = 1024;
    limited.down_rate = 2048;

    vec![User::new("alice", "password"), limited]
}

pub fn engine_with(config: Config) -> Engine {
    let repositories = Repositories::in_memory(users(), nas_list());
    Engine::new(
        Arc::new(config),
        repositories,
        Arc::new(AuditLogger::disabled()),
    )
}

pub fn engine() -> Engine {
    engine_with(Config::default())
}

fn base_request(username: &str, id: u8) -> Packet {
    let mut packet = Packet::new(Code::AccessRequest, id, generate_request_authenticator());
    packet.add_attribute(Attribute::string(AttributeType::UserName as u8, username).unwrap());
    packet
}

pub fn pap_request(username: &str, password: &str, id: u8) -> Packet {
    let mut packet = base_request(username, id);
    let hidden = encrypt_user_password(password, SECRET, &packet.authenticator);
    packet.add_attribute(Attribute::new(AttributeType::UserPassword as u8, hidden).unwrap());
    packet
}

pub fn chap_request(username: &str, password: &str, id: u8, chap_id: u8) -> Packet {
    let mut packet = base_request(username, id);
    let challenge = [0x5Au8; 16];
    let response = ChapResponse {
        ident: chap_id,
        response: compute_chap_response(chap_id, password.as_bytes(), &challenge),
    };
    packet.add_attribute(
        Attribute::new(AttributeType::ChapPassword as u8, response.to_bytes()).unwrap(),
    );
    packet.add_attribute(
        Attribute::new(AttributeType::ChapChallenge as u8, challenge.to_vec()).unwrap(),
    );
    packet
}

/// Access-Request carrying `eap`, the State of the previous challenge and a
/// valid Message-Authenticator
pub fn eap_request(username: &str, id: u8, eap: &EapPacket, state: Option<&[u8]>) -> Packet {
    let mut packet = base_request(username, id);
    add_eap_to_radius_packet(&mut packet, eap).unwrap();
    if let Some(state) = state {
        packet.add_attribute(Attribute::new(AttributeType::State as u8, state.to_vec()).unwrap());
    }
    packet.add_attribute(
        Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).unwrap(),
    );
    let mac = calculate_message_authenticator(&packet.encode().unwrap(), SECRET);
    packet.set_attribute(
        Attribute::new(AttributeType::MessageAuthenticator as u8, mac.to_vec()).unwrap(),
    );
    packet
}

/// Run one request through `service` and return the single reply, if any
pub async fn exchange(service: &AuthService, from: &str, packet: Packet) -> Option<Packet> {
    let writer = Arc::new(CapturingWriter::default());
    let remote: SocketAddr = from.parse().unwrap();
    let request = Request::new(
        remote,
        "127.0.0.1:1812".parse().unwrap(),
        packet,
        SECRET.to_vec(),
    );
    service.serve_radius(writer.clone(), request).await;
    let mut packets = writer.packets.lock().await;
    assert!(packets.len() <= 1, "more than one reply written");
    packets.pop()
}
