//! Client connection tracking for the room server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - The seats each client holds, i.e. which rooms it plays in and as which player
//! - Address lookup for routing inbound packets and room broadcasts
//!
//! Seats live here rather than in the room registry so that the simulation
//! never needs to know about network addresses.

use log::info;
use shared::PlayerNumber;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A client's place in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room_code: String,
    pub player: PlayerNumber,
}

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Rooms this client created or joined, most recent last. Key presses
    /// go to the most recent one.
    pub seats: Vec<Seat>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            seats: Vec::new(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and the rooms they sit in
///
/// The ClientManager enforces server capacity limits and answers the two
/// routing questions the network layer has: "who sent this packet" and
/// "who is in this room".
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns the removed client so the caller can release its seats, or
    /// None if the client was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks a client as alive. Returns false for unknown clients.
    pub fn refresh(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Seats a client in another room. Returns false for unknown clients.
    pub fn assign_seat(&mut self, client_id: u32, seat: Seat) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.seats.push(seat);
                true
            }
            None => false,
        }
    }

    /// The seat key presses of this client are routed to.
    pub fn current_seat(&self, client_id: u32) -> Option<&Seat> {
        self.clients.get(&client_id)?.seats.last()
    }

    pub fn seats_of(&self, client_id: u32) -> &[Seat] {
        self.clients
            .get(&client_id)
            .map(|client| client.seats.as_slice())
            .unwrap_or_default()
    }

    pub fn is_seated_in(&self, client_id: u32, room_code: &str) -> bool {
        self.seats_of(client_id)
            .iter()
            .any(|seat| seat.room_code == room_code)
    }

    /// Takes one room out of a client's seats.
    pub fn remove_seat(&mut self, client_id: u32, room_code: &str) -> Option<Seat> {
        let seats = &mut self.clients.get_mut(&client_id)?.seats;
        let index = seats.iter().position(|seat| seat.room_code == room_code)?;
        Some(seats.remove(index))
    }

    /// Clears every seat pointing at a closed room, returning how many
    /// clients were unseated.
    pub fn release_room(&mut self, room_code: &str) -> usize {
        let mut released = 0;
        for client in self.clients.values_mut() {
            let before = client.seats.len();
            client.seats.retain(|seat| seat.room_code != room_code);
            released += before - client.seats.len();
        }
        released
    }

    /// Gets the clients seated in a room together with their addresses
    pub fn room_members(&self, room_code: &str) -> Vec<(u32, SocketAddr)> {
        self.clients
            .values()
            .filter(|client| {
                client
                    .seats
                    .iter()
                    .any(|seat| seat.room_code == room_code)
            })
            .map(|client| (client.id, client.addr))
            .collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed clients so their rooms can be closed.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn seat(room_code: &str, player: PlayerNumber) -> Seat {
        Seat {
            room_code: room_code.to_string(),
            player,
        }
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert!(client.seats.is_empty());
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_returns_seats() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();
        manager.assign_seat(client_id, seat("ROOM1", PlayerNumber::One));

        let removed = manager.remove_client(&client_id).unwrap();
        assert_eq!(removed.seats, vec![seat("ROOM1", PlayerNumber::One)]);
        assert!(manager.is_empty());
        assert!(manager.remove_client(&client_id).is_none());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);

        let client_id1 = manager.add_client(test_addr()).unwrap();
        let _client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_refresh_unknown_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.refresh(client_id));
        assert!(!manager.refresh(999));
    }

    #[test]
    fn test_seats_accumulate_and_latest_is_current() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert_eq!(manager.current_seat(client_id), None);
        assert!(manager.assign_seat(client_id, seat("AAAAA", PlayerNumber::One)));
        assert!(manager.assign_seat(client_id, seat("BBBBB", PlayerNumber::One)));

        assert_eq!(manager.current_seat(client_id), Some(&seat("BBBBB", PlayerNumber::One)));
        assert_eq!(manager.seats_of(client_id).len(), 2);
        assert!(manager.is_seated_in(client_id, "AAAAA"));

        assert_eq!(
            manager.remove_seat(client_id, "BBBBB"),
            Some(seat("BBBBB", PlayerNumber::One))
        );
        assert_eq!(manager.remove_seat(client_id, "BBBBB"), None);
        assert_eq!(manager.current_seat(client_id), Some(&seat("AAAAA", PlayerNumber::One)));

        assert!(!manager.assign_seat(999, seat("CCCCC", PlayerNumber::Two)));
        assert!(manager.seats_of(999).is_empty());
    }

    #[test]
    fn test_release_room_unseats_every_member() {
        let mut manager = ClientManager::new(2);
        let host = manager.add_client(test_addr()).unwrap();
        let guest = manager.add_client(test_addr2()).unwrap();

        manager.assign_seat(host, seat("ROOM1", PlayerNumber::One));
        manager.assign_seat(host, seat("ROOM2", PlayerNumber::One));
        manager.assign_seat(guest, seat("ROOM1", PlayerNumber::Two));

        assert_eq!(manager.release_room("ROOM1"), 2);
        assert!(manager.room_members("ROOM1").is_empty());
        assert!(!manager.is_seated_in(guest, "ROOM1"));
        assert_eq!(manager.current_seat(host), Some(&seat("ROOM2", PlayerNumber::One)));
        assert_eq!(manager.release_room("ROOM1"), 0);
    }

    #[test]
    fn test_room_members() {
        let mut manager = ClientManager::new(3);
        let third: SocketAddr = "127.0.0.1:8082".parse().unwrap();

        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();
        let c = manager.add_client(third).unwrap();

        manager.assign_seat(a, seat("ROOM1", PlayerNumber::One));
        manager.assign_seat(b, seat("ROOM1", PlayerNumber::Two));
        manager.assign_seat(c, seat("ROOM2", PlayerNumber::One));

        let mut members = manager.room_members("ROOM1");
        members.sort();
        assert_eq!(members, vec![(a, test_addr()), (b, test_addr2())]);
        assert_eq!(manager.room_members("ROOM2"), vec![(c, third)]);
        assert!(manager.room_members("ROOM3").is_empty());
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        let stale = manager.add_client(test_addr()).unwrap();
        let fresh = manager.add_client(test_addr2()).unwrap();
        manager.assign_seat(stale, seat("ROOM1", PlayerNumber::One));

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(10);

        let removed = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, stale);
        assert_eq!(removed[0].seats, vec![seat("ROOM1", PlayerNumber::One)]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_client_by_addr(test_addr2()), Some(fresh));
    }
}
