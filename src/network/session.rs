//! Match Room Management
//!
//! A room owns one match: its connections, seating, hero picks and the
//! engine state. Every mutation of a room happens under that room's mutex,
//! so intents for the same match are applied one at a time while different
//! rooms proceed independently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::rng::{derive_match_seed, DeterministicRng, RandomSource};
use crate::game::combat::declare_winner;
use crate::game::events::GameEvent;
use crate::game::hero::{HeroStatsTable, TeamPick, TEAM_RULE};
use crate::game::intent::{apply_intent, Intent};
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::{MatchPhase, MatchState, PerSeat, Seat};
use crate::game::turn::start_match;
use crate::network::protocol::{JoinRequest, ServerMessage};

/// Identifier of one WebSocket connection.
pub type ConnectionId = Uuid;

/// Name used when a client joins without one.
pub const DEFAULT_MEMBER_NAME: &str = "Player";

/// A connection present in a room.
#[derive(Debug)]
pub struct RoomMember {
    pub name: String,
    /// Hero ids submitted on join
    pub heroes: Vec<String>,
    /// `None` while waiting for an opponent and for spectators
    pub seat: Option<Seat>,
    /// Message channel to this connection.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// One match room.
pub struct MatchRoom {
    /// Match id chosen by the clients.
    pub id: String,
    state: MatchState,
    /// Members in join order.
    members: Vec<(ConnectionId, RoomMember)>,
    stats: Arc<HeroStatsTable>,
    /// When the match ended (if it did).
    ended_at: Option<Instant>,
}

impl MatchRoom {
    /// Create an empty room whose match draws from `rng`.
    pub fn new(id: impl Into<String>, rng: Box<dyn RandomSource>, stats: Arc<HeroStatsTable>) -> Self {
        let id = id.into();
        Self {
            state: MatchState::new(id.clone(), rng),
            id,
            members: Vec::new(),
            stats,
            ended_at: None,
        }
    }

    /// Read-only view of the match.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Seat held by a connection, if any.
    pub fn seat_of(&self, conn: ConnectionId) -> Option<Seat> {
        self.member(conn).and_then(|m| m.seat)
    }

    /// How long ago the match ended.
    pub fn ended_for(&self) -> Option<Duration> {
        self.ended_at.map(|at| at.elapsed())
    }

    fn member(&self, conn: ConnectionId) -> Option<&RoomMember> {
        self.members.iter().find(|(id, _)| *id == conn).map(|(_, m)| m)
    }

    fn member_mut(&mut self, conn: ConnectionId) -> Option<&mut RoomMember> {
        self.members
            .iter_mut()
            .find(|(id, _)| *id == conn)
            .map(|(_, m)| m)
    }

    /// Add (or refresh) a connection.
    ///
    /// The first two connections are seated by coin flip and the match starts;
    /// everyone else watches. A lone first joiner watches until an opponent
    /// arrives.
    pub async fn join(
        &mut self,
        conn: ConnectionId,
        request: JoinRequest,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_MEMBER_NAME)
            .to_string();
        let heroes = request.heroes.unwrap_or_default();

        match self.member_mut(conn) {
            Some(member) => {
                member.sender = sender;
                if member.seat.is_none() {
                    member.name = name;
                    member.heroes = heroes;
                }
            }
            None => self.members.push((
                conn,
                RoomMember {
                    name,
                    heroes,
                    seat: None,
                    sender,
                },
            )),
        }

        if self.state.phase == MatchPhase::Waiting && self.members.len() >= 2 {
            self.seat_and_start().await;
            return;
        }

        let seat = self.seat_of(conn);
        self.send_to(conn, ServerMessage::RoleAssigned { seat }).await;
        self.send_to(conn, ServerMessage::Snapshot(MatchSnapshot::capture(&self.state)))
            .await;
    }

    async fn seat_and_start(&mut self) {
        let first_is_p1 = self.state.rng.coin_flip();
        let (p1, p2) = if first_is_p1 { (0, 1) } else { (1, 0) };
        self.members[p1].1.seat = Some(Seat::Player1);
        self.members[p2].1.seat = Some(Seat::Player2);

        let index = PerSeat::new(p1, p2);
        let picks = PerSeat::from_fn(|seat| TeamPick::resolve(&self.members[index[seat]].1.heroes));
        let names = PerSeat::from_fn(|seat| self.members[index[seat]].1.name.clone());

        for seat in Seat::ALL {
            if picks[seat].is_none() {
                let conn = self.members[index[seat]].0;
                debug!(match_id = %self.id, %seat, "hero selection rejected");
                self.send_to(
                    conn,
                    ServerMessage::HeroSelectionInvalid {
                        reason: TEAM_RULE.to_string(),
                    },
                )
                .await;
            }
        }

        start_match(&mut self.state, &picks, names, &self.stats);
        info!(match_id = %self.id, "seats assigned");

        for seat in Seat::ALL {
            let conn = self.members[index[seat]].0;
            self.send_to(conn, ServerMessage::RoleAssigned { seat: Some(seat) })
                .await;
        }

        let events = self.state.take_events();
        self.publish(events).await;
    }

    /// Apply one intent from a connection.
    ///
    /// Spectators and strangers are ignored. Validation failures are reported
    /// to the sender only; structural ones are dropped.
    pub async fn handle_intent(&mut self, conn: ConnectionId, intent: Intent) -> Result<(), SessionError> {
        let seat = match self.member(conn) {
            None => return Err(SessionError::NotInRoom),
            Some(member) => member.seat.ok_or(SessionError::NotSeated)?,
        };

        match apply_intent(&mut self.state, seat, intent) {
            Ok(events) => {
                self.publish(events).await;
            }
            Err(err) => {
                debug!(match_id = %self.id, %seat, error = %err, "intent rejected");
                if let Some(reply) = ServerMessage::rejection(&err) {
                    self.send_to(conn, reply).await;
                }
            }
        }
        Ok(())
    }

    /// Remove a connection. A seated player leaving a live match forfeits.
    ///
    /// Idempotent: unknown connections are ignored.
    pub async fn leave(&mut self, conn: ConnectionId) {
        let Some(pos) = self.members.iter().position(|(id, _)| *id == conn) else {
            return;
        };
        let (_, member) = self.members.remove(pos);

        if let Some(seat) = member.seat {
            if self.state.phase == MatchPhase::Playing {
                info!(match_id = %self.id, %seat, "seated player left, match forfeited");
                declare_winner(&mut self.state, seat.other());
                let events = self.state.take_events();
                self.publish(events).await;
            }
        }
    }

    /// Broadcast events in order, then one snapshot.
    async fn publish(&mut self, events: Vec<GameEvent>) {
        if self.state.is_ended() && self.ended_at.is_none() {
            self.ended_at = Some(Instant::now());
        }
        for event in events {
            self.broadcast(ServerMessage::Event { event }).await;
        }
        self.broadcast(ServerMessage::Snapshot(MatchSnapshot::capture(&self.state)))
            .await;
    }

    /// Broadcast a message to every member.
    pub async fn broadcast(&self, message: ServerMessage) {
        for (_, member) in &self.members {
            let _ = member.sender.send(message.clone()).await;
        }
    }

    async fn send_to(&self, conn: ConnectionId, message: ServerMessage) {
        if let Some(member) = self.member(conn) {
            let _ = member.sender.send(message).await;
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Connection has not joined a room.
    #[error("Not in a match")]
    NotInRoom,

    /// Connection is watching, not playing.
    #[error("Spectators cannot act")]
    NotSeated,

    /// Connection already belongs to another room.
    #[error("Already in match {0}")]
    AlreadyInRoom(String),
}

// =============================================================================
// MATCH REGISTRY
// =============================================================================

/// Owns every room, keyed by match id.
pub struct MatchRegistry {
    rooms: RwLock<BTreeMap<String, Arc<Mutex<MatchRoom>>>>,
    /// Connection to match id mapping.
    memberships: RwLock<BTreeMap<ConnectionId, String>>,
    stats: Arc<HeroStatsTable>,
}

impl MatchRegistry {
    pub fn new(stats: HeroStatsTable) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            memberships: RwLock::new(BTreeMap::new()),
            stats: Arc::new(stats),
        }
    }

    /// Join `request.match_id`, creating the room on first use.
    pub async fn join(
        &self,
        conn: ConnectionId,
        request: JoinRequest,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        let match_id = request.match_id.clone();
        {
            let mut memberships = self.memberships.write().await;
            match memberships.get(&conn) {
                Some(current) if *current != match_id => {
                    return Err(SessionError::AlreadyInRoom(current.clone()));
                }
                _ => {
                    memberships.insert(conn, match_id.clone());
                }
            }
        }

        let room = {
            let mut rooms = self.rooms.write().await;
            rooms
                .entry(match_id.clone())
                .or_insert_with(|| {
                    let entropy = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_nanos() as u64;
                    let seed = derive_match_seed(&match_id, entropy);
                    info!(%match_id, "room created");
                    Arc::new(Mutex::new(MatchRoom::new(
                        match_id.clone(),
                        Box::new(DeterministicRng::new(seed)),
                        self.stats.clone(),
                    )))
                })
                .clone()
        };

        room.lock().await.join(conn, request, sender).await;
        Ok(())
    }

    /// Apply an intent from a connection to its room.
    pub async fn apply(&self, conn: ConnectionId, intent: Intent) -> Result<(), SessionError> {
        let room = self.room_of(conn).await.ok_or(SessionError::NotInRoom)?;
        let mut room = room.lock().await;
        room.handle_intent(conn, intent).await
    }

    /// Drop a connection from its room; empty rooms are removed.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let Some(match_id) = self.memberships.write().await.remove(&conn) else {
            return;
        };
        let Some(room) = self.get_room(&match_id).await else {
            return;
        };

        let empty = {
            let mut room = room.lock().await;
            room.leave(conn).await;
            room.is_empty()
        };
        if empty {
            self.rooms.write().await.remove(&match_id);
            info!(%match_id, "room closed");
        }
    }

    /// Get a room by match id.
    pub async fn get_room(&self, match_id: &str) -> Option<Arc<Mutex<MatchRoom>>> {
        self.rooms.read().await.get(match_id).cloned()
    }

    /// Room a connection belongs to.
    pub async fn room_of(&self, conn: ConnectionId) -> Option<Arc<Mutex<MatchRoom>>> {
        let match_id = self.memberships.read().await.get(&conn).cloned()?;
        self.get_room(&match_id).await
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Remove rooms that are empty or whose match ended more than `linger` ago.
    pub async fn cleanup(&self, linger: Duration) {
        let mut rooms = self.rooms.write().await;
        let mut to_remove = Vec::new();

        for (id, room) in rooms.iter() {
            let room = room.lock().await;
            if room.is_empty() || room.ended_for().is_some_and(|age| age > linger) {
                to_remove.push(id.clone());
            }
        }

        if to_remove.is_empty() {
            return;
        }
        let mut memberships = self.memberships.write().await;
        for id in to_remove {
            rooms.remove(&id);
            memberships.retain(|_, room_id| *room_id != id);
            debug!(match_id = %id, "reaped room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedRolls;
    use crate::game::events::GameEventData;
    use crate::game::state::UnitId;

    const TEAM: [&str; 4] = ["voodoo", "aimbot", "trickster", "death_blossom"];

    fn request(name: &str, heroes: Option<&[&str]>) -> JoinRequest {
        JoinRequest {
            match_id: "room".to_string(),
            name: Some(name.to_string()),
            heroes: heroes.map(|h| h.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn roles(messages: &[ServerMessage]) -> Vec<Option<Seat>> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::RoleAssigned { seat } => Some(*seat),
                _ => None,
            })
            .collect()
    }

    /// Room whose coin flip seats the first joiner as player 1.
    fn room() -> MatchRoom {
        MatchRoom::new(
            "room",
            Box::new(ScriptedRolls::new([1])),
            Arc::new(HeroStatsTable::empty()),
        )
    }

    #[tokio::test]
    async fn test_lone_joiner_waits_as_spectator() {
        let mut room = room();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(64);

        room.join(conn, request("Ada", Some(&TEAM)), tx).await;
        let messages = drain(&mut rx);
        assert_eq!(roles(&messages), vec![None]);
        assert!(matches!(messages.last(), Some(ServerMessage::Snapshot(_))));
        assert_eq!(room.state().phase, MatchPhase::Waiting);
    }

    #[tokio::test]
    async fn test_second_joiner_starts_match() {
        let mut room = room();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(64);
        let (tx_b, mut rx_b) = mpsc::channel(64);

        room.join(a, request("Ada", Some(&TEAM)), tx_a).await;
        drain(&mut rx_a);
        room.join(b, request("Bo", None), tx_b).await;

        assert_eq!(room.state().phase, MatchPhase::Playing);
        assert_eq!(room.seat_of(a), Some(Seat::Player1));
        assert_eq!(room.seat_of(b), Some(Seat::Player2));
        assert_eq!(room.state().player_names.player1, "Ada");

        // Seat 1 picked heroes, seat 2 keeps role defaults
        let p1: UnitId = "P1".parse().unwrap();
        let e1: UnitId = "E1".parse().unwrap();
        assert_eq!(room.state().characters[&p1].name, "Voodoo");
        assert_eq!(room.state().characters[&e1].name, "Tank");

        let to_a = drain(&mut rx_a);
        assert_eq!(roles(&to_a), vec![Some(Seat::Player1)]);
        assert!(to_a.iter().any(|m| matches!(
            m,
            ServerMessage::Event { event } if event.data == GameEventData::TurnChanged { seat: Seat::Player1 }
        )));
        assert!(matches!(to_a.last(), Some(ServerMessage::Snapshot(_))));

        let to_b = drain(&mut rx_b);
        assert!(matches!(
            &to_b[0],
            ServerMessage::HeroSelectionInvalid { reason } if reason == TEAM_RULE
        ));
        assert_eq!(roles(&to_b), vec![Some(Seat::Player2)]);
    }

    #[tokio::test]
    async fn test_third_joiner_spectates() {
        let mut room = room();
        let (tx, _rx) = mpsc::channel(64);
        room.join(Uuid::new_v4(), request("A", None), tx.clone()).await;
        room.join(Uuid::new_v4(), request("B", None), tx).await;

        let watcher = Uuid::new_v4();
        let (tx_w, mut rx_w) = mpsc::channel(64);
        room.join(watcher, request("C", None), tx_w).await;
        let messages = drain(&mut rx_w);
        assert_eq!(roles(&messages), vec![None]);
        assert_eq!(room.seat_of(watcher), None);

        let err = room.handle_intent(watcher, Intent::EndTurn).await.unwrap_err();
        assert_eq!(err, SessionError::NotSeated);
    }

    #[tokio::test]
    async fn test_rejection_goes_to_sender_only() {
        let mut room = room();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(64);
        let (tx_b, mut rx_b) = mpsc::channel(64);
        room.join(a, request("A", None), tx_a).await;
        room.join(b, request("B", None), tx_b).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        // Seat 2 acting out of turn
        room.handle_intent(b, Intent::EndTurn).await.unwrap();
        let to_b = drain(&mut rx_b);
        assert!(matches!(&to_b[..], [ServerMessage::Error(err)] if err.code == "not_your_turn"));
        assert!(drain(&mut rx_a).is_empty());

        // Structural rejection is silent
        let ghost: UnitId = "P9".parse().unwrap();
        room.handle_intent(
            a,
            Intent::Move {
                unit_id: ghost,
                to_tile: "H1".parse().unwrap(),
            },
        )
        .await
        .unwrap();
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_applied_intent_broadcasts_events_then_snapshot() {
        let mut room = room();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(64);
        let (tx_b, mut rx_b) = mpsc::channel(64);
        room.join(a, request("A", None), tx_a).await;
        room.join(b, request("B", None), tx_b).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        room.handle_intent(a, Intent::EndTurn).await.unwrap();
        for rx in [&mut rx_a, &mut rx_b] {
            let messages = drain(rx);
            assert!(matches!(
                &messages[0],
                ServerMessage::Event { event } if event.data == GameEventData::TurnChanged { seat: Seat::Player2 }
            ));
            assert!(matches!(messages.last(), Some(ServerMessage::Snapshot(s)) if s.current_turn == Seat::Player2));
        }
    }

    #[tokio::test]
    async fn test_seated_leave_forfeits() {
        let mut room = room();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, _rx_a) = mpsc::channel(64);
        let (tx_b, mut rx_b) = mpsc::channel(64);
        room.join(a, request("A", None), tx_a).await;
        room.join(b, request("B", None), tx_b).await;
        drain(&mut rx_b);

        room.leave(a).await;
        assert_eq!(room.state().phase, MatchPhase::Ended);
        assert_eq!(room.state().winner, Some(Seat::Player2));
        assert!(room.ended_for().is_some());

        let messages = drain(&mut rx_b);
        assert!(messages.iter().any(|m| matches!(
            m,
            ServerMessage::Event { event } if event.is_game_over()
        )));

        // Second leave is a no-op
        room.leave(a).await;
        assert_eq!(room.member_count(), 1);
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = MatchRegistry::new(HeroStatsTable::empty());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, _rx) = mpsc::channel(256);

        registry.join(a, request("A", None), tx.clone()).await.unwrap();
        assert_eq!(registry.room_count().await, 1);
        assert!(registry.room_of(a).await.is_some());

        let other = JoinRequest {
            match_id: "elsewhere".to_string(),
            name: None,
            heroes: None,
        };
        assert_eq!(
            registry.join(a, other, tx.clone()).await,
            Err(SessionError::AlreadyInRoom("room".to_string()))
        );

        registry.join(b, request("B", None), tx).await.unwrap();
        registry.apply(a, Intent::EndTurn).await.ok();

        assert_eq!(
            registry.apply(Uuid::new_v4(), Intent::EndTurn).await,
            Err(SessionError::NotInRoom)
        );

        registry.disconnect(a).await;
        registry.disconnect(a).await;
        assert_eq!(registry.room_count().await, 1);
        registry.disconnect(b).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_reaps_ended_rooms() {
        let registry = MatchRegistry::new(HeroStatsTable::empty());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, _rx) = mpsc::channel(256);
        registry.join(a, request("A", None), tx.clone()).await.unwrap();
        registry.join(b, request("B", None), tx).await.unwrap();

        registry.cleanup(Duration::ZERO).await;
        assert_eq!(registry.room_count().await, 1);

        if let Some(room) = registry.get_room("room").await {
            room.lock().await.leave(a).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.cleanup(Duration::ZERO).await;
        assert_eq!(registry.room_count().await, 0);
        assert!(registry.room_of(b).await.is_none());
    }
}
