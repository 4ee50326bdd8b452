// Symmetric voice <-> text mapping for auto-created rooms.
//
// Not synchronised by itself; the lifecycle manager keeps it behind a lock.

use super::room_models::RoomPair;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PairingTable {
    // Both directions: voice -> text and text -> voice.
    companions: HashMap<u64, u64>,
    // Voice id -> full pair metadata.
    rooms: HashMap<u64, RoomPair>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert both directions. Existing entries for either id are overwritten.
    pub fn link(&mut self, pair: RoomPair) {
        self.companions.insert(pair.voice_id, pair.text_id);
        self.companions.insert(pair.text_id, pair.voice_id);
        self.rooms.insert(pair.voice_id, pair);
    }

    pub fn lookup(&self, id: u64) -> Option<u64> {
        self.companions.get(&id).copied()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.companions.contains_key(&id)
    }

    /// The pair `id` belongs to, whichever side it is.
    pub fn pair(&self, id: u64) -> Option<&RoomPair> {
        self.rooms
            .get(&id)
            .or_else(|| self.lookup(id).and_then(|voice| self.rooms.get(&voice)))
    }

    /// Remove `id` and its companion. No-op for unknown ids.
    pub fn unlink(&mut self, id: u64) -> Option<RoomPair> {
        let companion = self.companions.remove(&id)?;
        self.companions.remove(&companion);
        self.rooms
            .remove(&id)
            .or_else(|| self.rooms.remove(&companion))
    }

    pub fn pairs_in_guild(&self, guild_id: u64) -> Vec<RoomPair> {
        let mut pairs: Vec<RoomPair> = self
            .rooms
            .values()
            .filter(|pair| pair.guild_id == guild_id)
            .cloned()
            .collect();
        pairs.sort_by_key(|pair| pair.created_at);
        pairs
    }

    /// Number of room pairs (not entries).
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
