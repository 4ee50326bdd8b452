// Room lifecycle service - creation, reuse and teardown of personal voice rooms.
//
// The service owns all room state (pairing table, per-user registry, pending
// deletions). It talks to Discord only through the `ChannelPlatform` port, so
// the whole protocol is testable with a fake platform.

use super::cooldown_registry::CooldownRegistry;
use super::gather::gather_all;
use super::pairing_table::PairingTable;
use super::room_models::{
    room_slug, RemovedRoom, RoomOutcome, RoomPair, RoomRequest, RoomSettings, SkipReason,
    TeardownOutcome,
};
use super::room_platform::{ChannelInfo, ChannelKind, ChannelPlatform, PlatformError};
use chrono::Utc;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct RoomLifecycleManager<P: ChannelPlatform> {
    platform: P,
    settings: RoomSettings,
    registry: CooldownRegistry,
    pairs: RwLock<PairingTable>,
    // Voice id -> (schedule generation, deletion task)
    pending_teardowns: Mutex<HashMap<u64, (u64, JoinHandle<()>)>>,
    teardown_generation: AtomicU64,
}

impl<P: ChannelPlatform> RoomLifecycleManager<P> {
    pub fn new(platform: P, settings: RoomSettings) -> Self {
        Self {
            registry: CooldownRegistry::new(settings.cooldown, settings.creation_guard),
            platform,
            settings,
            pairs: RwLock::new(PairingTable::new()),
            pending_teardowns: Mutex::new(HashMap::new()),
            teardown_generation: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub async fn pair_of(&self, channel_id: u64) -> Option<u64> {
        self.pairs.read().await.lookup(channel_id)
    }

    pub async fn is_managed(&self, channel_id: u64) -> bool {
        self.pairs.read().await.contains(channel_id)
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn rooms_in_guild(&self, guild_id: u64) -> Vec<RoomPair> {
        self.pairs.read().await.pairs_in_guild(guild_id)
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Run the creation protocol for a user who entered a trigger channel.
    pub async fn create_room(&self, request: RoomRequest) -> RoomOutcome {
        let user_id = request.user_id;

        let Some(_permit) = self.registry.acquire(user_id, Instant::now()) else {
            tracing::debug!(user_id, "Join ignored: duplicate or on cooldown");
            return RoomOutcome::Skipped(SkipReason::Cooldown);
        };

        let user_lock = self.registry.user_lock(user_id);
        let _exclusive = user_lock.lock().await;

        let category_id = self
            .platform
            .channel(request.guild_id, request.trigger_channel_id)
            .and_then(|trigger| trigger.category_id);

        if let Some(existing) = self.find_reusable_room(&request, category_id).await {
            match self
                .platform
                .move_member(request.guild_id, user_id, existing.id)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        user_id,
                        channel_id = existing.id,
                        "Moved user to their existing room"
                    );
                    return RoomOutcome::MovedToExisting(existing.id);
                }
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        channel_id = existing.id,
                        "Failed to move user to existing room, creating a new one: {}",
                        e
                    );
                }
            }
        }

        if !self.registry.begin_creation(user_id, Instant::now()) {
            tracing::debug!(user_id, "Room creation already in flight");
            return RoomOutcome::Skipped(SkipReason::InFlight);
        }

        self.provision_room(&request, category_id).await
    }

    /// Voice channels named after the user that are either known rooms or sit
    /// in the trigger's category. Picks the least crowded one.
    async fn find_reusable_room(
        &self,
        request: &RoomRequest,
        category_id: Option<u64>,
    ) -> Option<ChannelInfo> {
        let pairs = self.pairs.read().await;

        self.platform
            .guild_channels(request.guild_id)
            .into_iter()
            .filter(|channel| {
                channel.kind == ChannelKind::Voice
                    && channel.id != request.trigger_channel_id
                    && channel.name == request.display_name
                    && (pairs.contains(channel.id)
                        || (category_id.is_some() && channel.category_id == category_id))
            })
            .min_by_key(|channel| {
                self.platform
                    .channel_members(request.guild_id, channel.id)
                    .len()
            })
    }

    async fn provision_room(&self, request: &RoomRequest, category_id: Option<u64>) -> RoomOutcome {
        let guild_id = request.guild_id;
        let user_id = request.user_id;
        let name = request.display_name.as_str();

        let created = gather_all(vec![
            self.platform
                .create_voice_channel(guild_id, name, category_id)
                .boxed(),
            self.platform
                .create_text_channel(guild_id, name, category_id)
                .boxed(),
        ])
        .await;

        let channels = match created.into_all_ok() {
            Ok(channels) => channels,
            Err((orphans, errors)) => {
                for e in &errors {
                    tracing::error!(user_id, "Failed to create room channel: {}", e);
                }
                let orphan_ids: Vec<u64> = orphans.iter().map(|c| c.id).collect();
                self.delete_channels(&orphan_ids).await;
                return RoomOutcome::Failed;
            }
        };

        let Ok([voice, text]) = <[ChannelInfo; 2]>::try_from(channels) else {
            return RoomOutcome::Failed;
        };

        tracing::info!(
            user_id,
            voice_id = voice.id,
            text_id = text.id,
            "Created room channels for {}",
            name
        );

        let wanted_position = voice.position.saturating_add(1);
        if text.position != wanted_position {
            if let Err(e) = self
                .platform
                .edit_channel_position(text.id, wanted_position)
                .await
            {
                tracing::warn!(channel_id = text.id, "Failed to update text channel position: {}", e);
            }
        }

        let moved = match tokio::time::timeout(
            self.settings.move_timeout,
            self.platform.move_member(guild_id, user_id, voice.id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout),
        };

        if let Err(e) = moved {
            tracing::error!(
                user_id,
                voice_id = voice.id,
                "Failed to move user into new room, rolling back: {}",
                e
            );
            let failures = self.delete_channels(&[voice.id, text.id]).await;
            if failures > 0 {
                tracing::error!(user_id, failures, "Rollback left channels behind");
            }
            return RoomOutcome::RolledBack;
        }

        let pair = RoomPair {
            guild_id,
            owner_id: user_id,
            voice_id: voice.id,
            text_id: text.id,
            created_at: Utc::now(),
        };
        self.pairs.write().await.link(pair.clone());

        if let Err(e) = self
            .platform
            .send_message(text.id, &format!("Welcome to {}'s room!", name))
            .await
        {
            tracing::warn!(channel_id = text.id, "Failed to send room welcome: {}", e);
        }

        tracing::info!(user_id, voice_id = voice.id, "Moved user into their new room");
        RoomOutcome::Created(pair)
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Called when somebody left `voice_id`. Schedules a delayed deletion if
    /// the channel is a managed room and is now empty.
    pub async fn on_room_left(self: &Arc<Self>, guild_id: u64, voice_id: u64) -> bool {
        if !self.is_managed(voice_id).await {
            return false;
        }
        if !self.platform.channel_members(guild_id, voice_id).is_empty() {
            return false;
        }
        self.schedule_teardown(guild_id, voice_id).await;
        true
    }

    /// Delete the room after the grace delay unless it is occupied again by then.
    /// A newer schedule for the same room replaces the older one.
    pub async fn schedule_teardown(self: &Arc<Self>, guild_id: u64, voice_id: u64) {
        let generation = self.teardown_generation.fetch_add(1, Ordering::Relaxed);
        let manager = Arc::clone(self);
        let grace = self.settings.delete_grace;

        let mut pending = self.pending_teardowns.lock().await;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let outcome = manager.teardown_now(guild_id, voice_id).await;
            tracing::debug!(voice_id, ?outcome, "Scheduled room teardown finished");

            let mut pending = manager.pending_teardowns.lock().await;
            if pending.get(&voice_id).map(|(gen, _)| *gen) == Some(generation) {
                pending.remove(&voice_id);
            }
        });

        if let Some((_, previous)) = pending.insert(voice_id, (generation, handle)) {
            previous.abort();
        }
        tracing::info!(voice_id, "Room is empty, deletion scheduled");
    }

    #[cfg(test)]
    pub async fn pending_teardowns(&self) -> usize {
        self.pending_teardowns.lock().await.len()
    }

    /// Delete an empty managed room and its companion right away.
    pub async fn teardown_now(&self, guild_id: u64, voice_id: u64) -> TeardownOutcome {
        let Some(text_id) = self.pair_of(voice_id).await else {
            return TeardownOutcome::NotManaged;
        };

        if !self.platform.channel_members(guild_id, voice_id).is_empty() {
            tracing::info!(voice_id, "Room was rejoined, deletion cancelled");
            return TeardownOutcome::Occupied;
        }

        let deleted = gather_all([voice_id, text_id].map(|id| self.delete_channel(id))).await;
        let failures = deleted.failures();

        if deleted.results[0].is_err() {
            tracing::error!(voice_id, "Voice channel could not be deleted, keeping pair");
            return TeardownOutcome::Failed;
        }

        match self.pairs.write().await.unlink(voice_id) {
            Some(pair) => {
                if deleted.all_ok() {
                    tracing::info!(voice_id, text_id, "Deleted room");
                } else {
                    tracing::warn!(voice_id, text_id, "Deleted room, text channel was left behind");
                }
                TeardownOutcome::Deleted { pair, failures }
            }
            None => TeardownOutcome::NotManaged,
        }
    }

    /// Administrative removal by either channel of a room. Channels that are
    /// not paired fall back to a name match across the guild.
    pub async fn remove_room(&self, guild_id: u64, channel_id: u64) -> RemovedRoom {
        let paired = self.pairs.read().await.pair(channel_id).cloned();
        let targets: Vec<ChannelInfo> = match paired {
            Some(pair) => {
                tracing::info!(owner_id = pair.owner_id, voice_id = pair.voice_id, "Removing room");
                std::iter::once(channel_id)
                    .chain(pair.companion_of(channel_id))
                    .filter_map(|id| self.platform.channel(guild_id, id))
                    .collect()
            }
            None => self.same_named_room(guild_id, channel_id),
        };

        if targets.is_empty() {
            return RemovedRoom::default();
        }

        {
            let mut pending = self.pending_teardowns.lock().await;
            for target in &targets {
                if let Some((_, handle)) = pending.remove(&target.id) {
                    handle.abort();
                }
            }
        }

        let results = gather_all(targets.iter().map(|t| self.delete_channel(t.id))).await;

        let mut report = RemovedRoom::default();
        let mut pairs = self.pairs.write().await;
        for (target, result) in targets.into_iter().zip(results.results) {
            match result {
                Ok(()) => {
                    pairs.unlink(target.id);
                    report.deleted.push((target.id, target.name));
                }
                Err(e) => {
                    tracing::error!(channel_id = target.id, "Failed to remove room channel: {}", e);
                    report.failed.push(target.id);
                }
            }
        }

        report
    }

    /// The selected channel plus the first channel of the other kind whose
    /// name matches it.
    fn same_named_room(&self, guild_id: u64, channel_id: u64) -> Vec<ChannelInfo> {
        let Some(selected) = self.platform.channel(guild_id, channel_id) else {
            return Vec::new();
        };
        let other_kind = match selected.kind {
            ChannelKind::Voice => ChannelKind::Text,
            ChannelKind::Text => ChannelKind::Voice,
            ChannelKind::Other => return Vec::new(),
        };
        let slug = room_slug(&selected.name);

        let companion = self
            .platform
            .guild_channels(guild_id)
            .into_iter()
            .find(|c| c.kind == other_kind && room_slug(&c.name) == slug);

        std::iter::once(selected).chain(companion).collect()
    }

    // ------------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------------

    pub fn sweep_expired(&self, now: Instant) -> usize {
        let removed = self.registry.sweep_expired(now, self.settings.stale_after);
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.registry.tracked_users(),
                "Swept stale cooldown entries"
            );
        }
        removed
    }

    /// Abort every pending deletion and wait for the tasks to stop.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .pending_teardowns
            .lock()
            .await
            .drain()
            .map(|(_, (_, handle))| handle)
            .collect();

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        let pairs = self.pairs.read().await;
        if !pairs.is_empty() {
            tracing::warn!(open_rooms = pairs.len(), "Shutting down with rooms still open");
        }
    }

    /// Delete one channel; a channel that is already gone counts as deleted.
    async fn delete_channel(&self, channel_id: u64) -> Result<(), PlatformError> {
        match self.platform.delete_channel(channel_id).await {
            Ok(()) | Err(PlatformError::NotFound) => Ok(()),
            Err(e) => {
                tracing::error!(channel_id, "Failed to delete channel: {}", e);
                Err(e)
            }
        }
    }

    /// Delete several channels concurrently; returns how many failed.
    async fn delete_channels(&self, channel_ids: &[u64]) -> usize {
        gather_all(channel_ids.iter().map(|id| self.delete_channel(*id)))
            .await
            .failures()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    pub const GUILD: u64 = 1;
    pub const CATEGORY: u64 = 500;
    pub const TRIGGER: u64 = 600;
    pub const ALICE: u64 = 42;
    pub const BOB: u64 = 43;

    /// In-memory platform that records calls and can be told to misbehave.
    #[derive(Default)]
    pub struct FakePlatform {
        next_id: AtomicU64,
        pub channels: DashMap<u64, ChannelInfo>,
        // user id -> voice channel id
        pub voice: DashMap<u64, u64>,
        pub messages: DashMap<u64, Vec<String>>,
        pub deleted: DashMap<u64, ()>,
        pub creations: AtomicU64,
        pub fail_move: AtomicBool,
        pub stall_move: AtomicBool,
        pub fail_text_create: AtomicBool,
        pub fail_position: AtomicBool,
        // Create text channels right below the voice channel
        pub text_follows_voice: AtomicBool,
        // channel id -> requested position
        pub position_edits: DashMap<u64, u16>,
        pub fail_delete: DashMap<u64, ()>,
        // Channels whose move requests are rejected
        pub refuse_move_into: DashMap<u64, ()>,
    }

    impl FakePlatform {
        pub fn new() -> Self {
            let platform = Self {
                next_id: AtomicU64::new(1000),
                ..Default::default()
            };
            platform.add_channel(TRIGGER, "Join to create", ChannelKind::Voice, Some(CATEGORY), 0);
            platform
        }

        pub fn add_channel(
            &self,
            id: u64,
            name: &str,
            kind: ChannelKind,
            category_id: Option<u64>,
            position: u16,
        ) {
            self.channels.insert(
                id,
                ChannelInfo {
                    id,
                    guild_id: GUILD,
                    name: name.to_string(),
                    kind,
                    category_id,
                    position,
                },
            );
        }

        pub fn connect(&self, user_id: u64, channel_id: u64) {
            self.voice.insert(user_id, channel_id);
        }

        pub fn disconnect(&self, user_id: u64) {
            self.voice.remove(&user_id);
        }

        pub fn location(&self, user_id: u64) -> Option<u64> {
            self.voice.get(&user_id).map(|c| *c)
        }

        fn create(
            &self,
            name: &str,
            kind: ChannelKind,
            category_id: Option<u64>,
        ) -> Result<ChannelInfo, PlatformError> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let position = match kind {
                ChannelKind::Voice => 5,
                _ if self.text_follows_voice.load(Ordering::SeqCst) => 6,
                _ => 0,
            };
            self.add_channel(id, name, kind, category_id, position);
            Ok(self.channels.get(&id).map(|c| c.clone()).expect("just inserted"))
        }
    }

    #[async_trait]
    impl ChannelPlatform for FakePlatform {
        async fn create_voice_channel(
            &self,
            _guild_id: u64,
            name: &str,
            category_id: Option<u64>,
        ) -> Result<ChannelInfo, PlatformError> {
            self.create(name, ChannelKind::Voice, category_id)
        }

        async fn create_text_channel(
            &self,
            _guild_id: u64,
            name: &str,
            category_id: Option<u64>,
        ) -> Result<ChannelInfo, PlatformError> {
            if self.fail_text_create.load(Ordering::SeqCst) {
                return Err(PlatformError::PermissionDenied);
            }
            self.create(&room_slug(name), ChannelKind::Text, category_id)
        }

        async fn delete_channel(&self, channel_id: u64) -> Result<(), PlatformError> {
            if self.fail_delete.contains_key(&channel_id) {
                return Err(PlatformError::Transient("500".into()));
            }
            match self.channels.remove(&channel_id) {
                Some(_) => {
                    self.deleted.insert(channel_id, ());
                    Ok(())
                }
                None => Err(PlatformError::NotFound),
            }
        }

        async fn edit_channel_position(
            &self,
            channel_id: u64,
            position: u16,
        ) -> Result<(), PlatformError> {
            self.position_edits.insert(channel_id, position);
            if self.fail_position.load(Ordering::SeqCst) {
                return Err(PlatformError::PermissionDenied);
            }
            let mut channel = self
                .channels
                .get_mut(&channel_id)
                .ok_or(PlatformError::NotFound)?;
            channel.position = position;
            Ok(())
        }

        async fn move_member(
            &self,
            _guild_id: u64,
            user_id: u64,
            channel_id: u64,
        ) -> Result<(), PlatformError> {
            if self.stall_move.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_move.load(Ordering::SeqCst)
                || self.refuse_move_into.contains_key(&channel_id)
            {
                return Err(PlatformError::PermissionDenied);
            }
            if !self.voice.contains_key(&user_id) {
                return Err(PlatformError::NotFound);
            }
            self.voice.insert(user_id, channel_id);
            Ok(())
        }

        async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), PlatformError> {
            self.messages
                .entry(channel_id)
                .or_default()
                .push(content.to_string());
            Ok(())
        }

        fn channel(&self, _guild_id: u64, channel_id: u64) -> Option<ChannelInfo> {
            self.channels.get(&channel_id).map(|c| c.clone())
        }

        fn guild_channels(&self, _guild_id: u64) -> Vec<ChannelInfo> {
            let mut channels: Vec<ChannelInfo> =
                self.channels.iter().map(|c| c.value().clone()).collect();
            channels.sort_by_key(|c| c.id);
            channels
        }

        fn channel_members(&self, _guild_id: u64, channel_id: u64) -> Vec<u64> {
            self.voice
                .iter()
                .filter(|entry| *entry.value() == channel_id)
                .map(|entry| *entry.key())
                .collect()
        }
    }

    pub fn make_manager() -> Arc<RoomLifecycleManager<FakePlatform>> {
        Arc::new(RoomLifecycleManager::new(
            FakePlatform::new(),
            RoomSettings::default(),
        ))
    }

    pub fn request(user_id: u64, name: &str) -> RoomRequest {
        RoomRequest {
            guild_id: GUILD,
            user_id,
            display_name: name.to_string(),
            trigger_channel_id: TRIGGER,
        }
    }

    async fn create_for_alice(manager: &RoomLifecycleManager<FakePlatform>) -> RoomPair {
        manager.platform().connect(ALICE, TRIGGER);
        match manager.create_room(request(ALICE, "Alice")).await {
            RoomOutcome::Created(pair) => pair,
            other => panic!("expected a new room, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn join_creates_paired_room_in_trigger_category() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        let platform = manager.platform();

        let voice = platform.channel(GUILD, pair.voice_id).expect("voice exists");
        let text = platform.channel(GUILD, pair.text_id).expect("text exists");
        assert_eq!(voice.name, "Alice");
        assert_eq!(voice.kind, ChannelKind::Voice);
        assert_eq!(text.name, "alice");
        assert_eq!(voice.category_id, Some(CATEGORY));
        assert_eq!(text.category_id, Some(CATEGORY));
        assert_eq!(text.position, voice.position + 1);

        assert_eq!(platform.location(ALICE), Some(pair.voice_id));
        assert_eq!(manager.pair_of(pair.voice_id).await, Some(pair.text_id));
        assert_eq!(manager.pair_of(pair.text_id).await, Some(pair.voice_id));
        assert_eq!(
            platform.messages.get(&pair.text_id).map(|m| m.clone()),
            Some(vec!["Welcome to Alice's room!".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_joins_for_one_user_create_one_room() {
        let manager = make_manager();
        manager.platform().connect(ALICE, TRIGGER);

        let outcomes =
            futures::future::join_all((0..5).map(|_| manager.create_room(request(ALICE, "Alice"))))
                .await;

        let created = outcomes
            .iter()
            .filter(|o| matches!(o, RoomOutcome::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(manager.room_count().await, 1);
        assert_eq!(manager.platform().creations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_within_cooldown_is_ignored() {
        let manager = make_manager();
        create_for_alice(&manager).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        manager.platform().connect(ALICE, TRIGGER);
        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert_eq!(outcome, RoomOutcome::Skipped(SkipReason::Cooldown));
        assert_eq!(manager.room_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_after_cooldown_reuses_existing_room() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;

        tokio::time::advance(Duration::from_secs(3)).await;
        manager.platform().connect(ALICE, TRIGGER);
        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert_eq!(outcome, RoomOutcome::MovedToExisting(pair.voice_id));
        assert_eq!(manager.platform().location(ALICE), Some(pair.voice_id));
        assert_eq!(manager.platform().creations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reuse_picks_least_crowded_same_named_room() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.add_channel(700, "Alice", ChannelKind::Voice, Some(CATEGORY), 1);
        platform.add_channel(701, "Alice", ChannelKind::Voice, Some(CATEGORY), 2);
        // Same name but in another category and not a known room.
        platform.add_channel(702, "Alice", ChannelKind::Voice, Some(999), 3);
        platform.connect(BOB, 700);
        platform.connect(ALICE, TRIGGER);

        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert_eq!(outcome, RoomOutcome::MovedToExisting(701));
        assert_eq!(platform.creations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_move_to_existing_room_falls_through_to_creation() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.add_channel(700, "Alice", ChannelKind::Voice, Some(CATEGORY), 1);
        platform.refuse_move_into.insert(700, ());
        platform.connect(ALICE, TRIGGER);

        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert!(matches!(outcome, RoomOutcome::Created(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn move_timeout_rolls_back_both_channels() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.stall_move.store(true, Ordering::SeqCst);
        platform.connect(ALICE, TRIGGER);

        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert_eq!(outcome, RoomOutcome::RolledBack);
        assert_eq!(platform.deleted.len(), 2);
        assert_eq!(platform.channels.len(), 1); // only the trigger is left
        assert_eq!(manager.room_count().await, 0);
        assert_eq!(platform.location(ALICE), Some(TRIGGER));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_move_rolls_back_and_releases_user() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.fail_move.store(true, Ordering::SeqCst);
        platform.connect(ALICE, TRIGGER);

        assert_eq!(
            manager.create_room(request(ALICE, "Alice")).await,
            RoomOutcome::RolledBack
        );
        assert_eq!(manager.room_count().await, 0);
        assert!(!manager.registry.is_creating(ALICE));

        // Next join after the cooldown tries again from scratch.
        platform.fail_move.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(
            manager.create_room(request(ALICE, "Alice")).await,
            RoomOutcome::Created(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_creation_failure_deletes_the_created_half() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.fail_text_create.store(true, Ordering::SeqCst);
        platform.connect(ALICE, TRIGGER);

        let outcome = manager.create_room(request(ALICE, "Alice")).await;

        assert_eq!(outcome, RoomOutcome::Failed);
        assert_eq!(platform.deleted.len(), 1);
        assert_eq!(platform.channels.len(), 1);
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn position_edit_failure_is_not_fatal() {
        let manager = make_manager();
        manager.platform().fail_position.store(true, Ordering::SeqCst);

        let pair = create_for_alice(&manager).await;
        assert_eq!(manager.pair_of(pair.voice_id).await, Some(pair.text_id));
    }

    #[tokio::test(start_paused = true)]
    async fn text_channel_is_moved_below_its_voice_channel() {
        let manager = make_manager();

        let pair = create_for_alice(&manager).await;
        let platform = manager.platform();

        assert_eq!(platform.position_edits.get(&pair.text_id).map(|p| *p), Some(6));
        assert_eq!(platform.channel(GUILD, pair.text_id).map(|c| c.position), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn position_edit_is_skipped_when_text_already_follows_voice() {
        let manager = make_manager();
        manager.platform().text_follows_voice.store(true, Ordering::SeqCst);

        let pair = create_for_alice(&manager).await;

        assert!(manager.platform().position_edits.is_empty());
        assert_eq!(manager.pair_of(pair.voice_id).await, Some(pair.text_id));
    }

    #[tokio::test(start_paused = true)]
    async fn two_users_get_distinct_rooms_concurrently() {
        let manager = make_manager();
        manager.platform().connect(ALICE, TRIGGER);
        manager.platform().connect(BOB, TRIGGER);

        let (alice, bob) = tokio::join!(
            manager.create_room(request(ALICE, "Alice")),
            manager.create_room(request(BOB, "Bob"))
        );

        let (RoomOutcome::Created(alice), RoomOutcome::Created(bob)) = (alice, bob) else {
            panic!("both users should get a room");
        };
        assert_ne!(alice.voice_id, bob.voice_id);
        assert_ne!(alice.text_id, bob.text_id);
        assert_eq!(manager.room_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_is_deleted_after_grace_delay() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;

        manager.platform().disconnect(ALICE);
        assert!(manager.on_room_left(GUILD, pair.voice_id).await);

        // Still there during the grace delay.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.room_count().await, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.room_count().await, 0);
        assert_eq!(manager.pair_of(pair.voice_id).await, None);
        assert_eq!(manager.pair_of(pair.text_id).await, None);
        assert!(manager.platform().deleted.contains_key(&pair.voice_id));
        assert!(manager.platform().deleted.contains_key(&pair.text_id));
        assert_eq!(manager.pending_teardowns().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_during_grace_keeps_the_room() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;

        manager.platform().disconnect(ALICE);
        assert!(manager.on_room_left(GUILD, pair.voice_id).await);

        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.platform().connect(ALICE, pair.voice_id);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(manager.pair_of(pair.voice_id).await, Some(pair.text_id));
        assert!(manager.platform().deleted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_an_occupied_or_unmanaged_channel_schedules_nothing() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        manager.platform().connect(BOB, pair.voice_id);
        manager.platform().disconnect(ALICE);

        assert!(!manager.on_room_left(GUILD, pair.voice_id).await);
        assert!(!manager.on_room_left(GUILD, TRIGGER).await);
        assert_eq!(manager.pending_teardowns().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_voice_delete_keeps_pair_for_retry() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        manager.platform().disconnect(ALICE);
        manager.platform().fail_delete.insert(pair.voice_id, ());

        assert_eq!(
            manager.teardown_now(GUILD, pair.voice_id).await,
            TeardownOutcome::Failed
        );
        assert_eq!(manager.pair_of(pair.voice_id).await, Some(pair.text_id));

        manager.platform().fail_delete.remove(&pair.voice_id);
        assert!(matches!(
            manager.teardown_now(GUILD, pair.voice_id).await,
            TeardownOutcome::Deleted { failures: 0, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn text_delete_failure_still_unlinks() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        manager.platform().disconnect(ALICE);
        manager.platform().fail_delete.insert(pair.text_id, ());

        let outcome = manager.teardown_now(GUILD, pair.voice_id).await;

        assert!(matches!(outcome, TeardownOutcome::Deleted { failures: 1, .. }));
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_room_by_text_channel_removes_pair() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;

        let removed = manager.remove_room(GUILD, pair.text_id).await;

        assert_eq!(removed.deleted.len(), 2);
        assert!(removed.failed.is_empty());
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_room_falls_back_to_name_match() {
        let manager = make_manager();
        let platform = manager.platform();
        platform.add_channel(800, "Bob Smith", ChannelKind::Voice, None, 1);
        platform.add_channel(801, "bob-smith", ChannelKind::Text, None, 2);
        platform.add_channel(802, "general", ChannelKind::Text, None, 3);

        let removed = manager.remove_room(GUILD, 800).await;

        let ids: Vec<u64> = removed.deleted.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![800, 801]);
        assert!(platform.channels.contains_key(&802));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_room_cancels_pending_teardown() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        manager.platform().disconnect(ALICE);
        manager.on_room_left(GUILD, pair.voice_id).await;

        manager.remove_room(GUILD, pair.voice_id).await;
        assert_eq!(manager.pending_teardowns().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_pending_teardowns() {
        let manager = make_manager();
        let pair = create_for_alice(&manager).await;
        manager.platform().disconnect(ALICE);
        manager.on_room_left(GUILD, pair.voice_id).await;

        manager.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(manager.pending_teardowns().await, 0);
        assert_eq!(manager.room_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_forgets_idle_users() {
        let manager = make_manager();
        create_for_alice(&manager).await;

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(manager.sweep_expired(later), 1);
    }
}
