// Event router - turns raw voice-state changes into room lifecycle work.
//
// The gateway handler only pushes `VoiceUpdate`s onto an unbounded queue; a
// single consumer task classifies them and hands them to the lifecycle manager.
// Creations run as their own tasks so different users proceed in parallel.

use super::room_models::{RoomEvent, RoomRequest, VoiceUpdate};
use super::room_platform::ChannelPlatform;
use super::room_service::RoomLifecycleManager;
use crate::core::community::CommunityChannelService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

/// Classify one voice-state change.
///
/// A move from A to B is a leave of A followed by a join of B, so this returns
/// up to two events. An empty result means the update is ignored.
pub fn classify(
    update: &VoiceUpdate,
    is_trigger: impl Fn(u64) -> bool,
    is_managed: impl Fn(u64) -> bool,
) -> Vec<RoomEvent> {
    let mut events = Vec::new();

    if update.before == update.after {
        return events;
    }

    if let Some(left) = update.before {
        if is_managed(left) {
            events.push(RoomEvent::LeftRoom {
                guild_id: update.guild_id,
                voice_id: left,
            });
        }
    }

    if let Some(joined) = update.after {
        if is_trigger(joined) {
            events.push(RoomEvent::JoinedTrigger {
                guild_id: update.guild_id,
                user_id: update.user_id,
                display_name: update.display_name.clone(),
                trigger_channel_id: joined,
            });
        }
    }

    events
}

/// Cheap, cloneable sender side of the router queue.
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<VoiceUpdate>,
}

impl RouterHandle {
    /// Queue an update. Returns false once the router has stopped.
    pub fn submit(&self, update: VoiceUpdate) -> bool {
        self.tx.send(update).is_ok()
    }
}

/// Owner side of the running router task.
pub struct RouterTask {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RouterTask {
    /// Stop taking updates and let in-flight creations finish, so their
    /// rollbacks still run. Whatever is left after `drain_timeout` is aborted.
    /// Returns false if the router had to be aborted.
    pub async fn shutdown(mut self, drain_timeout: Duration) -> bool {
        let _ = self.stop.send(());
        match tokio::time::timeout(drain_timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Voice event router failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!("Room creations still running after drain timeout, aborting");
                self.task.abort();
                false
            }
        }
    }

    /// Wait for the router to stop on its own (every handle dropped).
    #[cfg(test)]
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

pub struct EventRouter<P: ChannelPlatform> {
    manager: Arc<RoomLifecycleManager<P>>,
    community: Arc<CommunityChannelService>,
    rx: mpsc::UnboundedReceiver<VoiceUpdate>,
    stop: oneshot::Receiver<()>,
    creations: JoinSet<()>,
}

impl<P: ChannelPlatform> EventRouter<P> {
    /// Start the consumer task. It stops after every handle is dropped or
    /// [`RouterTask::shutdown`] is called, once in-flight creations have finished.
    pub fn spawn(
        manager: Arc<RoomLifecycleManager<P>>,
        community: Arc<CommunityChannelService>,
    ) -> (RouterHandle, RouterTask) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let router = Self {
            manager,
            community,
            rx,
            stop: stop_rx,
            creations: JoinSet::new(),
        };
        let task = tokio::spawn(router.run());
        (
            RouterHandle { tx },
            RouterTask {
                stop: stop_tx,
                task,
            },
        )
    }

    async fn run(mut self) {
        // Set once the RouterTask is gone without asking for a stop.
        let mut owner_gone = false;
        loop {
            tokio::select! {
                update = self.rx.recv() => match update {
                    Some(update) => self.dispatch(update).await,
                    None => break,
                },
                stop = &mut self.stop, if !owner_gone => match stop {
                    Ok(()) => {
                        // Further submits fail; queued updates are dropped.
                        self.rx.close();
                        tracing::info!(
                            in_flight = self.creations.len(),
                            "Voice event router stopping"
                        );
                        break;
                    }
                    Err(_) => owner_gone = true,
                },
                Some(finished) = self.creations.join_next(), if !self.creations.is_empty() => {
                    if let Err(e) = finished {
                        tracing::error!("Room creation task failed: {}", e);
                    }
                }
            }
        }

        while let Some(finished) = self.creations.join_next().await {
            if let Err(e) = finished {
                tracing::error!("Room creation task failed: {}", e);
            }
        }
        tracing::info!("Voice event router stopped");
    }

    async fn dispatch(&mut self, update: VoiceUpdate) {
        let guild_id = update.guild_id;
        let mut managed = Vec::new();
        if let Some(before) = update.before {
            if self.manager.is_managed(before).await {
                managed.push(before);
            }
        }

        let events = classify(
            &update,
            |channel_id| self.community.is_trigger(guild_id, channel_id),
            |channel_id| managed.contains(&channel_id),
        );

        for event in events {
            match event {
                RoomEvent::JoinedTrigger {
                    guild_id,
                    user_id,
                    display_name,
                    trigger_channel_id,
                } => {
                    tracing::info!(user_id, trigger_channel_id, "User joined a community channel");
                    let manager = Arc::clone(&self.manager);
                    let request = RoomRequest {
                        guild_id,
                        user_id,
                        display_name,
                        trigger_channel_id,
                    };
                    self.creations.spawn(async move {
                        let outcome = manager.create_room(request).await;
                        tracing::debug!(user_id, ?outcome, "Room creation finished");
                    });
                }
                RoomEvent::LeftRoom { guild_id, voice_id } => {
                    self.manager.on_room_left(guild_id, voice_id).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rooms::room_service::tests::{
        make_manager, ALICE, BOB, GUILD, TRIGGER,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn update(before: Option<u64>, after: Option<u64>) -> VoiceUpdate {
        VoiceUpdate {
            guild_id: GUILD,
            user_id: ALICE,
            display_name: "Alice".to_string(),
            before,
            after,
        }
    }

    #[test]
    fn join_of_trigger_is_classified() {
        let events = classify(&update(None, Some(TRIGGER)), |c| c == TRIGGER, |_| false);

        assert_eq!(
            events,
            vec![RoomEvent::JoinedTrigger {
                guild_id: GUILD,
                user_id: ALICE,
                display_name: "Alice".to_string(),
                trigger_channel_id: TRIGGER,
            }]
        );
    }

    #[test]
    fn leaving_managed_room_is_classified() {
        let events = classify(&update(Some(77), None), |_| false, |c| c == 77);
        assert_eq!(
            events,
            vec![RoomEvent::LeftRoom {
                guild_id: GUILD,
                voice_id: 77
            }]
        );
    }

    #[test]
    fn move_between_room_and_trigger_yields_leave_then_join() {
        let events = classify(&update(Some(77), Some(TRIGGER)), |c| c == TRIGGER, |c| c == 77);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RoomEvent::LeftRoom { voice_id: 77, .. }));
        assert!(matches!(events[1], RoomEvent::JoinedTrigger { .. }));
    }

    #[test]
    fn unrelated_updates_are_ignored() {
        // Mute/deafen: same channel before and after.
        assert!(classify(&update(Some(TRIGGER), Some(TRIGGER)), |_| true, |_| true).is_empty());
        // Plain channel hop outside the room system.
        assert!(classify(&update(Some(5), Some(6)), |_| false, |_| false).is_empty());
        assert!(classify(&update(None, None), |_| true, |_| true).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn router_creates_and_tears_down_rooms() {
        let manager = make_manager();
        let community = Arc::new(CommunityChannelService::new());
        community.set_triggers(GUILD, [TRIGGER]);
        let (handle, task) = EventRouter::spawn(Arc::clone(&manager), community);

        manager.platform().connect(ALICE, TRIGGER);
        assert!(handle.submit(update(None, Some(TRIGGER))));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let rooms = manager.rooms_in_guild(GUILD).await;
        assert_eq!(rooms.len(), 1);
        let voice_id = rooms[0].voice_id;
        assert_eq!(manager.platform().location(ALICE), Some(voice_id));

        manager.platform().disconnect(ALICE);
        assert!(handle.submit(update(Some(voice_id), None)));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(manager.room_count().await, 0);

        drop(handle);
        task.join().await.expect("router exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn router_ignores_non_trigger_channels() {
        let manager = make_manager();
        let community = Arc::new(CommunityChannelService::new());
        let (handle, task) = EventRouter::spawn(Arc::clone(&manager), community);

        manager.platform().connect(BOB, TRIGGER);
        handle.submit(VoiceUpdate {
            guild_id: GUILD,
            user_id: BOB,
            display_name: "Bob".to_string(),
            before: None,
            after: Some(TRIGGER),
        });
        drop(handle);
        task.join().await.expect("router exits cleanly");

        assert_eq!(manager.room_count().await, 0);
        assert_eq!(manager.platform().location(BOB), Some(TRIGGER));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_lets_in_flight_creation_roll_back() {
        let manager = make_manager();
        let community = Arc::new(CommunityChannelService::new());
        community.set_triggers(GUILD, [TRIGGER]);
        let (handle, task) = EventRouter::spawn(Arc::clone(&manager), community);

        manager.platform().connect(ALICE, TRIGGER);
        manager.platform().stall_move.store(true, Ordering::SeqCst);
        assert!(handle.submit(update(None, Some(TRIGGER))));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.platform().creations.load(Ordering::SeqCst), 2);

        assert!(task.shutdown(Duration::from_secs(30)).await);

        // The stalled move timed out and both channels were cleaned up.
        assert_eq!(manager.platform().deleted.len(), 2);
        assert_eq!(manager.room_count().await, 0);
        assert!(!handle.submit(update(None, Some(TRIGGER))));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_creations_that_outlive_the_drain_timeout() {
        let manager = make_manager();
        let community = Arc::new(CommunityChannelService::new());
        community.set_triggers(GUILD, [TRIGGER]);
        let (handle, task) = EventRouter::spawn(Arc::clone(&manager), community);

        manager.platform().connect(ALICE, TRIGGER);
        manager.platform().stall_move.store(true, Ordering::SeqCst);
        assert!(handle.submit(update(None, Some(TRIGGER))));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!task.shutdown(Duration::from_secs(1)).await);
        assert!(!handle.submit(update(None, Some(TRIGGER))));
    }
}
