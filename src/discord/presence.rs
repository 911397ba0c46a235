//! Discord Rich Presence client built on discord-sdk.

use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use discord_sdk::{
    activity::{ActivityBuilder, Assets},
    wheel::{UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::sync::watch;

use crate::presence::{
    Activity, DisconnectSignal, PresenceClient, PresenceConnection, PresenceError, PresenceSession,
};

/// Timeout for waiting for the Discord handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials the local Discord client over its IPC socket.
#[derive(Default)]
pub struct DiscordClient;

impl DiscordClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PresenceClient for DiscordClient {
    async fn connect(&self, application_id: &str) -> Result<PresenceConnection, PresenceError> {
        let app_id: i64 = application_id
            .parse()
            .map_err(|_| PresenceError::InvalidApplicationId(application_id.to_string()))?;

        let (wheel, handler) = Wheel::new(Box::new(|err| {
            tracing::warn!("Discord error: {:?}", err);
        }));

        let mut user_spoke = wheel.user();

        let discord = Discord::new(app_id, Subscriptions::ACTIVITY, Box::new(handler))
            .map_err(|e| PresenceError::Unavailable(e.to_string()))?;

        tracing::info!("Discord connecting...");

        let user = match tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            if user_spoke.0.changed().await.is_err() {
                Err("Discord connection closed".to_string())
            } else {
                match &*user_spoke.0.borrow() {
                    UserState::Connected(user) => Ok(user.clone()),
                    UserState::Disconnected(err) => Err(format!("Discord disconnected: {:?}", err)),
                }
            }
        })
        .await
        {
            Ok(Ok(user)) => user,
            Ok(Err(err)) => return Err(PresenceError::Handshake(err)),
            Err(_) => return Err(PresenceError::HandshakeTimeout),
        };

        tracing::info!("Discord Rich Presence connected as {}", user.username);

        let user_state = user_spoke.0;

        let mut signal_rx = user_state.clone();
        let disconnected: DisconnectSignal = Box::pin(async move {
            loop {
                if signal_rx.changed().await.is_err() {
                    return;
                }
                if matches!(&*signal_rx.borrow(), UserState::Disconnected(_)) {
                    return;
                }
            }
        });

        Ok(PresenceConnection {
            session: Box::new(DiscordSession {
                discord,
                user_state,
            }),
            disconnected,
        })
    }
}

struct DiscordSession {
    discord: Discord,
    user_state: watch::Receiver<UserState>,
}

#[async_trait]
impl PresenceSession for DiscordSession {
    fn is_ready(&self) -> bool {
        matches!(&*self.user_state.borrow(), UserState::Connected(_))
    }

    async fn set_activity(&self, activity: &Activity) -> Result<(), PresenceError> {
        self.discord
            .update_activity(to_builder(activity))
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Update(e.to_string()))
    }

    async fn clear_activity(&self) -> Result<(), PresenceError> {
        self.discord
            .clear_activity()
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Update(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let DiscordSession { discord, .. } = *self;
        discord.disconnect().await;
        tracing::info!("Discord Rich Presence disconnected");
    }
}

fn to_builder(activity: &Activity) -> ActivityBuilder {
    let mut assets = Assets::default().large(
        activity.large_image_key.as_str(),
        Some(activity.large_image_text.as_str()),
    );
    if let Some(key) = activity.small_image_key.as_deref() {
        assets = assets.small(key, activity.small_image_text.as_deref());
    }

    let start = UNIX_EPOCH + Duration::from_secs(activity.start_timestamp.max(0) as u64);

    ActivityBuilder::new()
        .details(activity.details.as_str())
        .state(activity.state.as_str())
        .assets(assets)
        .start_timestamp(start)
        .instance(activity.instance)
}
