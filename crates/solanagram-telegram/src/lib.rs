// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram messaging backend for Solanagram workers.
//!
//! Implements [`MessagingService`] over the Telegram Bot API via teloxide.
//! The session (string or file contents) is the bot token; a subscription
//! is a `getUpdates` long-polling task filtered to one chat.

pub mod convert;

use std::future::IntoFuture;

use async_trait::async_trait;
use solanagram_core::traits::messaging::EventStream;
use solanagram_core::{Credentials, InboundEvent, MessagingService, SessionSource, SolanagramError};
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bot API backed messaging service.
pub struct TelegramMessaging {
    bot: Mutex<Option<Bot>>,
    /// Cancels every polling task spawned by `subscribe`.
    cancel: Mutex<CancellationToken>,
}

impl TelegramMessaging {
    pub fn new() -> Self {
        Self {
            bot: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    async fn bot(&self) -> Result<Bot, SolanagramError> {
        self.bot
            .lock()
            .await
            .clone()
            .ok_or_else(|| SolanagramError::transient("telegram session is not connected"))
    }
}

impl Default for TelegramMessaging {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the bot token from the session source.
async fn session_token(session: &SessionSource) -> Result<String, SolanagramError> {
    let token = match session {
        SessionSource::String(s) => s.trim().to_string(),
        SessionSource::File(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| {
                SolanagramError::Config(format!("cannot read session file {}: {e}", path.display()))
            })?
            .trim()
            .to_string(),
    };
    if token.is_empty() {
        return Err(SolanagramError::AuthRequired("session is empty".to_string()));
    }
    Ok(token)
}

/// Polls `getUpdates` and pushes matching messages into `tx` until the
/// receiver is dropped, the token is cancelled or a request fails. A failure
/// is delivered as the last item so the supervisor can classify it.
async fn poll_updates(
    bot: Bot,
    channel_id: i64,
    tx: mpsc::Sender<Result<InboundEvent, SolanagramError>>,
    cancel: CancellationToken,
) {
    let mut offset = 0;
    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(convert::POLL_TIMEOUT.as_secs() as u32);
        let updates = tokio::select! {
            _ = cancel.cancelled() => return,
            result = request.into_future() => result,
        };
        let updates = match updates {
            Ok(u) => u,
            Err(e) => {
                let _ = tx.send(Err(convert::classify(e))).await;
                return;
            }
        };
        for update in updates {
            offset = update.id.as_offset();
            let Some(msg) = convert::update_message(&update) else {
                continue;
            };
            if msg.chat.id.0 != channel_id {
                debug!(chat_id = msg.chat.id.0, "ignoring update from another chat");
                continue;
            }
            if tx.send(Ok(convert::to_event(msg))).await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl MessagingService for TelegramMessaging {
    async fn connect(
        &self,
        _credentials: &Credentials,
        session: &SessionSource,
    ) -> Result<(), SolanagramError> {
        let token = session_token(session).await?;
        *self.bot.lock().await = Some(Bot::new(token));
        *self.cancel.lock().await = CancellationToken::new();
        info!("telegram session opened");
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, SolanagramError> {
        let bot = self.bot().await?;
        match bot.get_me().await {
            Ok(me) => {
                debug!(bot_id = me.id.0, "session authorized");
                Ok(true)
            }
            Err(e) => match convert::classify(e) {
                SolanagramError::AuthRequired(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn subscribe(&self, channel_id: i64) -> Result<EventStream, SolanagramError> {
        let bot = self.bot().await?;
        // Verifies the chat is reachable before polling starts.
        bot.get_chat(ChatId(channel_id))
            .await
            .map_err(convert::classify)?;

        let (tx, rx) = mpsc::channel(100);
        let cancel = self.cancel.lock().await.child_token();
        tokio::spawn(poll_updates(bot, channel_id, tx, cancel));
        info!(channel_id, "subscribed");

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn forward(&self, target: &str, event: &InboundEvent) -> Result<(), SolanagramError> {
        let bot = self.bot().await?;
        let to = convert::recipient(target)?;
        let message_id = i32::try_from(event.message_id).map_err(|_| {
            SolanagramError::Internal(format!("message id {} out of range", event.message_id))
        })?;
        bot.forward_message(to, ChatId(event.channel_id), MessageId(message_id))
            .await
            .map_err(convert::classify)?;
        Ok(())
    }

    async fn disconnect(&self) {
        self.cancel.lock().await.cancel();
        if self.bot.lock().await.take().is_some() {
            info!("telegram session closed");
        } else {
            warn!("disconnect without an open session");
        }
    }
}
