//! Chat admission controller implementation
//!
//! Owns the chat-request lifecycle (pending -> accepted -> active,
//! blocked/deleted terminal) and the cap on simultaneously pending requests
//! per listing. Premium initiators bypass the cap; free initiators compete
//! for the remaining slots.
//!
//! The pending-count check and the insert are deliberately not atomic
//! against two simultaneous free-tier requests for the same listing: a
//! small overshoot of the cap under a true race is accepted, the cap is an
//! abuse deterrent, not a capacity bound.

use tracing::{info, warn};
use crate::database::repositories::{AccountRepository, ChatRepository};
use crate::models::account::Account;
use crate::models::chat::{ChatRequest, Message, MessageContent};
use crate::services::entitlement::EntitlementService;
use crate::services::notification::{NotificationPayload, NotificationService};
use crate::services::quota::QuotaService;
use crate::utils::errors::{AnonimkaError, Result};

/// Whether a new chat request may join the pending set
pub fn admission_allowed(initiator_premium: bool, pending: i64, cap: i64) -> bool {
    initiator_premium || pending < cap
}

/// Chat admission controller
#[derive(Clone)]
pub struct ChatService {
    chats: ChatRepository,
    accounts: AccountRepository,
    entitlement: EntitlementService,
    quota: QuotaService,
    notifier: NotificationService,
    pending_cap: i64,
}

impl ChatService {
    pub fn new(
        chats: ChatRepository,
        accounts: AccountRepository,
        entitlement: EntitlementService,
        quota: QuotaService,
        notifier: NotificationService,
        pending_cap: i64,
    ) -> Self {
        Self { chats, accounts, entitlement, quota, notifier, pending_cap }
    }

    /// Open a chat request from `initiator` to `recipient`, optionally tied
    /// to a listing. The first message is staged on the request and only
    /// materialized on acceptance.
    pub async fn request_chat(
        &self,
        initiator: &Account,
        recipient: &Account,
        listing_id: Option<i64>,
        first_message: &str,
    ) -> Result<ChatRequest> {
        if initiator.is_banned {
            return Err(AnonimkaError::Banned { token: initiator.token.clone() });
        }
        if initiator.token == recipient.token {
            return Err(AnonimkaError::InvalidInput(
                "Cannot open a chat with yourself".to_string(),
            ));
        }

        let premium = self.entitlement.is_effectively_premium(initiator).await?;
        if !premium {
            let pending = match listing_id {
                Some(listing) => self.chats.count_pending_for_listing(listing).await?,
                None => self.chats.count_pending_for_recipient(&recipient.token).await?,
            };
            if !admission_allowed(premium, pending, self.pending_cap) {
                warn!(
                    initiator = %initiator.token,
                    listing_id = listing_id,
                    pending = pending,
                    "Chat request rejected by admission cap"
                );
                return Err(AnonimkaError::AdmissionLimitReached {
                    pending,
                    cap: self.pending_cap,
                });
            }
        }

        let (request, created) = self
            .chats
            .create_pending(&initiator.token, &recipient.token, listing_id, first_message)
            .await?;

        // A pre-existing (possibly accepted or blocked) request must not
        // ping the recipient again
        if created {
            info!(
                chat_id = request.id,
                initiator = %initiator.token,
                listing_id = listing_id,
                premium = premium,
                "Chat request created"
            );
            self.notify_detached(
                recipient.clone(),
                NotificationPayload::chat_request(request.id, listing_id),
            );
        }

        Ok(request)
    }

    /// Accept a pending request. Only the recipient may accept; the staged
    /// first message becomes the first Message row.
    pub async fn accept(&self, chat_id: i64, recipient: &Account) -> Result<ChatRequest> {
        let mut tx = self.chats.pool().begin().await?;

        let pending = self
            .chats
            .find_pending_for_update(&mut tx, chat_id, &recipient.token)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id })?;

        if let Some(staged) = pending.staged_message.as_deref().filter(|s| !s.trim().is_empty()) {
            self.chats
                .insert_message(&mut tx, chat_id, &pending.initiator, Some(staged), None, None)
                .await?;
        }

        let accepted = self.chats.mark_accepted(&mut tx, chat_id).await?;
        tx.commit().await?;

        info!(chat_id = chat_id, recipient = %recipient.token, "Chat request accepted");
        Ok(accepted)
    }

    /// Reject a pending request: the row is deleted, no message is ever
    /// materialized. Repeated calls are no-ops.
    pub async fn reject(&self, chat_id: i64, recipient: &Account) -> Result<()> {
        let removed = self.chats.delete_pending(chat_id, &recipient.token).await?;
        if removed {
            info!(chat_id = chat_id, recipient = %recipient.token, "Chat request rejected");
        }
        Ok(())
    }

    /// Send a message in an accepted chat. Photos pass through the photo
    /// quota first; `recipient_viewing` skips the notification when the
    /// other participant already has the conversation open.
    pub async fn send_message(
        &self,
        chat_id: i64,
        sender: &Account,
        content: MessageContent,
        recipient_viewing: bool,
    ) -> Result<Message> {
        if content.is_empty() {
            return Err(AnonimkaError::InvalidInput("Message is empty".to_string()));
        }

        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id })?;

        if !chat.is_participant(&sender.token) {
            return Err(AnonimkaError::ChatNotFound { chat_id });
        }
        if chat.blocked_by.is_some() {
            return Err(AnonimkaError::Blocked);
        }
        if !chat.accepted {
            return Err(AnonimkaError::InvalidStateTransition {
                from: "pending".to_string(),
                to: "message".to_string(),
            });
        }

        if content.photo_ref.is_some() {
            self.quota.consume_photo_slot(sender).await?;
        }

        let mut tx = self.chats.pool().begin().await?;
        let message = self
            .chats
            .insert_message(
                &mut tx,
                chat_id,
                &sender.token,
                content.body.as_deref(),
                content.photo_ref.as_deref(),
                content.reply_to,
            )
            .await?;
        self.chats.touch_last_message(&mut tx, chat_id).await?;
        tx.commit().await?;

        if !recipient_viewing {
            if let Some(other_token) = chat.other_participant(&sender.token) {
                if let Some(other) = self.accounts.find_by_token(other_token).await? {
                    self.notify_detached(
                        other,
                        NotificationPayload::new_message(chat_id, content.photo_ref.is_some()),
                    );
                }
            }
        }

        Ok(message)
    }

    /// Block the other participant. Terminal for new messages until the
    /// separate unblock surface clears it.
    pub async fn block(&self, chat_id: i64, blocker: &Account) -> Result<()> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id })?;

        if !chat.is_participant(&blocker.token) {
            return Err(AnonimkaError::ChatNotFound { chat_id });
        }

        let changed = self.chats.set_blocked(chat_id, &blocker.token).await?;
        if changed {
            info!(chat_id = chat_id, blocker = %blocker.token, "Chat blocked");
        }
        Ok(())
    }

    /// Unblock surface: only the participant that set the block may clear it
    pub async fn unblock(&self, chat_id: i64, blocker: &Account) -> Result<()> {
        let changed = self.chats.clear_blocked(chat_id, &blocker.token).await?;
        if changed {
            info!(chat_id = chat_id, blocker = %blocker.token, "Chat unblocked");
        }
        Ok(())
    }

    /// List messages of a chat for one of its participants
    pub async fn messages(&self, chat_id: i64, viewer: &Account, limit: i64) -> Result<Vec<Message>> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id })?;
        if !chat.is_participant(&viewer.token) {
            return Err(AnonimkaError::ChatNotFound { chat_id });
        }
        self.chats.list_messages(chat_id, limit).await
    }

    /// Mark the other participant's messages as read when the viewer opens
    /// the conversation
    pub async fn mark_read(&self, chat_id: i64, viewer: &Account) -> Result<()> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id })?;
        if !chat.is_participant(&viewer.token) {
            return Err(AnonimkaError::ChatNotFound { chat_id });
        }
        self.chats.mark_messages_read(chat_id, &viewer.token).await?;
        Ok(())
    }

    /// Delete one of the sender's own messages. Repeated calls are no-ops.
    pub async fn delete_message(&self, message_id: i64, sender: &Account) -> Result<()> {
        let removed = self.chats.delete_own_message(message_id, &sender.token).await?;
        if removed {
            info!(message_id = message_id, sender = %sender.token, "Message deleted");
        }
        Ok(())
    }

    /// Deliver a notification without tying the caller's outcome to it
    fn notify_detached(&self, recipient: Account, payload: NotificationPayload) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify(&recipient, payload).await;
        });
    }
}
