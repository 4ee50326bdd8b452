// Issues cards and posts them to the configured log channel.

use super::card_models::{CardKind, CardRecord};
use crate::core::rooms::ChannelPlatform;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CardError {
    #[error("Please tell me who the card is for")]
    MissingTarget,
    #[error("A reason is required for this card")]
    MissingReason,
    #[error("{0} is not a mentor/mentee")]
    NotMentee(String),
}

/// True when any role name contains "room" (case-insensitive).
pub fn is_mentee<'a>(role_names: impl IntoIterator<Item = &'a str>) -> bool {
    role_names
        .into_iter()
        .any(|name| name.to_lowercase().contains("room"))
}

pub struct CardService<P: ChannelPlatform> {
    platform: P,
    log_channel_id: Option<u64>,
}

impl<P: ChannelPlatform> CardService<P> {
    pub fn new(platform: P, log_channel_id: Option<u64>) -> Self {
        Self {
            platform,
            log_channel_id,
        }
    }

    /// Validate and build a card. `target_is_mentee` only matters for mentee cards.
    pub fn issue(
        &self,
        kind: CardKind,
        sender: &str,
        target: &str,
        reason: Option<&str>,
        target_is_mentee: bool,
        issued_on: NaiveDate,
    ) -> Result<CardRecord, CardError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(CardError::MissingTarget);
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if kind.needs_reason() && reason.is_none() {
            return Err(CardError::MissingReason);
        }

        if kind.is_mentee_card() && !target_is_mentee {
            return Err(CardError::NotMentee(target.to_string()));
        }

        Ok(CardRecord {
            kind,
            sender: sender.to_string(),
            target: target.to_string(),
            reason: reason.map(str::to_string),
            issued_on,
        })
    }

    /// Post the card's log line. Best-effort: failures are logged, and the
    /// return value says whether the line was posted.
    pub async fn post(&self, card: &CardRecord) -> bool {
        let Some(channel_id) = self.log_channel_id else {
            tracing::warn!(kind = ?card.kind, "No card log channel configured, card not logged");
            return false;
        };

        match self.platform.send_message(channel_id, &card.log_line()).await {
            Ok(()) => {
                tracing::info!(channel_id, kind = ?card.kind, target = %card.target, "Card logged");
                true
            }
            Err(e) => {
                tracing::error!(channel_id, kind = ?card.kind, "Failed to send card log: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rooms::room_service::tests::FakePlatform;

    const LOG_CHANNEL: u64 = 900;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn service() -> CardService<FakePlatform> {
        CardService::new(FakePlatform::new(), Some(LOG_CHANNEL))
    }

    #[tokio::test]
    async fn issued_card_is_posted_to_log_channel() {
        let service = service();
        let card = service
            .issue(CardKind::BadSlip, "Mod", "  Alice ", None, false, today())
            .unwrap();

        assert_eq!(card.target, "Alice");
        assert!(service.post(&card).await);

        let posted = service.platform.messages.get(&LOG_CHANNEL).map(|m| m.clone());
        assert_eq!(
            posted,
            Some(vec!["Alice received 1 bad-behaviour slip on 07/03/2025".to_string()])
        );
    }

    #[tokio::test]
    async fn missing_log_channel_skips_posting() {
        let service = CardService::new(FakePlatform::new(), None);
        let card = service
            .issue(CardKind::GoodSlip, "Mod", "Alice", None, false, today())
            .unwrap();

        assert!(!service.post(&card).await);
        assert!(service.platform.messages.is_empty());
    }

    #[test]
    fn complaint_requires_reason_and_target() {
        let service = service();

        assert_eq!(
            service.issue(CardKind::Complaint, "Mod", "Alice", Some("  "), false, today()),
            Err(CardError::MissingReason)
        );
        assert_eq!(
            service.issue(CardKind::BadSlip, "Mod", " ", None, false, today()),
            Err(CardError::MissingTarget)
        );

        let card = service
            .issue(CardKind::Complaint, "Mod", "Alice", Some(" noisy "), false, today())
            .unwrap();
        assert_eq!(card.reason.as_deref(), Some("noisy"));
    }

    #[test]
    fn mentee_cards_need_a_room_role() {
        let service = service();

        assert_eq!(
            service.issue(CardKind::MenteePraise, "Mod", "Bob", None, false, today()),
            Err(CardError::NotMentee("Bob".to_string()))
        );
        assert!(service
            .issue(CardKind::MenteeComplaint, "Mod", "Bob", None, true, today())
            .is_ok());
    }

    #[test]
    fn mentee_role_match_is_substring_and_case_insensitive() {
        assert!(is_mentee(["Member", "Study ROOM 3"]));
        assert!(!is_mentee(["Member", "Mentor"]));
    }
}
