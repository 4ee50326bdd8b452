use chrono::NaiveDate;

/// The kinds of card a member can be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// Bad-behaviour slip, given by name.
    BadSlip,
    /// Good-behaviour slip, given by name.
    GoodSlip,
    /// Complaint against a member, reason required.
    Complaint,
    MenteePraise,
    MenteeComplaint,
}

impl CardKind {
    pub fn needs_reason(self) -> bool {
        matches!(self, CardKind::Complaint)
    }

    /// Mentee cards only go to members holding a room role.
    pub fn is_mentee_card(self) -> bool {
        matches!(self, CardKind::MenteePraise | CardKind::MenteeComplaint)
    }
}

/// One issued card. `target` is whatever the log should show (a plain name or
/// a mention).
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    pub kind: CardKind,
    pub sender: String,
    pub target: String,
    pub reason: Option<String>,
    pub issued_on: NaiveDate,
}

impl CardRecord {
    /// Line posted to the shared log channel.
    pub fn log_line(&self) -> String {
        let date = self.issued_on.format("%d/%m/%Y");
        let reason = self.reason.as_deref().unwrap_or_default();
        match self.kind {
            CardKind::BadSlip => format!("{} received 1 bad-behaviour slip on {}", self.target, date),
            CardKind::GoodSlip => format!("{} received 1 good-behaviour slip on {}", self.target, date),
            CardKind::Complaint => format!(
                "{} received a complaint from {} on {}. Reason: {}",
                self.target, self.sender, date, reason
            ),
            CardKind::MenteePraise => {
                format!("[mentee] {} was praised by {} on {}", self.target, self.sender, date)
            }
            CardKind::MenteeComplaint => format!(
                "[mentee] {} was criticised by {} on {}",
                self.target, self.sender, date
            ),
        }
    }

    /// Reply shown where the command was used.
    pub fn reply_line(&self) -> String {
        match self.kind {
            CardKind::BadSlip => format!("{} has been given 1 bad-behaviour slip", self.target),
            CardKind::GoodSlip => format!("{} has been given 1 good-behaviour slip", self.target),
            CardKind::Complaint => format!(
                "{} has received a complaint. Reason: {}",
                self.target,
                self.reason.as_deref().unwrap_or_default()
            ),
            CardKind::MenteePraise => format!("{} has been praised.", self.target),
            CardKind::MenteeComplaint => format!("{} has been criticised.", self.target),
        }
    }
}
