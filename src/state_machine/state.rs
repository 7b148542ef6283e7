//! Session record and dialog state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendered in place of a phone number when the party chose chat contact
pub const PHONE_NOT_APPLICABLE: &str = "—";

/// Rendered for any field a branch of the dialog left unset
pub const NOT_SPECIFIED: &str = "не указано";

/// Cities offered as keyboard buttons
pub const KNOWN_CITIES: [&str; 2] = ["Калининград", "Калининградская область"];

/// Caption that switches the dialog to free-text city entry
pub const OTHER_CITY: &str = "Другой город";

// ============================================================================
// Party identity
// ============================================================================

/// Identity of a remote party: the id of their private chat with the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub i64);

impl PartyId {
    pub fn chat_id(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PartyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(PartyId)
    }
}

// ============================================================================
// Dialog State
// ============================================================================

/// Position of a party in the intake dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogState {
    /// No intake in progress; only the start command is accepted
    #[default]
    Idle,
    AwaitCity,
    /// Sub-state of `AwaitCity` after the "other city" button
    AwaitCustomCity,
    AwaitRole,
    /// Only reachable when the flow asks for a case type
    AwaitCaseType,
    AwaitContactMethod,
    AwaitName,
    AwaitQuery,
    AwaitPhone,
    /// Intake complete; party messages are relayed to operators
    ActiveRelay,
}

impl DialogState {
    pub fn as_str(self) -> &'static str {
        match self {
            DialogState::Idle => "idle",
            DialogState::AwaitCity => "await_city",
            DialogState::AwaitCustomCity => "await_custom_city",
            DialogState::AwaitRole => "await_role",
            DialogState::AwaitCaseType => "await_case_type",
            DialogState::AwaitContactMethod => "await_contact_method",
            DialogState::AwaitName => "await_name",
            DialogState::AwaitQuery => "await_query",
            DialogState::AwaitPhone => "await_phone",
            DialogState::ActiveRelay => "active_relay",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Fixed-choice answers
// ============================================================================

/// Legal status of the party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Individual,
    Organization,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Individual, Role::Organization];

    /// Button caption, also the accepted input
    pub fn caption(self) -> &'static str {
        match self {
            Role::Individual => "Физ лицо",
            Role::Organization => "Юр лицо",
        }
    }

    pub fn from_caption(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.caption() == text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Individual => "individual",
            Role::Organization => "organization",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Specialization of the case, asked only when the flow enables it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Civil,
    Criminal,
}

impl CaseType {
    pub const ALL: [CaseType; 2] = [CaseType::Civil, CaseType::Criminal];

    pub fn caption(self) -> &'static str {
        match self {
            CaseType::Civil => "Гражданское дело",
            CaseType::Criminal => "Уголовное дело",
        }
    }

    pub fn from_caption(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|case| case.caption() == text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseType::Civil => "civil",
            CaseType::Criminal => "criminal",
        }
    }
}

impl FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|case| case.as_str() == s)
            .ok_or_else(|| format!("unknown case type: {s}"))
    }
}

/// How the party wants to be consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Chat,
    Phone,
}

impl ContactMethod {
    pub const ALL: [ContactMethod; 2] = [ContactMethod::Chat, ContactMethod::Phone];

    pub fn caption(self) -> &'static str {
        match self {
            ContactMethod::Chat => "В чате",
            ContactMethod::Phone => "По телефону",
        }
    }

    pub fn from_caption(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.caption() == text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContactMethod::Chat => "chat",
            ContactMethod::Phone => "phone",
        }
    }
}

impl FromStr for ContactMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| format!("unknown contact method: {s}"))
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-party record of dialog progress and collected answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub party_id: PartyId,
    pub state: DialogState,
    pub city: Option<String>,
    pub role: Option<Role>,
    pub case_type: Option<CaseType>,
    pub contact_method: Option<ContactMethod>,
    pub name_or_company: Option<String>,
    pub query_text: Option<String>,
    pub phone: Option<String>,
    pub consultation_active: bool,
    pub created_at: DateTime<Utc>,
    /// Refreshed by the store on every write
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Fresh record positioned at the first question
    pub fn new(party_id: PartyId, now: DateTime<Utc>) -> Self {
        Self {
            party_id,
            state: DialogState::AwaitCity,
            city: None,
            role: None,
            case_type: None,
            contact_method: None,
            name_or_company: None,
            query_text: None,
            phone: None,
            consultation_active: false,
            created_at: now,
            expires_at: now,
        }
    }

    /// Move into the relay state; keeps `consultation_active` in step with it
    pub fn enter_relay(&mut self) {
        self.state = DialogState::ActiveRelay;
        self.consultation_active = true;
    }

    /// Phone as shown to operators: the sentinel unless phone contact was chosen
    pub fn phone_display(&self) -> &str {
        match self.contact_method {
            Some(ContactMethod::Phone) => self.phone.as_deref().unwrap_or(NOT_SPECIFIED),
            _ => PHONE_NOT_APPLICABLE,
        }
    }
}

// ============================================================================
// Flow configuration
// ============================================================================

/// Startup-time choices about the shape of the dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowConfig {
    /// Include the case-type question between role and contact method
    pub ask_case_type: bool,
    /// Relay party messages that look like an operator reply command
    pub forward_reply_syntax: bool,
    /// Desk number offered to parties who chose phone contact
    pub callback_phone: Option<String>,
}

/// Context for one party's dialog (immutable configuration)
#[derive(Debug, Clone)]
pub struct PartyContext {
    pub party_id: PartyId,
    pub flow: FlowConfig,
}

impl PartyContext {
    pub fn new(party_id: PartyId, flow: FlowConfig) -> Self {
        Self { party_id, flow }
    }
}
