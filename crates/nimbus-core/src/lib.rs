pub mod errors;
pub mod ids;
pub mod messages;
pub mod settings;

pub use errors::ChatError;
pub use messages::{ConversationRecord, Message, Sender};
pub use settings::{HistorySettings, Settings, SettingsError};
