pub mod log;
pub mod session;

pub use log::ChatEntry;
pub use session::{SessionEvent, TranslationSession};
