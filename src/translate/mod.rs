pub mod interface;
pub mod client;

pub use interface::{TranslateError, TranslationClient, TranslationData, TranslationRequest};
pub use client::HttpTranslationClient;
