//! Gemini `generateContent` transport shared by every AI-assisted component.

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{GeminiClient, GeminiError, GenerateParams, TextGenerator};
