pub mod ai;
pub mod error;
pub mod gemini;
