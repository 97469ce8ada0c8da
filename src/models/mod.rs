pub mod gemini;
pub mod persona;
