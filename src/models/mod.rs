pub mod fragment;
pub mod message;
pub mod question;

pub use fragment::{OcrFragment, Point, Quad};
pub use message::{ConversationMessage, MessageRole};
pub use question::Question;
