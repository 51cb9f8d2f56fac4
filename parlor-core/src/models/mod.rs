pub mod message;

pub use message::{Message, MessageBody, MessageType};
