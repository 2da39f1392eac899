// alife-master: Live viewer streaming

mod connection;
mod hub;

pub use connection::{Message, ViewerConnection};
pub use hub::ViewerHub;
