mod engine;
mod handlers;

pub use engine::{Dht, DEFAULT_BIND};
