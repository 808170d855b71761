pub mod chunker;

#[cfg(test)]
pub mod testing;

pub use chunker::{Destination, send_long_message};
