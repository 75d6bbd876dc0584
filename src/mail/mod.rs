pub mod types;

pub use types::{EmailAddress, EmailFlags, Flag, Header, Uid};
