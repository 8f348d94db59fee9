pub mod dates;
pub mod wire;
