pub mod cast;
pub mod format;
pub mod parse;
pub mod temporal;
pub mod widen;
