/// Parsing of console input lines.
pub mod command;
/// Console host loop.
pub mod console;
