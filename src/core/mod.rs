pub mod compiler;
pub mod indent;
pub mod options;
pub mod reader;
pub mod script;
