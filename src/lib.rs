//! Narrative Script: an indentation-sensitive dialogue language for games.
//!
//! A [`Script`] (literal text interleaved with host callbacks) is compiled
//! once into an immutable [`Document`]; any number of [`Reader`]s then walk
//! it line by line, pausing at decision points until the host chooses.
//!
//! ```
//! use narrative_script::{Compiler, Reader, Script, Step};
//! use std::rc::Rc;
//!
//! let script = Script::new().text("== Start ==\nHello ").value(|| "traveller").text(
//!     "\n> Wave\n\t-> Start\n> Leave\n<-",
//! );
//! let document = Rc::new(Compiler::new().compile(&script, |issue| eprintln!("{}", issue)));
//!
//! let mut reader = Reader::new(document);
//! assert!(reader.move_next().unwrap());
//! assert_eq!(reader.current(), Some(&Step::Line("Hello traveller".to_string())));
//! assert!(reader.move_next().unwrap());
//! reader.choose(1).unwrap();
//! assert!(!reader.move_next().unwrap());
//! ```

pub mod core;
pub mod schema;

pub use crate::core::compiler::Compiler;
pub use crate::core::options::CompileOptions;
pub use crate::core::reader::{Reader, ReaderError, Step};
pub use crate::core::script::{Script, ScriptError};
pub use crate::schema::content::{Argument, Value};
pub use crate::schema::issue::{Issue, IssueKind, Severity};
pub use crate::schema::node::Document;
