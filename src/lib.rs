//! # Simile
//!
//! A console-output oracle for interactive command-line programs.
//!
//! A simile script lists what a program should print and what a user would
//! type, line by line. Simile launches the program, feeds it the scripted
//! input, and checks each line of its output against the script, reporting
//! matches and mismatches as they happen.
//!
//! ## Quick start
//!
//! ```no_run
//! use simile::{Engine, RunConfig, parse_str};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let script = parse_str(
//!         "Hello!\n\
//!          What is your name? {{Chris}}\n\
//!          Hi Chris, you are [[t=int;min=0;max=120]] years old\n",
//!     )?;
//!
//!     let summary = Engine::new(RunConfig::default())
//!         .run(script, "./target/debug/greeter")
//!         .await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Script syntax
//!
//! | Line | Meaning |
//! |------|---------|
//! | `Hello!` | Expect the program to print exactly this line |
//! | *(empty)* | Expect an empty line |
//! | `# comment` | Ignored |
//! | `Total: [[t=double;p=2]]` | Expect a number of the given type at this position |
//! | `Name? {{Chris}}` | Expect the prompt `Name? ` (no newline), then send `Chris` |
//! | `{{Chris}}` | Send `Chris` |
//!
//! Numeric tags take `;`-separated options: `t`/`type` (required; `byte`,
//! `sbyte`, `short`, `ushort`, `int`, `uint`, `long`, `ulong`, `float`,
//! `double`, `char` or their aliases `b`, `sb`, `s`, `us`, `i`, `ui`, `l`,
//! `ul`, `f`, `d`, `c`), `min`, `max`, `v`/`values` (`{1,2,3}`) and
//! `p`/`precision` (0 to 15, floating types only). A numeric tag that is not
//! at the end of a line must be followed by a space.
//!
//! Scripts written with one-character prefixes (`.` output, `;` prompt,
//! `>` input) are read with [`Syntax::Legacy`].
//!
//! ## Watching a run
//!
//! [`Engine::begin`] returns a [`RunHandle`] immediately. Events arrive in
//! script order:
//!
//! ```no_run
//! use simile::{Engine, RunEvent, parse_str};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let script = parse_str("Ready\n{{quit}}\n")?;
//! let mut handle = Engine::default().begin(script, "/usr/local/bin/repl")?;
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         RunEvent::Line(report) if !report.matched => {
//!             println!("expected {:?}, got {:?}", report.expected, report.actual);
//!         }
//!         RunEvent::Finished(_) => break,
//!         _ => {}
//!     }
//! }
//! let summary = handle.finish().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom targets
//!
//! The driver talks to the program through the [`Target`] trait. Besides
//! the process-backed target, [`StreamTarget`] drives any pair of async
//! streams, which is handy for testing:
//!
//! ```
//! use simile::{Engine, StreamTarget, parse_str};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let script = parse_str("Name? {{Chris}}\nHi Chris")?;
//! let target = StreamTarget::new(&b"Name? Hi Chris\n"[..], tokio::io::sink());
//! let summary = Engine::default()
//!     .begin_with_target(script, Box::new(target))
//!     .finish()
//!     .await?;
//! assert_eq!((summary.compared, summary.matched), (2, 2));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod matcher;
pub mod numeric;
pub mod parser;
pub mod process;
pub mod script;
pub mod target;

pub use cancel::StopToken;
pub use config::{LineEnding, RunConfig};
pub use engine::{Engine, RunHandle};
pub use error::{LoadError, ParseErrorKind, RunError, ScriptParseError, SetupError};
pub use event::{LineKind, LineReport, RunEvent, Summary};
pub use matcher::{LineMatch, match_line, matches};
pub use numeric::{Constraint, NumericElement, NumericKind};
pub use parser::{Syntax, check_str, parse_file, parse_lines, parse_str};
pub use script::{InputLine, OutputElement, OutputExpectation, Script, ScriptLine, Terminator};
pub use target::{StreamTarget, Target};
