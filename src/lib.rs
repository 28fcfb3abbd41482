//! Regular-Gen generates random words from right-linear (regular) grammars.
//!
//! A grammar is a set of non-terminals, a set of terminal characters, a start
//! symbol and productions of the form `A -> aB` or `A -> a`. A [`Generator`]
//! walks the grammar from the start symbol, picking one production uniformly
//! at random at each step, until a terminal-only production ends the word or
//! the step budget runs out.
//!
//! # Example
//!
//! ```rust
//! use regular_gen::{Generator, Grammar, ScriptedChoices};
//!
//! let grammar: Grammar = "
//!     VN = {S, A}
//!     VT = {a, b}
//!     S -> aA
//!     A -> b | aS
//! "
//! .parse()
//! .unwrap();
//!
//! // Random walk with a bounded number of steps
//! let mut generator = Generator::new(&grammar);
//! if let Ok(word) = generator.generate(50) {
//!     assert!(word.ends_with('b'));
//! }
//!
//! // Forced choices: S -> aA, then A -> b
//! let mut generator = Generator::with_choices(&grammar, ScriptedChoices::new(vec![0, 0]));
//! assert_eq!(generator.generate(10).unwrap(), "ab");
//! ```

pub mod enumerate;
pub mod generator;
pub mod grammar;
pub mod utils;

pub use enumerate::Enumerator;
pub use generator::{
    ChoiceSource, Derivation, Generator, GeneratorConfig, RngChoices, ScriptedChoices,
};
pub use grammar::{Grammar, GrammarSpec, Production, Symbol};
pub use utils::{GenerationError, GrammarError, Result};
