//! Benchmark harness around the nlqbench equivalence engine.
//!
//! Wires configuration, question banks and adapters into the pure engine
//! in `nlqbench-core`: the runner drives each question through a database
//! adapter and a system under test, compares the results, validates
//! self-reported measurements and folds everything into a suite report.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod question;
pub mod report;
pub mod runner;
pub mod tokens;

pub use adapter::{DatabaseAdapter, FixtureSet, ScriptedSut, StaticDatabase, SutAdapter, SutResponse};
pub use config::BenchConfig;
pub use question::{Complexity, Question, QuestionBank};
pub use report::{Reporter, SuiteReport};
pub use runner::{BenchRunner, QuestionOutcome};
