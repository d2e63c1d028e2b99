//! Secret-pattern compilation.
//!
//! Turns the ordered registry from `config` into compiled regular expressions that
//! the scan engines in `engines` run against action text.

pub mod compiler;
