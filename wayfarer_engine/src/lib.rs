//! Console host for the wayfarer gameplay-flow core: a Lua-backed
//! dialogue interpreter, a transcript presenter, and a session journal
//! that records every orchestration signal.

pub mod cli;
pub mod console;
pub mod journal;
pub mod lua_host;
