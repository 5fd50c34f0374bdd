pub(crate) mod bootstrap;
pub(crate) mod cli;
pub(crate) mod session_runner;
