pub(crate) mod bootstrap;
pub(crate) mod console_input;
pub(crate) mod gameplay;
pub(crate) mod loop_runner;
