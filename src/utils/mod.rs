pub mod callback;
pub mod logging;
