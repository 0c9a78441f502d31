mod log;

pub use log::LogWriter;
