pub mod logger;
pub mod paths;
pub mod progress;
