pub mod attach;
pub mod error;
pub mod options;
pub mod request;
pub mod service;
pub mod stream;
pub mod terminal;
