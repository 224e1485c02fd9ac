pub mod fs_util;
pub mod protocol;
pub mod responder;
pub mod server;
pub mod settings;
pub mod zones;
