pub mod chat;
pub mod init;
