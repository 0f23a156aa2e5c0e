pub mod connect;
pub mod decode_credential;
