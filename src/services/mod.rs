// Services module - Business logic

pub mod envelope;
pub mod matcher;
pub mod password;
pub mod signature;
pub mod validator;
