pub mod honeypot;
pub mod responder;
pub mod supply;
