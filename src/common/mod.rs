pub mod captcha;
pub mod discovery;
pub mod faucet;
pub mod notification;
