pub mod manual;
pub mod start_bot;
