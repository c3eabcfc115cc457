pub mod config;
pub mod manual;
pub mod orchestrator;
pub mod route;
pub mod trader;
pub mod worker;
