pub mod analyser;
pub mod clients;
pub mod collector;
pub mod config;
pub mod decision_log;
pub mod domain;
pub mod engine;
pub mod health;
pub mod learner;
pub mod planner;
pub mod retry;
pub mod supervisor;
pub mod telemetry;
