pub mod flow_exchange;
pub mod webhook;
