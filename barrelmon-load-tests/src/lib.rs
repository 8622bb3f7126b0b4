pub mod data;
pub mod report;
pub mod scenarios;
pub mod worker;
pub mod workload;
