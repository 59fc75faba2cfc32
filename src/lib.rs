pub mod access;
pub mod app;
pub mod assembler;
pub mod catalog;
pub mod certificate;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod export;
pub mod normalize;
pub mod notify;
pub mod output;
pub mod postgrest;
pub mod regions;
pub mod research;
pub mod storage;
