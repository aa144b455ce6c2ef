// src/config/helpers.rs
// Small env-reading helpers shared by the domain config structs.

use std::str::FromStr;

pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn env_f64(key: &str, default: f64) -> f64 {
    env_parsed(key, default)
}

pub fn env_u64(key: &str, default: u64) -> u64 {
    env_parsed(key, default)
}

pub fn env_usize(key: &str, default: usize) -> usize {
    env_parsed(key, default)
}

pub fn env_bool(key: &str, default: bool) -> bool {
    env_parsed(key, default)
}
