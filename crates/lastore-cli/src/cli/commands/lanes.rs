//! `lastore lanes` – list configured job lanes.

use lastore_core::config::LastoreConfig;

pub fn run_lanes(cfg: &LastoreConfig) {
    if cfg.lanes.is_empty() {
        println!("No lanes configured.");
        return;
    }
    println!("{:<16} {:<10} {}", "LANE", "CAPACITY", "DUPLICATES");
    for lane in &cfg.lanes {
        let capacity = lane
            .capacity
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let dups = if lane.allow_duplicate_packages { "allowed" } else { "rejected" };
        println!("{:<16} {:<10} {}", lane.name, capacity, dups);
    }
}
