//! Formatting helpers for the query commands.

use super::query::{FactoryStatus, HelperStatus};

/// Print factories in human-readable format.
pub fn print_factories_human(factories: &[FactoryStatus]) {
    println!("\nFactories ({} registered)", factories.len());
    println!("  Name                 | Language | UUID");
    println!("  ---------------------+----------+--------------------------------------");
    for factory in factories {
        println!(
            "  {:20} | {:8} | {}",
            truncate(&factory.name, 20),
            truncate(&factory.language, 8),
            factory.uuid
        );
    }
}

/// Print helpers in human-readable format.
pub fn print_helpers_human(helpers: &[HelperStatus]) {
    println!("\nHelpers ({} installed)", helpers.len());
    println!("  Name                 | Flags                    | UUID");
    println!("  ---------------------+--------------------------+--------------------------------------");
    for helper in helpers {
        println!(
            "  {:20} | {:24} | {}",
            truncate(&helper.name, 20),
            truncate(&format_flags(&helper.flags), 24),
            helper.uuid
        );
    }
}

pub fn format_flags(flags: &[String]) -> String {
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(",")
    }
}

/// Truncate a string to at most `max_len` characters.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
