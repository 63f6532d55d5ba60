//! Human-readable output helpers.

use idealab::housekeeping::{BatchReport, Outcome};
use idealab::storage::scanner::{CategoryStats, ScanReport};
use idealab::Category;

/// Formats a byte count with binary units.
pub fn bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn stats_line(label: &str, stats: CategoryStats) -> String {
    format!("  {:<10} {:>6} items {:>12}", label, stats.count, bytes(stats.size))
}

pub fn print_scan(report: &ScanReport, list_items: bool) {
    println!("Storage usage:");
    for category in Category::ALL {
        println!("{}", stats_line(category.as_str(), report.stats.get(category)));
    }
    println!("{}", stats_line("total", report.stats.total));
    println!();
    println!("{}", stats_line("orphans", report.orphans()));
    println!("{}", stats_line("optimizable", report.optimizable()));

    if list_items {
        println!();
        for item in &report.items {
            let mut flags = Vec::new();
            if item.is_orphan {
                flags.push("orphan");
            }
            if item.is_optimized {
                flags.push("optimized");
            }
            if item.is_optimizable {
                flags.push("optimizable");
            }
            println!(
                "  {:<40} {:>10}  {:<8} {}",
                item.key,
                bytes(item.size),
                item.category.as_str(),
                flags.join(",")
            );
        }
    }
}

pub fn print_batch(title: &str, batch: &BatchReport, verbose: bool) {
    for item in &batch.items {
        match &item.outcome {
            Outcome::Failed { reason } => eprintln!("FAIL: {} - {}", item.key, reason),
            Outcome::Skipped { reason } if verbose => println!("SKIP: {} - {}", item.key, reason),
            Outcome::Deleted { size } if verbose => println!("DEL:  {} ({})", item.key, bytes(*size)),
            Outcome::Optimized { before, after } if verbose => {
                println!("OK:   {} {} -> {}", item.key, bytes(*before), bytes(*after))
            }
            _ => {}
        }
    }

    println!("\n========================================");
    println!("{}:", title);
    println!("========================================");
    if batch.deleted() > 0 {
        println!("  Deleted:   {} ({})", batch.deleted(), bytes(batch.bytes_freed()));
    }
    if batch.optimized() > 0 {
        println!("  Optimized: {} ({} saved)", batch.optimized(), bytes(batch.bytes_saved()));
    }
    println!("  Skipped:   {}", batch.skipped());
    println!("  Failed:    {}", batch.failed());
    println!("  Total:     {}", batch.items.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(bytes(0), "0 B");
        assert_eq!(bytes(1023), "1023 B");
        assert_eq!(bytes(1536), "1.5 KB");
        assert_eq!(bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
