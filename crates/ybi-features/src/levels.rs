//! Round-number levels and level clustering.

use ybi_core::{Level, LevelKind};

/// Whole- and half-dollar levels within +/-5% of `price`.
pub fn round_levels(price: f64) -> Vec<Level> {
    if price <= 0.0 {
        return Vec::new();
    }
    let lower = price * 0.95;
    let upper = price * 1.05;
    let mut levels = Vec::new();
    let mut x = (lower * 2.0).ceil() / 2.0;
    while x <= upper {
        levels.push(Level {
            price: x,
            kind: LevelKind::Round,
        });
        x += 0.5;
    }
    levels
}

/// Merges levels within `tolerance` (a fraction of price) of each other,
/// keeping the first occurrence's price as the cluster representative.
pub fn cluster(levels: &[Level], tolerance: f64) -> Vec<Level> {
    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<Level> = Vec::new();
    for level in sorted {
        if let Some(last) = out.last() {
            if last.price > 0.0 && (level.price - last.price).abs() / last.price <= tolerance {
                continue;
            }
        }
        out.push(level);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_levels_bracket_price_within_five_percent() {
        let levels = round_levels(10.0);
        assert!(levels.iter().all(|l| l.price >= 9.5 && l.price <= 10.5));
        assert!(levels.iter().any(|l| l.price == 10.0));
    }

    #[test]
    fn cluster_merges_near_duplicates() {
        let levels = vec![
            Level { price: 10.00, kind: LevelKind::PivotHigh },
            Level { price: 10.01, kind: LevelKind::Round },
            Level { price: 11.00, kind: LevelKind::PivotLow },
        ];
        let clustered = cluster(&levels, 0.002);
        assert_eq!(clustered.len(), 2);
    }
}
