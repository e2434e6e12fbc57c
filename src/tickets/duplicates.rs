//! Advisory duplicate detection, run before ticket creation.
//!
//! Scans open tickets at the same location (and asset, when given) for titles
//! that describe the same problem. Matching is deterministic and symmetric:
//! case-insensitive containment either way, or token overlap above a fixed
//! threshold. The result is a warning, never a hard constraint; callers may
//! create anyway with `force_create`.

use diesel::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use crate::core::shared::enums::TicketStatus;
use crate::core::shared::schema::maintenance_tickets;

use super::error::WorkflowError;
use super::MaintenanceTicket;

const TOKEN_OVERLAP_THRESHOLD: f64 = 0.6;

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        } else if c.is_whitespace() || c.is_ascii_punctuation() {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard overlap of whitespace tokens over two normalized titles.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// True when two raw titles likely describe the same problem.
pub fn titles_match(a: &str, b: &str) -> bool {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na.contains(&nb) || nb.contains(&na) {
        return true;
    }
    token_overlap(&na, &nb) >= TOKEN_OVERLAP_THRESHOLD
}

/// Open tickets at the same location (and asset, when given) whose title is a
/// close match for the candidate's.
pub fn find_duplicates(
    conn: &mut PgConnection,
    org_id: Uuid,
    location_id: Uuid,
    asset_id: Option<Uuid>,
    title: &str,
) -> Result<Vec<MaintenanceTicket>, WorkflowError> {
    let mut q = maintenance_tickets::table
        .filter(maintenance_tickets::org_id.eq(org_id))
        .filter(maintenance_tickets::location_id.eq(location_id))
        .filter(maintenance_tickets::deleted_at.is_null())
        .filter(maintenance_tickets::status.ne(TicketStatus::Closed))
        .filter(maintenance_tickets::status.ne(TicketStatus::Rejected))
        .into_boxed();

    if let Some(asset) = asset_id {
        q = q.filter(maintenance_tickets::asset_id.eq(asset));
    }

    let candidates: Vec<MaintenanceTicket> = q
        .order(maintenance_tickets::created_at.desc())
        .load(conn)?;

    Ok(candidates
        .into_iter()
        .filter(|t| titles_match(&t.title, title))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Broken  AC!! (unit 4B)  "), "broken ac unit 4b");
        assert_eq!(normalize_title("HVAC/Heating"), "hvac heating");
        assert_eq!(normalize_title("!!!"), "");
    }

    #[test]
    fn test_containment_match() {
        assert!(titles_match("Leaking faucet", "leaking faucet in kitchen"));
        assert!(titles_match("LEAKING FAUCET IN KITCHEN", "leaking faucet"));
    }

    #[test]
    fn test_token_overlap_match() {
        // no containment either way; 3 shared of 5 total tokens = 0.6
        assert!(titles_match("faucet leaking badly now", "kitchen faucet leaking badly"));
        assert!(!titles_match("broken window", "leaking faucet"));
    }

    #[test]
    fn test_match_is_symmetric() {
        let pairs = [
            ("Leaking faucet", "leaking faucet in kitchen"),
            ("broken window", "leaking faucet"),
            ("elevator stuck floor 3", "elevator stuck on floor 3"),
        ];
        for (a, b) in pairs {
            assert_eq!(titles_match(a, b), titles_match(b, a), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_match_is_deterministic() {
        for _ in 0..10 {
            assert!(titles_match("AC broken", "ac broken in lobby"));
        }
    }

    #[test]
    fn test_blank_titles_never_match() {
        assert!(!titles_match("", ""));
        assert!(!titles_match("  ", "leaking faucet"));
    }
}
