//! Staff identity resolution
//!
//! Joins the staff roster against the telephony provider's line listing and
//! the results board's group listing. Resolution is total over the roster:
//! a member without a matching phone line still resolves (their calls just
//! cannot be fetched), while a member without a board group is skipped with
//! a warning because audit results would have nowhere to land.

use crate::clients::board::BoardGroup;
use crate::clients::telephony::PhoneLine;
use crate::types::{StaffIdentity, StaffRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Resolve each staff member against the provider's phone lines.
///
/// Returns identities keyed by staff name. Matching is on the exact E.164
/// number; a roster entry whose number no line carries resolves with
/// `phone_number_id: None`.
pub fn resolve_identities(
    staff: &[StaffRecord],
    lines: &[PhoneLine],
) -> HashMap<String, StaffIdentity> {
    let line_by_number: HashMap<&str, &PhoneLine> =
        lines.iter().map(|l| (l.number.as_str(), l)).collect();

    let mut identities = HashMap::with_capacity(staff.len());
    for member in staff {
        let phone_number_id = match line_by_number.get(member.phone_number.as_str()) {
            Some(line) => Some(line.id.clone()),
            None => {
                warn!(
                    staff_name = %member.staff_name,
                    phone_number = %member.phone_number,
                    "no phone line for staff number; calls unavailable"
                );
                None
            }
        };
        identities.insert(
            member.staff_name.clone(),
            StaffIdentity {
                staff_name: member.staff_name.clone(),
                board_id: member.board_id.clone(),
                phone_number_id,
            },
        );
    }

    debug!(
        staff_count = staff.len(),
        resolved_lines = identities.values().filter(|i| i.phone_number_id.is_some()).count(),
        "identities resolved"
    );
    identities
}

/// Map each staff member to their group on the results board.
///
/// Group titles lead with the member's name ("Tony Holtgren 3/5/2025: MA"),
/// so matching is prefix-based. Members with no group are omitted.
pub fn resolve_groups<'a>(
    staff: &[StaffRecord],
    groups: &'a [BoardGroup],
) -> HashMap<String, &'a BoardGroup> {
    let mut resolved = HashMap::new();
    for member in staff {
        let matched = groups
            .iter()
            .find(|g| g.title.starts_with(member.staff_name.as_str()));
        match matched {
            Some(group) => {
                resolved.insert(member.staff_name.clone(), group);
            }
            None => {
                warn!(
                    staff_name = %member.staff_name,
                    "no board group for staff member; skipped"
                );
            }
        }
    }
    resolved
}

/// The set of staff phone numbers, used to label transcript speakers.
pub fn staff_numbers(staff: &[StaffRecord]) -> HashSet<String> {
    staff.iter().map(|m| m.phone_number.clone()).collect()
}
