//! Spreads child rows over parent rows according to cardinality policies.

use std::collections::HashMap;

use medsynth_core::TableSchema;
use rand::Rng;

use crate::errors::GenerationError;

/// Parent picks for one child row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Parent row index per foreign key, in declaration order.
    pub picks: Vec<usize>,
    /// Zero-based position of the row among its driving parent's children.
    pub driving_ordinal: Option<u32>,
}

/// Row plan for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub assignments: Vec<Assignment>,
    /// `(requested, allocated)` when an advisory target had to be clamped.
    pub clamped: Option<(u64, u64)>,
}

impl Allocation {
    pub fn rows(&self) -> u64 {
        self.assignments.len() as u64
    }
}

/// Decides how many rows a table gets and which parents each row references.
#[derive(Debug, Clone, Copy)]
pub struct ReferentialAllocator<'t> {
    table: &'t TableSchema,
}

impl<'t> ReferentialAllocator<'t> {
    pub fn new(table: &'t TableSchema) -> Self {
        Self { table }
    }

    /// `parent_rows` maps each parent table to its generated row count.
    ///
    /// With a per-parent relationship the target is advisory: it is clamped to
    /// what the bounds allow, then per-parent counts are nudged one unit at a
    /// time until they sum to it. Without one, the target is the row count.
    pub fn allocate<R: Rng>(
        &self,
        parent_rows: &HashMap<&str, usize>,
        target: Option<u64>,
        rng: &mut R,
    ) -> Result<Allocation, GenerationError> {
        let mut sizes = Vec::with_capacity(self.table.foreign_keys.len());
        for fk in &self.table.foreign_keys {
            let size = parent_rows
                .get(fk.references_table.as_str())
                .copied()
                .unwrap_or(0);
            if size == 0 {
                return Err(GenerationError::NoParentsAvailable {
                    table: self.table.name.clone(),
                    parent: fk.references_table.clone(),
                });
            }
            sizes.push(size);
        }

        let driving = self
            .table
            .foreign_keys
            .iter()
            .position(|fk| fk.cardinality.is_per_parent());

        let Some(driving) = driving else {
            let rows = target.ok_or_else(|| GenerationError::MissingTarget(self.table.name.clone()))?;
            let assignments = (0..rows)
                .map(|_| Assignment {
                    picks: independent_picks(&sizes, None, rng),
                    driving_ordinal: None,
                })
                .collect();
            return Ok(Allocation {
                assignments,
                clamped: None,
            });
        };

        let (min, max) = self.table.foreign_keys[driving]
            .cardinality
            .bounds()
            .unwrap_or((0, 0));
        let parents = sizes[driving];
        let mut counts: Vec<u32> = (0..parents).map(|_| rng.random_range(min..=max)).collect();

        let mut clamped = None;
        if let Some(requested) = target {
            let lowest = parents as u64 * u64::from(min);
            let highest = parents as u64 * u64::from(max);
            let goal = requested.clamp(lowest, highest);
            if goal != requested {
                clamped = Some((requested, goal));
            }
            reconcile(&mut counts, goal, min, max, rng);
        }

        let total: u64 = counts.iter().map(|count| u64::from(*count)).sum();
        let mut assignments = Vec::with_capacity(total as usize);
        for (parent, count) in counts.iter().enumerate() {
            for ordinal in 0..*count {
                assignments.push(Assignment {
                    picks: independent_picks(&sizes, Some((driving, parent)), rng),
                    driving_ordinal: Some(ordinal),
                });
            }
        }

        Ok(Allocation {
            assignments,
            clamped,
        })
    }
}

fn independent_picks<R: Rng>(
    sizes: &[usize],
    fixed: Option<(usize, usize)>,
    rng: &mut R,
) -> Vec<usize> {
    sizes
        .iter()
        .enumerate()
        .map(|(idx, size)| match fixed {
            Some((driving, parent)) if driving == idx => parent,
            _ => rng.random_range(0..*size),
        })
        .collect()
}

/// Adjust `counts` to sum to `goal`, keeping each within `[min, max]`.
fn reconcile<R: Rng>(counts: &mut [u32], goal: u64, min: u32, max: u32, rng: &mut R) {
    let mut sum: u64 = counts.iter().map(|count| u64::from(*count)).sum();

    if sum < goal {
        let mut eligible: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] < max).collect();
        while sum < goal && !eligible.is_empty() {
            let pos = rng.random_range(0..eligible.len());
            let parent = eligible[pos];
            counts[parent] += 1;
            sum += 1;
            if counts[parent] >= max {
                eligible.swap_remove(pos);
            }
        }
    } else if sum > goal {
        let mut eligible: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] > min).collect();
        while sum > goal && !eligible.is_empty() {
            let pos = rng.random_range(0..eligible.len());
            let parent = eligible[pos];
            counts[parent] -= 1;
            sum -= 1;
            if counts[parent] <= min {
                eligible.swap_remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsynth_core::SchemaRegistry;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn parents(pairs: &[(&'static str, usize)]) -> HashMap<&'static str, usize> {
        pairs.iter().copied().collect()
    }

    fn per_parent_counts(allocation: &Allocation, fk: usize, parents: usize) -> Vec<u32> {
        let mut counts = vec![0_u32; parents];
        for assignment in &allocation.assignments {
            counts[assignment.picks[fk]] += 1;
        }
        counts
    }

    #[test]
    fn advisory_target_is_met_within_bounds() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let admissions = registry.lookup("admissions").expect("admissions");
        let allocator = ReferentialAllocator::new(admissions);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let allocation = allocator
            .allocate(&parents(&[("patients", 50), ("wards", 4)]), Some(120), &mut rng)
            .expect("allocation");

        assert_eq!(allocation.rows(), 120);
        assert_eq!(allocation.clamped, None);
        let counts = per_parent_counts(&allocation, 0, 50);
        assert!(counts.iter().all(|count| *count <= 4));
        assert!(allocation.assignments.iter().all(|a| a.picks[1] < 4));
    }

    #[test]
    fn unreachable_target_is_clamped() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let diagnoses = registry.lookup("diagnoses").expect("diagnoses");
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let allocation = ReferentialAllocator::new(diagnoses)
            .allocate(&parents(&[("admissions", 10)]), Some(100), &mut rng)
            .expect("allocation");

        assert_eq!(allocation.rows(), 30);
        assert_eq!(allocation.clamped, Some((100, 30)));
        assert!(per_parent_counts(&allocation, 0, 10).iter().all(|count| *count == 3));
    }

    #[test]
    fn children_are_emitted_in_parent_order() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let devices = registry.lookup("devices").expect("devices");
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let allocation = ReferentialAllocator::new(devices)
            .allocate(&parents(&[("wards", 6)]), None, &mut rng)
            .expect("allocation");

        let picks: Vec<usize> = allocation.assignments.iter().map(|a| a.picks[0]).collect();
        let mut sorted = picks.clone();
        sorted.sort_unstable();
        assert_eq!(picks, sorted);
        let counts = per_parent_counts(&allocation, 0, 6);
        assert!(counts.iter().all(|count| (1..=5).contains(count)));
    }

    #[test]
    fn empty_parent_table_is_fatal() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let vitals = registry.lookup("vital_signs").expect("vital_signs");
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let err = ReferentialAllocator::new(vitals)
            .allocate(&parents(&[("patients", 3), ("devices", 0)]), None, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::NoParentsAvailable { ref parent, .. } if parent == "devices"
        ));
    }

    #[test]
    fn tables_without_driving_key_need_a_target() {
        let registry = SchemaRegistry::hospital().expect("registry");
        let wards = registry.lookup("wards").expect("wards");
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let err = ReferentialAllocator::new(wards)
            .allocate(&HashMap::new(), None, &mut rng)
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingTarget(table) if table == "wards"));

        let allocation = ReferentialAllocator::new(wards)
            .allocate(&HashMap::new(), Some(4), &mut rng)
            .expect("allocation");
        assert_eq!(allocation.rows(), 4);
        assert!(allocation.assignments.iter().all(|a| a.picks.is_empty()));
    }
}
