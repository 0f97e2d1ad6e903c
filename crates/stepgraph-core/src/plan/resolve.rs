//! Dependency resolution: raw references to validated step positions.

use std::collections::HashMap;

use tracing::debug;

use super::error::ValidationError;
use super::extract::DependencyRef;
use super::normalize::NormalizedRecord;
use super::types::Step;

/// Resolve every record's references against the whole batch.
///
/// Numeric references match the `step` numbers the model declared; string
/// references match assigned identities (`step_N`). The returned steps keep
/// input order and carry deduplicated dependency sequences.
pub fn resolve_dependencies(records: Vec<NormalizedRecord>) -> Result<Vec<Step>, ValidationError> {
    let mut by_number: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut by_id: HashMap<String, usize> = HashMap::with_capacity(records.len());
    for record in &records {
        by_number
            .entry(record.step.declared_number)
            .or_default()
            .push(record.step.sequence);
        by_id.insert(record.step.id.clone(), record.step.sequence);
    }

    let mut edges = 0usize;
    let mut steps = Vec::with_capacity(records.len());

    for NormalizedRecord {
        mut step,
        references,
    } in records
    {
        for reference in &references {
            let target = match reference {
                DependencyRef::ByNumber(n) => match by_number.get(n).map(Vec::as_slice) {
                    Some([sequence]) => *sequence,
                    Some(shared) if shared.len() > 1 => {
                        return Err(ValidationError::AmbiguousDependency {
                            step: step.declared_number,
                            id: step.id.clone(),
                            reference: *n,
                            count: shared.len(),
                        });
                    }
                    _ => return Err(unknown(&step, reference)),
                },
                DependencyRef::ById(id) => match by_id.get(id) {
                    Some(sequence) => *sequence,
                    None => return Err(unknown(&step, reference)),
                },
            };

            if target == step.sequence {
                return Err(ValidationError::SelfDependency {
                    step: step.declared_number,
                    id: step.id.clone(),
                });
            }
            if step.depends_on.insert(target) {
                edges += 1;
            }
        }
        steps.push(step);
    }

    debug!(steps = steps.len(), edges, "resolved dependencies");
    Ok(steps)
}

fn unknown(step: &Step, reference: &DependencyRef) -> ValidationError {
    ValidationError::UnknownDependency {
        step: step.declared_number,
        id: step.id.clone(),
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::plan::types::{Action, step_id};
    use DependencyRef::{ById, ByNumber};

    fn rec(sequence: usize, declared: u64, refs: Vec<DependencyRef>) -> NormalizedRecord {
        NormalizedRecord {
            step: Step {
                sequence,
                declared_number: declared,
                id: step_id(sequence),
                action: Action::Read,
                description: format!("step {sequence}"),
                path: format!("file{sequence}.txt"),
                depends_on: BTreeSet::new(),
            },
            references: refs,
        }
    }

    #[test]
    fn resolves_numbers_and_ids() {
        let steps = resolve_dependencies(vec![
            rec(1, 1, vec![]),
            rec(2, 2, vec![ByNumber(1)]),
            rec(3, 3, vec![ById("step_1".into()), ByNumber(2)]),
        ])
        .unwrap();
        assert!(steps[0].depends_on.is_empty());
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
        assert_eq!(steps[2].depends_on, BTreeSet::from([1, 2]));
    }

    #[test]
    fn numeric_refs_follow_declared_numbers() {
        // The model numbered its steps 10, 20, 30.
        let steps = resolve_dependencies(vec![
            rec(1, 10, vec![]),
            rec(2, 20, vec![ByNumber(10)]),
            rec(3, 30, vec![ByNumber(20)]),
        ])
        .unwrap();
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
        assert_eq!(steps[2].depends_on, BTreeSet::from([2]));
    }

    #[test]
    fn collapses_duplicate_references() {
        let steps = resolve_dependencies(vec![
            rec(1, 1, vec![]),
            rec(2, 2, vec![ByNumber(1), ById("step_1".into()), ByNumber(1)]),
        ])
        .unwrap();
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
    }

    #[test]
    fn rejects_dangling_number() {
        let err = resolve_dependencies(vec![rec(1, 1, vec![]), rec(2, 2, vec![ByNumber(7)])])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownDependency {
                step: 2,
                id: "step_2".to_owned(),
                reference: "7".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_dangling_id() {
        let err = resolve_dependencies(vec![rec(1, 1, vec![ById("step_9".into())])]).unwrap_err();
        assert!(
            matches!(err, ValidationError::UnknownDependency { ref reference, .. } if reference == "step_9"),
            "got {err:?}"
        );
    }

    #[test]
    fn rejects_self_reference_by_number_and_id() {
        let err = resolve_dependencies(vec![rec(1, 1, vec![ByNumber(1)])]).unwrap_err();
        assert!(matches!(err, ValidationError::SelfDependency { step: 1, .. }));

        let err = resolve_dependencies(vec![rec(1, 5, vec![]), rec(2, 6, vec![ById("step_2".into())])])
            .unwrap_err();
        assert!(matches!(err, ValidationError::SelfDependency { step: 6, .. }));
    }

    #[test]
    fn rejects_ambiguous_numbers() {
        let err = resolve_dependencies(vec![
            rec(1, 1, vec![]),
            rec(2, 1, vec![]),
            rec(3, 3, vec![ByNumber(1)]),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ValidationError::AmbiguousDependency { reference: 1, count: 2, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn duplicate_numbers_are_fine_when_unreferenced() {
        let steps = resolve_dependencies(vec![
            rec(1, 1, vec![]),
            rec(2, 1, vec![ById("step_1".into())]),
        ])
        .unwrap();
        assert_eq!(steps[1].depends_on, BTreeSet::from([1]));
    }
}
