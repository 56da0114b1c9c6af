#![forbid(unsafe_code)]

//! Dependency-ordered case scheduling.
//!
//! Produces a stable topological order over the declared `depends_on`
//! edges: Kahn's algorithm with the ready set ordered by declaration
//! index, so runs are reproducible. Unknown dependency names and cycles
//! are load-time configuration errors, fatal before any network call.

use std::collections::{BTreeMap, BTreeSet};

use crate::registry::TestCase;
use crate::SetupError;

/// Returns indices into `cases` in execution order.
pub fn execution_order(cases: &[TestCase]) -> Result<Vec<usize>, SetupError> {
    let mut index_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (index, case) in cases.iter().enumerate() {
        if index_of.insert(case.name.as_str(), index).is_some() {
            return Err(SetupError::DuplicateCase(case.name.clone()));
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); cases.len()];
    let mut in_degree: Vec<usize> = vec![0; cases.len()];
    for (index, case) in cases.iter().enumerate() {
        for dep in &case.depends_on {
            let dep_index =
                *index_of
                    .get(dep.as_str())
                    .ok_or_else(|| SetupError::UnknownDependency {
                        case: case.name.clone(),
                        dependency: dep.clone(),
                    })?;
            dependents[dep_index].push(index);
            in_degree[index] += 1;
        }
    }

    // BTreeSet pops the smallest declaration index first, which is what
    // keeps ties stable.
    let mut ready: BTreeSet<usize> = (0..cases.len())
        .filter(|&index| in_degree[index] == 0)
        .collect();
    let mut order = Vec::with_capacity(cases.len());
    while let Some(&index) = ready.iter().next() {
        ready.remove(&index);
        order.push(index);
        for &next in &dependents[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < cases.len() {
        let stuck: Vec<String> = (0..cases.len())
            .filter(|&index| in_degree[index] > 0)
            .map(|index| cases[index].name.clone())
            .collect();
        return Err(SetupError::DependencyCycle(stuck));
    }
    Ok(order)
}
