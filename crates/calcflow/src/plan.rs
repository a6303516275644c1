//! Execution plans

use calcflow_formula::{FormulaResult, Graph};

/// Formula ids grouped into stages, plus each formula's dependents.
///
/// Every predecessor of a formula in stage `k` lies in a stage before `k`,
/// so formulas within one stage are independent of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    stages: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    /// Build a plan from a dependency graph whose vertices are the formula
    /// ids `0..n`
    pub fn from_graph(graph: &Graph<usize>) -> FormulaResult<Self> {
        let ids = graph.vertices();
        let stages = graph
            .stage_indices()?
            .into_iter()
            .map(|stage| stage.into_iter().map(|v| ids[v]).collect())
            .collect();

        let mut dependents = vec![Vec::new(); ids.len()];
        for (v, &id) in ids.iter().enumerate() {
            dependents[id] = graph.dependents(v).iter().map(|&d| ids[d]).collect();
        }

        Ok(Self { stages, dependents })
    }

    pub fn stages(&self) -> &[Vec<usize>] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Formulas that read the result of `id`
    pub fn dependents(&self, id: usize) -> &[usize] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Number of formulas in the plan
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_from_diamond() {
        let graph = Graph::new(0..4, [(0, 1), (0, 2), (1, 3), (2, 3)]).unwrap();
        let plan = ExecutionPlan::from_graph(&graph).unwrap();

        assert_eq!(plan.stages(), &[vec![0], vec![1, 2], vec![3]]);
        assert_eq!(plan.dependents(0), &[1, 2]);
        assert_eq!(plan.dependents(3), &[] as &[usize]);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_stage_zero_has_no_predecessors() {
        let graph = Graph::new(0..3, [(2, 0)]).unwrap();
        let plan = ExecutionPlan::from_graph(&graph).unwrap();
        assert_eq!(plan.stages(), &[vec![1, 2], vec![0]]);
    }
}
