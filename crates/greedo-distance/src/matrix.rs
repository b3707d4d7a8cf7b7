//! Sparse interaction coefficient matrix
//!
//! A(i, j) is directional and omitted entries are zero. The objective only
//! ever consumes the symmetrized value A(i, j) + A(j, i); the diagonal A(i, i)
//! is the agent's own squared usage-change contribution.
//!
//! Once built the matrix is immutable and may be shared across threads.

use greedo_common::AgentId;
use std::collections::{BTreeSet, HashMap};

/// Read-only sparse mapping (AgentId, AgentId) → coefficient
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    rows: HashMap<AgentId, HashMap<AgentId, f64>>,
    entries: usize,
}

impl InteractionMatrix {
    /// Matrix without any interaction
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a matrix from directional entries; duplicate pairs are summed
    pub fn from_entries<I, A, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, B, f64)>,
        A: Into<AgentId>,
        B: Into<AgentId>,
    {
        let mut rows: HashMap<AgentId, HashMap<AgentId, f64>> = HashMap::new();
        for (from, to, value) in entries {
            *rows
                .entry(from.into())
                .or_default()
                .entry(to.into())
                .or_insert(0.0) += value;
        }
        Self::from_rows(rows)
    }

    pub(crate) fn from_rows(rows: HashMap<AgentId, HashMap<AgentId, f64>>) -> Self {
        let entries = rows.values().map(HashMap::len).sum();
        Self { rows, entries }
    }

    /// Directional coefficient A(from, to)
    #[inline]
    pub fn coefficient(&self, from: &AgentId, to: &AgentId) -> f64 {
        self.rows
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Self term A(i, i)
    #[inline]
    pub fn self_term(&self, agent: &AgentId) -> f64 {
        self.coefficient(agent, agent)
    }

    /// Symmetrized coefficient A(a, b) + A(b, a)
    #[inline]
    pub fn symmetric(&self, a: &AgentId, b: &AgentId) -> f64 {
        self.coefficient(a, b) + self.coefficient(b, a)
    }

    /// Non-zero entries of one row
    pub fn row(&self, from: &AgentId) -> impl Iterator<Item = (&AgentId, f64)> {
        self.rows
            .get(from)
            .into_iter()
            .flat_map(|row| row.iter().map(|(to, value)| (to, *value)))
    }

    /// Iterate every stored entry as (from, to, value)
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &AgentId, f64)> {
        self.rows
            .iter()
            .flat_map(|(from, row)| row.iter().map(move |(to, value)| (from, to, *value)))
    }

    /// Every agent appearing in at least one stored entry, in agent order
    pub fn agents(&self) -> BTreeSet<&AgentId> {
        self.iter().flat_map(|(from, to, _)| [from, to]).collect()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Quadratic form ½ Σ_{i,j ∈ members} (A(i, j) + A(j, i)), computed from scratch
    pub fn quadratic_form<'a>(&self, members: impl IntoIterator<Item = &'a AgentId>) -> f64 {
        let members: BTreeSet<&AgentId> = members.into_iter().collect();
        members
            .iter()
            .map(|from| {
                self.row(from)
                    .filter(|(to, _)| members.contains(to))
                    .map(|(_, value)| value)
                    .sum::<f64>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AgentId {
        AgentId::from(s)
    }

    #[test]
    fn test_from_entries_sums_duplicates() {
        let matrix = InteractionMatrix::from_entries(vec![
            ("a", "b", 1.0),
            ("a", "b", 0.5),
            ("b", "a", 2.0),
            ("a", "a", 3.0),
        ]);
        assert_eq!(matrix.len(), 3);
        assert!((matrix.coefficient(&id("a"), &id("b")) - 1.5).abs() < 1e-12);
        assert!((matrix.symmetric(&id("a"), &id("b")) - 3.5).abs() < 1e-12);
        assert!((matrix.self_term(&id("a")) - 3.0).abs() < 1e-12);
        assert_eq!(matrix.coefficient(&id("b"), &id("c")), 0.0);
    }

    #[test]
    fn test_quadratic_form() {
        let matrix = InteractionMatrix::from_entries(vec![
            ("a", "a", 1.0),
            ("b", "b", 2.0),
            ("a", "b", 0.5),
            ("b", "c", 7.0),
        ]);
        let members = [id("a"), id("b")];
        // A(a,a) + A(b,b) + A(a,b) + A(b,a)
        assert!((matrix.quadratic_form(members.iter()) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_agents_and_empty() {
        assert!(InteractionMatrix::empty().is_empty());
        let matrix = InteractionMatrix::from_entries(vec![("b", "c", 1.0)]);
        let agents: Vec<_> = matrix.agents().into_iter().map(AgentId::as_str).collect();
        assert_eq!(agents, vec!["b", "c"]);
    }
}
