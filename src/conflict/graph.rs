//! In-memory conflict graph over the modules of one generation run.
//!
//! Nodes are modules. A **hard** edge joins two modules that share students
//! (same formation, or formations linked by a shared-enrollment rule); a
//! **soft** edge joins two modules that share a supervising professor.
//! Pairs are stored under an ordered index key so lookups are O(1).

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Module, SharedEnrollment};
use crate::loader::WorkingSet;

/// Strength of a conflict between two modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    /// Shared students: never in the same slot
    Hard,
    /// Shared professor: only raises priority
    Soft,
}

/// A conflict between two modules, `a < b` by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEdge {
    pub a: String,
    pub b: String,
    /// Shared students for hard edges, shared professors for soft edges
    pub weight: u32,
    pub kind: ConflictKind,
}

type PairKey = (usize, usize);

fn pair(i: usize, j: usize) -> PairKey {
    if i < j { (i, j) } else { (j, i) }
}

fn formation_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Adjacency structure the allocator queries
#[derive(Debug, Clone, Default)]
pub struct ConflictGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    sizes: Vec<u32>,
    formations: Vec<String>,
    /// Formation pairs linked by a shared-enrollment rule, lower id first
    linked: HashSet<(String, String)>,
    hard: HashMap<PairKey, u32>,
    soft: HashMap<PairKey, u32>,
    hard_adj: Vec<Vec<usize>>,
    soft_adj: Vec<Vec<usize>>,
}

impl ConflictGraph {
    /// Build the graph for a working set
    pub fn from_working_set(working_set: &WorkingSet) -> Self {
        Self::build(&working_set.modules, &working_set.shared_enrollments)
    }

    /// Build the graph over `modules`.
    ///
    /// Modules must already carry their enrolled-student count. Cross-formation
    /// hard edges exist only where a `SharedEnrollment` rule links the two formations.
    pub fn build(modules: &[Module], shared: &[SharedEnrollment]) -> Self {
        let mut graph = Self {
            ids: modules.iter().map(|m| m.id.clone()).collect(),
            index: modules.iter().enumerate().map(|(i, m)| (m.id.clone(), i)).collect(),
            sizes: modules.iter().map(|m| m.student_count).collect(),
            formations: modules.iter().map(|m| m.formation_id.clone()).collect(),
            linked: HashSet::new(),
            hard: HashMap::new(),
            soft: HashMap::new(),
            hard_adj: vec![Vec::new(); modules.len()],
            soft_adj: vec![Vec::new(); modules.len()],
        };

        let mut shared_students: HashMap<(&str, &str), u32> = HashMap::new();
        for rule in shared {
            let key = formation_pair(&rule.formation_a, &rule.formation_b);
            *shared_students.entry(key).or_insert(0) += rule.students;
        }
        graph.linked = shared_students
            .iter()
            .filter(|(_, students)| **students > 0)
            .map(|((a, b), _)| (a.to_string(), b.to_string()))
            .collect();

        for i in 0..modules.len() {
            for j in (i + 1)..modules.len() {
                let (mi, mj) = (&modules[i], &modules[j]);

                let hard_weight = if mi.formation_id == mj.formation_id {
                    Some(mi.student_count)
                } else {
                    let key = formation_pair(&mi.formation_id, &mj.formation_id);
                    shared_students.get(&key).copied().filter(|s| *s > 0)
                };
                if let Some(weight) = hard_weight {
                    graph.hard.insert((i, j), weight);
                    graph.hard_adj[i].push(j);
                    graph.hard_adj[j].push(i);
                }

                let professors = mi.shared_professor_count(mj);
                if professors > 0 {
                    graph.soft.insert((i, j), professors);
                    graph.soft_adj[i].push(j);
                    graph.soft_adj[j].push(i);
                }
            }
        }

        log::debug!(
            "Built conflict graph: {} modules, {} hard edges, {} soft edges",
            graph.len(),
            graph.hard.len(),
            graph.soft.len()
        );
        graph
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, module_id: &str) -> Option<usize> {
        self.index.get(module_id).copied()
    }

    /// Whether two modules must not share a slot
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) if i != j => self.hard.contains_key(&pair(i, j)),
            _ => false,
        }
    }

    pub fn conflicts_at(&self, i: usize, j: usize) -> bool {
        i != j && self.hard.contains_key(&pair(i, j))
    }

    /// Whether two modules share a professor
    pub fn soft_conflicts(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) if i != j => self.soft.contains_key(&pair(i, j)),
            _ => false,
        }
    }

    /// The strongest edge between two modules, hard before soft
    pub fn edge(&self, a: &str, b: &str) -> Option<ConflictEdge> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        if i == j {
            return None;
        }
        let key = pair(i, j);
        self.hard
            .get(&key)
            .map(|w| self.make_edge(key, *w, ConflictKind::Hard))
            .or_else(|| self.soft.get(&key).map(|w| self.make_edge(key, *w, ConflictKind::Soft)))
    }

    /// Number of hard-conflicting peers
    pub fn degree(&self, module_id: &str) -> usize {
        self.index_of(module_id).map(|i| self.hard_adj[i].len()).unwrap_or(0)
    }

    pub fn degree_at(&self, i: usize) -> usize {
        self.hard_adj[i].len()
    }

    /// Number of peers sharing a professor
    pub fn soft_degree(&self, module_id: &str) -> usize {
        self.index_of(module_id).map(|i| self.soft_adj[i].len()).unwrap_or(0)
    }

    pub fn soft_degree_at(&self, i: usize) -> usize {
        self.soft_adj[i].len()
    }

    /// Enrolled students of a module
    pub fn size(&self, module_id: &str) -> u32 {
        self.index_of(module_id).map(|i| self.sizes[i]).unwrap_or(0)
    }

    /// Nodes whose students also sit exams of `formation_id`: the formation's
    /// own modules and those of formations linked to it.
    ///
    /// Lets the allocator treat exams outside the graph as hard conflicts.
    pub fn peers_of_formation(&self, formation_id: &str) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| {
                let own = self.formations[i].as_str();
                if own == formation_id {
                    return true;
                }
                let (a, b) = formation_pair(own, formation_id);
                self.linked.contains(&(a.to_string(), b.to_string()))
            })
            .collect()
    }

    /// All edges sorted by (a, b, kind)
    pub fn edges(&self) -> Vec<ConflictEdge> {
        let mut edges: BTreeMap<(String, String, u8), ConflictEdge> = BTreeMap::new();
        for (key, weight) in &self.hard {
            let edge = self.make_edge(*key, *weight, ConflictKind::Hard);
            edges.insert((edge.a.clone(), edge.b.clone(), 0), edge);
        }
        for (key, weight) in &self.soft {
            let edge = self.make_edge(*key, *weight, ConflictKind::Soft);
            edges.insert((edge.a.clone(), edge.b.clone(), 1), edge);
        }
        edges.into_values().collect()
    }

    pub fn hard_edge_count(&self) -> usize {
        self.hard.len()
    }

    pub fn soft_edge_count(&self) -> usize {
        self.soft.len()
    }

    fn make_edge(&self, (i, j): PairKey, weight: u32, kind: ConflictKind) -> ConflictEdge {
        let (a, b) = if self.ids[i] <= self.ids[j] {
            (&self.ids[i], &self.ids[j])
        } else {
            (&self.ids[j], &self.ids[i])
        };
        ConflictEdge {
            a: a.clone(),
            b: b.clone(),
            weight,
            kind,
        }
    }
}
