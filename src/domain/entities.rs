//! Scheduling entities: modules, formations, professors and rooms.
//!
//! These are loaded from an external data source and are read-only for the
//! duration of a generation run.

use serde::{Deserialize, Serialize};

/// A course unit requiring exactly one exam
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub credits: u32,
    /// Owning formation
    pub formation_id: String,
    /// Module that must be taken before this one
    #[serde(default)]
    pub prerequisite_id: Option<String>,
    /// Professors supervising the exam
    #[serde(default)]
    pub professor_ids: Vec<String>,
    /// Enrolled students, filled from the formation size at load time
    #[serde(default)]
    pub student_count: u32,
    /// Department of the owning formation, filled at load time
    #[serde(default)]
    pub department: String,
}

impl Module {
    pub fn new(id: impl Into<String>, name: impl Into<String>, formation_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            credits: 0,
            formation_id: formation_id.into(),
            prerequisite_id: None,
            professor_ids: Vec::new(),
            student_count: 0,
            department: String::new(),
        }
    }

    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_prerequisite(mut self, module_id: impl Into<String>) -> Self {
        self.prerequisite_id = Some(module_id.into());
        self
    }

    pub fn with_professor(mut self, professor_id: impl Into<String>) -> Self {
        self.professor_ids.push(professor_id.into());
        self
    }

    /// Whether two modules share at least one supervising professor
    pub fn shares_professor_with(&self, other: &Module) -> bool {
        self.shared_professor_count(other) > 0
    }

    pub fn shared_professor_count(&self, other: &Module) -> u32 {
        self.professor_ids
            .iter()
            .filter(|p| other.professor_ids.contains(p))
            .count() as u32
    }
}

/// A cohort of students sharing a set of required modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    pub id: String,
    pub name: String,
    pub department: String,
    pub student_count: u32,
    /// Number of modules owned, derived at load time
    #[serde(default)]
    pub module_count: u32,
}

impl Formation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        department: impl Into<String>,
        student_count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: department.into(),
            student_count,
            module_count: 0,
        }
    }
}

/// Supervises and teaches modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professor {
    pub id: String,
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub specialty: String,
}

impl Professor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: department.into(),
            specialty: String::new(),
        }
    }
}

/// Kind of exam venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    #[default]
    Classroom,
    Amphitheater,
    Laboratory,
}

/// A physical venue with a seat capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    #[serde(default, rename = "type")]
    pub room_type: RoomType,
    #[serde(default)]
    pub building: String,
}

impl Room {
    pub fn new(id: impl Into<String>, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capacity,
            room_type: RoomType::Classroom,
            building: String::new(),
        }
    }

    pub fn with_type(mut self, room_type: RoomType) -> Self {
        self.room_type = room_type;
        self
    }

    pub fn fits(&self, students: u32) -> bool {
        self.capacity >= students
    }
}

/// Explicit rule declaring that two formations share enrolled students
/// (double majors, shared minors). Without such a rule, modules of different
/// formations never hard-conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEnrollment {
    pub formation_a: String,
    pub formation_b: String,
    pub students: u32,
}

impl SharedEnrollment {
    pub fn new(formation_a: impl Into<String>, formation_b: impl Into<String>, students: u32) -> Self {
        Self {
            formation_a: formation_a.into(),
            formation_b: formation_b.into(),
            students,
        }
    }

    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.formation_a == a && self.formation_b == b) || (self.formation_a == b && self.formation_b == a)
    }
}
