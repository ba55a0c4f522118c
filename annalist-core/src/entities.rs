// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity and Relationship Types
//!
//! Defines the core types for the knowledge graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity types in the annotation scheme
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A person (`PER`)
    Person,
    /// A place (`LOC`)
    Place,
    /// An office or title (`OFI`)
    Office,
    /// A book (`BOOK`)
    Book,
}

impl EntityType {
    /// Every entity type, in display order
    pub const ALL: [EntityType; 4] = [
        EntityType::Person,
        EntityType::Place,
        EntityType::Office,
        EntityType::Book,
    ];

    /// Resolve an annotation type code. Unknown codes are untyped.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PER" => Some(EntityType::Person),
            "LOC" => Some(EntityType::Place),
            "OFI" => Some(EntityType::Office),
            "BOOK" => Some(EntityType::Book),
            _ => None,
        }
    }

    /// Annotation type code
    pub fn code(&self) -> &'static str {
        match self {
            EntityType::Person => "PER",
            EntityType::Place => "LOC",
            EntityType::Office => "OFI",
            EntityType::Book => "BOOK",
        }
    }

    /// Node label used in the graph store
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Person => "人物",
            EntityType::Place => "地点",
            EntityType::Office => "官衔",
            EntityType::Book => "书籍",
        }
    }

    /// Display color
    pub fn color(&self) -> &'static str {
        match self {
            EntityType::Person => "#FF6B6B",
            EntityType::Place => "#4ECDC4",
            EntityType::Office => "#45B7D1",
            EntityType::Book => "#96CEB4",
        }
    }
}

/// A relation triple extracted from an annotated document
///
/// `head_type` and `tail_type` carry the raw annotation code (`"PER"`, ...)
/// or an empty string when the span had no matching entity annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub head: String,
    pub head_type: String,
    pub relation: String,
    pub tail: String,
    pub tail_type: String,
    /// Source snippet justifying the relation
    pub context: String,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        head: impl Into<String>,
        head_type: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
        tail_type: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            head_type: head_type.into(),
            relation: relation.into(),
            tail: tail.into(),
            tail_type: tail_type.into(),
            context: context.into(),
        }
    }

    /// The `(head, relation, tail)` identity used for deduplication
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.head, &self.relation, &self.tail)
    }

    pub fn head_entity_type(&self) -> Option<EntityType> {
        EntityType::from_code(&self.head_type)
    }

    pub fn tail_entity_type(&self) -> Option<EntityType> {
        EntityType::from_code(&self.tail_type)
    }
}

/// One directed edge as seen by readers, always in head → tail orientation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Head entity name
    pub entity1: String,
    /// Relation type
    pub relation: String,
    /// Tail entity name
    pub entity2: String,
    /// Source snippet stored on the edge
    pub context: String,
}

impl RelationRecord {
    pub fn new(
        entity1: impl Into<String>,
        relation: impl Into<String>,
        entity2: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            entity1: entity1.into(),
            relation: relation.into(),
            entity2: entity2.into(),
            context: context.into(),
        }
    }

    /// Whether `name` is either endpoint
    pub fn involves(&self, name: &str) -> bool {
        self.entity1 == name || self.entity2 == name
    }
}

/// A node name together with the label it is stored under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSummary {
    pub label: String,
    pub name: String,
}

/// Statistics about the knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of nodes
    pub node_count: usize,
    /// Total number of edges
    pub edge_count: usize,
    /// Node count per label
    pub nodes_by_label: BTreeMap<String, usize>,
    /// Edge count per relation type
    pub edges_by_relation: BTreeMap<String, usize>,
}

impl GraphStats {
    /// Node count for a label (zero when absent)
    pub fn nodes_with_label(&self, label: &str) -> usize {
        self.nodes_by_label.get(label).copied().unwrap_or(0)
    }

    /// Edge count for a relation type (zero when absent)
    pub fn edges_of_type(&self, relation: &str) -> usize {
        self.edges_by_relation.get(relation).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_codes() {
        for ty in EntityType::ALL {
            assert_eq!(EntityType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(EntityType::from_code(""), None);
        assert_eq!(EntityType::from_code("per"), None);
    }

    #[test]
    fn test_triple_types() {
        let triple = Triple::new("甲", "PER", "到达", "长安", "", "甲至长安");
        assert_eq!(triple.head_entity_type(), Some(EntityType::Person));
        assert_eq!(triple.tail_entity_type(), None);
        assert_eq!(triple.identity(), ("甲", "到达", "长安"));
    }

    #[test]
    fn test_stats_lookup_defaults_to_zero() {
        let stats = GraphStats::default();
        assert_eq!(stats.nodes_with_label("人物"), 0);
        assert_eq!(stats.edges_of_type("父母"), 0);
    }
}
