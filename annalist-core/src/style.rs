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

//! Label and color tables
//!
//! Entity type codes and relation types are free-form strings coming out of
//! the annotation data. Both tables resolve through an explicit fallback
//! entry instead of failing on unknown keys.

use crate::entities::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label used for untyped or unrecognized entities
pub const FALLBACK_LABEL: &str = "Entity";
/// Color used for anything without a table entry
pub const FALLBACK_COLOR: &str = "#CCCCCC";

/// Display label and color for a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub label: String,
    pub color: String,
}

impl Style {
    pub fn new(label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: color.into(),
        }
    }
}

/// Type code → node style
#[derive(Debug, Clone)]
pub struct EntityStyles {
    styles: HashMap<String, Style>,
    /// Codes in registration order
    order: Vec<String>,
    fallback: Style,
}

impl EntityStyles {
    /// Empty table with the given fallback
    pub fn new(fallback: Style) -> Self {
        Self {
            styles: HashMap::new(),
            order: Vec::new(),
            fallback,
        }
    }

    /// Register a style for a type code
    pub fn with(mut self, code: impl Into<String>, style: Style) -> Self {
        let code = code.into();
        if self.styles.insert(code.clone(), style).is_none() {
            self.order.push(code);
        }
        self
    }

    /// Style for a type code, or the fallback
    pub fn resolve(&self, code: &str) -> &Style {
        self.styles.get(code).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &Style {
        &self.fallback
    }

    /// Labels of the registered types, in registration order
    pub fn labels(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|code| self.styles.get(code))
            .map(|style| style.label.as_str())
            .collect()
    }
}

impl Default for EntityStyles {
    fn default() -> Self {
        EntityType::ALL.iter().fold(
            Self::new(Style::new(FALLBACK_LABEL, FALLBACK_COLOR)),
            |styles, ty| styles.with(ty.code(), Style::new(ty.label(), ty.color())),
        )
    }
}

/// Relation type → edge color
#[derive(Debug, Clone)]
pub struct RelationPalette {
    colors: HashMap<String, String>,
    fallback: String,
}

impl RelationPalette {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            colors: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with(mut self, relation: impl Into<String>, color: impl Into<String>) -> Self {
        self.colors.insert(relation.into(), color.into());
        self
    }

    /// Color for a relation type, or the fallback
    pub fn color(&self, relation: &str) -> &str {
        self.colors
            .get(relation)
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }
}

impl Default for RelationPalette {
    fn default() -> Self {
        Self::new(FALLBACK_COLOR)
            .with("任职", "#FFA07A")
            .with("敌对攻伐", "#FF4500")
            .with("上下级", "#9370DB")
            .with("政治奥援", "#20B2AA")
            .with("管理", "#4682B4")
            .with("同僚", "#87CEEB")
            .with("到达", "#DDA0DD")
            .with("父母", "#F0E68C")
            .with("驻守", "#98FB98")
            .with("出生于某地", "#DEB887")
            .with("兄弟", "#F4A460")
            .with("别名", "#D8BFD8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_styles_default() {
        let styles = EntityStyles::default();
        assert_eq!(styles.resolve("PER"), &Style::new("人物", "#FF6B6B"));
        assert_eq!(styles.resolve("BOOK").label, "书籍");
        assert_eq!(styles.labels(), vec!["人物", "地点", "官衔", "书籍"]);
    }

    #[test]
    fn test_entity_styles_fallback() {
        let styles = EntityStyles::default();
        assert_eq!(styles.resolve(""), &Style::new(FALLBACK_LABEL, FALLBACK_COLOR));
        assert_eq!(styles.resolve("ORG").label, FALLBACK_LABEL);
    }

    #[test]
    fn test_relation_palette() {
        let palette = RelationPalette::default();
        assert_eq!(palette.color("父母"), "#F0E68C");
        assert_eq!(palette.color("师徒"), FALLBACK_COLOR);
    }
}
