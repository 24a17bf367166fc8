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

//! Relationship Parsing
//!
//! Turns free-form extraction output into triples. The expected shape is
//!
//! ```text
//! Entities:
//! - Alice
//! - Bob
//!
//! Relationships:
//! - Alice -> knows -> Bob
//! ```
//!
//! but nothing is enforced: every line is classified on its own and bad lines
//! are skipped, so parsing never fails.

use crate::knowledge_graph::entities::Triple;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Marker that must appear somewhere in a block for it to yield triples
pub const RELATIONSHIPS_MARKER: &str = "Relationships:";

static RELATIONSHIP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s*(.+?)\s*->\s*(.+?)\s*->\s*(.+?)\s*$")
        .expect("relationship line pattern is valid")
});

/// Classification of a single line of model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// `- A -> r -> B` with three non-empty fields
    Valid(Triple),
    /// Looks like a relationship bullet but a field is empty or missing
    Malformed,
    /// Anything else (headers, entity bullets, prose, blank lines)
    Ignored,
}

/// Triples recovered from one block, plus what was thrown away
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBlock {
    pub triples: Vec<Triple>,
    pub malformed: usize,
    pub has_relationships: bool,
}

/// Line-oriented parser for extraction output
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipParser;

impl RelationshipParser {
    pub fn new() -> Self {
        Self
    }

    /// Classify one line
    pub fn classify_line(&self, line: &str) -> LineClass {
        if let Some(caps) = RELATIONSHIP_LINE.captures(line) {
            return match Triple::new(&caps[1], &caps[2], &caps[3]) {
                Some(triple) => LineClass::Valid(triple),
                None => LineClass::Malformed,
            };
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with('-') && trimmed.contains("->") {
            LineClass::Malformed
        } else {
            LineClass::Ignored
        }
    }

    /// Parse a whole block. `block_id` only labels log lines.
    pub fn parse_block(&self, block_id: &str, text: &str) -> ParsedBlock {
        if !text.contains(RELATIONSHIPS_MARKER) {
            warn!(block = block_id, "No 'Relationships:' block found, skipping");
            return ParsedBlock::default();
        }

        let mut parsed = ParsedBlock {
            has_relationships: true,
            ..Default::default()
        };

        for (line_no, line) in text.lines().enumerate() {
            match self.classify_line(line) {
                LineClass::Valid(triple) => parsed.triples.push(triple),
                LineClass::Malformed => {
                    warn!(
                        block = block_id,
                        line = line_no + 1,
                        "Skipping malformed relationship: {:?}",
                        line
                    );
                    parsed.malformed += 1;
                }
                LineClass::Ignored => {}
            }
        }

        debug!(
            block = block_id,
            triples = parsed.triples.len(),
            malformed = parsed.malformed,
            "Parsed relationship block"
        );

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str, r: &str, t: &str) -> Triple {
        Triple::new(s, r, t).unwrap()
    }

    #[test]
    fn test_parse_example_block() {
        let text = "Entities:\n- Alice\n- Bob\n\nRelationships:\n- Alice -> knows -> Bob\n";
        let parsed = RelationshipParser::new().parse_block("0", text);

        assert!(parsed.has_relationships);
        assert_eq!(parsed.triples, vec![triple("Alice", "knows", "Bob")]);
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_parse_is_pure() {
        let parser = RelationshipParser::new();
        let text = "Relationships:\n- A -> r1 -> B\n-   C->r2->D  \nnoise\n- E -> -> F\n";
        assert_eq!(parser.parse_block("x", text), parser.parse_block("x", text));
    }

    #[test]
    fn test_malformed_line_is_isolated() {
        let text = "Relationships:\n- Alice -> knows -> Bob\n- Carol ->   -> Dave\n";
        let parsed = RelationshipParser::new().parse_block("1", text);

        assert_eq!(parsed.triples, vec![triple("Alice", "knows", "Bob")]);
        assert_eq!(parsed.malformed, 1);
    }

    #[test]
    fn test_missing_marker_yields_nothing() {
        let text = "Entities:\n- Alice\n- Alice -> knows -> Bob\n";
        let parsed = RelationshipParser::new().parse_block("2", text);

        assert!(!parsed.has_relationships);
        assert!(parsed.triples.is_empty());
    }

    #[test]
    fn test_extraction_sentinel_yields_nothing() {
        let parsed =
            RelationshipParser::new().parse_block("3", "Error: Failed to extract elements.");
        assert!(parsed.triples.is_empty());
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_classify_line_variants() {
        let parser = RelationshipParser::new();

        assert_eq!(
            parser.classify_line("  -   Acme Corp   ->  acquired ->  Widget Co  "),
            LineClass::Valid(triple("Acme Corp", "acquired", "Widget Co"))
        );
        assert_eq!(parser.classify_line("- Alice"), LineClass::Ignored);
        assert_eq!(parser.classify_line("Relationships:"), LineClass::Ignored);
        assert_eq!(parser.classify_line(""), LineClass::Ignored);
        assert_eq!(parser.classify_line("- Alice -> Bob"), LineClass::Malformed);
        assert_eq!(parser.classify_line("- Alice -> \t -> Bob"), LineClass::Malformed);
    }

    #[test]
    fn test_extra_arrows_stay_in_target() {
        let parser = RelationshipParser::new();
        assert_eq!(
            parser.classify_line("- A -> r -> B -> C"),
            LineClass::Valid(triple("A", "r", "B -> C"))
        );
    }
}
