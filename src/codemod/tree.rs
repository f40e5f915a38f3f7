//! Consumer source trees
//!
//! The codemod never touches the filesystem. It works against a
//! [`ConsumerTree`], and the caller decides where units come from and
//! whether edits are written back.

use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::lexer::{self, Declaration, Token};

/// Identifies one unit (usually a file) of consumer source
pub type UnitId = PathBuf;

/// Replace `span` with `replacement`; an empty replacement removes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn replace(span: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn remove(span: Range<usize>) -> Self {
        Self::replace(span, String::new())
    }
}

/// Token-level access to consumer source
pub trait ConsumerTree {
    /// Every unit in the tree, in a stable order
    fn unit_ids(&self) -> Vec<UnitId>;

    /// Tokens of one unit; comments are not tokens
    fn tokens(&self, unit: &Path) -> Vec<Token>;

    /// Top-level declarations of one unit
    fn declarations(&self, unit: &Path) -> Vec<Declaration>;

    /// Apply edits whose spans refer to the unit's current text
    ///
    /// Overlapping edits keep the one starting earliest.
    fn apply_edits(&mut self, unit: &Path, edits: Vec<Edit>);
}

/// In-memory tree of text units keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextTree {
    units: BTreeMap<PathBuf, String>,
}

impl TextTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: impl Into<PathBuf>, text: impl Into<String>) {
        self.units.insert(unit.into(), text.into());
    }

    pub fn get(&self, unit: &Path) -> Option<&str> {
        self.units.get(unit).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.units.iter().map(|(p, t)| (p.as_path(), t.as_str()))
    }

    /// Units whose text differs from `baseline`
    pub fn changed_units<'a>(&'a self, baseline: &TextTree) -> Vec<(&'a Path, &'a str)> {
        self.iter()
            .filter(|(unit, text)| baseline.get(unit) != Some(*text))
            .collect()
    }

    /// Unified diff of every changed unit against `baseline`
    pub fn unified_diff(&self, baseline: &TextTree) -> String {
        let mut out = String::new();
        for (unit, text) in self.changed_units(baseline) {
            let before = baseline.get(unit).unwrap_or("");
            let name = unit.display().to_string();
            let diff = TextDiff::from_lines(before, text);
            out.push_str(
                &diff
                    .unified_diff()
                    .context_radius(3)
                    .header(&format!("a/{}", name), &format!("b/{}", name))
                    .to_string(),
            );
        }
        out
    }
}

impl ConsumerTree for TextTree {
    fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().cloned().collect()
    }

    fn tokens(&self, unit: &Path) -> Vec<Token> {
        self.get(unit).map(lexer::tokenize).unwrap_or_default()
    }

    fn declarations(&self, unit: &Path) -> Vec<Declaration> {
        match self.get(unit) {
            Some(text) => lexer::declarations(text, &lexer::tokenize(text)),
            None => Vec::new(),
        }
    }

    fn apply_edits(&mut self, unit: &Path, mut edits: Vec<Edit>) {
        let Some(text) = self.units.get_mut(unit) else {
            return;
        };

        edits.sort_by_key(|e| e.span.start);
        let mut kept: Vec<Edit> = Vec::with_capacity(edits.len());
        for edit in edits {
            if edit.span.end > text.len() {
                continue;
            }
            match kept.last() {
                Some(prev) if edit.span.start < prev.span.end => continue,
                _ => kept.push(edit),
            }
        }

        // Back to front so earlier spans stay valid
        for edit in kept.into_iter().rev() {
            text.replace_range(edit.span, &edit.replacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_apply_against_original_offsets() {
        let mut tree = TextTree::new();
        tree.insert("a.ts", "let a: Foo = b as Foo;");
        let path = Path::new("a.ts");

        tree.apply_edits(
            path,
            vec![Edit::replace(7..10, "FooV2"), Edit::replace(18..21, "FooV2")],
        );
        assert_eq!(tree.get(path), Some("let a: FooV2 = b as FooV2;"));
    }

    #[test]
    fn test_overlapping_edits_keep_earliest() {
        let mut tree = TextTree::new();
        tree.insert("a.ts", "abcdef");
        let path = Path::new("a.ts");

        tree.apply_edits(path, vec![Edit::replace(2..5, "X"), Edit::remove(0..3)]);
        assert_eq!(tree.get(path), Some("def"));
    }

    #[test]
    fn test_unified_diff_lists_changed_units_only() {
        let mut before = TextTree::new();
        before.insert("a.ts", "type A = Foo;\n");
        before.insert("b.ts", "type B = 1;\n");

        let mut after = before.clone();
        after.insert("a.ts", "type A = FooV2;\n");

        let diff = after.unified_diff(&before);
        assert!(diff.contains("--- a/a.ts"));
        assert!(diff.contains("+type A = FooV2;"));
        assert!(!diff.contains("b.ts"));
    }
}
