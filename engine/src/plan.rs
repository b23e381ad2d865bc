use std::fmt;

use serde::{Deserialize, Serialize};

/// The five benchmarks, in the order a full run executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Treeview,
    LabelUpdates,
    Windows,
    Widgets,
    Memory,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::Treeview,
        StepKind::LabelUpdates,
        StepKind::Windows,
        StepKind::Widgets,
        StepKind::Memory,
    ];

    /// Key of the step's record in a ResultSet.
    pub fn name(self) -> &'static str {
        match self {
            Self::Treeview => "treeview",
            Self::LabelUpdates => "label_updates",
            Self::Windows => "windows",
            Self::Widgets => "widgets",
            Self::Memory => "memory",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Human label used in status lines.
    pub fn title(self) -> &'static str {
        match self {
            Self::Treeview => "Treeview",
            Self::LabelUpdates => "Label/Progress",
            Self::Windows => "Windows",
            Self::Widgets => "Widget Creation",
            Self::Memory => "Memory",
        }
    }

    /// What the size parameter counts.
    pub fn parameter(self) -> &'static str {
        match self {
            Self::Treeview => "number of items",
            Self::LabelUpdates => "number of updates",
            Self::Windows => "number of windows",
            Self::Widgets => "number of widget sets",
            Self::Memory => "size",
        }
    }

    /// Sub-iterations between two cancellation checks (and toolkit flushes).
    pub fn checkpoint_every(self) -> usize {
        match self {
            Self::Treeview | Self::LabelUpdates => 100,
            Self::Windows => 10,
            Self::Widgets => 50,
            Self::Memory => 1024,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One benchmark plus its size parameter. Sizes stay signed so that a bad
/// value coming from a text field reaches the runner and is reported there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub kind: StepKind,
    pub size: i64,
}

impl StepSpec {
    pub fn new(kind: StepKind, size: i64) -> Self {
        Self { kind, size }
    }
}

/// Ordered list of steps for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<StepSpec>,
}

impl Plan {
    pub fn new(steps: Vec<StepSpec>) -> Self {
        Self { steps }
    }

    /// The full five-step run with the given sizes.
    pub fn standard(sizes: &StepSizes) -> Self {
        Self::new(
            StepKind::ALL
                .into_iter()
                .map(|kind| StepSpec::new(kind, sizes.get(kind)))
                .collect(),
        )
    }

    pub fn single(kind: StepKind, size: i64) -> Self {
        Self::new(vec![StepSpec::new(kind, size)])
    }

    /// Every size multiplied and truncated, as stress iterations do.
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self::new(
            self.steps
                .iter()
                .map(|s| StepSpec::new(s.kind, (s.size as f64 * multiplier) as i64))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Size parameter of every benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSizes {
    pub tree_items: i64,
    pub label_updates: i64,
    pub window_count: i64,
    pub widget_sets: i64,
    pub memory_mb: i64,
}

impl Default for StepSizes {
    fn default() -> Self {
        Self {
            tree_items: 1000,
            label_updates: 5000,
            window_count: 50,
            widget_sets: 200,
            memory_mb: 100,
        }
    }
}

impl StepSizes {
    pub fn get(&self, kind: StepKind) -> i64 {
        match kind {
            StepKind::Treeview => self.tree_items,
            StepKind::LabelUpdates => self.label_updates,
            StepKind::Windows => self.window_count,
            StepKind::Widgets => self.widget_sets,
            StepKind::Memory => self.memory_mb,
        }
    }

    pub fn set(&mut self, kind: StepKind, size: i64) {
        match kind {
            StepKind::Treeview => self.tree_items = size,
            StepKind::LabelUpdates => self.label_updates = size,
            StepKind::Windows => self.window_count = size,
            StepKind::Widgets => self.widget_sets = size,
            StepKind::Memory => self.memory_mb = size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_follows_declared_order() {
        let plan = Plan::standard(&StepSizes::default());
        let kinds: Vec<_> = plan.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, StepKind::ALL.to_vec());
        assert_eq!(plan.steps[0].size, 1000);
        assert_eq!(plan.steps[4].size, 100);
    }

    #[test]
    fn scaling_truncates() {
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Windows, 5),
            StepSpec::new(StepKind::Memory, 3),
        ]);
        let scaled = plan.scaled(1.5);
        assert_eq!(scaled.steps[0].size, 7);
        assert_eq!(scaled.steps[1].size, 4);
    }

    #[test]
    fn names_round_trip() {
        for kind in StepKind::ALL {
            assert_eq!(StepKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StepKind::from_name("disk"), None);
    }
}
