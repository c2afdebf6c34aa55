use std::collections::HashMap;

use super::{KernelError, OptionSnapshot, RestoreReport};

/// A tunable compile-time option declared by kernel source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOption {
    pub key: String,
    /// Current override. Empty means "use the source default".
    pub value: String,
    /// Default found in source, empty if none was declared.
    pub default: String,
}

impl KernelOption {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: String::new(),
            default: String::new(),
        }
    }

    /// Value the kernel will actually see.
    pub fn effective(&self) -> &str {
        if self.value.is_empty() {
            &self.default
        } else {
            &self.value
        }
    }

    pub fn is_overridden(&self) -> bool {
        !self.value.is_empty()
    }

    fn has_whitespace(&self) -> bool {
        self.key.chars().any(char::is_whitespace) || self.value.chars().any(char::is_whitespace)
    }
}

/// Declared options of one kernel, in declaration order.
///
/// The key set is fixed by [`extract_options`](super::extract_options);
/// setters only ever touch existing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<KernelOption>,
    index: HashMap<String, usize>,
}

impl OptionMap {
    pub(crate) fn declare(&mut self, key: &str) {
        if !self.index.contains_key(key) {
            self.index.insert(key.to_string(), self.entries.len());
            self.entries.push(KernelOption::new(key));
        }
    }

    /// Records a source default. Returns `false` for undeclared keys.
    pub(crate) fn set_default(&mut self, key: &str, default: &str) -> bool {
        match self.index.get(key) {
            Some(&i) => {
                self.entries[i].default = default.to_string();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&KernelOption> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelOption> {
        self.entries.iter()
    }

    /// Overrides `key`. An empty value falls back to the source default.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), KernelError> {
        let &i = self
            .index
            .get(key)
            .ok_or_else(|| KernelError::UnknownOption(key.to_string()))?;
        self.entries[i].value = value.to_string();
        Ok(())
    }

    /// Drops the override for `key`.
    pub fn reset(&mut self, key: &str) -> Result<(), KernelError> {
        self.set(key, "")
    }

    /// First option that cannot be expressed as a compiler define.
    pub fn invalid_define(&self) -> Option<&KernelOption> {
        self.entries.iter().find(|o| o.has_whitespace())
    }

    /// Compiler option string: `-D KEY=VALUE` per overridden option.
    ///
    /// Options without an override are omitted so the source-level default
    /// applies.
    pub fn define_flags(&self) -> String {
        self.entries
            .iter()
            .filter(|o| o.is_overridden())
            .map(|o| format!("-D {}={}", o.key, o.value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Current values of all options, declaration order.
    pub fn snapshot(&self) -> OptionSnapshot {
        let mut snapshot = OptionSnapshot::new();
        for o in &self.entries {
            snapshot.push(&o.key, &o.value);
        }
        snapshot
    }

    /// Applies every known key of `snapshot`; unknown keys are collected in
    /// the report and skipped.
    pub fn restore(&mut self, snapshot: &OptionSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (key, value) in snapshot.iter() {
            match self.index.get(key) {
                Some(&i) => {
                    self.entries[i].value = value.to_string();
                    report.applied += 1;
                }
                None => report.unknown.push(key.to_string()),
            }
        }
        report
    }
}
