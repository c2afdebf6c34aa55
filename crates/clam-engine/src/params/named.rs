use crate::backend::KernelArgs;

use super::ParameterSet;

/// Named `f32` parameters bound in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParameters {
    values: Vec<(String, f32)>,
}

impl NamedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: f32) -> Self {
        self.set(name, value);
        self
    }

    /// Updates `name`, appending it if it is new.
    pub fn set(&mut self, name: &str, value: f32) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ParameterSet for NamedParameters {
    fn apply_to_kernel(&self, args: &mut KernelArgs, start_index: u32) -> u32 {
        let mut index = start_index;
        for &(_, value) in &self.values {
            args.set(index, value);
            index += 1;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ArgValue;

    #[test]
    fn binds_in_insertion_order() {
        let params = NamedParameters::new()
            .with("zoom", 2.0)
            .with("center_x", -0.5)
            .with("zoom", 4.0);
        let mut args = KernelArgs::new();
        let next = params.apply_to_kernel(&mut args, 3);
        assert_eq!(next, 5);
        assert_eq!(args.get(3), Some(ArgValue::F32(4.0)));
        assert_eq!(args.get(4), Some(ArgValue::F32(-0.5)));
    }
}
