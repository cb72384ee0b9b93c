use crate::fuzz::mangle::{MangleConfig, MangleOp};

pub const HARD_MAX_OP: usize = 10_000;
pub const HARD_MIN_OP: usize = 0;

/// Derives a [`MangleConfig`] from the size of the data about to be
/// mangled and the current aggressivity. Higher aggressivity unlocks more
/// destructive operations and raises the operation count.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMangle {
    pub aggressivity: f64,
    pub fixed_size_factor: f64,
    pub hard_min_op: usize,
    pub hard_max_op: usize,
}

impl Default for AutoMangle {
    fn default() -> Self {
        Self {
            aggressivity: 0.1,
            fixed_size_factor: 1.0,
            hard_min_op: HARD_MIN_OP,
            hard_max_op: HARD_MAX_OP,
        }
    }
}

impl AutoMangle {
    #[must_use]
    pub fn operations(&self) -> (Vec<MangleOp>, f64) {
        let mut operations = vec![MangleOp::Bit];
        let mut size_factor = 0.30;

        if self.aggressivity >= 0.25 {
            operations.push(MangleOp::Increment);
        }
        if self.aggressivity >= 0.30 {
            operations.extend([MangleOp::Replace, MangleOp::SpecialValue]);
        }
        if self.aggressivity >= 0.50 {
            operations.extend([MangleOp::InsertBytes, MangleOp::DeleteBytes]);
            size_factor = 0.20;
        }

        (operations, size_factor)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn setup_conf(&self, config: &mut MangleConfig, data_len: usize) {
        let (operations, size_factor) = self.operations();
        config.operations = Some(operations);

        let count = data_len as f64 * size_factor * self.fixed_size_factor;
        let count = count.clamp(self.hard_min_op as f64, self.hard_max_op as f64);
        let count = (count * self.aggressivity) as usize;

        config.max_op = count.max(self.hard_min_op);
        config.min_op = ((config.max_op as f64 * 0.80) as usize).max(self.hard_min_op);
    }
}
