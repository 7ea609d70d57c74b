//! Fixed-capacity buffers for one evaluation mini-batch.
//!
//! Input planes are filled slot by slot during descent; value, policy and
//! auxiliary outputs are written by the evaluator in one call over the filled
//! prefix. Buffers are allocated once per thread and reused every round.

/// Mutable views over the output arrays for the filled prefix of a batch.
pub struct EvalOutputs<'a> {
    pub values: &'a mut [f32],
    pub policies: &'a mut [f32],
    pub aux: &'a mut [f32],
    pub action_space: usize,
}

pub struct BatchBuffers {
    capacity: usize,
    plane_len: usize,
    action_space: usize,
    aux_len: usize,
    input_planes: Vec<f32>,
    value_out: Vec<f32>,
    policy_out: Vec<f32>,
    aux_out: Vec<f32>,
    len: usize,
}

impl BatchBuffers {
    pub fn new(capacity: usize, plane_len: usize, action_space: usize, aux_len: usize) -> Self {
        Self {
            capacity,
            plane_len,
            action_space,
            aux_len,
            input_planes: vec![0.0; capacity * plane_len],
            value_out: vec![0.0; capacity],
            policy_out: vec![0.0; capacity * action_space],
            aux_out: vec![0.0; capacity * aux_len],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Forget the previous round's samples. Slot contents are overwritten on
    /// the next fill.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Resize the auxiliary output stride, e.g. when the evaluator changes.
    pub fn set_aux_len(&mut self, aux_len: usize) {
        if aux_len != self.aux_len {
            self.aux_len = aux_len;
            self.aux_out = vec![0.0; self.capacity * aux_len];
        }
    }

    /// Claim the next slot and return its index plus the zeroed input plane
    /// slice to encode into. Panics if the batch is full; callers gate on
    /// [`is_full`](Self::is_full).
    pub fn push_slot(&mut self) -> (usize, &mut [f32]) {
        assert!(self.len < self.capacity, "batch buffer overflow");
        let idx = self.len;
        self.len += 1;
        let slot = &mut self.input_planes[idx * self.plane_len..(idx + 1) * self.plane_len];
        slot.fill(0.0);
        (idx, slot)
    }

    pub fn value(&self, idx: usize) -> f32 {
        self.value_out[idx]
    }

    pub fn set_value(&mut self, idx: usize, v: f32) {
        self.value_out[idx] = v;
    }

    pub fn policy(&self, idx: usize) -> &[f32] {
        &self.policy_out[idx * self.action_space..(idx + 1) * self.action_space]
    }

    /// Split borrows for one evaluator call: the encoded inputs for the
    /// filled prefix, the sample count, and the writable outputs.
    pub fn eval_views(&mut self) -> (&[f32], usize, EvalOutputs<'_>) {
        let n = self.len;
        (
            &self.input_planes[..n * self.plane_len],
            n,
            EvalOutputs {
                values: &mut self.value_out[..n],
                policies: &mut self.policy_out[..n * self.action_space],
                aux: &mut self.aux_out[..n * self.aux_len],
                action_space: self.action_space,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_fill_up_to_capacity() {
        let mut b = BatchBuffers::new(2, 3, 4, 0);
        assert!(b.is_empty());
        let (i0, s0) = b.push_slot();
        s0[0] = 1.0;
        assert_eq!(i0, 0);
        let (i1, _) = b.push_slot();
        assert_eq!(i1, 1);
        assert!(b.is_full());
        b.clear();
        assert!(b.is_empty());
        // A reused slot comes back zeroed.
        let (_, s) = b.push_slot();
        assert_eq!(s[0], 0.0);
    }

    #[test]
    fn eval_views_cover_the_filled_prefix_only() {
        let mut b = BatchBuffers::new(4, 2, 3, 1);
        b.push_slot();
        b.push_slot();
        let (inputs, n, out) = b.eval_views();
        assert_eq!(n, 2);
        assert_eq!(inputs.len(), 4);
        assert_eq!(out.values.len(), 2);
        assert_eq!(out.policies.len(), 6);
        assert_eq!(out.aux.len(), 2);
    }

    #[test]
    #[should_panic(expected = "batch buffer overflow")]
    fn overflow_panics() {
        let mut b = BatchBuffers::new(1, 1, 1, 0);
        b.push_slot();
        b.push_slot();
    }
}
