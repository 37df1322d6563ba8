use crate::model::Tensor;

#[derive(Debug, Clone, Copy)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MomentState {
    step: u64,
    exp_avg: Vec<f64>,
    exp_avg_sq: Vec<f64>,
}

/// Adam over a fixed list of parameter tensors; moment state is keyed by
/// tensor position, so callers must pass the tensors in a stable order.
#[derive(Debug)]
pub struct Adam {
    config: AdamConfig,
    state: Vec<MomentState>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            state: Vec::new(),
        }
    }

    pub fn step(&mut self, tensors: &mut [&mut Tensor], learning_rate: f64) {
        if self.state.len() < tensors.len() {
            self.state.resize_with(tensors.len(), MomentState::default);
        }

        for (tensor, state) in tensors.iter_mut().zip(&mut self.state) {
            if state.exp_avg.is_empty() {
                state.exp_avg = vec![0.0; tensor.len()];
                state.exp_avg_sq = vec![0.0; tensor.len()];
            }
            state.step = state.step.saturating_add(1);
            let step_f = state.step as f64;
            let bias_correction1 = 1.0 - self.config.beta1.powf(step_f);
            let bias_correction2 = 1.0 - self.config.beta2.powf(step_f);

            for idx in 0..tensor.len() {
                let grad = tensor.grad[idx];
                state.exp_avg[idx] =
                    self.config.beta1 * state.exp_avg[idx] + (1.0 - self.config.beta1) * grad;
                state.exp_avg_sq[idx] = self.config.beta2 * state.exp_avg_sq[idx]
                    + (1.0 - self.config.beta2) * grad * grad;

                let m_hat = state.exp_avg[idx] / bias_correction1.max(f64::MIN_POSITIVE);
                let v_hat = state.exp_avg_sq[idx] / bias_correction2.max(f64::MIN_POSITIVE);
                tensor.data[idx] -= learning_rate * m_hat / (v_hat.sqrt() + self.config.eps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Adam, AdamConfig};
    use crate::model::LstmParity;

    #[test]
    fn constant_gradient_moves_parameters_at_the_learning_rate() {
        let mut model = LstmParity::new(1, 1);
        let mut optimizer = Adam::new(AdamConfig::default());

        let before: Vec<f64> = model.tensors_mut()[0].data.clone();
        for tensor in model.tensors_mut() {
            for g in &mut tensor.grad {
                *g = 0.5;
            }
        }
        optimizer.step(&mut model.tensors_mut(), 0.1);

        // With zero running moments and a uniform gradient, the first Adam
        // update is -lr * g / (|g| + eps), i.e. one full learning-rate step.
        let after = &model.tensors_mut()[0].data;
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((b - a - 0.1).abs() < 1e-6, "expected ~0.1 step, got {}", b - a);
        }
    }

    #[test]
    fn repeated_steps_keep_direction_for_repeated_gradient() {
        let mut model = LstmParity::new(1, 2);
        let mut optimizer = Adam::new(AdamConfig::default());

        let start = model.tensors_mut()[0].data[0];
        for _ in 0..3 {
            for tensor in model.tensors_mut() {
                for g in &mut tensor.grad {
                    *g = 1.0;
                }
            }
            optimizer.step(&mut model.tensors_mut(), 0.1);
        }
        let end = model.tensors_mut()[0].data[0];
        assert!((start - end - 0.3).abs() < 1e-4);
    }
}
