use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed hidden width of every recurrent layer.
pub const HIDDEN_SIZE: usize = 56;

/// Dense parameter matrix with a matching gradient buffer.
#[derive(Debug, Clone)]
pub struct Tensor {
    rows: usize,
    cols: usize,
    pub data: Vec<f64>,
    pub grad: Vec<f64>,
}

impl Tensor {
    fn uniform(rows: usize, cols: usize, bound: f64, rng: &mut StdRng) -> Self {
        let data = (0..rows * cols)
            .map(|_| {
                if bound == 0.0 {
                    0.0
                } else {
                    rng.gen_range(-bound..bound)
                }
            })
            .collect();
        Self {
            rows,
            cols,
            data,
            grad: vec![0.0; rows * cols],
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zero_grad(&mut self) {
        for g in &mut self.grad {
            *g = 0.0;
        }
    }
}

/// One LSTM layer. Gate rows are laid out in blocks of `HIDDEN_SIZE` in the
/// order input, forget, cell, output.
#[derive(Debug, Clone)]
struct LstmLayer {
    input_size: usize,
    w_ih: Tensor,
    w_hh: Tensor,
    b_ih: Tensor,
    b_hh: Tensor,
}

impl LstmLayer {
    fn new(input_size: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (hidden as f64).sqrt();
        Self {
            input_size,
            w_ih: Tensor::uniform(4 * hidden, input_size, bound, rng),
            w_hh: Tensor::uniform(4 * hidden, hidden, bound, rng),
            b_ih: Tensor::uniform(4 * hidden, 1, bound, rng),
            b_hh: Tensor::uniform(4 * hidden, 1, bound, rng),
        }
    }
}

/// Per-timestep activations recorded during a cached forward pass.
#[derive(Debug, Clone, Default)]
struct LayerCache {
    inputs: Vec<Vec<f64>>,
    gate_i: Vec<Vec<f64>>,
    gate_f: Vec<Vec<f64>>,
    gate_g: Vec<Vec<f64>>,
    gate_o: Vec<Vec<f64>>,
    cell: Vec<Vec<f64>>,
    cell_tanh: Vec<Vec<f64>>,
    hidden: Vec<Vec<f64>>,
}

/// Activations needed to backpropagate one sample.
#[derive(Debug, Clone)]
pub struct ForwardCache {
    layers: Vec<LayerCache>,
}

/// Stacked LSTM over a bit sequence, projecting the final hidden state to a
/// single parity logit. Hidden and cell state are zeroed per call; nothing
/// persists between sequences.
#[derive(Debug, Clone)]
pub struct LstmParity {
    hidden: usize,
    layers: Vec<LstmLayer>,
    head_w: Tensor,
    head_b: Tensor,
}

impl LstmParity {
    pub fn new(n_layers: usize, seed: u64) -> Self {
        let hidden = HIDDEN_SIZE;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(n_layers.max(1));
        for layer_idx in 0..n_layers.max(1) {
            let input_size = if layer_idx == 0 { 1 } else { hidden };
            layers.push(LstmLayer::new(input_size, hidden, &mut rng));
        }
        let bound = 1.0 / (hidden as f64).sqrt();
        Self {
            hidden,
            layers,
            head_w: Tensor::uniform(1, hidden, bound, &mut rng),
            head_b: Tensor::uniform(1, 1, bound, &mut rng),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.tensors().iter().map(|tensor| tensor.len()).sum()
    }

    fn tensors(&self) -> Vec<&Tensor> {
        let mut out = Vec::with_capacity(self.layers.len() * 4 + 2);
        for layer in &self.layers {
            out.push(&layer.w_ih);
            out.push(&layer.w_hh);
            out.push(&layer.b_ih);
            out.push(&layer.b_hh);
        }
        out.push(&self.head_w);
        out.push(&self.head_b);
        out
    }

    pub fn tensors_mut(&mut self) -> Vec<&mut Tensor> {
        let mut out = Vec::with_capacity(self.layers.len() * 4 + 2);
        for layer in &mut self.layers {
            out.push(&mut layer.w_ih);
            out.push(&mut layer.w_hh);
            out.push(&mut layer.b_ih);
            out.push(&mut layer.b_hh);
        }
        out.push(&mut self.head_w);
        out.push(&mut self.head_b);
        out
    }

    pub fn zero_grad(&mut self) {
        for tensor in self.tensors_mut() {
            tensor.zero_grad();
        }
    }

    /// Inference-only forward pass; no activations are retained.
    pub fn logit(&self, bits: &[u8]) -> f64 {
        let hidden = self.hidden;
        let mut x: Vec<f64> = Vec::new();
        let mut layer_h = vec![vec![0.0; hidden]; self.layers.len()];
        let mut layer_c = vec![vec![0.0; hidden]; self.layers.len()];

        for bit in bits {
            x.clear();
            x.push(f64::from(*bit));
            for (layer_idx, layer) in self.layers.iter().enumerate() {
                let pre = gate_preactivations(layer, &x, &layer_h[layer_idx]);
                let (h, c) = cell_step(&pre, &layer_c[layer_idx], hidden);
                layer_h[layer_idx] = h;
                layer_c[layer_idx] = c;
                x = layer_h[layer_idx].clone();
            }
        }

        let top_h = &layer_h[self.layers.len() - 1];
        dot(&self.head_w.data, top_h) + self.head_b.data[0]
    }

    /// Training forward pass, recording everything backward needs.
    pub fn forward_cached(&self, bits: &[u8]) -> (f64, ForwardCache) {
        let hidden = self.hidden;
        let mut x_seq: Vec<Vec<f64>> = bits.iter().map(|bit| vec![f64::from(*bit)]).collect();
        let mut caches = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let mut cache = LayerCache::default();
            let mut h = vec![0.0; hidden];
            let mut c = vec![0.0; hidden];
            for x in &x_seq {
                let pre = gate_preactivations(layer, x, &h);
                let mut gate_i = vec![0.0; hidden];
                let mut gate_f = vec![0.0; hidden];
                let mut gate_g = vec![0.0; hidden];
                let mut gate_o = vec![0.0; hidden];
                let mut cell_tanh = vec![0.0; hidden];
                let mut new_c = vec![0.0; hidden];
                let mut new_h = vec![0.0; hidden];
                for j in 0..hidden {
                    gate_i[j] = sigmoid(pre[j]);
                    gate_f[j] = sigmoid(pre[hidden + j]);
                    gate_g[j] = pre[2 * hidden + j].tanh();
                    gate_o[j] = sigmoid(pre[3 * hidden + j]);
                    new_c[j] = gate_f[j] * c[j] + gate_i[j] * gate_g[j];
                    cell_tanh[j] = new_c[j].tanh();
                    new_h[j] = gate_o[j] * cell_tanh[j];
                }
                cache.inputs.push(x.clone());
                cache.gate_i.push(gate_i);
                cache.gate_f.push(gate_f);
                cache.gate_g.push(gate_g);
                cache.gate_o.push(gate_o);
                cache.cell.push(new_c.clone());
                cache.cell_tanh.push(cell_tanh);
                cache.hidden.push(new_h.clone());
                c = new_c;
                h = new_h;
            }
            x_seq = cache.hidden.clone();
            caches.push(cache);
        }

        let top_h = caches[self.layers.len() - 1]
            .hidden
            .last()
            .expect("sequences have at least one timestep");
        let logit = dot(&self.head_w.data, top_h) + self.head_b.data[0];
        (logit, ForwardCache { layers: caches })
    }

    /// Accumulate exact BPTT gradients for one sample into the grad buffers.
    pub fn backward(&mut self, cache: &ForwardCache, dlogit: f64) {
        let hidden = self.hidden;
        let n_layers = self.layers.len();
        let steps = cache.layers[0].hidden.len();

        let top_h = cache.layers[n_layers - 1]
            .hidden
            .last()
            .expect("sequences have at least one timestep");
        for j in 0..hidden {
            self.head_w.grad[j] += dlogit * top_h[j];
        }
        self.head_b.grad[0] += dlogit;

        // Gradient flowing into each timestep's hidden output from the
        // consumers above this layer (the head, or the layer stacked on top).
        let mut dh_above = vec![vec![0.0; hidden]; steps];
        for j in 0..hidden {
            dh_above[steps - 1][j] = dlogit * self.head_w.data[j];
        }

        for layer_idx in (0..n_layers).rev() {
            let input_size = self.layers[layer_idx].input_size;
            let lc = &cache.layers[layer_idx];
            let mut dh_carry = vec![0.0; hidden];
            let mut dc_carry = vec![0.0; hidden];
            let mut dx_below = vec![vec![0.0; input_size]; steps];
            let mut d_pre = vec![0.0; 4 * hidden];

            for t in (0..steps).rev() {
                let zeros = vec![0.0; hidden];
                let c_prev = if t == 0 { &zeros } else { &lc.cell[t - 1] };
                let h_prev = if t == 0 { &zeros } else { &lc.hidden[t - 1] };

                for j in 0..hidden {
                    let dh = dh_above[t][j] + dh_carry[j];
                    let i = lc.gate_i[t][j];
                    let f = lc.gate_f[t][j];
                    let g = lc.gate_g[t][j];
                    let o = lc.gate_o[t][j];
                    let tc = lc.cell_tanh[t][j];

                    let d_o = dh * tc;
                    let dc = dh * o * (1.0 - tc * tc) + dc_carry[j];
                    let d_i = dc * g;
                    let d_g = dc * i;
                    let d_f = dc * c_prev[j];
                    dc_carry[j] = dc * f;

                    d_pre[j] = d_i * i * (1.0 - i);
                    d_pre[hidden + j] = d_f * f * (1.0 - f);
                    d_pre[2 * hidden + j] = d_g * (1.0 - g * g);
                    d_pre[3 * hidden + j] = d_o * o * (1.0 - o);
                }

                let x = &lc.inputs[t];
                let layer = &mut self.layers[layer_idx];
                for r in 0..4 * hidden {
                    let da = d_pre[r];
                    layer.b_ih.grad[r] += da;
                    layer.b_hh.grad[r] += da;
                    for (col, x_col) in x.iter().enumerate() {
                        layer.w_ih.grad[r * input_size + col] += da * x_col;
                    }
                    for col in 0..hidden {
                        layer.w_hh.grad[r * hidden + col] += da * h_prev[col];
                    }
                }
                for col in 0..input_size {
                    let mut acc = 0.0;
                    for r in 0..4 * hidden {
                        acc += layer.w_ih.data[r * input_size + col] * d_pre[r];
                    }
                    dx_below[t][col] = acc;
                }
                for col in 0..hidden {
                    let mut acc = 0.0;
                    for r in 0..4 * hidden {
                        acc += layer.w_hh.data[r * hidden + col] * d_pre[r];
                    }
                    dh_carry[col] = acc;
                }
            }

            // The gradient wrt this layer's inputs is the gradient wrt the
            // layer below's hidden outputs; the bottom layer's input is the
            // raw bit sequence and needs no gradient.
            if layer_idx > 0 {
                dh_above = dx_below;
            }
        }
    }
}

fn gate_preactivations(layer: &LstmLayer, x: &[f64], h_prev: &[f64]) -> Vec<f64> {
    let rows = layer.w_ih.rows;
    let input_size = layer.input_size;
    let hidden = h_prev.len();
    let mut pre = vec![0.0; rows];
    for (r, out) in pre.iter_mut().enumerate() {
        let mut acc = layer.b_ih.data[r] + layer.b_hh.data[r];
        for (col, x_col) in x.iter().enumerate() {
            acc += layer.w_ih.data[r * input_size + col] * x_col;
        }
        for col in 0..hidden {
            acc += layer.w_hh.data[r * hidden + col] * h_prev[col];
        }
        *out = acc;
    }
    pre
}

fn cell_step(pre: &[f64], c_prev: &[f64], hidden: usize) -> (Vec<f64>, Vec<f64>) {
    let mut h = vec![0.0; hidden];
    let mut c = vec![0.0; hidden];
    for j in 0..hidden {
        let i = sigmoid(pre[j]);
        let f = sigmoid(pre[hidden + j]);
        let g = pre[2 * hidden + j].tanh();
        let o = sigmoid(pre[3 * hidden + j]);
        c[j] = f * c_prev[j] + i * g;
        h[j] = o * c[j].tanh();
    }
    (h, c)
}

fn dot(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
