//! Node arena and block renderer for the playback graph.
//!
//! Nodes live in a slotmap so handles stay valid across removals and a
//! stale handle is detected instead of aliasing a new node. Each node owns
//! one output buffer; rendering walks a cached topological order, sums a
//! node's inputs into a scratch buffer, processes it in place and swaps it
//! into the node's output slot.

use core::f32::consts::FRAC_PI_2;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::audio_buffer::AudioBuffer;
use crate::effects::Effect;
use crate::error::GraphError;
use crate::param::AudioParam;
use crate::player::Player;

new_key_type! {
    /// Handle to a node in an [`AudioGraph`].
    pub struct NodeKey;
}

pub enum NodeKind {
    /// Multiplies by an automated linear gain.
    Gain(AudioParam),
    /// Stereo panner, -1 (left) to 1 (right).
    Pan(AudioParam),
    Effect(Box<dyn Effect>),
    /// Source voice; ignores inputs.
    Player(Player),
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Gain(_) => "gain",
            NodeKind::Pan(_) => "pan",
            NodeKind::Effect(e) => e.name(),
            NodeKind::Player(_) => "player",
        }
    }
}

struct Node {
    kind: NodeKind,
    outputs: Vec<NodeKey>,
}

/// Per-block timing handed to every node.
pub struct RenderContext<'a> {
    /// Context frame of the first frame in the block
    pub now: u64,
    /// Timeline frame for each output frame, `None` while the transport
    /// is not rolling
    pub timeline: &'a [Option<u64>],
}

pub struct AudioGraph {
    nodes: SlotMap<NodeKey, Node>,
    buffers: SecondaryMap<NodeKey, AudioBuffer>,
    inputs: SecondaryMap<NodeKey, Vec<NodeKey>>,
    order: Vec<NodeKey>,
    dirty: bool,
    scratch: AudioBuffer,
    block_size: usize,
}

impl AudioGraph {
    pub fn new(block_size: usize) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            buffers: SecondaryMap::new(),
            inputs: SecondaryMap::new(),
            order: Vec::new(),
            dirty: false,
            scratch: AudioBuffer::stereo(block_size),
            block_size,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeKey {
        let key = self.nodes.insert(Node {
            kind,
            outputs: Vec::new(),
        });
        self.buffers.insert(key, AudioBuffer::stereo(self.block_size));
        self.dirty = true;
        key
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.keys()
    }

    pub fn label(&self, key: NodeKey) -> Option<&'static str> {
        self.nodes.get(key).map(|n| n.kind.label())
    }

    /// Route `from`'s output into `to`. Connecting twice is a no-op.
    pub fn connect(&mut self, from: NodeKey, to: NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(to) {
            return Err(GraphError::StaleNode);
        }
        if from == to || self.reaches(to, from) {
            return Err(GraphError::Cycle);
        }
        let node = self.nodes.get_mut(from).ok_or(GraphError::StaleNode)?;
        if !node.outputs.contains(&to) {
            node.outputs.push(to);
            self.dirty = true;
        }
        Ok(())
    }

    /// Remove every outgoing connection of `from`.
    pub fn disconnect(&mut self, from: NodeKey) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(from).ok_or(GraphError::StaleNode)?;
        node.outputs.clear();
        self.dirty = true;
        Ok(())
    }

    pub fn outputs_of(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map_or(&[], |n| n.outputs.as_slice())
    }

    /// Drop a node and every connection into it.
    pub fn dispose(&mut self, key: NodeKey) -> Result<(), GraphError> {
        self.nodes.remove(key).ok_or(GraphError::StaleNode)?;
        self.buffers.remove(key);
        for node in self.nodes.values_mut() {
            node.outputs.retain(|&k| k != key);
        }
        self.dirty = true;
        Ok(())
    }

    fn reaches(&self, from: NodeKey, target: NodeKey) -> bool {
        let mut stack = vec![from];
        let mut seen: SecondaryMap<NodeKey, ()> = SecondaryMap::new();
        while let Some(key) = stack.pop() {
            if key == target {
                return true;
            }
            if seen.insert(key, ()).is_some() {
                continue;
            }
            stack.extend(self.outputs_of(key).iter().copied());
        }
        false
    }

    /// Automated parameter of a gain or pan node.
    pub fn param(&self, key: NodeKey) -> Option<&AudioParam> {
        match &self.nodes.get(key)?.kind {
            NodeKind::Gain(p) | NodeKind::Pan(p) => Some(p),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, key: NodeKey) -> Option<&mut AudioParam> {
        match &mut self.nodes.get_mut(key)?.kind {
            NodeKind::Gain(p) | NodeKind::Pan(p) => Some(p),
            _ => None,
        }
    }

    /// Output of the last rendered block.
    pub fn output(&self, key: NodeKey) -> Option<&AudioBuffer> {
        self.buffers.get(key)
    }

    /// Recompute the traversal order if the topology changed. Allocates;
    /// `render` calls it, so call it up front to keep the first block
    /// after a rebuild allocation-free.
    pub fn prepare(&mut self) {
        if !self.dirty {
            return;
        }
        for list in self.inputs.values_mut() {
            list.clear();
        }
        for (key, node) in &self.nodes {
            for &to in &node.outputs {
                if let Some(list) = self.inputs.get_mut(to) {
                    list.push(key);
                } else {
                    self.inputs.insert(to, vec![key]);
                }
            }
        }
        self.inputs.retain(|key, _| self.nodes.contains_key(key));
        self.order = topological_sort(&self.nodes);
        if self.order.len() < self.nodes.len() {
            log::warn!("graph has a cycle; {} nodes skipped", self.nodes.len() - self.order.len());
        }
        self.dirty = false;
    }

    /// Render one block through every node.
    pub fn render(&mut self, ctx: &RenderContext<'_>) {
        self.prepare();
        let frames = ctx.timeline.len().min(self.block_size);
        for i in 0..self.order.len() {
            let key = self.order[i];
            gather_inputs(&self.inputs, &self.buffers, key, &mut self.scratch);
            if let Some(node) = self.nodes.get_mut(key) {
                process_node(&mut node.kind, ctx, frames, &mut self.scratch);
            }
            if let Some(out) = self.buffers.get_mut(key) {
                core::mem::swap(out, &mut self.scratch);
            }
        }
    }
}

/// Topological sort via Kahn's algorithm: every source before its consumers.
/// Nodes on a cycle are left out.
fn topological_sort(nodes: &SlotMap<NodeKey, Node>) -> Vec<NodeKey> {
    let mut in_degree: SecondaryMap<NodeKey, u32> = nodes.keys().map(|k| (k, 0)).collect();
    for node in nodes.values() {
        for &to in &node.outputs {
            if let Some(d) = in_degree.get_mut(to) {
                *d += 1;
            }
        }
    }

    let mut queue: Vec<NodeKey> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| k)
        .collect();
    let mut result = Vec::with_capacity(nodes.len());

    while let Some(key) = queue.pop() {
        result.push(key);
        for &to in &nodes[key].outputs {
            if let Some(d) = in_degree.get_mut(to) {
                *d -= 1;
                if *d == 0 {
                    queue.push(to);
                }
            }
        }
    }
    result
}

/// Sum the outputs of every node feeding `key` into `scratch`.
fn gather_inputs(
    inputs: &SecondaryMap<NodeKey, Vec<NodeKey>>,
    buffers: &SecondaryMap<NodeKey, AudioBuffer>,
    key: NodeKey,
    scratch: &mut AudioBuffer,
) {
    scratch.silence();
    let Some(sources) = inputs.get(key) else {
        return;
    };
    for &src in sources {
        if let Some(buf) = buffers.get(src) {
            scratch.mix_from(buf);
        }
    }
}

fn process_node(kind: &mut NodeKind, ctx: &RenderContext<'_>, frames: usize, buf: &mut AudioBuffer) {
    match kind {
        NodeKind::Gain(param) => {
            let (left, right) = buf.stereo_mut();
            for i in 0..frames {
                let g = param.value_at(ctx.now + i as u64);
                left[i] *= g;
                right[i] *= g;
            }
            param.advance(ctx.now + frames as u64);
        }
        NodeKind::Pan(param) => {
            let (left, right) = buf.stereo_mut();
            for i in 0..frames {
                let (l, r) = pan_stereo(left[i], right[i], param.value_at(ctx.now + i as u64));
                left[i] = l;
                right[i] = r;
            }
            param.advance(ctx.now + frames as u64);
        }
        NodeKind::Effect(effect) => effect.process(buf),
        NodeKind::Player(player) => player.render(&ctx.timeline[..frames], buf),
    }
}

/// Equal-power stereo panning of a stereo pair. Unity at center; moving
/// off center folds the far side into the near one.
pub fn pan_stereo(left: f32, right: f32, pan: f32) -> (f32, f32) {
    if pan == 0.0 {
        return (left, right);
    }
    let pan = pan.clamp(-1.0, 1.0);
    if pan < 0.0 {
        let x = (pan + 1.0) * FRAC_PI_2;
        (left + right * libm::cosf(x), right * libm::sinf(x))
    } else {
        let x = pan * FRAC_PI_2;
        (left * libm::cosf(x), right + left * libm::sinf(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(timeline: &[Option<u64>]) -> RenderContext<'_> {
        RenderContext { now: 0, timeline }
    }

    /// Writes full-scale DC regardless of input.
    struct Dc;

    impl Effect for Dc {
        fn name(&self) -> &'static str {
            "dc"
        }

        fn process(&mut self, buffer: &mut AudioBuffer) {
            for ch in 0..buffer.channels() {
                buffer.channel_mut(ch).fill(1.0);
            }
        }

        fn reset(&mut self) {}
    }

    fn dc_graph(block: usize) -> (AudioGraph, NodeKey, NodeKey) {
        let mut g = AudioGraph::new(block);
        let a = g.add(NodeKind::Gain(AudioParam::new(1.0)));
        let b = g.add(NodeKind::Gain(AudioParam::new(0.5)));
        g.connect(a, b).unwrap();
        (g, a, b)
    }

    #[test]
    fn chain_topology() {
        let (mut g, a, b) = dc_graph(4);
        let c = g.add(NodeKind::Pan(AudioParam::new(0.0)));
        g.connect(b, c).unwrap();
        g.prepare();
        let pos = |k| g.order.iter().position(|&x| x == k).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn fan_in_sums_sources() {
        let mut g = AudioGraph::new(1);
        let a = g.add(NodeKind::Gain(AudioParam::new(1.0)));
        let b = g.add(NodeKind::Gain(AudioParam::new(1.0)));
        let out = g.add(NodeKind::Gain(AudioParam::new(1.0)));
        g.connect(a, out).unwrap();
        g.connect(b, out).unwrap();
        g.prepare();

        g.buffers[a].channel_mut(0)[0] = 0.25;
        g.buffers[b].channel_mut(0)[0] = 0.5;
        let mut scratch = AudioBuffer::stereo(1);
        gather_inputs(&g.inputs, &g.buffers, out, &mut scratch);
        assert!((scratch.channel(0)[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn no_inputs_gathers_silence() {
        let (mut g, a, _) = dc_graph(2);
        g.prepare();
        let mut scratch = AudioBuffer::stereo(2);
        scratch.channel_mut(0)[0] = 1.0;
        gather_inputs(&g.inputs, &g.buffers, a, &mut scratch);
        assert_eq!(scratch.peak(), 0.0);
    }

    #[test]
    fn cycles_are_refused() {
        let (mut g, a, b) = dc_graph(2);
        assert_eq!(g.connect(b, a), Err(GraphError::Cycle));
        assert_eq!(g.connect(a, a), Err(GraphError::Cycle));
    }

    #[test]
    fn dispose_removes_edges_and_invalidates_handle() {
        let (mut g, a, b) = dc_graph(2);
        g.dispose(b).unwrap();
        assert!(g.outputs_of(a).is_empty());
        assert!(!g.contains(b));
        assert_eq!(g.dispose(b), Err(GraphError::StaleNode));
        assert_eq!(g.connect(a, b), Err(GraphError::StaleNode));
        // A fresh node never aliases the stale handle.
        let c = g.add(NodeKind::Pan(AudioParam::new(0.0)));
        assert_ne!(b, c);
    }

    #[test]
    fn gain_ramp_is_sample_accurate() {
        let mut g = AudioGraph::new(4);
        let dc = g.add(NodeKind::Effect(Box::new(Dc)));
        let gain = g.add(NodeKind::Gain(AudioParam::new(0.0)));
        g.connect(dc, gain).unwrap();
        g.param_mut(gain).unwrap().linear_ramp_to(1.0, 4);

        let timeline = [None; 4];
        g.render(&ctx(&timeline));
        assert_eq!(g.output(gain).unwrap().channel(1), &[0.0, 0.25, 0.5, 0.75]);
        assert_eq!(g.param(gain).unwrap().value(), 1.0);
        assert!(!g.param(gain).unwrap().has_automation());
    }

    #[test]
    fn render_runs_chain_in_order() {
        let mut g = AudioGraph::new(2);
        let dc = g.add(NodeKind::Effect(Box::new(Dc)));
        let half = g.add(NodeKind::Gain(AudioParam::new(0.5)));
        let pan = g.add(NodeKind::Pan(AudioParam::new(1.0)));
        g.connect(dc, half).unwrap();
        g.connect(half, pan).unwrap();
        g.render(&ctx(&[None, None]));
        let out = g.output(pan).unwrap();
        assert!(out.channel(0)[0].abs() < 1e-6);
        assert!((out.channel(1)[0] - 1.0).abs() < 1e-6);
        assert_eq!(g.label(pan), Some("pan"));
    }

    #[test]
    fn center_pan_is_unity() {
        assert_eq!(pan_stereo(0.3, -0.2, 0.0), (0.3, -0.2));
    }

    #[test]
    fn hard_pan_folds_to_one_side() {
        let (l, r) = pan_stereo(0.5, 0.5, -1.0);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);
        let (l, r) = pan_stereo(0.5, 0.5, 1.0);
        assert!(l.abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
    }
}
