//! Track and master buses: gain, pan and an insert chain.

use tl_ir::{clamp_pan, EffectSpec};

use crate::effects::build_effect;
use crate::error::GraphError;
use crate::graph::{AudioGraph, NodeKey, NodeKind};
use crate::param::AudioParam;

/// Node handles of one bus.
///
/// Track buses run `gain → pan → chain`; the master bus runs
/// `chain → gain → pan`. `input` is where upstream audio connects and
/// `output` is what feeds downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct Bus {
    pub input: NodeKey,
    pub output: NodeKey,
    pub gain: NodeKey,
    pub pan: NodeKey,
    pub chain: Vec<NodeKey>,
}

impl Bus {
    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        [self.gain, self.pan].into_iter().chain(self.chain.iter().copied())
    }
}

/// Instantiate an effect chain in signal order. Entries that fail to build
/// are skipped with a warning.
fn build_chain(graph: &mut AudioGraph, specs: &[EffectSpec], sample_rate: u32, owner: &str) -> Result<Vec<NodeKey>, GraphError> {
    let mut chain: Vec<NodeKey> = Vec::with_capacity(specs.len());
    for spec in specs {
        let effect = match build_effect(spec, sample_rate) {
            Ok(effect) => effect,
            Err(e) => {
                log::warn!("{}: skipping {} effect: {}", owner, spec.type_name(), e);
                continue;
            }
        };
        let key = graph.add(NodeKind::Effect(effect));
        if let Some(&prev) = chain.last() {
            graph.connect(prev, key)?;
        }
        chain.push(key);
    }
    Ok(chain)
}

pub fn build_track_bus(
    graph: &mut AudioGraph,
    level: f32,
    pan: f32,
    effects: &[EffectSpec],
    sample_rate: u32,
    owner: &str,
) -> Result<Bus, GraphError> {
    let gain = graph.add(NodeKind::Gain(AudioParam::new(level)));
    let pan_node = graph.add(NodeKind::Pan(AudioParam::new(clamp_pan(pan))));
    graph.connect(gain, pan_node)?;
    let chain = build_chain(graph, effects, sample_rate, owner)?;
    let output = match (chain.first(), chain.last()) {
        (Some(&head), Some(&tail)) => {
            graph.connect(pan_node, head)?;
            tail
        }
        _ => pan_node,
    };
    Ok(Bus {
        input: gain,
        output,
        gain,
        pan: pan_node,
        chain,
    })
}

pub fn build_master_bus(
    graph: &mut AudioGraph,
    level: f32,
    effects: &[EffectSpec],
    sample_rate: u32,
) -> Result<Bus, GraphError> {
    let chain = build_chain(graph, effects, sample_rate, "master")?;
    let gain = graph.add(NodeKind::Gain(AudioParam::new(level)));
    let pan = graph.add(NodeKind::Pan(AudioParam::new(0.0)));
    graph.connect(gain, pan)?;
    let input = match (chain.first(), chain.last()) {
        (Some(&head), Some(&tail)) => {
            graph.connect(tail, gain)?;
            head
        }
        _ => gain,
    };
    Ok(Bus {
        input,
        output: pan,
        gain,
        pan,
        chain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_ir::{EffectKind, OpaqueEffect};

    fn reverb() -> EffectSpec {
        EffectKind::Reverb(Default::default()).into()
    }

    fn bogus() -> EffectSpec {
        EffectSpec::Opaque(OpaqueEffect {
            kind: "granular".into(),
            params: serde_json::Value::Null,
        })
    }

    #[test]
    fn track_bus_without_chain_outputs_pan() {
        let mut g = AudioGraph::new(8);
        let bus = build_track_bus(&mut g, 1.0, 0.0, &[], 48_000, "t").unwrap();
        assert_eq!(bus.input, bus.gain);
        assert_eq!(bus.output, bus.pan);
        assert_eq!(g.outputs_of(bus.gain), &[bus.pan]);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn track_chain_follows_pan() {
        let mut g = AudioGraph::new(8);
        let bus = build_track_bus(&mut g, 1.0, 0.0, &[reverb(), bogus(), reverb()], 48_000, "t").unwrap();
        assert_eq!(bus.chain.len(), 2);
        assert_eq!(g.outputs_of(bus.pan), &[bus.chain[0]]);
        assert_eq!(g.outputs_of(bus.chain[0]), &[bus.chain[1]]);
        assert_eq!(bus.output, bus.chain[1]);
        assert_eq!(bus.nodes().count(), 4);
    }

    #[test]
    fn master_chain_precedes_gain() {
        let mut g = AudioGraph::new(8);
        let bus = build_master_bus(&mut g, 0.5, &[reverb()], 48_000).unwrap();
        assert_eq!(bus.input, bus.chain[0]);
        assert_eq!(g.outputs_of(bus.chain[0]), &[bus.gain]);
        assert_eq!(bus.output, bus.pan);
        assert_eq!(g.param(bus.gain).unwrap().value(), 0.5);
    }

    #[test]
    fn master_without_chain_starts_at_gain() {
        let mut g = AudioGraph::new(8);
        let bus = build_master_bus(&mut g, 1.0, &[bogus()], 48_000).unwrap();
        assert!(bus.chain.is_empty());
        assert_eq!(bus.input, bus.gain);
    }
}
