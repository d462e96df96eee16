//! Layer lifecycle: attach, replace, update and tear down logical layers.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::{debug, info};

use super::{attach_tree, NodeId, SceneGraph};
use crate::gml::{FeatureLayer, LoadReport};
use crate::wms::{Camera, CompletionOutcome, FetchCompletion, ImageDispatcher, RasterLayer, UpdateOutcome};

/// The per-layer update hook registered while a raster layer is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHook {
    pub layer: String,
    pub generation: u64,
}

/// Bookkeeping for an attached feature layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEntry {
    pub root: NodeId,
    pub report: LoadReport,
    pub source_srs: String,
}

#[derive(Debug)]
enum ManagedLayer {
    Raster(RasterLayer),
    Features(FeatureEntry),
}

impl ManagedLayer {
    fn root(&self) -> Option<NodeId> {
        match self {
            ManagedLayer::Raster(layer) => layer.group(),
            ManagedLayer::Features(entry) => Some(entry.root),
        }
    }
}

/// Logical layers keyed by name.
///
/// Importing a layer under a name already in use first detaches and
/// disposes the previous instance, so each name has at most one group in
/// the scene and at most one update hook.
#[derive(Debug, Default)]
pub struct LayerManager {
    layers: BTreeMap<String, ManagedLayer>,
    /// Last generation of raster layers that were removed or replaced.
    retired: HashMap<String, u64>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Root node of a layer in the scene.
    pub fn root(&self, name: &str) -> Option<NodeId> {
        self.layers.get(name).and_then(ManagedLayer::root)
    }

    pub fn raster(&self, name: &str) -> Option<&RasterLayer> {
        match self.layers.get(name) {
            Some(ManagedLayer::Raster(layer)) => Some(layer),
            _ => None,
        }
    }

    pub fn features(&self, name: &str) -> Option<&FeatureEntry> {
        match self.layers.get(name) {
            Some(ManagedLayer::Features(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Attaches a raster layer, replacing any layer of the same name.
    pub fn import_raster<S>(&mut self, mut layer: RasterLayer, scene: &mut S) -> NodeId
    where
        S: SceneGraph + ?Sized,
    {
        let name = layer.name().to_string();
        self.remove(&name, scene);
        if let Some(previous) = self.retired.get(&name) {
            layer.continue_generation(*previous);
        }
        let group = layer.attach(scene);
        info!(layer = %name, generation = layer.generation(), "Raster layer imported");
        self.layers.insert(name, ManagedLayer::Raster(layer));
        group
    }

    /// Attaches a loaded feature layer, replacing any layer of the same name.
    pub fn attach_features<S>(&mut self, layer: FeatureLayer, scene: &mut S) -> NodeId
    where
        S: SceneGraph + ?Sized,
    {
        let FeatureLayer {
            name,
            tree,
            report,
            source_srs,
            ..
        } = layer;
        self.remove(&name, scene);
        let root = attach_tree(scene, None, tree);
        info!(layer = %name, root = %root, features = report.features, "Feature layer attached");
        self.layers.insert(
            name,
            ManagedLayer::Features(FeatureEntry {
                root,
                report,
                source_srs,
            }),
        );
        root
    }

    /// Detaches a layer and disposes everything it owns.
    ///
    /// Returns `false` if no layer has that name.
    pub fn remove<S>(&mut self, name: &str, scene: &mut S) -> bool
    where
        S: SceneGraph + ?Sized,
    {
        let Some(layer) = self.layers.remove(name) else {
            return false;
        };
        match layer {
            ManagedLayer::Raster(mut raster) => {
                raster.detach(scene);
                self.retired.insert(name.to_string(), raster.generation());
            }
            ManagedLayer::Features(entry) => {
                scene.detach(entry.root);
            }
        }
        info!(layer = %name, "Layer removed");
        true
    }

    /// Removes every layer.
    pub fn clear<S>(&mut self, scene: &mut S)
    where
        S: SceneGraph + ?Sized,
    {
        let names: Vec<String> = self.layers.keys().cloned().collect();
        for name in names {
            self.remove(&name, scene);
        }
    }

    /// Runs the update hook of every active raster layer.
    pub fn update<S, D>(
        &mut self,
        camera: &Camera,
        now: Instant,
        scene: &mut S,
        dispatcher: &D,
    ) -> Vec<(String, UpdateOutcome)>
    where
        S: SceneGraph + ?Sized,
        D: ImageDispatcher + ?Sized,
    {
        let mut outcomes = Vec::new();
        for (name, layer) in self.layers.iter_mut() {
            if let ManagedLayer::Raster(raster) = layer {
                if raster.is_active() {
                    let outcome = raster.update(camera, now, scene, dispatcher);
                    outcomes.push((name.clone(), outcome));
                }
            }
        }
        outcomes
    }

    /// Routes a completion to its layer.
    pub fn complete<S>(&mut self, completion: FetchCompletion, scene: &mut S) -> CompletionOutcome
    where
        S: SceneGraph + ?Sized,
    {
        match self.layers.get_mut(&completion.layer) {
            Some(ManagedLayer::Raster(raster)) => raster.complete(completion, scene),
            _ => {
                debug!(layer = %completion.layer, key = %completion.key, "Completion for removed layer discarded");
                CompletionOutcome::Discarded
            }
        }
    }

    /// Fetches in flight across all raster layers.
    pub fn in_flight(&self) -> usize {
        self.layers
            .values()
            .map(|layer| match layer {
                ManagedLayer::Raster(raster) => raster.in_flight(),
                ManagedLayer::Features(_) => 0,
            })
            .sum()
    }

    /// Update hooks currently registered, one per active raster layer.
    pub fn active_hooks(&self) -> Vec<UpdateHook> {
        self.layers
            .iter()
            .filter_map(|(name, layer)| match layer {
                ManagedLayer::Raster(raster) if raster.is_active() => Some(UpdateHook {
                    layer: name.clone(),
                    generation: raster.generation(),
                }),
                _ => None,
            })
            .collect()
    }
}
