use super::discoverer;
use super::leaf_eraser;
use super::models::{CancelToken, Node, NodeKind, SanitizationProfile, WipeOutcome};
use super::policy;
use super::provider::ContentProviderOperations;
use std::path::Path;
use std::sync::Arc;

/*
 * Orchestrates the erasure of one folder target: full discovery first, then
 * leaf erasure in discovery order, then container removal over the reversed
 * container list. The three-phase shape is deliberate; deleting as the walk
 * goes would either need recursion (stack depth) or risk removing a
 * container while child discovery for it is still in flight.
 *
 * `erase_target` never fails as a whole. Every per-item failure becomes an
 * outcome line and the batch moves on to the next item.
 */
pub struct TreeEraser {
    provider: Arc<dyn ContentProviderOperations>,
}

impl TreeEraser {
    pub fn new(provider: Arc<dyn ContentProviderOperations>) -> Self {
        TreeEraser { provider }
    }

    /*
     * Erases everything under `root` following the given profile and returns
     * the accumulated outcome. A root that resolves to a leaf bypasses
     * discovery entirely: measure, erase, one outcome line. Cancellation is
     * honored between items only; the item in progress always reaches a
     * terminal state.
     */
    pub fn erase_target(
        &self,
        root: &Path,
        profile: SanitizationProfile,
        cancel: &CancelToken,
    ) -> WipeOutcome {
        let mut outcome = WipeOutcome::new();
        let patterns = policy::pattern_sequence(profile);
        let root_name = display_name(root);

        let kind = match self.provider.kind_of(root) {
            Ok(kind) => kind,
            Err(e) => {
                log::warn!("TreeEraser: Cannot resolve target {root:?}: {e}");
                outcome.record_failed(&root_name);
                return outcome;
            }
        };

        if kind == NodeKind::Leaf {
            // Single-file target: no tree, no discovery phase.
            match self.provider.measure(root) {
                Ok(length) => {
                    let node = Node::leaf(root.to_path_buf(), root_name.clone(), length);
                    match leaf_eraser::erase_leaf(self.provider.as_ref(), &node, patterns) {
                        Ok(bytes) => outcome.record_erased(&root_name, bytes),
                        Err(e) => {
                            log::warn!("TreeEraser: Failed to erase file {root:?}: {e}");
                            outcome.record_failed(&root_name);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("TreeEraser: Cannot measure file {root:?}: {e}");
                    outcome.record_failed(&root_name);
                }
            }
            return outcome;
        }

        // Phase 1: build the full leaf and container lists before any mutation.
        let discovery = discoverer::discover(self.provider.as_ref(), root);
        for gap in &discovery.gaps {
            outcome.record_failed(gap);
        }

        // Phase 2: leaves, in discovery order. One failure never aborts the batch.
        for leaf in &discovery.leaves {
            if cancel.is_cancelled() {
                log::info!("TreeEraser: Cancelled before leaf {:?}.", leaf.path);
                return outcome;
            }
            match leaf_eraser::erase_leaf(self.provider.as_ref(), leaf, patterns) {
                Ok(bytes) => outcome.record_erased(&leaf.name, bytes),
                Err(e) => {
                    log::warn!("TreeEraser: Failed to erase leaf {:?}: {e}", leaf.path);
                    outcome.record_failed(&leaf.name);
                }
            }
        }

        // Phase 3: containers in reverse discovery order, so the deepest
        // discovered are removed first and every container goes only after
        // its descendants reached a terminal outcome.
        for container in discovery.containers.iter().rev() {
            if cancel.is_cancelled() {
                log::info!("TreeEraser: Cancelled before container {:?}.", container.path);
                return outcome;
            }
            match self.provider.delete(&container.path) {
                Ok(()) => outcome.record_removed_container(&container.name),
                Err(e) => {
                    log::warn!(
                        "TreeEraser: Failed to remove container {:?}: {e}",
                        container.path
                    );
                    outcome.record_failed(&container.name);
                }
            }
        }

        log::debug!(
            "TreeEraser: Target {root:?} done, {} bytes freed across {} lines.",
            outcome.total_bytes_freed(),
            outcome.lines().len()
        );
        outcome
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
