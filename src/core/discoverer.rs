use super::models::{Node, NodeKind};
use super::provider::ContentProviderOperations;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/*
 * Walks a folder target breadth-first and classifies every entry as
 * container or leaf, producing the material the tree eraser consumes. The
 * traversal is iterative with an explicit queue: trees from real
 * filesystems can exceed typical call-stack depth, so recursion is off the
 * table. A visited-identifier set guards against cyclic links (symbolic
 * link loops or malformed trees); an identifier seen twice is skipped
 * silently instead of being re-enqueued.
 */

/*
 * Result of a discovery walk. `leaves` carry their byte length, measured
 * here, before any mutation begins. `containers` are in discovery
 * (parent-first) order; consumers that need parent-after-children deletion
 * order must reverse the list. `gaps` names entries excluded from erasure:
 * containers whose children could not be enumerated (those still appear in
 * `containers` so a later deletion is attempted) and leaves that could not
 * be measured, which are left untouched rather than deleted with their
 * content never overwritten.
 */
#[derive(Debug, Default)]
pub struct Discovery {
    pub leaves: Vec<Node>,
    pub containers: Vec<Node>,
    pub gaps: Vec<String>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/*
 * Discovers everything under `root`, which must resolve to a container.
 * Partial failures (a branch that cannot be enumerated, a leaf that cannot
 * be measured) never terminate the walk; they are recorded and the walk
 * continues with the remaining branches.
 */
pub fn discover(provider: &dyn ContentProviderOperations, root: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut queue: VecDeque<Node> = VecDeque::new();

    let root_node = Node::container(root.to_path_buf(), display_name(root));
    visited.insert(root_node.path.clone());
    queue.push_back(root_node);

    while let Some(container) = queue.pop_front() {
        let children = match provider.list_children(&container.path) {
            Ok(children) => children,
            Err(e) => {
                // Discovery gap: the container stays a deletion candidate,
                // but this branch contributes no children.
                log::warn!(
                    "TreeDiscoverer: Cannot enumerate children of {:?}: {e}",
                    container.path
                );
                discovery.gaps.push(container.name.clone());
                discovery.containers.push(container);
                continue;
            }
        };

        discovery.containers.push(container);

        for child in children {
            if !visited.insert(child.path.clone()) {
                log::debug!(
                    "TreeDiscoverer: Skipping already-visited identifier {:?} (cyclic link?).",
                    child.path
                );
                continue;
            }
            match child.kind {
                NodeKind::Container => {
                    queue.push_back(Node::container(child.path, child.name));
                }
                NodeKind::Leaf => match provider.measure(&child.path) {
                    Ok(length) => {
                        discovery.leaves.push(Node::leaf(child.path, child.name, length));
                    }
                    Err(e) => {
                        // An unmeasured leaf must not be erased: without its
                        // length the overwrite passes would be skipped and a
                        // bare delete passed off as sanitization.
                        log::warn!(
                            "TreeDiscoverer: Cannot measure leaf {:?}: {e}. Excluded from erasure.",
                            child.path
                        );
                        discovery.gaps.push(child.name);
                    }
                },
            }
        }
    }

    log::debug!(
        "TreeDiscoverer: Walk of {root:?} complete: {} leaves, {} containers, {} gaps.",
        discovery.leaves.len(),
        discovery.containers.len(),
        discovery.gaps.len()
    );
    discovery
}
