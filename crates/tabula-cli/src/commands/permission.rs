//! `tabula permission` commands.

use anyhow::bail;
use std::collections::BTreeMap;
use tabula_core::PermissionNode;
use tabula_runtime::PermissionStore;

use super::Workspace;

fn describe(node: &PermissionNode) -> String {
    match node.method {
        Some(method) => format!("{} ({}) {} {}", node.slug, node.name, method, node.path),
        None => format!("{} ({}) {}", node.slug, node.name, node.path),
    }
}

fn print_node(
    node: &PermissionNode,
    children: &BTreeMap<Option<u64>, Vec<&PermissionNode>>,
    depth: usize,
) {
    println!("{}{}", "  ".repeat(depth), describe(node));
    for child in children.get(&Some(node.id)).into_iter().flatten() {
        print_node(child, children, depth + 1);
    }
}

pub async fn run_tree(ws: &Workspace, slug: Option<&str>) -> anyhow::Result<()> {
    let mut nodes = ws.store.list_permissions().await?;
    nodes.sort_by_key(|n| (n.sort, n.id));

    let mut children: BTreeMap<Option<u64>, Vec<&PermissionNode>> = BTreeMap::new();
    for node in &nodes {
        children.entry(node.parent_id).or_default().push(node);
    }

    match slug {
        Some(slug) => {
            let Some(root) = nodes.iter().find(|n| n.slug == slug) else {
                bail!("No permission with slug '{}'", slug);
            };
            print_node(root, &children, 0);
        }
        None if nodes.is_empty() => println!("No permissions"),
        None => {
            for root in children.get(&None).into_iter().flatten() {
                print_node(root, &children, 0);
            }
        }
    }
    Ok(())
}
