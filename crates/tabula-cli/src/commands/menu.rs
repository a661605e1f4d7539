//! `tabula menu` commands.

use std::collections::BTreeMap;
use tabula_core::MenuEntry;
use tabula_runtime::MenuStore;

use super::Workspace;

fn print_branch(children: &BTreeMap<Option<u64>, Vec<&MenuEntry>>, parent: Option<u64>, depth: usize) {
    let Some(entries) = children.get(&parent) else {
        return;
    };
    for entry in entries {
        println!(
            "{}{} [{}] {} {}",
            "  ".repeat(depth),
            entry.title,
            entry.name,
            entry.path,
            entry.permission.as_deref().unwrap_or("-")
        );
        print_branch(children, Some(entry.id), depth + 1);
    }
}

pub async fn run_list(ws: &Workspace) -> anyhow::Result<()> {
    let mut menus = ws.store.list_menus(ws.ctx.site_id).await?;
    if menus.is_empty() {
        println!("No menus for site {}", ws.ctx.site_id);
        return Ok(());
    }
    menus.sort_by_key(|m| (m.sort, m.id));

    let mut children: BTreeMap<Option<u64>, Vec<&MenuEntry>> = BTreeMap::new();
    for entry in &menus {
        children.entry(entry.parent_id).or_default().push(entry);
    }
    print_branch(&children, None, 0);
    Ok(())
}
