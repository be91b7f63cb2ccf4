use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::StructureRecord;

#[derive(Debug, Clone, Serialize)]
pub struct StructureNode {
    #[serde(flatten)]
    pub record: StructureRecord,
    pub children: Vec<StructureNode>,
}

fn sibling_order(a: &StructureRecord, b: &StructureRecord) -> std::cmp::Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Nests live records by `parent_id`, siblings sorted by order.
///
/// Records whose parent is absent (archived or never existed) are promoted to roots
/// so nothing live disappears from the tree.
pub fn build_hierarchy(records: Vec<StructureRecord>) -> Vec<StructureNode> {
    let live: Vec<StructureRecord> = records.into_iter().filter(|r| r.is_live()).collect();
    let ids: HashSet<String> = live.iter().map(|r| r.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<StructureRecord>> = HashMap::new();
    for record in live {
        match record.parent_id.clone() {
            Some(parent) if parent != record.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(record)
            }
            _ => roots.push(record),
        }
    }

    roots.sort_by(sibling_order);
    let mut tree: Vec<StructureNode> = roots
        .into_iter()
        .map(|record| attach(record, &mut children))
        .collect();

    // Whatever is left hangs off a parent cycle and is unreachable from any root.
    let mut stranded: Vec<StructureRecord> = children.into_values().flatten().collect();
    stranded.sort_by(sibling_order);
    tree.extend(stranded.into_iter().map(|record| StructureNode {
        record,
        children: Vec::new(),
    }));

    tree
}

fn attach(
    record: StructureRecord,
    children: &mut HashMap<String, Vec<StructureRecord>>,
) -> StructureNode {
    let mut kids = children.remove(&record.id).unwrap_or_default();
    kids.sort_by(sibling_order);
    let nodes = kids
        .into_iter()
        .map(|kid| attach(kid, children))
        .collect();

    StructureNode {
        record,
        children: nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewStructureRequest, StructureType};

    fn record(id: &str, parent: Option<&str>, order: i64) -> StructureRecord {
        let mut r = StructureRecord::from_request(
            NewStructureRequest {
                family_id: "fam".to_string(),
                student_id: "stu".to_string(),
                record_type: if parent.is_some() {
                    StructureType::Collection
                } else {
                    StructureType::Portfolio
                },
                parent_id: parent.map(str::to_string),
                title: id.to_string(),
                description: None,
                order: Some(order),
                icon: None,
                color: None,
            },
            "tester",
            "2024-09-01T00:00:00+00:00",
        );
        r.id = id.to_string();
        r
    }

    #[test]
    fn nests_and_sorts_siblings() {
        let tree = build_hierarchy(vec![
            record("b", None, 2),
            record("a", None, 1),
            record("a2", Some("a"), 5),
            record("a1", Some("a"), 0),
        ]);

        let roots: Vec<&str> = tree.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(roots, vec!["a", "b"]);
        let kids: Vec<&str> = tree[0].children.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(kids, vec!["a1", "a2"]);
    }

    #[test]
    fn children_of_archived_parents_become_roots() {
        let mut parent = record("p", None, 0);
        parent.is_archived = true;
        let tree = build_hierarchy(vec![parent, record("c", Some("p"), 0)]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].record.id, "c");
    }

    #[test]
    fn parent_cycles_do_not_lose_records() {
        let tree = build_hierarchy(vec![record("x", Some("y"), 0), record("y", Some("x"), 1)]);
        let ids: Vec<&str> = tree.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
    }
}
