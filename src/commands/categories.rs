// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{LedgerError, LedgerResult};
use crate::models::Category;
use crate::utils::{maybe_print_json, parse_color, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_COLOR: &str = "#868e96";

/// Owner's categories held as an arena; parents and children are indices.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: Vec<Category>,
    index: HashMap<i64, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl CategoryTree {
    pub fn load(conn: &Connection, owner: i64) -> LedgerResult<Self> {
        Ok(Self::from_categories(list_categories(conn, owner)?))
    }

    /// Builds the arena keeping the input order among siblings. A parent id
    /// that is not part of the set makes the node a root.
    pub fn from_categories(nodes: Vec<Category>) -> Self {
        let index: HashMap<i64, usize> = nodes.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
        let parent: Vec<Option<usize>> = nodes
            .iter()
            .map(|c| c.parent_id.and_then(|p| index.get(&p).copied()))
            .collect();
        let mut children = vec![Vec::new(); nodes.len()];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }
        Self {
            nodes,
            index,
            parent,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Category {
        &self.nodes[idx]
    }

    pub fn get(&self, id: i64) -> Option<&Category> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Top-level categories of one kind, in display order.
    pub fn roots(&self, is_expense: bool) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.parent[i].is_none() && self.nodes[i].is_expense == is_expense)
            .collect()
    }

    /// Number of ancestors. A cycle in stored data reports `len()`.
    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 0;
        let mut cur = self.parent[idx];
        while let Some(p) = cur {
            depth += 1;
            if depth >= self.nodes.len() {
                break;
            }
            cur = self.parent[p];
        }
        depth
    }

    /// Checks that `child` (None for a category not yet stored) of kind
    /// `is_expense` may hang below `parent_id`.
    pub fn validate_parent(
        &self,
        child: Option<i64>,
        is_expense: bool,
        parent_id: i64,
    ) -> LedgerResult<()> {
        let parent = self.get(parent_id).ok_or(LedgerError::NotFound("category"))?;
        if child == Some(parent_id) {
            return Err(LedgerError::validation("A category can't be its own parent"));
        }
        if parent.parent_id.is_some() {
            return Err(LedgerError::validation(
                "Categories can only be nested one level deep",
            ));
        }
        if parent.is_expense != is_expense {
            return Err(LedgerError::validation(
                "Parent category must be of the same kind (expense/income)",
            ));
        }
        if let Some(idx) = child.and_then(|c| self.index_of(c)) {
            if !self.children[idx].is_empty() {
                return Err(LedgerError::validation(
                    "A category with subcategories can't be nested",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub description: String,
    pub is_expense: bool,
    #[serde(default = "usable_default")]
    pub usable: bool,
    pub parent_id: Option<i64>,
    pub color: Option<String>,
    pub order: Option<i64>,
}

fn usable_default() -> bool {
    true
}

pub fn get_category(conn: &Connection, owner: i64, id: i64) -> LedgerResult<Category> {
    conn.query_row(
        &format!(
            "SELECT {} FROM categories WHERE id=?1 AND user_id=?2",
            Category::COLUMNS
        ),
        params![id, owner],
        Category::from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => LedgerError::NotFound("category"),
        e => e.into(),
    })
}

pub fn list_categories(conn: &Connection, owner: i64) -> LedgerResult<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories WHERE user_id=?1 ORDER BY sort_order",
        Category::COLUMNS
    ))?;
    let rows = stmt.query_map(params![owner], Category::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn create_category(conn: &Connection, owner: i64, input: CategoryInput) -> LedgerResult<Category> {
    let description = input.description.trim().to_string();
    if description.is_empty() {
        return Err(LedgerError::validation("Category description must not be empty"));
    }
    let color = match input.color.as_deref() {
        Some(c) => parse_color(c)?,
        None => DEFAULT_COLOR.to_string(),
    };
    if let Some(parent_id) = input.parent_id {
        CategoryTree::load(conn, owner)?.validate_parent(None, input.is_expense, parent_id)?;
    }
    let order = match input.order {
        Some(o) => o,
        None => conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM categories WHERE user_id=?1",
            params![owner],
            |r| r.get(0),
        )?,
    };
    conn.execute(
        "INSERT INTO categories(description, is_expense, usable, parent_id, color, sort_order, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            description,
            input.is_expense,
            input.usable,
            input.parent_id,
            color,
            order,
            owner
        ],
    )
    .map_err(|e| {
        LedgerError::from(e)
            .or_duplicate("Category with same description or order already exists!")
    })?;
    tracing::info!(owner, category = %description, "category created");
    Ok(Category {
        id: conn.last_insert_rowid(),
        description,
        is_expense: input.is_expense,
        usable: input.usable,
        parent_id: input.parent_id,
        color,
        order,
        user_id: owner,
    })
}

/// Moves a category below `parent_id`, or to the top level with `None`.
pub fn set_parent(
    conn: &Connection,
    owner: i64,
    id: i64,
    parent_id: Option<i64>,
) -> LedgerResult<Category> {
    let tree = CategoryTree::load(conn, owner)?;
    let cat = tree.get(id).cloned().ok_or(LedgerError::NotFound("category"))?;
    if let Some(p) = parent_id {
        tree.validate_parent(Some(id), cat.is_expense, p)?;
    }
    conn.execute(
        "UPDATE categories SET parent_id=?1 WHERE id=?2 AND user_id=?3",
        params![parent_id, id, owner],
    )?;
    tracing::info!(owner, category = id, parent = ?parent_id, "category moved");
    Ok(Category { parent_id, ..cat })
}

fn tree_rows(tree: &CategoryTree, is_expense: bool) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for root in tree.roots(is_expense) {
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let c = tree.node(idx);
            let name = format!("{}{}", "  ".repeat(tree.depth(idx)), c.description);
            rows.push(vec![
                c.id.to_string(),
                name,
                if c.is_expense { "expense" } else { "income" }.to_string(),
                if c.usable { "yes" } else { "no" }.to_string(),
                c.color.clone(),
                c.order.to_string(),
            ]);
            stack.extend(tree.children(idx).iter().rev());
        }
    }
    rows
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let input = CategoryInput {
                description: sub.get_one::<String>("name").unwrap().to_string(),
                is_expense: !sub.get_flag("income"),
                usable: !sub.get_flag("unusable"),
                parent_id: sub.get_one::<i64>("parent").copied(),
                color: sub.get_one::<String>("color").cloned(),
                order: sub.get_one::<i64>("order").copied(),
            };
            let cat = create_category(conn, owner, input)?;
            println!("Added category '{}' (id {})", cat.description, cat.id);
        }
        Some(("move", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let parent = sub.get_one::<i64>("parent").copied();
            let cat = set_parent(conn, owner, id, parent)?;
            match cat.parent_id {
                Some(p) => println!("Moved '{}' below category {}", cat.description, p),
                None => println!("Moved '{}' to the top level", cat.description),
            }
        }
        Some(("list", sub)) => {
            let tree = CategoryTree::load(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), false, &tree.nodes)? {
                let mut rows = tree_rows(&tree, true);
                rows.extend(tree_rows(&tree, false));
                println!(
                    "{}",
                    pretty_table(&["ID", "Category", "Kind", "Usable", "Color", "Order"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: i64, parent_id: Option<i64>, is_expense: bool) -> Category {
        Category {
            id,
            description: format!("c{}", id),
            is_expense,
            usable: true,
            parent_id,
            color: DEFAULT_COLOR.into(),
            order: id,
            user_id: 1,
        }
    }

    fn tree() -> CategoryTree {
        CategoryTree::from_categories(vec![
            cat(1, None, true),
            cat(2, Some(1), true),
            cat(3, None, true),
            cat(4, None, false),
            cat(5, Some(1), true),
        ])
    }

    #[test]
    fn roots_and_children_keep_order() {
        let t = tree();
        let roots: Vec<i64> = t.roots(true).into_iter().map(|i| t.node(i).id).collect();
        assert_eq!(roots, vec![1, 3]);
        let idx = t.index_of(1).unwrap();
        let kids: Vec<i64> = t.children(idx).iter().map(|&i| t.node(i).id).collect();
        assert_eq!(kids, vec![2, 5]);
        assert_eq!(t.depth(t.index_of(2).unwrap()), 1);
        assert_eq!(t.roots(false).len(), 1);
    }

    #[test]
    fn nesting_rules() {
        let t = tree();
        assert!(t.validate_parent(None, true, 1).is_ok());
        assert!(t.validate_parent(Some(3), true, 1).is_ok());
        // below a child: too deep
        assert!(matches!(t.validate_parent(None, true, 2), Err(LedgerError::Validation(_))));
        // self
        assert!(matches!(t.validate_parent(Some(3), true, 3), Err(LedgerError::Validation(_))));
        // has children
        assert!(matches!(t.validate_parent(Some(1), true, 3), Err(LedgerError::Validation(_))));
        // wrong kind
        assert!(matches!(t.validate_parent(None, false, 1), Err(LedgerError::Validation(_))));
        assert!(matches!(t.validate_parent(None, true, 99), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn depth_terminates_on_cycles() {
        let t = CategoryTree::from_categories(vec![cat(1, Some(2), true), cat(2, Some(1), true)]);
        assert_eq!(t.depth(0), 2);
        assert!(t.roots(true).is_empty());
    }
}
