// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An ordered sequence of panes with a layout tree and an active pane.

use crate::error::CoreResult;
use crate::layout::{self, LayoutNode};

pub struct Window {
    pub id: u16,
    pane_ids: Vec<u16>,
    active_pane_id: u16,
    pub template_id: Option<String>,
    pub layout_nodes: Option<LayoutNode>,
}

impl Window {
    /// `pane_ids` must be non-empty: a window always has at least one
    /// pane while live.
    pub fn new(id: u16, pane_ids: Vec<u16>) -> Self {
        let active_pane_id = *pane_ids.first().expect("window created with no panes");
        Self {
            id,
            pane_ids,
            active_pane_id,
            template_id: None,
            layout_nodes: None,
        }
    }

    pub fn pane_ids(&self) -> &[u16] {
        &self.pane_ids
    }

    pub fn active_pane_id(&self) -> u16 {
        self.active_pane_id
    }

    pub fn add_pane(&mut self, id: u16) {
        self.pane_ids.push(id);
    }

    /// Preserves order of the remaining panes. If the removed pane was
    /// active, the first remaining pane becomes active. Returns `false`
    /// if `id` was the window's only pane (caller must not remove it).
    pub fn remove_pane(&mut self, id: u16) -> bool {
        if self.pane_ids.len() <= 1 {
            return false;
        }
        let Some(pos) = self.pane_ids.iter().position(|&p| p == id) else {
            return false;
        };
        self.pane_ids.remove(pos);
        if self.active_pane_id == id {
            self.active_pane_id = self.pane_ids[0];
        }
        true
    }

    pub fn swap_pane_positions(&mut self, a: u16, b: u16) -> bool {
        let (Some(pos_a), Some(pos_b)) = (
            self.pane_ids.iter().position(|&p| p == a),
            self.pane_ids.iter().position(|&p| p == b),
        ) else {
            return false;
        };
        self.pane_ids.swap(pos_a, pos_b);
        true
    }

    pub fn set_active_pane(&mut self, id: u16) -> bool {
        if self.pane_ids.contains(&id) {
            self.active_pane_id = id;
            true
        } else {
            false
        }
    }

    /// Deep-clone `template`, assign this window's pane-ids to its `Pane`
    /// leaves in order, and adopt it as the current layout. The caller is
    /// responsible for growing `pane_ids` (via the registry) before
    /// calling this so every template slot gets a real pane; any window
    /// panes beyond the template's slot count are left unassigned —
    /// resident but unrendered.
    pub fn set_layout_from_template(&mut self, template_id: impl Into<String>, template: &LayoutNode) {
        let mut tree = layout::clone_template(template);
        layout::assign_pane_ids(&mut tree, &self.pane_ids);
        self.template_id = Some(template_id.into());
        self.layout_nodes = Some(tree);
    }

    /// Rewrite only the dimensions of the existing tree from `new_dims`,
    /// preserving pane-ids. Fails if the trees don't share shape or the
    /// result doesn't satisfy the percentage rule.
    pub fn resize_layout(&mut self, new_dims: &LayoutNode) -> CoreResult<()> {
        let mut tree = self
            .layout_nodes
            .clone()
            .unwrap_or_else(|| layout::clone_template(new_dims));
        layout::copy_dimensions(&mut tree, new_dims)?;
        layout::validate_percentages(&tree)?;
        self.layout_nodes = Some(tree);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_pane_reassigns_active_when_active_removed() {
        let mut window = Window::new(1, vec![10, 20, 30]);
        window.set_active_pane(20);
        assert!(window.remove_pane(20));
        assert_eq!(window.active_pane_id(), 10);
        assert_eq!(window.pane_ids(), &[10, 30]);
    }

    #[test]
    fn remove_pane_refuses_to_empty_window() {
        let mut window = Window::new(1, vec![10]);
        assert!(!window.remove_pane(10));
        assert_eq!(window.pane_ids(), &[10]);
    }

    #[test]
    fn swap_pane_positions_requires_both_present() {
        let mut window = Window::new(1, vec![10, 20]);
        assert!(!window.swap_pane_positions(10, 99));
        assert!(window.swap_pane_positions(10, 20));
        assert_eq!(window.pane_ids(), &[20, 10]);
    }

    #[test]
    fn set_layout_from_template_assigns_ids_in_order() {
        let mut window = Window::new(1, vec![10, 20]);
        let template = LayoutNode::Container {
            width: 100.0,
            height: 100.0,
            children: vec![
                LayoutNode::Pane { width: 50.0, height: 100.0, pane_id: None },
                LayoutNode::Pane { width: 50.0, height: 100.0, pane_id: None },
            ],
        };
        window.set_layout_from_template("2-col", &template);
        assert_eq!(window.template_id.as_deref(), Some("2-col"));
        assert_eq!(layout::count_panes(window.layout_nodes.as_ref().unwrap()), 2);
    }
}
