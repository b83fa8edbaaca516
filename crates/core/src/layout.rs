// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive percentage-split layout trees and their named-template
//! database.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Percentage sums are accepted within this tolerance of 100%.
const PERCENT_TOLERANCE: f32 = 5.0;
/// No dimension may be smaller than this percentage of its containing
/// region.
const MIN_DIMENSION_PERCENT: f32 = 5.0;
/// Implementation-suggested recursion cap (§3).
const MAX_DEPTH: u32 = 8;

/// A node in a window's layout tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutNode {
    Pane {
        width: f32,
        height: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pane_id: Option<u16>,
    },
    Container {
        width: f32,
        height: f32,
        children: Vec<LayoutNode>,
    },
}

impl LayoutNode {
    fn width(&self) -> f32 {
        match self {
            Self::Pane { width, .. } | Self::Container { width, .. } => *width,
        }
    }

    fn height(&self) -> f32 {
        match self {
            Self::Pane { height, .. } | Self::Container { height, .. } => *height,
        }
    }
}

/// Count `Pane`-variant leaves in a tree.
pub fn count_panes(node: &LayoutNode) -> usize {
    match node {
        LayoutNode::Pane { .. } => 1,
        LayoutNode::Container { children, .. } => children.iter().map(count_panes).sum(),
    }
}

/// Structural deep-copy with every pane leaf's `pane_id` cleared, ready to
/// be assigned fresh ids by [`crate::window::Window::set_layout_from_template`].
pub fn clone_template(node: &LayoutNode) -> LayoutNode {
    match node {
        LayoutNode::Pane { width, height, .. } => LayoutNode::Pane {
            width: *width,
            height: *height,
            pane_id: None,
        },
        LayoutNode::Container {
            width,
            height,
            children,
        } => LayoutNode::Container {
            width: *width,
            height: *height,
            children: children.iter().map(clone_template).collect(),
        },
    }
}

/// Validate the §3 sibling-sum-to-100%, minimum-dimension, and depth rules.
pub fn validate_percentages(root: &LayoutNode) -> CoreResult<()> {
    validate_node(root, 0)
}

fn validate_node(node: &LayoutNode, depth: u32) -> CoreResult<()> {
    if depth > MAX_DEPTH {
        return Err(CoreError::LayoutInvalid(format!(
            "tree depth exceeds {MAX_DEPTH}"
        )));
    }
    if node.width() < MIN_DIMENSION_PERCENT || node.height() < MIN_DIMENSION_PERCENT {
        return Err(CoreError::LayoutInvalid(format!(
            "dimension below {MIN_DIMENSION_PERCENT}%: {}x{}",
            node.width(),
            node.height()
        )));
    }
    if let LayoutNode::Container { children, .. } = node {
        if children.is_empty() {
            return Err(CoreError::LayoutInvalid("container has no children".into()));
        }
        let width_sum: f32 = children.iter().map(LayoutNode::width).sum();
        let height_sum: f32 = children.iter().map(LayoutNode::height).sum();
        let width_ok = (width_sum - 100.0).abs() <= PERCENT_TOLERANCE;
        let height_ok = (height_sum - 100.0).abs() <= PERCENT_TOLERANCE;
        if !width_ok && !height_ok {
            return Err(CoreError::LayoutInvalid(format!(
                "sibling sums out of tolerance: widths={width_sum} heights={height_sum}"
            )));
        }
        for child in children {
            validate_node(child, depth + 1)?;
        }
    }
    Ok(())
}

/// Copy width/height from `src` into `dst`, tree-isomorphically, preserving
/// `dst`'s pane-ids. Fails if the two trees don't have matching shape.
pub fn copy_dimensions(dst: &mut LayoutNode, src: &LayoutNode) -> CoreResult<()> {
    match (dst, src) {
        (
            LayoutNode::Pane { width, height, .. },
            LayoutNode::Pane {
                width: sw,
                height: sh,
                ..
            },
        ) => {
            *width = *sw;
            *height = *sh;
            Ok(())
        }
        (
            LayoutNode::Container {
                width,
                height,
                children,
            },
            LayoutNode::Container {
                width: sw,
                height: sh,
                children: schildren,
            },
        ) => {
            if children.len() != schildren.len() {
                return Err(CoreError::LayoutMismatch);
            }
            *width = *sw;
            *height = *sh;
            for (d, s) in children.iter_mut().zip(schildren.iter()) {
                copy_dimensions(d, s)?;
            }
            Ok(())
        }
        _ => Err(CoreError::LayoutMismatch),
    }
}

/// Walk the tree in order, assigning `pane_ids` to each `Pane` leaf in
/// sequence. Extra ids beyond the tree's pane-slot count are left unused;
/// extra slots beyond the id count are left `None`.
pub fn assign_pane_ids(node: &mut LayoutNode, ids: &[u16]) {
    let mut cursor = 0usize;
    assign_inner(node, ids, &mut cursor);
}

fn assign_inner(node: &mut LayoutNode, ids: &[u16], cursor: &mut usize) {
    match node {
        LayoutNode::Pane { pane_id, .. } => {
            *pane_id = ids.get(*cursor).copied();
            *cursor += 1;
        }
        LayoutNode::Container { children, .. } => {
            for child in children {
                assign_inner(child, ids, cursor);
            }
        }
    }
}

/// A named, loaded-at-startup set of layout templates.
#[derive(Debug, Default)]
pub struct LayoutDatabase {
    templates: HashMap<String, LayoutNode>,
}

impl LayoutDatabase {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Register a template, validating its percentage tree first.
    pub fn insert(&mut self, id: impl Into<String>, tree: LayoutNode) -> CoreResult<()> {
        validate_percentages(&tree)?;
        self.templates.insert(id.into(), tree);
        Ok(())
    }

    pub fn get(&self, id: &str) -> CoreResult<&LayoutNode> {
        self.templates
            .get(id)
            .ok_or_else(|| CoreError::UnknownTemplate(id.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// The built-in templates the wrapper seeds at startup: single pane,
    /// two- and three-column splits, and 2x2/3x2 grids.
    pub fn with_builtin_templates() -> Self {
        let mut db = Self::new();
        let single = LayoutNode::Pane {
            width: 100.0,
            height: 100.0,
            pane_id: None,
        };
        let two_col = LayoutNode::Container {
            width: 100.0,
            height: 100.0,
            children: vec![
                LayoutNode::Pane {
                    width: 50.0,
                    height: 100.0,
                    pane_id: None,
                },
                LayoutNode::Pane {
                    width: 50.0,
                    height: 100.0,
                    pane_id: None,
                },
            ],
        };
        let three_col = LayoutNode::Container {
            width: 100.0,
            height: 100.0,
            children: (0..3)
                .map(|_| LayoutNode::Pane {
                    width: 100.0 / 3.0,
                    height: 100.0,
                    pane_id: None,
                })
                .collect(),
        };
        let two_by_two = LayoutNode::Container {
            width: 100.0,
            height: 100.0,
            children: vec![
                LayoutNode::Container {
                    width: 100.0,
                    height: 50.0,
                    children: vec![
                        LayoutNode::Pane {
                            width: 50.0,
                            height: 100.0,
                            pane_id: None,
                        },
                        LayoutNode::Pane {
                            width: 50.0,
                            height: 100.0,
                            pane_id: None,
                        },
                    ],
                },
                LayoutNode::Container {
                    width: 100.0,
                    height: 50.0,
                    children: vec![
                        LayoutNode::Pane {
                            width: 50.0,
                            height: 100.0,
                            pane_id: None,
                        },
                        LayoutNode::Pane {
                            width: 50.0,
                            height: 100.0,
                            pane_id: None,
                        },
                    ],
                },
            ],
        };
        let three_by_two = LayoutNode::Container {
            width: 100.0,
            height: 100.0,
            children: vec![
                LayoutNode::Container {
                    width: 100.0,
                    height: 50.0,
                    children: (0..3)
                        .map(|_| LayoutNode::Pane {
                            width: 100.0 / 3.0,
                            height: 100.0,
                            pane_id: None,
                        })
                        .collect(),
                },
                LayoutNode::Container {
                    width: 100.0,
                    height: 50.0,
                    children: (0..3)
                        .map(|_| LayoutNode::Pane {
                            width: 100.0 / 3.0,
                            height: 100.0,
                            pane_id: None,
                        })
                        .collect(),
                },
            ],
        };
        db.insert("single", single).expect("builtin template valid");
        db.insert("2-col", two_col).expect("builtin template valid");
        db.insert("3-col", three_col).expect("builtin template valid");
        db.insert("2x2", two_by_two).expect("builtin template valid");
        db.insert("3x2", three_by_two).expect("builtin template valid");
        db
    }
}
