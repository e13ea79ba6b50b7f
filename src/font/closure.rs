//! # Glyph Closure
//!
//! Expands the caller's glyph list into every glyph the subset needs:
//! composite glyphs pull in their components, transitively. The walk is an
//! explicit worklist with a visited set, so a corrupt font can neither loop
//! forever nor blow the stack.
//!
//! New ids are handed out in visit order: `.notdef`, then the requested ids
//! as given, then components in the order they were discovered. The same
//! request always produces the same mapping.

use std::collections::HashMap;

use super::glyf::GlyphTable;
use crate::error::{Result, SubsetError};

/// Bijection between source glyph ids and subset glyph ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphIdMap {
    old_to_new: HashMap<u16, u16>,
    /// Old ids, indexed by new id.
    order: Vec<u16>,
}

impl GlyphIdMap {
    /// Adds `old` if unseen. Returns `true` when it was newly inserted.
    fn insert(&mut self, old: u16) -> bool {
        if self.old_to_new.contains_key(&old) {
            return false;
        }
        self.old_to_new.insert(old, self.order.len() as u16);
        self.order.push(old);
        true
    }

    #[cfg(test)]
    pub(crate) fn from_old_ids(ids: &[u16]) -> Self {
        let mut map = GlyphIdMap::default();
        for &id in ids {
            map.insert(id);
        }
        map
    }

    /// The subset id for a source glyph id.
    pub fn new_id(&self, old: u16) -> Option<u16> {
        self.old_to_new.get(&old).copied()
    }

    /// The source glyph id behind a subset id.
    pub fn old_id(&self, new: u16) -> Option<u16> {
        self.order.get(new as usize).copied()
    }

    pub fn contains(&self, old: u16) -> bool {
        self.old_to_new.contains_key(&old)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Source ids in new-id order.
    pub fn old_ids(&self) -> &[u16] {
        &self.order
    }

    /// `(old, new)` pairs in new-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u16))
    }
}

/// Run the composite closure over `requested` and build the id mapping.
pub fn compute_closure(glyphs: &GlyphTable<'_>, requested: &[u16]) -> Result<GlyphIdMap> {
    let num_glyphs = glyphs.num_glyphs();
    let mut map = GlyphIdMap::default();
    map.insert(0);
    for &gid in requested {
        if gid >= num_glyphs {
            return Err(SubsetError::Index {
                glyph_id: gid,
                num_glyphs,
            });
        }
        map.insert(gid);
    }

    // Adjacency of every visited composite, reused by the cycle check.
    let mut edges: HashMap<u16, Vec<u16>> = HashMap::new();
    let mut cursor = 0;
    while cursor < map.order.len() {
        let gid = map.order[cursor];
        cursor += 1;

        let components = glyphs.components(gid)?;
        if components.is_empty() {
            continue;
        }
        for &component in &components {
            if component >= num_glyphs {
                return Err(SubsetError::format(format!(
                    "composite glyph {} references glyph {} (font has {} glyphs)",
                    gid, component, num_glyphs
                )));
            }
            map.insert(component);
        }
        edges.insert(gid, components);
    }

    check_acyclic(&map, &edges)?;
    Ok(map)
}

/// Reject composite graphs where a glyph reaches itself through its
/// components. Iterative three-colour DFS over the retained glyphs.
fn check_acyclic(map: &GlyphIdMap, edges: &HashMap<u16, Vec<u16>>) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: HashMap<u16, Mark> = HashMap::new();
    let mark_of = |marks: &HashMap<u16, Mark>, gid: u16| {
        marks.get(&gid).copied().unwrap_or(Mark::Unvisited)
    };

    for &root in map.old_ids() {
        if !edges.contains_key(&root) || mark_of(&marks, root) != Mark::Unvisited {
            continue;
        }
        // (glyph, index of next child to visit)
        let mut stack: Vec<(u16, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::InProgress);

        while let Some(top) = stack.last_mut() {
            let (gid, next) = *top;
            top.1 += 1;
            let children = edges.get(&gid).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&child) = children.get(next) {
                match mark_of(&marks, child) {
                    Mark::InProgress => {
                        return Err(SubsetError::format(format!(
                            "composite glyph {} references itself through glyph {}",
                            child, gid
                        )));
                    }
                    Mark::Unvisited => {
                        marks.insert(child, Mark::InProgress);
                        stack.push((child, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks.insert(gid, Mark::Done);
                stack.pop();
            }
        }
    }
    Ok(())
}
