use super::element::{Element, Shape};

/// Outcome of collapsing one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collapsed {
    /// No repeated points; the element is kept as is.
    Intact,
    /// The element degenerated to nothing.
    Removed,
    /// The element is replaced by these elements.
    Replaced(Vec<Element>),
}

/// Bitmask over point pairs `(i, j)` of one element, bit `8 * min + max`.
const fn pairs(list: &[(usize, usize)]) -> u64 {
    let mut mask = 0;
    let mut k = 0;
    while k < list.len() {
        let (a, b) = list[k];
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        mask |= 1 << (8 * lo + hi);
        k += 1;
    }
    mask
}

struct Rule {
    when: u64,
    into: &'static [(Shape, &'static [usize])],
}

const fn rule(when: &[(usize, usize)], into: &'static [(Shape, &'static [usize])]) -> Rule {
    Rule {
        when: pairs(when),
        into,
    }
}

use Shape::{Pyramid as P, Tetra as T, Triangle as Tri, Wedge as W};

const QUAD_RULES: &[Rule] = &[
    rule(&[(0, 1)], &[(Tri, &[0, 2, 3])]),
    rule(&[(1, 2)], &[(Tri, &[0, 1, 3])]),
    rule(&[(2, 3)], &[(Tri, &[0, 1, 2])]),
    rule(&[(3, 0)], &[(Tri, &[0, 1, 2])]),
];

const PYRAMID_RULES: &[Rule] = &[
    rule(&[(0, 1)], &[(T, &[1, 2, 3, 4])]),
    rule(&[(1, 2)], &[(T, &[2, 3, 0, 4])]),
    rule(&[(2, 3)], &[(T, &[3, 0, 1, 4])]),
    rule(&[(3, 0)], &[(T, &[0, 1, 2, 4])]),
    rule(&[(0, 4)], &[(T, &[1, 2, 3, 4])]),
    rule(&[(1, 4)], &[(T, &[2, 3, 0, 4])]),
    rule(&[(2, 4)], &[(T, &[3, 0, 1, 4])]),
    rule(&[(3, 4)], &[(T, &[0, 1, 2, 4])]),
];

const WEDGE_RULES: &[Rule] = &[
    rule(&[(0, 3)], &[(P, &[1, 2, 5, 4, 0])]),
    rule(&[(1, 4)], &[(P, &[2, 0, 3, 5, 1])]),
    rule(&[(2, 5)], &[(P, &[0, 1, 4, 3, 2])]),
];

const HEXA_RULES: &[Rule] = &[
    rule(&[(0, 1), (2, 3)], &[(W, &[0, 4, 5, 3, 7, 6])]),
    rule(&[(0, 1), (4, 5)], &[(W, &[1, 2, 3, 5, 6, 7])]),
    rule(&[(0, 1)], &[(W, &[2, 5, 6, 3, 4, 7]), (P, &[2, 5, 4, 3, 0])]),
    rule(&[(1, 2), (0, 3)], &[(W, &[1, 5, 6, 0, 4, 7])]),
    rule(&[(1, 2), (5, 6)], &[(W, &[2, 3, 0, 6, 7, 4])]),
    rule(&[(1, 2)], &[(W, &[3, 6, 7, 0, 5, 4]), (P, &[3, 6, 5, 0, 1])]),
    rule(&[(2, 3), (6, 7)], &[(W, &[3, 0, 1, 7, 4, 5])]),
    rule(&[(2, 3)], &[(W, &[0, 7, 4, 1, 6, 5]), (P, &[0, 7, 6, 1, 2])]),
    rule(&[(3, 0), (7, 4)], &[(W, &[0, 1, 2, 4, 5, 6])]),
    rule(&[(3, 0)], &[(W, &[1, 4, 5, 2, 7, 6]), (P, &[1, 4, 7, 2, 3])]),
    rule(&[(0, 4), (1, 5)], &[(W, &[0, 3, 7, 1, 2, 6])]),
    rule(&[(0, 4), (3, 7)], &[(W, &[3, 2, 6, 0, 1, 5])]),
    rule(&[(0, 4)], &[(W, &[1, 2, 3, 5, 6, 7]), (P, &[3, 1, 5, 7, 0])]),
    rule(&[(1, 5), (2, 6)], &[(W, &[1, 0, 4, 2, 3, 7])]),
    rule(&[(1, 5)], &[(W, &[2, 3, 0, 6, 7, 4]), (P, &[0, 2, 6, 4, 1])]),
    rule(&[(2, 6), (3, 7)], &[(W, &[2, 1, 5, 3, 0, 4])]),
    rule(&[(2, 6)], &[(W, &[3, 0, 1, 7, 4, 5]), (P, &[1, 3, 7, 5, 2])]),
    rule(&[(3, 7)], &[(W, &[0, 1, 2, 4, 5, 6]), (P, &[2, 0, 4, 6, 3])]),
    rule(&[(4, 5), (6, 7)], &[(W, &[1, 0, 4, 2, 3, 7])]),
    rule(&[(4, 5)], &[(W, &[0, 3, 7, 1, 2, 6]), (P, &[0, 1, 6, 7, 4])]),
    rule(&[(5, 6), (7, 4)], &[(W, &[2, 1, 5, 3, 0, 4])]),
    rule(&[(5, 6)], &[(W, &[1, 0, 4, 2, 3, 7]), (P, &[1, 2, 7, 4, 5])]),
    rule(&[(6, 7)], &[(W, &[2, 1, 5, 3, 0, 4]), (P, &[2, 3, 4, 5, 6])]),
    rule(&[(7, 4)], &[(W, &[3, 2, 6, 0, 1, 5]), (P, &[3, 0, 5, 6, 7])]),
];

fn rules(shape: Shape) -> &'static [Rule] {
    match shape {
        Shape::Quad => QUAD_RULES,
        Shape::Pyramid => PYRAMID_RULES,
        Shape::Wedge => WEDGE_RULES,
        Shape::Hexa => HEXA_RULES,
        Shape::Line | Shape::Triangle | Shape::Polygon | Shape::Tetra => &[],
    }
}

fn coincidence_mask(points: &[usize]) -> u64 {
    let mut mask = 0;
    for i in 0..points.len().min(8) {
        for j in i + 1..points.len().min(8) {
            if points[i] == points[j] {
                mask |= 1 << (8 * i + j);
            }
        }
    }
    mask
}

/// Collapses `element` through the rule tables.
///
/// A rule fires when every point pair in its key coincides and replaces the
/// element with permutations of its points. The outputs are collapsed
/// again; triangles and tetrahedra left with a repeated point vanish.
///
/// With `split == false`, rules that turn one element into several are not
/// allowed. Returns `None` when no rule applies.
#[must_use]
pub fn collapse(element: &Element, split: bool) -> Option<Collapsed> {
    if !element.has_repeated_points() {
        return Some(Collapsed::Intact);
    }
    if matches!(element.shape, Shape::Line | Shape::Triangle | Shape::Tetra) {
        return Some(Collapsed::Removed);
    }

    let mask = coincidence_mask(&element.points);
    let rule = rules(element.shape)
        .iter()
        .find(|r| mask & r.when == r.when)?;
    if !split && rule.into.len() > 1 {
        return None;
    }

    let mut out = Vec::new();
    for &(shape, perm) in rule.into {
        let piece = Element {
            shape,
            name: element.name,
            points: perm.iter().map(|&k| element.points[k]).collect(),
        };
        match collapse(&piece, split)? {
            Collapsed::Intact => out.push(piece),
            Collapsed::Removed => {}
            Collapsed::Replaced(more) => out.extend(more),
        }
    }

    Some(if out.is_empty() {
        Collapsed::Removed
    } else {
        Collapsed::Replaced(out)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn replaced(c: Option<Collapsed>) -> Vec<Element> {
        match c {
            Some(Collapsed::Replaced(v)) => v,
            other => panic!("expected Replaced, got {other:?}"),
        }
    }

    #[test]
    fn intact_without_repeats() {
        let e = Element::new(Shape::Hexa, (0..8).collect());
        assert_eq!(collapse(&e, true), Some(Collapsed::Intact));
    }

    #[test]
    fn degenerate_triangle_removed() {
        let e = Element::new(Shape::Triangle, vec![0, 1, 1]);
        assert_eq!(collapse(&e, false), Some(Collapsed::Removed));
    }

    #[test]
    fn quad_to_triangle() {
        let e = Element::new(Shape::Quad, vec![4, 4, 5, 6]).with_name(2);
        let out = replaced(collapse(&e, false));
        assert_eq!(out, vec![Element::new(Shape::Triangle, vec![4, 5, 6]).with_name(2)]);
    }

    #[test]
    fn quad_with_two_repeats_removed() {
        let e = Element::new(Shape::Quad, vec![4, 4, 5, 5]);
        assert_eq!(collapse(&e, false), Some(Collapsed::Removed));
    }

    #[test]
    fn pyramid_apex_on_base() {
        let e = Element::new(Shape::Pyramid, vec![0, 1, 2, 3, 2]);
        let out = replaced(collapse(&e, false));
        assert_eq!(out, vec![Element::new(Shape::Tetra, vec![3, 0, 1, 2])]);
    }

    #[test]
    fn wedge_lateral_edge_to_pyramid() {
        let e = Element::new(Shape::Wedge, vec![0, 1, 2, 0, 4, 5]);
        let out = replaced(collapse(&e, false));
        assert_eq!(out, vec![Element::new(Shape::Pyramid, vec![1, 2, 5, 4, 0])]);
    }

    #[test]
    fn wedge_two_lateral_edges_to_tetra() {
        let e = Element::new(Shape::Wedge, vec![0, 1, 2, 0, 1, 5]);
        let out = replaced(collapse(&e, false));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].shape, Shape::Tetra);
        assert!(!out[0].has_repeated_points());
    }

    #[test]
    fn wedge_cap_edge_has_no_rule() {
        let e = Element::new(Shape::Wedge, vec![0, 0, 2, 3, 4, 5]);
        assert_eq!(collapse(&e, true), None);
    }

    #[test]
    fn hexa_two_edges_to_wedge() {
        let e = Element::new(Shape::Hexa, vec![0, 0, 2, 2, 4, 5, 6, 7]);
        let out = replaced(collapse(&e, false));
        assert_eq!(out, vec![Element::new(Shape::Wedge, vec![0, 4, 5, 2, 7, 6])]);
    }

    #[test]
    fn hexa_single_edge_splits() {
        let e = Element::new(Shape::Hexa, vec![0, 0, 2, 3, 4, 5, 6, 7]);
        let out = replaced(collapse(&e, true));
        let shapes: Vec<Shape> = out.iter().map(|e| e.shape).collect();
        assert_eq!(shapes, vec![Shape::Wedge, Shape::Pyramid]);
        assert!(out.iter().all(|e| !e.has_repeated_points()));
    }

    #[test]
    fn hexa_split_refused_without_split() {
        let e = Element::new(Shape::Hexa, vec![0, 0, 2, 3, 4, 5, 6, 7]);
        assert_eq!(collapse(&e, false), None);
    }
}
