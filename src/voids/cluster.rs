//! 周期网格上的连通分量（带路径压缩与按秩合并的并查集）

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 网格邻接方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Face neighbours only
    #[default]
    #[value(name = "6")]
    Six,
    /// Face, edge and corner neighbours
    #[value(name = "26")]
    TwentySix,
}

impl Connectivity {
    /// 正向半邻域；每对邻居只访问一次
    fn forward_offsets(self) -> Vec<[isize; 3]> {
        match self {
            Connectivity::Six => vec![[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            Connectivity::TwentySix => {
                let mut offsets = Vec::with_capacity(13);
                for dw in -1..=1isize {
                    for dv in -1..=1isize {
                        for du in -1..=1isize {
                            if [dw, dv, du] > [0, 0, 0] {
                                offsets.push([du, dv, dw]);
                            }
                        }
                    }
                }
                offsets
            }
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Six => write!(f, "6"),
            Connectivity::TwentySix => write!(f, "26"),
        }
    }
}

pub(crate) struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    pub fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (ka, kb) = (self.rank[ra as usize], self.rank[rb as usize]);
        if ka < kb {
            self.parent[ra as usize] = rb;
        } else {
            self.parent[rb as usize] = ra;
            if ka == kb {
                self.rank[ra as usize] += 1;
            }
        }
    }
}

/// 给 `mask` 为真的点打上连通分量标签
///
/// 返回每点的分量编号（非空点为 `None`）与分量数；编号按分量中最小扁平下标的
/// 先后分配，扁平下标为 u + nx·(v + ny·w)。
pub(crate) fn label_components(
    mask: &[bool],
    dims: [usize; 3],
    connectivity: Connectivity,
) -> (Vec<Option<u32>>, usize) {
    let [nx, ny, nz] = dims;
    let mut uf = UnionFind::new(mask.len());
    let offsets = connectivity.forward_offsets();
    let wrap = |x: usize, d: isize, n: usize| (x as isize + d).rem_euclid(n as isize) as usize;

    for w in 0..nz {
        for v in 0..ny {
            for u in 0..nx {
                let idx = u + nx * (v + ny * w);
                if !mask[idx] {
                    continue;
                }
                for &[du, dv, dw] in &offsets {
                    let nidx = wrap(u, du, nx) + nx * (wrap(v, dv, ny) + ny * wrap(w, dw, nz));
                    if mask[nidx] {
                        uf.union(idx as u32, nidx as u32);
                    }
                }
            }
        }
    }

    let mut labels = vec![None; mask.len()];
    let mut root_label: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
    for (idx, &is_void) in mask.iter().enumerate() {
        if !is_void {
            continue;
        }
        let root = uf.find(idx as u32);
        let next = root_label.len() as u32;
        labels[idx] = Some(*root_label.entry(root).or_insert(next));
    }
    (labels, root_label.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_wrap_joins_edges() {
        // 1D 线上两端的点通过周期边界相连
        let dims = [5, 1, 1];
        let mask = [true, false, false, false, true];
        let (labels, count) = label_components(&mask, dims, Connectivity::Six);
        assert_eq!(count, 1);
        assert_eq!(labels[0], labels[4]);
        assert_eq!(labels[1], None);
    }

    #[test]
    fn test_diagonal_needs_26() {
        let dims = [4, 4, 1];
        let mut mask = vec![false; 16];
        mask[0] = true; // (0,0)
        mask[1 + 4] = true; // (1,1)

        let (_, six) = label_components(&mask, dims, Connectivity::Six);
        let (_, twenty_six) = label_components(&mask, dims, Connectivity::TwentySix);
        assert_eq!(six, 2);
        assert_eq!(twenty_six, 1);
    }

    #[test]
    fn test_forward_offsets_count() {
        assert_eq!(Connectivity::Six.forward_offsets().len(), 3);
        assert_eq!(Connectivity::TwentySix.forward_offsets().len(), 13);
    }
}
