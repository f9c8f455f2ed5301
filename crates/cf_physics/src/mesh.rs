// crates/cf_physics/src/mesh.rs

//! 有限体积网格
//!
//! 只保存通量与源项所需的几何量：单元体积与形心、面（owner、邻居或边界类型、
//! 面积、单位外法向）以及贴壁单元的壁面几何。
//!
//! [`PhaseMesh::channel_1d`] 构建准一维变截面通道：截面变化以侧向滑移壁面表示，
//! 其法向只有 x 分量，压力在侧壁上的投影正好给出 p·dA/dx 源项。

use cf_io::fnv1a64;
use glam::DVec3;

use crate::error::{PhaseError, PhaseResult};

/// 边界类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// 零梯度外推
    Transmissive,
    /// 无穿透滑移壁面
    SlipWall,
    /// 固定状态，索引指向边界状态表
    FixedState(usize),
}

/// 面类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    /// 内部面，携带邻居单元
    Interior(usize),
    /// 边界面
    Boundary(BoundaryKind),
}

/// 网格面
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshFace {
    /// 所属单元
    pub owner: usize,
    /// 面类型
    pub kind: FaceKind,
    /// 面积 [m²]
    pub area: f64,
    /// 单位法向（由 owner 指向外侧）
    pub normal: DVec3,
}

/// 贴壁单元的壁面几何
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallPatch {
    /// 单元索引
    pub cell: usize,
    /// 壁面积 [m²]
    pub area: f64,
    /// 局部通道高度 [m]
    pub channel_height: f64,
}

/// 有限体积网格
#[derive(Debug, Clone)]
pub struct PhaseMesh {
    volumes: Vec<f64>,
    centroids: Vec<DVec3>,
    faces: Vec<MeshFace>,
    walls: Vec<WallPatch>,
    face_area_sum: Vec<f64>,
}

impl PhaseMesh {
    /// 创建并校验网格
    pub fn new(
        volumes: Vec<f64>,
        centroids: Vec<DVec3>,
        faces: Vec<MeshFace>,
        walls: Vec<WallPatch>,
    ) -> PhaseResult<Self> {
        let n = volumes.len();
        PhaseError::check_size("centroids", n, centroids.len())?;
        if let Some(v) = volumes.iter().find(|v| !(**v > 0.0) || !v.is_finite()) {
            return Err(PhaseError::Config(format!("单元体积必须为正: {v}")));
        }

        let mut face_area_sum = vec![0.0; n];
        for (f, face) in faces.iter().enumerate() {
            if face.owner >= n {
                return Err(PhaseError::Config(format!("面 {f} 的 owner {} 越界", face.owner)));
            }
            if let FaceKind::Interior(nb) = face.kind {
                if nb >= n {
                    return Err(PhaseError::Config(format!("面 {f} 的邻居 {nb} 越界")));
                }
                face_area_sum[nb] += face.area;
            }
            face_area_sum[face.owner] += face.area;
        }
        if let Some(w) = walls.iter().find(|w| w.cell >= n) {
            return Err(PhaseError::Config(format!("壁面单元 {} 越界", w.cell)));
        }

        Ok(Self {
            volumes,
            centroids,
            faces,
            walls,
            face_area_sum,
        })
    }

    /// 准一维变截面通道
    ///
    /// `x_faces` 与 `areas` 为面位置与面截面积（长度 n+1），`depth` 为展向宽度。
    /// 每个单元都是贴壁单元，壁面积为 dx·depth，通道高度为平均截面积/depth。
    pub fn channel_1d(
        x_faces: &[f64],
        areas: &[f64],
        depth: f64,
        inlet: BoundaryKind,
        outlet: BoundaryKind,
    ) -> PhaseResult<Self> {
        if x_faces.len() < 2 {
            return Err(PhaseError::Config("通道至少需要一个单元".into()));
        }
        PhaseError::check_size("areas", x_faces.len(), areas.len())?;
        if !(depth > 0.0) {
            return Err(PhaseError::Config(format!("展向宽度必须为正: {depth}")));
        }
        if let Some(a) = areas.iter().find(|a| !(**a > 0.0)) {
            return Err(PhaseError::Config(format!("截面积必须为正: {a}")));
        }

        let n = x_faces.len() - 1;
        let mut volumes = Vec::with_capacity(n);
        let mut centroids = Vec::with_capacity(n);
        let mut walls = Vec::with_capacity(n);
        let mut faces = Vec::with_capacity(2 * n + 1);

        for i in 0..n {
            let dx = x_faces[i + 1] - x_faces[i];
            if !(dx > 0.0) {
                return Err(PhaseError::Config(format!("面坐标必须严格递增: 单元 {i}")));
            }
            let a_mean = 0.5 * (areas[i] + areas[i + 1]);
            volumes.push(a_mean * dx);
            centroids.push(DVec3::new(0.5 * (x_faces[i] + x_faces[i + 1]), 0.0, 0.0));
            walls.push(WallPatch {
                cell: i,
                area: dx * depth,
                channel_height: a_mean / depth,
            });

            let d_area = areas[i + 1] - areas[i];
            if d_area != 0.0 {
                faces.push(MeshFace {
                    owner: i,
                    kind: FaceKind::Boundary(BoundaryKind::SlipWall),
                    area: d_area.abs(),
                    normal: DVec3::new(-d_area.signum(), 0.0, 0.0),
                });
            }
        }

        faces.push(MeshFace {
            owner: 0,
            kind: FaceKind::Boundary(inlet),
            area: areas[0],
            normal: DVec3::NEG_X,
        });
        for i in 1..n {
            faces.push(MeshFace {
                owner: i - 1,
                kind: FaceKind::Interior(i),
                area: areas[i],
                normal: DVec3::X,
            });
        }
        faces.push(MeshFace {
            owner: n - 1,
            kind: FaceKind::Boundary(outlet),
            area: areas[n],
            normal: DVec3::X,
        });

        Self::new(volumes, centroids, faces, walls)
    }

    /// 等截面通道（单位展向宽度，两端外推）
    pub fn uniform_channel(n_cells: usize, length: f64, height: f64) -> Self {
        let n = n_cells.max(1);
        let dx = length / n as f64;
        let volumes = vec![height * dx; n];
        let centroids = (0..n).map(|i| DVec3::new((i as f64 + 0.5) * dx, 0.0, 0.0)).collect();
        let mut faces = Vec::with_capacity(n + 1);
        faces.push(MeshFace {
            owner: 0,
            kind: FaceKind::Boundary(BoundaryKind::Transmissive),
            area: height,
            normal: DVec3::NEG_X,
        });
        for i in 1..n {
            faces.push(MeshFace {
                owner: i - 1,
                kind: FaceKind::Interior(i),
                area: height,
                normal: DVec3::X,
            });
        }
        faces.push(MeshFace {
            owner: n - 1,
            kind: FaceKind::Boundary(BoundaryKind::Transmissive),
            area: height,
            normal: DVec3::X,
        });
        let walls = (0..n)
            .map(|cell| WallPatch {
                cell,
                area: dx,
                channel_height: height,
            })
            .collect();

        let mut face_area_sum = vec![0.0; n];
        for face in &faces {
            face_area_sum[face.owner] += face.area;
            if let FaceKind::Interior(nb) = face.kind {
                face_area_sum[nb] += face.area;
            }
        }

        Self {
            volumes,
            centroids,
            faces,
            walls,
            face_area_sum,
        }
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.volumes.len()
    }

    /// 面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 单元体积
    #[inline]
    pub fn volume(&self, cell: usize) -> f64 {
        self.volumes[cell]
    }

    /// 全部单元体积
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// 单元形心
    #[inline]
    pub fn centroid(&self, cell: usize) -> DVec3 {
        self.centroids[cell]
    }

    /// 全部面
    pub fn faces(&self) -> &[MeshFace] {
        &self.faces
    }

    /// 贴壁单元
    pub fn walls(&self) -> &[WallPatch] {
        &self.walls
    }

    /// 特征长度 2V/ΣA_f
    #[inline]
    pub fn characteristic_length(&self, cell: usize) -> f64 {
        let sum = self.face_area_sum[cell];
        if sum > 0.0 {
            2.0 * self.volumes[cell] / sum
        } else {
            f64::INFINITY
        }
    }

    /// 网格指纹（用于检查点兼容性）
    pub fn hash(&self) -> u64 {
        let mut bytes = Vec::with_capacity(8 * (self.volumes.len() * 4 + self.faces.len() * 6));
        bytes.extend_from_slice(&(self.n_cells() as u64).to_le_bytes());
        for (v, c) in self.volumes.iter().zip(&self.centroids) {
            bytes.extend_from_slice(&v.to_le_bytes());
            for x in c.to_array() {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
        }
        for face in &self.faces {
            bytes.extend_from_slice(&(face.owner as u64).to_le_bytes());
            let tag: u64 = match face.kind {
                FaceKind::Interior(nb) => nb as u64,
                FaceKind::Boundary(_) => u64::MAX,
            };
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&face.area.to_le_bytes());
            for x in face.normal.to_array() {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
        }
        fnv1a64(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nozzle() -> PhaseMesh {
        let x = [0.0, 0.1, 0.2, 0.3];
        let a = [2.0, 1.0, 1.0, 1.5];
        PhaseMesh::channel_1d(&x, &a, 1.0, BoundaryKind::FixedState(0), BoundaryKind::Transmissive).unwrap()
    }

    #[test]
    fn test_channel_geometry() {
        let mesh = nozzle();
        assert_eq!(mesh.n_cells(), 3);
        assert!((mesh.volume(0) - 0.15).abs() < 1e-14);
        assert!((mesh.centroid(2).x - 0.25).abs() < 1e-14);
        // 两个截面变化的单元各有一个侧壁面 + 4 个轴向面
        assert_eq!(mesh.n_faces(), 6);
        assert_eq!(mesh.walls().len(), 3);
        assert!((mesh.walls()[0].channel_height - 1.5).abs() < 1e-14);
    }

    #[test]
    fn test_closed_surface_per_cell() {
        // 每个单元的 Σ A·n_x 为零
        let mesh = nozzle();
        let mut net = vec![0.0; mesh.n_cells()];
        for face in mesh.faces() {
            net[face.owner] += face.area * face.normal.x;
            if let FaceKind::Interior(nb) = face.kind {
                net[nb] -= face.area * face.normal.x;
            }
        }
        for v in net {
            assert!(v.abs() < 1e-14);
        }
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(PhaseMesh::channel_1d(&[0.0], &[1.0], 1.0, BoundaryKind::Transmissive, BoundaryKind::Transmissive).is_err());
        assert!(PhaseMesh::channel_1d(&[0.0, 1.0], &[1.0], 1.0, BoundaryKind::Transmissive, BoundaryKind::Transmissive).is_err());
        assert!(PhaseMesh::channel_1d(&[0.0, 0.0], &[1.0, 1.0], 1.0, BoundaryKind::Transmissive, BoundaryKind::Transmissive).is_err());
    }

    #[test]
    fn test_hash_sensitive_to_geometry() {
        let a = PhaseMesh::uniform_channel(10, 1.0, 0.01);
        let b = PhaseMesh::uniform_channel(10, 1.0, 0.01);
        let c = PhaseMesh::uniform_channel(10, 1.0, 0.02);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_characteristic_length() {
        let mesh = PhaseMesh::uniform_channel(10, 1.0, 0.01);
        // V = 1e-3, ΣA = 0.02
        assert!((mesh.characteristic_length(3) - 0.1).abs() < 1e-12);
    }
}
