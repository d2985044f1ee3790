//! 内置几何体生成模块
//!
//! 提供演示场景用的程序化网格：四边形、地面、网格地形和立方体。
//! 顶点布局固定为 位置 + 法线 + UV，与 HLSL 输入布局一一对应。

use bytemuck::{Pod, Zeroable};

/// 顶点结构
///
/// `#[repr(C)]` + `Pod` 保证内存布局与顶点缓冲区字节序一致。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 位置
    pub position: [f32; 3],
    /// 法线
    pub normal: [f32; 3],
    /// 纹理坐标
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// CPU 侧网格数据
///
/// 索引固定使用 32 位无符号格式。
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// 顶点数据的字节视图，用于上传
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// 索引数据的字节视图
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// 面向 +Z 的单位四边形
pub fn quad() -> MeshData {
    MeshData {
        vertices: vec![
            Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// 朝上的地面平面，边长 `size`
pub fn plane(size: f32) -> MeshData {
    let half = size / 2.0;
    MeshData {
        vertices: vec![
            Vertex::new([-half, 0.0, -half], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([half, 0.0, -half], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-half, 0.0, half], [0.0, 1.0, 0.0], [0.0, 1.0]),
            Vertex::new([half, 0.0, half], [0.0, 1.0, 0.0], [1.0, 1.0]),
        ],
        indices: vec![2, 1, 0, 3, 1, 2],
    }
}

/// 细分的网格地形，`resolution × resolution` 个单元
pub fn grid(resolution: u32, size: f32) -> MeshData {
    let step = size / resolution as f32;
    let offset = size / 2.0;
    let side = resolution + 1;

    let mut mesh = MeshData {
        vertices: Vec::with_capacity((side * side) as usize),
        indices: Vec::with_capacity((resolution * resolution * 6) as usize),
    };

    for i in 0..side {
        for j in 0..side {
            let x = j as f32 * step - offset;
            let z = i as f32 * step - offset;
            mesh.vertices.push(Vertex::new(
                [x, 0.0, z],
                [0.0, 1.0, 0.0],
                [j as f32 / resolution as f32, i as f32 / resolution as f32],
            ));
        }
    }

    for i in 0..resolution {
        for j in 0..resolution {
            let top_left = i * side + j;
            let top_right = top_left + 1;
            let bottom_left = top_left + side;
            let bottom_right = bottom_left + 1;

            mesh.indices.extend_from_slice(&[top_left, bottom_left, bottom_right]);
            mesh.indices.extend_from_slice(&[top_left, bottom_right, top_right]);
        }
    }

    mesh
}

/// 单位立方体，24 个顶点（每面独立法线和 UV）
pub fn cube() -> MeshData {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (法线, 切向 u, 切向 v)
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ];

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };

    for (face, (normal, u_axis, v_axis)) in faces.iter().enumerate() {
        let base = (face * 4) as u32;
        let corners: [(f32, f32); 4] = [(-0.5, 0.5), (0.5, 0.5), (0.5, -0.5), (-0.5, -0.5)];
        let uvs: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        for (&(u, v), uv) in corners.iter().zip(uvs.iter()) {
            let position = [
                normal[0] * 0.5 + u_axis[0] * u + v_axis[0] * v,
                normal[1] * 0.5 + u_axis[1] * u + v_axis[1] * v,
                normal[2] * 0.5 + u_axis[2] * u + v_axis[2] * v,
            ];
            mesh.vertices.push(Vertex::new(position, *normal, *uv));
        }

        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

/// 天空盒立方体：与 [`cube`] 同形，索引反绕向，从内侧可见
pub fn skybox() -> MeshData {
    let mut mesh = cube();
    for triangle in mesh.indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride_matches_layout() {
        // 3 + 3 + 2 个 f32
        assert_eq!(Vertex::STRIDE, 32);
    }

    #[test]
    fn test_quad_counts() {
        let mesh = quad();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.vertex_bytes().len(), 4 * Vertex::STRIDE as usize);
    }

    #[test]
    fn test_grid_counts() {
        let mesh = grid(100, 10.0);
        assert_eq!(mesh.vertices.len(), 101 * 101);
        assert_eq!(mesh.index_count(), 100 * 100 * 6);
        // 索引都在顶点范围内
        let max = *mesh.indices.iter().max().unwrap();
        assert!((max as usize) < mesh.vertices.len());
    }

    #[test]
    fn test_cube_counts() {
        let mesh = cube();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.index_count(), 36);
    }

    #[test]
    fn test_skybox_reverses_winding() {
        let outer = cube();
        let inner = skybox();
        assert_eq!(outer.indices[0], inner.indices[0]);
        assert_eq!(outer.indices[1], inner.indices[2]);
        assert_eq!(outer.indices[2], inner.indices[1]);
    }
}
